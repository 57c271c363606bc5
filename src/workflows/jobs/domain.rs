//! The job aggregate: lifecycle states, logs, signatures, the applicant
//! roster and the relation vocabulary the resolver understands.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::companies::domain::{Company, CompanyId};
use crate::workflows::tags::{TagId, UnapprovedTags};
use crate::workflows::users::domain::{FreelancerUser, User, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states of a job. The forward chain follows the hiring
/// funnel; `denied`, `cancelled`, `postponed` and `completed` are
/// absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    InReview,
    Approved,
    ChooseFreelancers,
    RequiresSignature,
    InProgress,
    ReadyForReview,
    Completed,
    Denied,
    Cancelled,
    Postponed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::InReview => "inReview",
            JobStatus::Approved => "approved",
            JobStatus::ChooseFreelancers => "chooseFreelancers",
            JobStatus::RequiresSignature => "requiresSignature",
            JobStatus::InProgress => "inProgress",
            JobStatus::ReadyForReview => "readyForReview",
            JobStatus::Completed => "completed",
            JobStatus::Denied => "denied",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Postponed => "postponed",
        }
    }

    /// Absorbing states; no transition leaves them.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Denied | JobStatus::Cancelled | JobStatus::Postponed | JobStatus::Completed
        )
    }

    /// The legal transition graph. `cancelled` and `postponed` are
    /// off-ramps from every non-terminal state; `denied` only from
    /// review.
    pub fn can_advance_to(self, target: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, target),
            (JobStatus::InReview, JobStatus::Approved)
                | (JobStatus::InReview, JobStatus::Denied)
                | (JobStatus::Approved, JobStatus::ChooseFreelancers)
                | (JobStatus::ChooseFreelancers, JobStatus::RequiresSignature)
                | (JobStatus::RequiresSignature, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::ReadyForReview)
                | (JobStatus::ReadyForReview, JobStatus::Completed)
                | (_, JobStatus::Cancelled)
                | (_, JobStatus::Postponed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the engagement is scoped on the job form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobType {
    NotSure,
    PartTime,
    Timeframe,
}

/// Schedule facts. `start` and `end` are compact `dd-mm-yyyy` strings as
/// entered on the form; `percentage` only applies to part-time jobs and
/// `num_of_hours` only to timeframe jobs. `deadline` is the computed
/// end of the offer window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub start: String,
    pub end: String,
    pub percentage: Option<u32>,
    pub num_of_hours: Option<u32>,
    pub deadline: Option<DateTime<Utc>>,
}

/// One entry of the append-only job history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLog {
    pub status: JobStatus,
    pub date: DateTime<Utc>,
    pub title: String,
    pub description: String,
}

/// The two signing sides of a job contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignatureParty {
    Employer,
    Freelancer,
}

impl SignatureParty {
    pub const fn counterpart(self) -> SignatureParty {
        match self {
            SignatureParty::Employer => SignatureParty::Freelancer,
            SignatureParty::Freelancer => SignatureParty::Employer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub id: UserId,
    pub date: DateTime<Utc>,
}

/// Signature slots for the two parties. Persisted as null while both
/// slots are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signatures {
    pub employer: Option<Signature>,
    pub freelancer: Option<Signature>,
}

impl Signatures {
    pub fn is_empty(&self) -> bool {
        self.employer.is_none() && self.freelancer.is_none()
    }

    pub fn complete(&self) -> bool {
        self.employer.is_some() && self.freelancer.is_some()
    }

    pub fn of(&self, party: SignatureParty) -> Option<&Signature> {
        match party {
            SignatureParty::Employer => self.employer.as_ref(),
            SignatureParty::Freelancer => self.freelancer.as_ref(),
        }
    }

    pub fn set(&mut self, party: SignatureParty, signature: Signature) {
        match party {
            SignatureParty::Employer => self.employer = Some(signature),
            SignatureParty::Freelancer => self.freelancer = Some(signature),
        }
    }
}

/// Contact-information disclosure between the company and an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContactStatus {
    Requested,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    Hourly,
    Fixed,
}

/// A freelancer's bid. Rates are digit-only strings; anything else the
/// form lets through is stripped before persisting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub hourly_rate: String,
    pub fixed_rate: String,
    pub message: String,
    pub date: Option<DateTime<Utc>>,
    pub accepted_rate: Option<RateKind>,
}

impl Offer {
    pub fn sanitized(mut self) -> Self {
        self.hourly_rate = digits_only(&self.hourly_rate);
        self.fixed_rate = digits_only(&self.fixed_rate);
        self
    }
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// An application living under `jobs/{id}/applicants/{userId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applicant {
    pub id: UserId,
    pub offer: Offer,
    pub contact_approval: Option<ContactStatus>,
}

/// Canned reasons shown to applicants who were not picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotSelectedReason {
    PriceTooHigh,
    MoreRelevantExperience,
    ProjectChanged,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeePermission {
    Edit,
    View,
}

/// A company-side user on the job roster; at most one is the designated
/// contract signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEmployee {
    pub id: UserId,
    pub permission: EmployeePermission,
    pub signer: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub description: String,
    pub generated_description: Option<String>,
    pub original_description: Option<String>,
    pub kind: JobType,
    pub status: JobStatus,
    pub job_info: JobInfo,
    pub job_titles: Vec<TagId>,
    pub skills: Vec<TagId>,
    pub languages: Vec<TagId>,
    pub unapproved_tags: Option<UnapprovedTags>,
    pub logs: Vec<JobLog>,
    pub signatures: Signatures,
    pub terms: Option<DateTime<Utc>>,
    pub document_id: Option<String>,
    pub document_storage_url: Option<String>,
    pub not_selected_reason: Option<NotSelectedReason>,
    pub hidden: bool,
    pub company: CompanyId,
    pub creator: UserId,
    pub selected_applicants: Vec<UserId>,
    pub freelancers: Vec<UserId>,
}

impl Job {
    pub fn last_log(&self) -> Option<&JobLog> {
        self.logs.last()
    }
}

/// Relations a caller may ask the resolver to attach to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobRelation {
    Creator,
    Company,
    Employees,
    Applicants,
    SelectedApplicants,
    Freelancers,
}

impl JobRelation {
    /// Shortlist and hire relations are filters over the applicant join,
    /// so requesting them forces the applicants to resolve first.
    pub const fn requires_applicants(self) -> bool {
        matches!(
            self,
            JobRelation::Applicants | JobRelation::SelectedApplicants | JobRelation::Freelancers
        )
    }

    pub fn from_name(name: &str) -> Option<JobRelation> {
        match name {
            "creator" => Some(JobRelation::Creator),
            "company" => Some(JobRelation::Company),
            "employees" => Some(JobRelation::Employees),
            "applicants" => Some(JobRelation::Applicants),
            "selectedApplicants" => Some(JobRelation::SelectedApplicants),
            "freelancers" => Some(JobRelation::Freelancers),
            _ => None,
        }
    }
}

/// An applicant joined with the freelancer account behind it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreelancerApplicant {
    pub user: FreelancerUser,
    pub offer: Offer,
    pub contact_approval: Option<ContactStatus>,
}

/// A roster entry joined with the account's display name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEmployeeProfile {
    pub user: UserId,
    pub name: String,
    pub permission: EmployeePermission,
    pub signer: bool,
}

/// A job plus whichever relations were requested. Unrequested relations
/// stay `None` so callers can tell "not fetched" from "fetched, empty".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobWithRelations {
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employees: Option<Vec<JobEmployeeProfile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicants: Option<Vec<FreelancerApplicant>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_applicants: Option<Vec<FreelancerApplicant>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freelancers: Option<Vec<FreelancerApplicant>>,
}

/// Condensed per-job row of the admin overview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: JobId,
    pub title: String,
    pub status: JobStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub info: JobInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewCompany {
    pub id: CompanyId,
    pub name: String,
    pub logo: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOverview {
    pub job: JobSummary,
    pub logs: Vec<JobLog>,
    pub company: OverviewCompany,
    pub applicant_count: usize,
    pub creator: UserId,
    pub creator_name: String,
}

/// A job the overview could not assemble, with the reason it was left
/// out.
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub job: JobId,
    pub reason: String,
}

/// One overview page. Failures ride along instead of aborting the batch.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOverviewBatch {
    pub jobs: Vec<JobOverview>,
    pub failed: Vec<JobFailure>,
    pub cursor: Option<JobId>,
    pub has_more: bool,
}
