//! Marketplace account model. A user always carries a `general` record
//! and at most one of the `freelancer` / `employer` role profiles; most
//! call sites want one specific role, so the service exposes role-checked
//! projections.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::alerts::Locale;
use crate::workflows::companies::domain::{Company, CompanyId};
use crate::workflows::jobs::domain::JobId;
use crate::workflows::tags::{TagId, UnapprovedTags};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub String);

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phone {
    pub number: String,
    pub country_code: String,
}

/// Profile photo; `original_url` keeps the uncropped upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub url: String,
    #[serde(default)]
    pub original_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub postal_code: String,
    pub city: String,
}

/// A freelancer operating through their own registered business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnBusiness {
    pub name: String,
    pub ssn: String,
    pub address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Social {
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub website: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Identity shared by both marketplace roles.
#[derive(Debug, Clone, Serialize)]
pub struct General {
    pub name: String,
    pub email: String,
    pub ssn: String,
    pub phone: Phone,
    pub photo: Option<Photo>,
    pub locale: Locale,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FreelancerStatus {
    InReview,
    Approved,
    Denied,
    RequiresSignature,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub school: String,
    pub degree: String,
    pub from: String,
    pub to: String,
}

/// Platform contract a freelancer signs before taking work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreelancerContract {
    pub document_id: String,
    pub link: String,
    pub signed: bool,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Freelancer {
    pub status: FreelancerStatus,
    pub gender: Gender,
    pub photo: Photo,
    pub job_titles: Vec<TagId>,
    pub skills: Vec<TagId>,
    pub languages: Vec<TagId>,
    pub unapproved_tags: Option<UnapprovedTags>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    /// Jobs the freelancer currently has an application on.
    pub jobs: Vec<JobId>,
    pub contract: Option<FreelancerContract>,
    /// Reviews curated onto the public profile, in display order.
    pub selected_reviews: Vec<ReviewId>,
    pub address: Option<Address>,
    pub own_business: Option<OwnBusiness>,
    pub social: Option<Social>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Employer {
    pub position: String,
    pub active_company: Option<CompanyId>,
    pub companies: Vec<CompanyId>,
}

/// Per-user delivery preferences honored by alert fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub sms_alerts: bool,
    pub denied_offer_mail: bool,
    pub cancelled_job_mail: bool,
    #[serde(default)]
    pub excluded_job_titles: Vec<TagId>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sms_alerts: true,
            denied_offer_mail: true,
            cancelled_job_mail: true,
            excluded_job_titles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub general: General,
    pub settings: Option<Settings>,
    pub freelancer: Option<Freelancer>,
    pub employer: Option<Employer>,
}

/// A user proven to carry the freelancer role.
#[derive(Debug, Clone, Serialize)]
pub struct FreelancerUser {
    pub id: UserId,
    pub general: General,
    pub freelancer: Freelancer,
}

/// A user proven to carry the employer role, with their companies
/// resolved.
#[derive(Debug, Clone, Serialize)]
pub struct EmployerUser {
    pub id: UserId,
    pub general: General,
    pub position: String,
    pub company: Option<Company>,
    pub companies: Vec<Company>,
}

/// Review left on a freelancer after a completed job; the job and company
/// are frozen as display snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub job_name: String,
    pub job_description: String,
    pub company: ReviewCompany,
    pub stars: u8,
    pub text: String,
    pub show: bool,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCompany {
    pub name: String,
    pub employer_name: String,
    #[serde(default)]
    pub logo: String,
}
