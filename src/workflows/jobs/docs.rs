//! Stored shapes for `jobs/{id}` and its applicant/employee
//! subcollections. Conversion swaps dates for stamps and ids for
//! references; the only normalization applied is the null-when-empty
//! rule for `signatures` and `unapprovedTags`.

use serde::{Deserialize, Serialize};

use super::domain::{
    Applicant, ContactStatus, EmployeePermission, Job, JobEmployee, JobId, JobInfo, JobLog,
    JobStatus, JobType, NotSelectedReason, Offer, RateKind, Signature, Signatures,
};
use crate::store::{decode, ConvertError, DocRef, Document, Stamp};
use crate::workflows::companies::domain::CompanyId;
use crate::workflows::tags::{TagId, UnapprovedTags};
use crate::workflows::users::domain::UserId;

pub(crate) const JOBS: &str = "jobs";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LogDoc {
    pub status: JobStatus,
    pub date: Stamp,
    pub title: String,
    pub description: String,
}

impl LogDoc {
    pub fn from_log(log: &JobLog) -> Self {
        Self {
            status: log.status,
            date: Stamp::from(log.date),
            title: log.title.clone(),
            description: log.description.clone(),
        }
    }

    pub fn into_log(self) -> JobLog {
        JobLog {
            status: self.status,
            date: self.date.into(),
            title: self.title,
            description: self.description,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SignatureDoc {
    pub id: UserId,
    pub date: Stamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SignaturesDoc {
    #[serde(default)]
    pub employer: Option<SignatureDoc>,
    #[serde(default)]
    pub freelancer: Option<SignatureDoc>,
}

impl SignaturesDoc {
    /// None while both slots are empty; the document stores null then.
    pub fn from_signatures(signatures: &Signatures) -> Option<Self> {
        if signatures.is_empty() {
            return None;
        }
        let slot = |signature: &Signature| SignatureDoc {
            id: signature.id.clone(),
            date: Stamp::from(signature.date),
        };
        Some(Self {
            employer: signatures.employer.as_ref().map(slot),
            freelancer: signatures.freelancer.as_ref().map(slot),
        })
    }

    pub fn into_signatures(self) -> Signatures {
        let slot = |doc: SignatureDoc| Signature {
            id: doc.id,
            date: doc.date.into(),
        };
        Signatures {
            employer: self.employer.map(slot),
            freelancer: self.freelancer.map(slot),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobInfoDoc {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub percentage: Option<u32>,
    #[serde(default)]
    pub num_of_hours: Option<u32>,
    #[serde(default)]
    pub deadline: Option<Stamp>,
}

impl JobInfoDoc {
    pub fn from_info(info: &JobInfo) -> Self {
        Self {
            start: info.start.clone(),
            end: info.end.clone(),
            percentage: info.percentage,
            num_of_hours: info.num_of_hours,
            deadline: info.deadline.map(Stamp::from),
        }
    }

    pub fn into_info(self) -> JobInfo {
        JobInfo {
            start: self.start,
            end: self.end,
            percentage: self.percentage,
            num_of_hours: self.num_of_hours,
            deadline: self.deadline.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OfferDoc {
    #[serde(default)]
    pub hourly_rate: String,
    #[serde(default)]
    pub fixed_rate: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub date: Option<Stamp>,
    #[serde(default)]
    pub accepted_rate: Option<RateKind>,
}

impl OfferDoc {
    pub fn from_offer(offer: &Offer) -> Self {
        Self {
            hourly_rate: offer.hourly_rate.clone(),
            fixed_rate: offer.fixed_rate.clone(),
            message: offer.message.clone(),
            date: offer.date.map(Stamp::from),
            accepted_rate: offer.accepted_rate,
        }
    }

    pub fn into_offer(self) -> Offer {
        Offer {
            hourly_rate: self.hourly_rate,
            fixed_rate: self.fixed_rate,
            message: self.message,
            date: self.date.map(Into::into),
            accepted_rate: self.accepted_rate,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApplicantDoc {
    pub offer: OfferDoc,
    #[serde(default)]
    pub contact_approval: Option<ContactStatus>,
}

impl ApplicantDoc {
    pub fn from_applicant(applicant: &Applicant) -> Self {
        Self {
            offer: OfferDoc::from_offer(&applicant.offer),
            contact_approval: applicant.contact_approval,
        }
    }
}

pub(crate) fn applicant_from_doc(doc: &Document) -> Result<Applicant, ConvertError> {
    let stored: ApplicantDoc = decode(doc)?;
    Ok(Applicant {
        id: UserId(doc.path.id().to_string()),
        offer: stored.offer.into_offer(),
        contact_approval: stored.contact_approval,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JobEmployeeDoc {
    pub permission: EmployeePermission,
    #[serde(default)]
    pub signer: Option<bool>,
}

pub(crate) fn employee_from_doc(doc: &Document) -> Result<JobEmployee, ConvertError> {
    let stored: JobEmployeeDoc = decode(doc)?;
    Ok(JobEmployee {
        id: UserId(doc.path.id().to_string()),
        permission: stored.permission,
        signer: stored.signer.unwrap_or(false),
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobDoc {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub generated_description: Option<String>,
    #[serde(default)]
    pub original_description: Option<String>,
    #[serde(rename = "type")]
    pub kind: JobType,
    pub status: JobStatus,
    pub job_info: JobInfoDoc,
    #[serde(default)]
    pub job_titles: Vec<TagId>,
    #[serde(default)]
    pub skills: Vec<TagId>,
    #[serde(default)]
    pub languages: Vec<TagId>,
    #[serde(default)]
    pub unapproved_tags: Option<UnapprovedTags>,
    #[serde(default)]
    pub logs: Vec<LogDoc>,
    #[serde(default)]
    pub signatures: Option<SignaturesDoc>,
    #[serde(default)]
    pub terms: Option<Stamp>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub document_storage_url: Option<String>,
    #[serde(default)]
    pub not_selected_reason: Option<NotSelectedReason>,
    #[serde(default)]
    pub hidden: bool,
    pub company: DocRef,
    pub creator: DocRef,
    #[serde(default)]
    pub selected_applicants: Vec<DocRef>,
    #[serde(default)]
    pub freelancers: Vec<DocRef>,
}

impl JobDoc {
    pub fn from_job(job: &Job) -> Self {
        let applicant_ref =
            |user: &UserId| DocRef::new(&format!("{JOBS}/{}/applicants", job.id), user);
        Self {
            name: job.name.clone(),
            description: job.description.clone(),
            generated_description: job.generated_description.clone(),
            original_description: job.original_description.clone(),
            kind: job.kind,
            status: job.status,
            job_info: JobInfoDoc::from_info(&job.job_info),
            job_titles: job.job_titles.clone(),
            skills: job.skills.clone(),
            languages: job.languages.clone(),
            unapproved_tags: UnapprovedTags::normalize(job.unapproved_tags.clone()),
            logs: job.logs.iter().map(LogDoc::from_log).collect(),
            signatures: SignaturesDoc::from_signatures(&job.signatures),
            terms: job.terms.map(Stamp::from),
            document_id: job.document_id.clone(),
            document_storage_url: job.document_storage_url.clone(),
            not_selected_reason: job.not_selected_reason,
            hidden: job.hidden,
            company: DocRef::new("companies", &job.company),
            creator: DocRef::new("users", &job.creator),
            selected_applicants: job.selected_applicants.iter().map(applicant_ref).collect(),
            freelancers: job.freelancers.iter().map(applicant_ref).collect(),
        }
    }
}

pub(crate) fn job_from_doc(doc: &Document) -> Result<Job, ConvertError> {
    let stored: JobDoc = decode(doc)?;
    let ids = |refs: Vec<DocRef>| {
        refs.into_iter()
            .map(|r| UserId(r.doc_id().to_string()))
            .collect()
    };
    Ok(Job {
        id: JobId(doc.path.id().to_string()),
        name: stored.name,
        description: stored.description,
        generated_description: stored.generated_description,
        original_description: stored.original_description,
        kind: stored.kind,
        status: stored.status,
        job_info: stored.job_info.into_info(),
        job_titles: stored.job_titles,
        skills: stored.skills,
        languages: stored.languages,
        unapproved_tags: UnapprovedTags::normalize(stored.unapproved_tags),
        logs: stored.logs.into_iter().map(LogDoc::into_log).collect(),
        signatures: stored
            .signatures
            .map(SignaturesDoc::into_signatures)
            .unwrap_or_default(),
        terms: stored.terms.map(Into::into),
        document_id: stored.document_id,
        document_storage_url: stored.document_storage_url,
        not_selected_reason: stored.not_selected_reason,
        hidden: stored.hidden,
        company: CompanyId(stored.company.doc_id().to_string()),
        creator: UserId(stored.creator.doc_id().to_string()),
        selected_applicants: ids(stored.selected_applicants),
        freelancers: ids(stored.freelancers),
    })
}
