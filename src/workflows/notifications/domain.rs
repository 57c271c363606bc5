//! In-app notification records. Display data is denormalized at creation
//! time: whatever the sender, job or company were called at that moment is
//! what the notification keeps showing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::companies::domain::CompanyId;
use crate::workflows::jobs::domain::JobId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of the marketplace a notification addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountType {
    Freelancer,
    Employer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    // shown to employers
    ApplicantsSelected,
    ContactInfoApproved,
    ContactInfoDenied,
    ReviewRequested,
    FreelancerSignature,
    // shown to freelancers
    ContactInfoRequested,
    ReviewReceived,
    EmployerSignature,
    NewFreelancerContract,
}

impl NotificationKind {
    /// The account role this kind addresses; stored alongside the record
    /// so clients can filter without knowing the kind table.
    pub const fn account_type(self) -> AccountType {
        match self {
            NotificationKind::ApplicantsSelected
            | NotificationKind::ContactInfoApproved
            | NotificationKind::ContactInfoDenied
            | NotificationKind::ReviewRequested
            | NotificationKind::FreelancerSignature => AccountType::Employer,
            NotificationKind::ContactInfoRequested
            | NotificationKind::ReviewReceived
            | NotificationKind::EmployerSignature
            | NotificationKind::NewFreelancerContract => AccountType::Freelancer,
        }
    }
}

/// Display snapshot of a user at notification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub photo: String,
}

impl PartyRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, photo: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            photo: photo.into(),
        }
    }
}

/// Display snapshot of the job a notification concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub id: JobId,
    pub name: String,
}

/// Display snapshot of the company a notification concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub photo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub account_type: AccountType,
    pub recipient: PartyRef,
    pub sender: PartyRef,
    pub job: Option<JobRef>,
    pub company: Option<CompanyRef>,
    pub date: DateTime<Utc>,
    pub read: bool,
    pub is_system: bool,
}

/// What a workflow hands the notifier; everything else is derived at
/// write time. A missing sender marks the record as a platform (system)
/// notification.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub recipient: PartyRef,
    pub sender: Option<PartyRef>,
    pub job: Option<JobRef>,
    pub company: Option<CompanyRef>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationKind, recipient: PartyRef) -> Self {
        Self {
            kind,
            recipient,
            sender: None,
            job: None,
            company: None,
        }
    }

    pub fn from_sender(mut self, sender: PartyRef) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn about_job(mut self, job: JobRef) -> Self {
        self.job = Some(job);
        self
    }

    pub fn about_company(mut self, company: CompanyRef) -> Self {
        self.company = Some(company);
        self
    }
}
