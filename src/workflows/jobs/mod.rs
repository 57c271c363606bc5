//! The job aggregate: lifecycle state machine, contract signatures,
//! applicant selection and the relation/overview reads.

pub mod deadline;
pub mod domain;
pub mod lifecycle;
pub mod relations;
pub mod repository;
pub mod router;
pub mod selection;
pub mod signatures;

pub(crate) mod docs;

#[cfg(test)]
mod tests;

pub use deadline::{
    format_compact, offer_deadline, parse_compact, working_days_between, DEFAULT_OFFER_WINDOW_DAYS,
};
pub use domain::{
    Applicant, ContactStatus, EmployeePermission, FreelancerApplicant, Job, JobEmployee,
    JobEmployeeProfile, JobFailure, JobId, JobInfo, JobLog, JobOverview, JobOverviewBatch,
    JobRelation, JobStatus, JobSummary, JobType, JobWithRelations, NotSelectedReason, Offer,
    OverviewCompany, RateKind, Signature, SignatureParty, Signatures,
};
pub use lifecycle::{InfoUpdate, JobForm, JobInfoForm, JobLifecycle, LogDraft};
pub use relations::RelationResolver;
pub use repository::{JobError, JobRepository};
pub use router::{jobs_router, JobsApi};
pub use selection::{SelectionManager, SelectionOutcome};
pub use signatures::SignatureCoordinator;
