//! Typed reads for jobs and their subcollections, plus the guarded
//! read-derive-commit cycle every racy mutation goes through.

use std::sync::Arc;

use tracing::warn;

use super::docs::{applicant_from_doc, employee_from_doc, job_from_doc, JOBS};
use super::domain::{Applicant, Job, JobEmployee, JobId, JobStatus};
use crate::store::{
    CollectionPath, ConvertError, DocPath, DocumentStore, Patch, StoreError, WriteBatch,
};
use crate::workflows::companies::domain::CompanyId;
use crate::workflows::notifications::NotificationError;
use crate::workflows::users::domain::UserId;

/// Attempts before a guarded update gives up on a contended job.
pub(crate) const GUARDED_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("user {user} has not applied to job {job}")]
    ApplicantNotFound { job: JobId, user: UserId },
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("user {0} has no freelancer profile")]
    NotFreelancer(UserId),
    #[error("company {0} not found")]
    CompanyNotFound(CompanyId),
    #[error("user {user} is not a member of company {company}")]
    NotCompanyMember { company: CompanyId, user: UserId },
    #[error("user {user} is not on the roster of job {job}")]
    NotAnEmployee { job: JobId, user: UserId },
    #[error("job {job} cannot move from {from} to {to}")]
    IllegalTransition {
        job: JobId,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("job {0} has no selected applicants to submit")]
    EmptyShortlist(JobId),
    #[error("user {user} is not an applicant of job {job}")]
    NotAnApplicant { job: JobId, user: UserId },
    #[error("user {user} already applied to job {job}")]
    AlreadyApplied { job: JobId, user: UserId },
    #[error("job {job} is {status} and no longer accepts applications")]
    JobClosed { job: JobId, status: JobStatus },
    #[error("job {job} is {status}; signatures are only collected while it requires them")]
    NotSignable { job: JobId, status: JobStatus },
    #[error("{field} is not a dd-mm-yyyy date: {value}")]
    InvalidSchedule { field: &'static str, value: String },
    #[error("job {0} kept changing concurrently; giving up")]
    Contention(JobId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

pub struct JobRepository<S> {
    store: Arc<S>,
}

impl<S> Clone for JobRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> JobRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn collection() -> CollectionPath {
        CollectionPath::new(JOBS)
    }

    pub(crate) fn doc(id: &JobId) -> DocPath {
        Self::collection().doc(id.0.clone())
    }

    pub(crate) fn applicants_collection(id: &JobId) -> CollectionPath {
        CollectionPath::new(format!("{JOBS}/{id}/applicants"))
    }

    pub(crate) fn employees_collection(id: &JobId) -> CollectionPath {
        CollectionPath::new(format!("{JOBS}/{id}/employees"))
    }

    /// The job plus the version its document carried, for preconditions.
    pub async fn job(&self, id: &JobId) -> Result<(Job, u64), JobError> {
        let doc = self
            .store
            .get(&Self::doc(id))
            .await?
            .ok_or_else(|| JobError::NotFound(id.clone()))?;
        Ok((job_from_doc(&doc)?, doc.version))
    }

    pub async fn applicant(&self, id: &JobId, user: &UserId) -> Result<Applicant, JobError> {
        let path = Self::applicants_collection(id).doc(user.0.clone());
        let doc = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| JobError::ApplicantNotFound {
                job: id.clone(),
                user: user.clone(),
            })?;
        Ok(applicant_from_doc(&doc)?)
    }

    pub async fn applicants(&self, id: &JobId) -> Result<Vec<Applicant>, JobError> {
        let docs = self.store.list(&Self::applicants_collection(id)).await?;
        let mut applicants = Vec::with_capacity(docs.len());
        for doc in &docs {
            match applicant_from_doc(doc) {
                Ok(applicant) => applicants.push(applicant),
                Err(err) => warn!(job = %id, error = %err, "skipping undecodable applicant"),
            }
        }
        Ok(applicants)
    }

    pub async fn employees(&self, id: &JobId) -> Result<Vec<JobEmployee>, JobError> {
        let docs = self.store.list(&Self::employees_collection(id)).await?;
        let mut employees = Vec::with_capacity(docs.len());
        for doc in &docs {
            match employee_from_doc(doc) {
                Ok(employee) => employees.push(employee),
                Err(err) => warn!(job = %id, error = %err, "skipping undecodable roster entry"),
            }
        }
        Ok(employees)
    }

    /// Read the job, derive a patch from its current state and commit it
    /// under the version observed. Retried a bounded number of times when
    /// a concurrent writer gets there first, so racing callers serialize
    /// instead of losing updates.
    pub async fn update_derived<F>(&self, id: &JobId, derive: F) -> Result<Job, JobError>
    where
        F: Fn(&Job) -> Result<Patch, JobError>,
    {
        for _ in 0..GUARDED_ATTEMPTS {
            let (job, version) = self.job(id).await?;
            let patch = derive(&job)?;
            let mut batch = WriteBatch::new();
            batch.update_if_version(Self::doc(id), patch, version);
            match self.store.commit(batch).await {
                Ok(()) => return Ok(self.job(id).await?.0),
                Err(StoreError::Conflict(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(JobError::Contention(id.clone()))
    }
}
