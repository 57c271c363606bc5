//! Contract signature collection. Signing is only legal while the job
//! sits in `requiresSignature`; whichever party signs second moves the
//! job to `inProgress` in the same write as its signature.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::docs::{LogDoc, SignatureDoc};
use super::domain::{Job, JobId, JobStatus, SignatureParty};
use super::lifecycle::{load_user, party_ref};
use super::repository::{JobError, JobRepository};
use crate::store::{encode, CollectionPath, DocumentStore, Patch, Stamp};
use crate::workflows::alerts::{AlertMessenger, DynamicData, TemplateKind};
use crate::workflows::companies::docs::company_from_doc;
use crate::workflows::companies::domain::Company;
use crate::workflows::notifications::{
    JobRef, NotificationDraft, NotificationKind, Notifier, PartyRef,
};
use crate::workflows::users::domain::{User, UserId};

pub struct SignatureCoordinator<S, M> {
    repo: JobRepository<S>,
    notifier: Arc<Notifier<S>>,
    messenger: Arc<M>,
}

impl<S, M> SignatureCoordinator<S, M>
where
    S: DocumentStore,
    M: AlertMessenger,
{
    pub fn new(repo: JobRepository<S>, notifier: Arc<Notifier<S>>, messenger: Arc<M>) -> Self {
        Self {
            repo,
            notifier,
            messenger,
        }
    }

    async fn company(&self, job: &Job) -> Result<Company, JobError> {
        let path = CollectionPath::new("companies").doc(job.company.0.clone());
        let doc = self
            .repo
            .store()
            .get(&path)
            .await?
            .ok_or_else(|| JobError::CompanyNotFound(job.company.clone()))?;
        Ok(company_from_doc(&doc)?)
    }

    /// Record one party's signature. The signature, the derived status
    /// and the history entry land in a single document update; the
    /// status only becomes `inProgress` once the counterpart has already
    /// signed.
    pub async fn add_signature(
        &self,
        id: &JobId,
        party: SignatureParty,
        signer: &UserId,
    ) -> Result<Job, JobError> {
        let (job, _) = self.repo.job(id).await?;
        let company = self.company(&job).await?;
        let signer_user = load_user(self.repo.store().as_ref(), signer)
            .await
            .ok_or_else(|| JobError::UserNotFound(signer.clone()))?;

        let (title, description) = match party {
            SignatureParty::Employer => (
                "Fyrirtæki skrifar undir".to_string(),
                format!(
                    "{} hefur skrifað undir samning fyrir verkefnið {}",
                    company.name, job.name
                ),
            ),
            SignatureParty::Freelancer => (
                "Giggari skrifar undir".to_string(),
                format!(
                    "{} skrifar undir samning fyrir verkefnið {}.",
                    signer_user.general.name, job.name
                ),
            ),
        };

        let signature = SignatureDoc {
            id: signer.clone(),
            date: Stamp::now(),
        };
        let job = self
            .repo
            .update_derived(id, |job| {
                if job.status != JobStatus::RequiresSignature {
                    return Err(JobError::NotSignable {
                        job: id.clone(),
                        status: job.status,
                    });
                }
                let next = if job.signatures.of(party.counterpart()).is_some() {
                    JobStatus::InProgress
                } else {
                    JobStatus::RequiresSignature
                };
                let field = match party {
                    SignatureParty::Employer => "signatures.employer",
                    SignatureParty::Freelancer => "signatures.freelancer",
                };
                let entry = LogDoc {
                    status: next,
                    date: Stamp::now(),
                    title: title.clone(),
                    description: description.clone(),
                };
                Ok(Patch::new()
                    .set(field, encode(&signature)?)
                    .set("status", encode(&next)?)
                    .array_union("logs", vec![encode(&entry)?]))
            })
            .await?;

        info!(job = %id, party = ?party, status = %job.status, "signature recorded");
        self.tell_counterpart(&job, party, &company, signer, &signer_user)
            .await;
        Ok(job)
    }

    /// Point the job at its prepared contract document.
    pub async fn attach_contract(
        &self,
        id: &JobId,
        document_id: String,
        storage_url: String,
    ) -> Result<Job, JobError> {
        self.repo
            .update_derived(id, |job| {
                let entry = LogDoc {
                    status: job.status,
                    date: Stamp::now(),
                    title: "Samningur útbúinn".to_string(),
                    description: "Samningur hefur verið útbúinn og bíður undirritana".to_string(),
                };
                Ok(Patch::new()
                    .set("documentId", encode(&document_id)?)
                    .set("documentStorageUrl", encode(&storage_url)?)
                    .array_union("logs", vec![encode(&entry)?]))
            })
            .await
    }

    /// Throw away collected signatures and start over against a fresh
    /// contract document. Legal while signing is underway or the job has
    /// just started; both parties must sign again afterwards.
    pub async fn reset_contract(
        &self,
        id: &JobId,
        document_id: String,
        storage_url: String,
        actor_name: &str,
    ) -> Result<Job, JobError> {
        let title = format!("{actor_name} hefur endurstillt samningsferli");
        let job = self
            .repo
            .update_derived(id, |job| {
                if !matches!(
                    job.status,
                    JobStatus::RequiresSignature | JobStatus::InProgress
                ) {
                    return Err(JobError::NotSignable {
                        job: id.clone(),
                        status: job.status,
                    });
                }
                let entry = LogDoc {
                    status: JobStatus::RequiresSignature,
                    date: Stamp::now(),
                    title: title.clone(),
                    description: "Samningsferli endurstillt".to_string(),
                };
                Ok(Patch::new()
                    .set("signatures", Value::Null)
                    .set("status", encode(&JobStatus::RequiresSignature)?)
                    .set("documentId", encode(&document_id)?)
                    .set("documentStorageUrl", encode(&storage_url)?)
                    .array_union("logs", vec![encode(&entry)?]))
            })
            .await?;

        info!(job = %id, "contract reset");
        Ok(job)
    }

    /// Tell the other party a signature arrived. Best-effort; failures
    /// are logged and the recorded signature stands.
    async fn tell_counterpart(
        &self,
        job: &Job,
        party: SignatureParty,
        company: &Company,
        signer: &UserId,
        signer_user: &User,
    ) {
        let (recipient_id, kind, template) = match party {
            SignatureParty::Employer => {
                let Some(freelancer) = job.freelancers.first() else {
                    warn!(job = %job.id, "no freelancer selected; signature stays unannounced");
                    return;
                };
                (
                    freelancer.clone(),
                    NotificationKind::EmployerSignature,
                    TemplateKind::EmployerSignature,
                )
            }
            SignatureParty::Freelancer => (
                job.creator.clone(),
                NotificationKind::FreelancerSignature,
                TemplateKind::FreelancerSignature,
            ),
        };
        let Some(recipient) = load_user(self.repo.store().as_ref(), &recipient_id).await else {
            return;
        };

        let sender = match party {
            SignatureParty::Employer => PartyRef::new(
                company.id.0.clone(),
                company.name.clone(),
                company.logo.url.clone(),
            ),
            SignatureParty::Freelancer => party_ref(signer, signer_user),
        };
        let draft = NotificationDraft::new(kind, party_ref(&recipient_id, &recipient))
            .from_sender(sender)
            .about_job(JobRef {
                id: job.id.clone(),
                name: job.name.clone(),
            });
        if let Err(err) = self.notifier.notify(draft).await {
            warn!(job = %job.id, error = %err, "signature notification failed");
        }

        let data = DynamicData {
            user_name: Some(signer_user.general.name.clone()),
            company_name: Some(company.name.clone()),
            job_name: Some(job.name.clone()),
        };
        let receipt = self
            .messenger
            .send(
                template,
                recipient.general.locale,
                &recipient.general.email,
                &data,
            )
            .await;
        if !receipt.delivered {
            warn!(
                job = %job.id,
                recipient = %recipient_id,
                error = receipt.error.as_deref().unwrap_or("unknown"),
                "signature alert not delivered"
            );
        }
    }
}
