//! Applications, the shortlist and the final pick. An application and
//! its back-reference on the freelancer profile always move together in
//! one batch, and the shortlist only ever names actual applicants.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::docs::{ApplicantDoc, LogDoc, OfferDoc, JOBS};
use super::domain::{
    Applicant, ContactStatus, Job, JobId, JobStatus, NotSelectedReason, Offer, RateKind,
};
use super::lifecycle::{load_user, party_ref, JobLifecycle};
use super::repository::{JobError, JobRepository};
use crate::store::{encode, CollectionPath, DocRef, DocumentStore, Patch, Stamp, WriteBatch};
use crate::workflows::alerts::{AlertMessenger, DynamicData, TemplateKind};
use crate::workflows::companies::docs::company_from_doc;
use crate::workflows::notifications::{
    JobRef, NotificationDraft, NotificationKind, Notifier, PartyRef,
};
use crate::workflows::users::domain::{User, UserId};

/// How the employer concludes the selection round.
#[derive(Debug, Clone, Default)]
pub struct SelectionOutcome {
    /// Status to land on alongside the pick, typically
    /// `requiresSignature`. Checked against the transition graph.
    pub status: Option<JobStatus>,
    pub document_id: Option<String>,
    pub document_storage_url: Option<String>,
    pub not_selected_reason: Option<NotSelectedReason>,
}

pub struct SelectionManager<S, M> {
    repo: JobRepository<S>,
    notifier: Arc<Notifier<S>>,
    messenger: Arc<M>,
    lifecycle: Arc<JobLifecycle<S, M>>,
}

impl<S, M> SelectionManager<S, M>
where
    S: DocumentStore,
    M: AlertMessenger,
{
    pub fn new(
        repo: JobRepository<S>,
        notifier: Arc<Notifier<S>>,
        messenger: Arc<M>,
        lifecycle: Arc<JobLifecycle<S, M>>,
    ) -> Self {
        Self {
            repo,
            notifier,
            messenger,
            lifecycle,
        }
    }

    fn applicant_ref(id: &JobId, user: &UserId) -> DocRef {
        DocRef::new(&format!("{JOBS}/{id}/applicants"), user)
    }

    /// Apply to a job with an offer. Free-text rate fields are reduced to
    /// their digits before anything is stored, and the application plus
    /// the freelancer's job back-reference commit as one batch.
    pub async fn apply(&self, id: &JobId, user: &UserId, offer: Offer) -> Result<Applicant, JobError> {
        let (job, _) = self.repo.job(id).await?;
        if job.status.is_terminal() {
            return Err(JobError::JobClosed {
                job: id.clone(),
                status: job.status,
            });
        }
        match self.repo.applicant(id, user).await {
            Ok(_) => {
                return Err(JobError::AlreadyApplied {
                    job: id.clone(),
                    user: user.clone(),
                })
            }
            Err(JobError::ApplicantNotFound { .. }) => {}
            Err(err) => return Err(err),
        }
        let account = load_user(self.repo.store().as_ref(), user)
            .await
            .ok_or_else(|| JobError::UserNotFound(user.clone()))?;
        if account.freelancer.is_none() {
            return Err(JobError::NotFreelancer(user.clone()));
        }

        let mut offer = offer.sanitized();
        offer.date = Some(Utc::now());
        let applicant = Applicant {
            id: user.clone(),
            offer,
            contact_approval: None,
        };

        let mut batch = WriteBatch::new();
        batch.set(
            JobRepository::<S>::applicants_collection(id).doc(user.0.clone()),
            encode(&ApplicantDoc::from_applicant(&applicant))?,
        );
        batch.update(
            CollectionPath::new("users").doc(user.0.clone()),
            Patch::new().array_union("freelancer.jobs", vec![encode(&DocRef::new(JOBS, id))?]),
        );
        self.repo.store().commit(batch).await?;

        info!(job = %id, user = %user, "application submitted");
        Ok(applicant)
    }

    /// Withdraw an application. The application document, the freelancer
    /// back-reference and any shortlist entry disappear together.
    pub async fn withdraw(&self, id: &JobId, user: &UserId) -> Result<(), JobError> {
        self.repo.applicant(id, user).await?;

        let mut batch = WriteBatch::new();
        batch.delete(JobRepository::<S>::applicants_collection(id).doc(user.0.clone()));
        batch.update(
            CollectionPath::new("users").doc(user.0.clone()),
            Patch::new().array_remove("freelancer.jobs", vec![encode(&DocRef::new(JOBS, id))?]),
        );
        batch.update(
            JobRepository::<S>::doc(id),
            Patch::new().array_remove(
                "selectedApplicants",
                vec![encode(&Self::applicant_ref(id, user))?],
            ),
        );
        self.repo.store().commit(batch).await?;

        info!(job = %id, user = %user, "application withdrawn");
        Ok(())
    }

    /// Replace the offer on an existing application. The original
    /// application date is kept.
    pub async fn change_offer(
        &self,
        id: &JobId,
        user: &UserId,
        offer: Offer,
    ) -> Result<Applicant, JobError> {
        let existing = self.repo.applicant(id, user).await?;
        let mut offer = offer.sanitized();
        offer.date = existing.offer.date;

        let path = JobRepository::<S>::applicants_collection(id).doc(user.0.clone());
        self.repo
            .store()
            .update(&path, Patch::new().set("offer", encode(&OfferDoc::from_offer(&offer))?))
            .await?;
        Ok(Applicant {
            id: user.clone(),
            offer,
            contact_approval: existing.contact_approval,
        })
    }

    /// Record which of the offered rates the employer accepted.
    pub async fn accept_rate(&self, id: &JobId, user: &UserId, rate: RateKind) -> Result<(), JobError> {
        self.repo.applicant(id, user).await?;
        let path = JobRepository::<S>::applicants_collection(id).doc(user.0.clone());
        self.repo
            .store()
            .update(&path, Patch::new().set("offer.acceptedRate", encode(&rate)?))
            .await?;
        Ok(())
    }

    /// Replace the shortlist. Every entry must be an applicant of this
    /// job; duplicates collapse, first occurrence wins.
    pub async fn update_selected_applicants(
        &self,
        id: &JobId,
        ids: Vec<UserId>,
    ) -> Result<Vec<UserId>, JobError> {
        let applicants = self.repo.applicants(id).await?;
        let known: HashSet<&UserId> = applicants.iter().map(|applicant| &applicant.id).collect();
        let mut seen = HashSet::new();
        let mut shortlist = Vec::with_capacity(ids.len());
        for user in ids {
            if !known.contains(&user) {
                return Err(JobError::NotAnApplicant {
                    job: id.clone(),
                    user,
                });
            }
            if seen.insert(user.clone()) {
                shortlist.push(user);
            }
        }

        let refs = shortlist
            .iter()
            .map(|user| encode(&Self::applicant_ref(id, user)))
            .collect::<Result<Vec<_>, _>>()?;
        self.repo
            .store()
            .update(
                &JobRepository::<S>::doc(id),
                Patch::new().set("selectedApplicants", serde_json::Value::Array(refs)),
            )
            .await?;
        Ok(shortlist)
    }

    /// Hand the shortlist to the job creator: the `chooseFreelancers`
    /// transition with its canned log and fan-out.
    pub async fn submit_shortlist(&self, id: &JobId) -> Result<Job, JobError> {
        self.lifecycle
            .transition(id, JobStatus::ChooseFreelancers, None)
            .await
    }

    /// The employer's final pick. The chosen applicant, the optional
    /// status step and the contract pointers land in one update; the
    /// passed-over shortlist hears about it by mail afterwards.
    pub async fn select_freelancer(
        &self,
        id: &JobId,
        applicant: &UserId,
        outcome: SelectionOutcome,
    ) -> Result<Job, JobError> {
        let chosen = load_user(self.repo.store().as_ref(), applicant)
            .await
            .ok_or_else(|| JobError::UserNotFound(applicant.clone()))?;
        let applicants = self.repo.applicants(id).await?;
        if !applicants.iter().any(|entry| &entry.id == applicant) {
            return Err(JobError::NotAnApplicant {
                job: id.clone(),
                user: applicant.clone(),
            });
        }

        let (title, description) = (
            "Giggari valinn".to_string(),
            format!(
                "{} valinn fyrir verkefnið og samningur búinn til",
                chosen.general.name
            ),
        );
        let job = self
            .repo
            .update_derived(id, |job| {
                if !job.selected_applicants.is_empty()
                    && !job.selected_applicants.contains(applicant)
                {
                    return Err(JobError::NotAnApplicant {
                        job: id.clone(),
                        user: applicant.clone(),
                    });
                }
                if let Some(target) = outcome.status {
                    if !job.status.can_advance_to(target) {
                        return Err(JobError::IllegalTransition {
                            job: id.clone(),
                            from: job.status,
                            to: target,
                        });
                    }
                }
                let landing = outcome.status.unwrap_or(job.status);
                let entry = LogDoc {
                    status: landing,
                    date: Stamp::now(),
                    title: title.clone(),
                    description: description.clone(),
                };
                let mut patch = Patch::new()
                    .set(
                        "freelancers",
                        serde_json::Value::Array(vec![encode(&Self::applicant_ref(id, applicant))?]),
                    )
                    .array_union("logs", vec![encode(&entry)?]);
                if let Some(target) = outcome.status {
                    patch = patch.set("status", encode(&target)?);
                }
                if let Some(document_id) = &outcome.document_id {
                    patch = patch.set("documentId", encode(document_id)?);
                }
                if let Some(url) = &outcome.document_storage_url {
                    patch = patch.set("documentStorageUrl", encode(url)?);
                }
                if let Some(reason) = outcome.not_selected_reason {
                    patch = patch.set("notSelectedReason", encode(&reason)?);
                }
                Ok(patch)
            })
            .await?;

        info!(job = %id, freelancer = %applicant, "freelancer selected");
        self.announce_selection(&job, applicant, &chosen).await;
        Ok(job)
    }

    /// Request, grant or refuse contact-information visibility on one
    /// application. The approval field and the job's history entry commit
    /// in one batch, then the affected party is notified.
    pub async fn update_contact_approval(
        &self,
        id: &JobId,
        freelancer: &UserId,
        status: ContactStatus,
    ) -> Result<(), JobError> {
        self.repo.applicant(id, freelancer).await?;
        let (job, _) = self.repo.job(id).await?;
        let subject = load_user(self.repo.store().as_ref(), freelancer)
            .await
            .ok_or_else(|| JobError::UserNotFound(freelancer.clone()))?;

        let (title, description) = match status {
            ContactStatus::Requested => (
                "Beiðni um tengiliðaupplýsingar".to_string(),
                format!(
                    "Beiðni send á {} um að fá tengiliðaupplýsingar.",
                    subject.general.name
                ),
            ),
            ContactStatus::Approved => (
                "Tengiliðaupplýsingar samþykktar".to_string(),
                format!(
                    "{} hefur samþykkt birtingu tengiliðaupplýsinga.",
                    subject.general.name
                ),
            ),
            ContactStatus::Denied => (
                "Tengiliðaupplýsingum hafnað".to_string(),
                format!(
                    "{} hefur hafnað birtingu tengiliðaupplýsinga og þar með dregið tilboðið sitt til baka.",
                    subject.general.name
                ),
            ),
        };
        let entry = LogDoc {
            status: job.status,
            date: Stamp::now(),
            title,
            description,
        };

        let mut batch = WriteBatch::new();
        batch.update(
            JobRepository::<S>::applicants_collection(id).doc(freelancer.0.clone()),
            Patch::new().set("contactApproval", encode(&status)?),
        );
        batch.update(
            JobRepository::<S>::doc(id),
            Patch::new().array_union("logs", vec![encode(&entry)?]),
        );
        self.repo.store().commit(batch).await?;

        info!(job = %id, freelancer = %freelancer, status = ?status, "contact approval updated");
        self.announce_contact_decision(&job, freelancer, &subject, status)
            .await;
        Ok(())
    }

    /// Contract notification and mail to the chosen freelancer, plus the
    /// regrets mail to everyone else on the shortlist who allows it.
    async fn announce_selection(&self, job: &Job, applicant: &UserId, chosen: &User) {
        let sender = match self.company_party(job).await {
            Some(sender) => sender,
            None => return,
        };
        let draft = NotificationDraft::new(
            NotificationKind::NewFreelancerContract,
            party_ref(applicant, chosen),
        )
        .from_sender(sender.clone())
        .about_job(JobRef {
            id: job.id.clone(),
            name: job.name.clone(),
        });
        if let Err(err) = self.notifier.notify(draft).await {
            warn!(job = %job.id, error = %err, "contract notification failed");
        }

        let data = DynamicData {
            user_name: Some(chosen.general.name.clone()),
            company_name: Some(sender.name.clone()),
            job_name: Some(job.name.clone()),
        };
        let receipt = self
            .messenger
            .send(
                TemplateKind::NewFreelancerContract,
                chosen.general.locale,
                &chosen.general.email,
                &data,
            )
            .await;
        if !receipt.delivered {
            warn!(
                job = %job.id,
                recipient = %applicant,
                error = receipt.error.as_deref().unwrap_or("unknown"),
                "contract alert not delivered"
            );
        }

        for passed_over in &job.selected_applicants {
            if passed_over == applicant {
                continue;
            }
            let Some(user) = load_user(self.repo.store().as_ref(), passed_over).await else {
                continue;
            };
            if user
                .settings
                .as_ref()
                .is_some_and(|settings| !settings.denied_offer_mail)
            {
                continue;
            }
            let data = DynamicData {
                user_name: Some(user.general.name.clone()),
                company_name: Some(sender.name.clone()),
                job_name: Some(job.name.clone()),
            };
            let receipt = self
                .messenger
                .send(
                    TemplateKind::DeniedOffer,
                    user.general.locale,
                    &user.general.email,
                    &data,
                )
                .await;
            if !receipt.delivered {
                warn!(
                    job = %job.id,
                    recipient = %passed_over,
                    error = receipt.error.as_deref().unwrap_or("unknown"),
                    "regrets mail not delivered"
                );
            }
        }
    }

    async fn announce_contact_decision(
        &self,
        job: &Job,
        freelancer: &UserId,
        subject: &User,
        status: ContactStatus,
    ) {
        let (recipient_id, kind, template) = match status {
            ContactStatus::Requested => (
                freelancer.clone(),
                NotificationKind::ContactInfoRequested,
                TemplateKind::ContactInfoRequested,
            ),
            ContactStatus::Approved => (
                job.creator.clone(),
                NotificationKind::ContactInfoApproved,
                TemplateKind::ContactInfoApproved,
            ),
            ContactStatus::Denied => (
                job.creator.clone(),
                NotificationKind::ContactInfoDenied,
                TemplateKind::ContactInfoDenied,
            ),
        };
        let Some(recipient) = load_user(self.repo.store().as_ref(), &recipient_id).await else {
            return;
        };
        let sender = match status {
            ContactStatus::Requested => match load_user(self.repo.store().as_ref(), &job.creator).await {
                Some(creator) => party_ref(&job.creator, &creator),
                None => return,
            },
            ContactStatus::Approved | ContactStatus::Denied => party_ref(freelancer, subject),
        };

        let draft = NotificationDraft::new(kind, party_ref(&recipient_id, &recipient))
            .from_sender(sender)
            .about_job(JobRef {
                id: job.id.clone(),
                name: job.name.clone(),
            });
        if let Err(err) = self.notifier.notify(draft).await {
            warn!(job = %job.id, error = %err, "contact notification failed");
        }

        let data = DynamicData {
            user_name: Some(subject.general.name.clone()),
            company_name: None,
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
                "contact alert not delivered"
            );
        }
    }

    async fn company_party(&self, job: &Job) -> Option<PartyRef> {
        let path = CollectionPath::new("companies").doc(job.company.0.clone());
        match self.repo.store().get(&path).await {
            Ok(Some(doc)) => match company_from_doc(&doc) {
                Ok(company) => Some(PartyRef::new(
                    company.id.0,
                    company.name,
                    company.logo.url,
                )),
                Err(err) => {
                    warn!(company = %job.company, error = %err, "company does not decode");
                    None
                }
            },
            Ok(None) => {
                warn!(company = %job.company, "company missing");
                None
            }
            Err(err) => {
                warn!(company = %job.company, error = %err, "company lookup failed");
                None
            }
        }
    }
}
