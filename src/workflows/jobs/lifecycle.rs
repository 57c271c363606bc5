//! The job state machine: creation, legal transitions with their canned
//! history entries, and the notification/alert side effects each
//! milestone fans out.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::deadline::{offer_deadline, parse_compact, DEFAULT_OFFER_WINDOW_DAYS};
use super::docs::{JobDoc, JobEmployeeDoc, LogDoc, JOBS};
use super::domain::{
    EmployeePermission, Job, JobId, JobInfo, JobLog, JobStatus, JobType, Signatures,
};
use super::repository::{JobError, JobRepository};
use crate::store::{
    encode, CollectionPath, DocPath, DocRef, DocumentStore, Patch, Stamp, StoreError, WriteBatch,
};
use crate::workflows::alerts::{AlertMessenger, DynamicData, TemplateKind};
use crate::workflows::companies::domain::CompanyId;
use crate::workflows::notifications::{JobRef, NotificationDraft, NotificationKind, Notifier};
use crate::workflows::tags::{TagId, TagKind, UnapprovedTags};
use crate::workflows::users::docs::user_from_doc;
use crate::workflows::users::domain::{User, UserId};

/// What the posting form submits.
#[derive(Debug, Clone)]
pub struct JobForm {
    pub name: String,
    pub description: String,
    pub kind: JobType,
    pub job_titles: Vec<TagId>,
    pub skills: Vec<TagId>,
    pub languages: Vec<TagId>,
    pub unapproved_tags: Option<UnapprovedTags>,
    pub info: JobInfoForm,
}

#[derive(Debug, Clone, Default)]
pub struct JobInfoForm {
    pub start: Option<String>,
    pub end: Option<String>,
    pub percentage: Option<u32>,
    pub num_of_hours: Option<u32>,
    /// Length of the offer window in working days.
    pub deadline_days: Option<u32>,
}

/// Caller-supplied history entry overriding the canned one.
#[derive(Debug, Clone)]
pub struct LogDraft {
    pub title: String,
    pub description: String,
}

/// Partial edit of the descriptive and schedule fields.
#[derive(Debug, Clone, Default)]
pub struct InfoUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<JobType>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub percentage: Option<u32>,
    pub num_of_hours: Option<u32>,
    pub deadline_days: Option<u32>,
}

pub struct JobLifecycle<S, M> {
    repo: JobRepository<S>,
    notifier: Arc<Notifier<S>>,
    messenger: Arc<M>,
}

impl<S, M> JobLifecycle<S, M>
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

    fn company_doc(company: &CompanyId) -> DocPath {
        CollectionPath::new("companies").doc(company.0.clone())
    }

    fn membership_doc(company: &CompanyId, user: &UserId) -> DocPath {
        CollectionPath::new(format!("companies/{company}/employees")).doc(user.0.clone())
    }

    async fn require_member(&self, company: &CompanyId, user: &UserId) -> Result<(), JobError> {
        if self
            .repo
            .store()
            .get(&Self::membership_doc(company, user))
            .await?
            .is_none()
        {
            return Err(JobError::NotCompanyMember {
                company: company.clone(),
                user: user.clone(),
            });
        }
        Ok(())
    }

    /// Post a job. The job document and the company's back-reference are
    /// written in one batch, so a job never exists without its owner
    /// knowing about it.
    pub async fn create(
        &self,
        form: JobForm,
        company: &CompanyId,
        creator: &UserId,
    ) -> Result<Job, JobError> {
        let store = self.repo.store();
        if store.get(&Self::company_doc(company)).await?.is_none() {
            return Err(JobError::CompanyNotFound(company.clone()));
        }
        self.require_member(company, creator).await?;

        for (field, value) in [("start", &form.info.start), ("end", &form.info.end)] {
            if let Some(raw) = value {
                if !raw.is_empty() && parse_compact(raw).is_err() {
                    return Err(JobError::InvalidSchedule {
                        field,
                        value: raw.clone(),
                    });
                }
            }
        }

        let now = Utc::now();
        let window = form.info.deadline_days.unwrap_or(DEFAULT_OFFER_WINDOW_DAYS);
        let info = JobInfo {
            start: form.info.start.unwrap_or_default(),
            end: form.info.end.unwrap_or_default(),
            percentage: match form.kind {
                JobType::PartTime => form.info.percentage,
                _ => None,
            },
            num_of_hours: match form.kind {
                JobType::Timeframe => form.info.num_of_hours,
                _ => None,
            },
            deadline: Some(offer_deadline(now, window)),
        };

        let id = JobId(store.allocate_id(&JobRepository::<S>::collection()).await?);
        let (title, description) = canned_log(JobStatus::InReview);
        let job = Job {
            id: id.clone(),
            name: form.name,
            description: form.description,
            generated_description: None,
            original_description: None,
            kind: form.kind,
            status: JobStatus::InReview,
            job_info: info,
            job_titles: form.job_titles,
            skills: form.skills,
            languages: form.languages,
            unapproved_tags: UnapprovedTags::normalize(form.unapproved_tags),
            logs: vec![JobLog {
                status: JobStatus::InReview,
                date: now,
                title: title.to_string(),
                description: description.to_string(),
            }],
            signatures: Signatures::default(),
            terms: None,
            document_id: None,
            document_storage_url: None,
            not_selected_reason: None,
            hidden: false,
            company: company.clone(),
            creator: creator.clone(),
            selected_applicants: Vec::new(),
            freelancers: Vec::new(),
        };

        let mut batch = WriteBatch::new();
        batch.set(
            JobRepository::<S>::doc(&id),
            encode(&JobDoc::from_job(&job))?,
        );
        batch.update(
            Self::company_doc(company),
            Patch::new().array_union("jobs", vec![encode(&DocRef::new(JOBS, &id))?]),
        );
        store.commit(batch).await?;

        info!(job = %id, company = %company, "job created");
        Ok(job)
    }

    /// Move the job to `target`. The status write and its justifying log
    /// entry are one document update; an observer never sees one without
    /// the other. Submitting the shortlist additionally requires it to be
    /// non-empty.
    pub async fn transition(
        &self,
        id: &JobId,
        target: JobStatus,
        log: Option<LogDraft>,
    ) -> Result<Job, JobError> {
        let (title, description) = match log {
            Some(draft) => (draft.title, draft.description),
            None => {
                let (title, description) = canned_log(target);
                (title.to_string(), description.to_string())
            }
        };

        let job = self
            .repo
            .update_derived(id, |job| {
                if !job.status.can_advance_to(target) {
                    return Err(JobError::IllegalTransition {
                        job: id.clone(),
                        from: job.status,
                        to: target,
                    });
                }
                if target == JobStatus::ChooseFreelancers && job.selected_applicants.is_empty() {
                    return Err(JobError::EmptyShortlist(id.clone()));
                }
                let entry = LogDoc {
                    status: target,
                    date: Stamp::now(),
                    title: title.clone(),
                    description: description.clone(),
                };
                Ok(Patch::new()
                    .set("status", encode(&target)?)
                    .array_union("logs", vec![encode(&entry)?]))
            })
            .await?;

        info!(job = %id, status = %target, "job transitioned");
        self.after_transition(&job).await;
        Ok(job)
    }

    /// The `completed` milestone with its canned closing entry.
    pub async fn finish(&self, id: &JobId) -> Result<Job, JobError> {
        self.transition(id, JobStatus::Completed, None).await
    }

    /// Stamp the platform terms as accepted. Not a transition; the log
    /// entry carries the job's current status.
    pub async fn agree_terms(&self, id: &JobId) -> Result<Job, JobError> {
        self.repo
            .update_derived(id, |job| {
                let entry = LogDoc {
                    status: job.status,
                    date: Stamp::now(),
                    title: "Skilmálar samþykktir".to_string(),
                    description: "Fyrirtæki hefur samþykkt skilmála".to_string(),
                };
                Ok(Patch::new()
                    .set("terms", encode(&Stamp::now())?)
                    .array_union("logs", vec![encode(&entry)?]))
            })
            .await
    }

    /// Move a staged free-text tag into the approved id set. The caller
    /// passes what remains staged; the null-when-empty rule is applied on
    /// the way out.
    pub async fn approve_tag(
        &self,
        id: &JobId,
        kind: TagKind,
        tag: TagId,
        remaining: Option<UnapprovedTags>,
    ) -> Result<(), JobError> {
        let patch = Patch::new()
            .array_union(kind.collection_name(), vec![encode(&tag)?])
            .set(
                "unapprovedTags",
                encode(&UnapprovedTags::normalize(remaining))?,
            );
        match self.repo.store().update(&JobRepository::<S>::doc(id), patch).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(JobError::NotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Edit the descriptive and schedule fields. The percentage/hours
    /// slots follow the job type: only the slot matching the effective
    /// type is kept.
    pub async fn update_info(&self, id: &JobId, update: InfoUpdate) -> Result<Job, JobError> {
        for (field, value) in [("start", &update.start), ("end", &update.end)] {
            if let Some(raw) = value {
                if !raw.is_empty() && parse_compact(raw).is_err() {
                    return Err(JobError::InvalidSchedule {
                        field,
                        value: raw.clone(),
                    });
                }
            }
        }

        let (job, _) = self.repo.job(id).await?;
        let kind = update.kind.unwrap_or(job.kind);

        let mut patch = Patch::new();
        if let Some(name) = update.name {
            patch = patch.set("name", encode(&name)?);
        }
        if let Some(description) = update.description {
            patch = patch.set("description", encode(&description)?);
        }
        if update.kind.is_some() {
            patch = patch.set("type", encode(&kind)?);
        }
        if let Some(start) = update.start {
            patch = patch.set("jobInfo.start", encode(&start)?);
        }
        if let Some(end) = update.end {
            patch = patch.set("jobInfo.end", encode(&end)?);
        }
        if update.percentage.is_some() || update.kind.is_some() {
            let percentage = match kind {
                JobType::PartTime => update.percentage.or(job.job_info.percentage),
                _ => None,
            };
            patch = patch.set("jobInfo.percentage", encode(&percentage)?);
        }
        if update.num_of_hours.is_some() || update.kind.is_some() {
            let hours = match kind {
                JobType::Timeframe => update.num_of_hours.or(job.job_info.num_of_hours),
                _ => None,
            };
            patch = patch.set("jobInfo.numOfHours", encode(&hours)?);
        }
        if let Some(days) = update.deadline_days {
            let deadline = offer_deadline(Utc::now(), days);
            patch = patch.set("jobInfo.deadline", encode(&Stamp::from(deadline))?);
        }

        self.repo
            .store()
            .update(&JobRepository::<S>::doc(id), patch)
            .await?;
        Ok(self.repo.job(id).await?.0)
    }

    /// Replace the job roster with `ids`. Entries keep their signer flag
    /// when they survive the diff; dropped entries are deleted in the
    /// same batch.
    pub async fn set_employees(
        &self,
        id: &JobId,
        ids: Vec<UserId>,
        caller: &UserId,
    ) -> Result<Vec<UserId>, JobError> {
        let (job, _) = self.repo.job(id).await?;
        self.require_member(&job.company, caller).await?;

        let current = self.repo.employees(id).await?;
        let mut batch = WriteBatch::new();
        for employee in &current {
            if !ids.contains(&employee.id) {
                batch.delete(JobRepository::<S>::employees_collection(id).doc(employee.id.0.clone()));
            }
        }
        for user in &ids {
            let signer = current
                .iter()
                .find(|employee| &employee.id == user)
                .map(|employee| employee.signer);
            let doc = JobEmployeeDoc {
                permission: EmployeePermission::Edit,
                signer,
            };
            batch.set(
                JobRepository::<S>::employees_collection(id).doc(user.0.clone()),
                encode(&doc)?,
            );
        }
        self.repo.store().commit(batch).await?;

        info!(job = %id, roster = ids.len(), "job roster replaced");
        Ok(ids)
    }

    /// Designate the contract signer. Exactly one roster entry holds the
    /// flag afterwards.
    pub async fn set_signer(
        &self,
        id: &JobId,
        employee: &UserId,
        caller: &UserId,
    ) -> Result<(), JobError> {
        let (job, _) = self.repo.job(id).await?;
        self.require_member(&job.company, caller).await?;

        let roster = self.repo.employees(id).await?;
        if !roster.iter().any(|entry| &entry.id == employee) {
            return Err(JobError::NotAnEmployee {
                job: id.clone(),
                user: employee.clone(),
            });
        }

        let mut batch = WriteBatch::new();
        for entry in &roster {
            batch.update(
                JobRepository::<S>::employees_collection(id).doc(entry.id.0.clone()),
                Patch::new().set("signer", encode(&(&entry.id == employee))?),
            );
        }
        self.repo.store().commit(batch).await?;
        Ok(())
    }

    /// Delete the job, its subcollections and the company back-reference
    /// in one batch.
    pub async fn remove(&self, id: &JobId) -> Result<(), JobError> {
        let (job, _) = self.repo.job(id).await?;
        let store = self.repo.store();
        let applicants = store
            .list(&JobRepository::<S>::applicants_collection(id))
            .await?;
        let employees = store
            .list(&JobRepository::<S>::employees_collection(id))
            .await?;

        let mut batch = WriteBatch::new();
        batch.delete(JobRepository::<S>::doc(id));
        for doc in applicants.iter().chain(employees.iter()) {
            batch.delete(doc.path.clone());
        }
        batch.update(
            Self::company_doc(&job.company),
            Patch::new().array_remove("jobs", vec![encode(&DocRef::new(JOBS, id))?]),
        );
        store.commit(batch).await?;

        info!(job = %id, company = %job.company, "job removed");
        Ok(())
    }

    /// Milestone side effects. Best-effort: a failed notification or
    /// email is logged and never unwinds the committed transition.
    async fn after_transition(&self, job: &Job) {
        match job.status {
            JobStatus::Approved => {
                self.alert_user(&job.creator, job, TemplateKind::JobApproved, false)
                    .await;
            }
            JobStatus::Denied => {
                self.alert_user(&job.creator, job, TemplateKind::JobDenied, false)
                    .await;
            }
            JobStatus::ChooseFreelancers => {
                self.notify_creator(job, NotificationKind::ApplicantsSelected)
                    .await;
                for applicant in &job.selected_applicants {
                    self.alert_user(applicant, job, TemplateKind::ChooseFreelancers, false)
                        .await;
                }
            }
            JobStatus::ReadyForReview => {
                self.notify_creator(job, NotificationKind::ReviewRequested)
                    .await;
            }
            JobStatus::Cancelled => {
                self.alert_applicants(job, TemplateKind::JobCancelled, true)
                    .await;
            }
            JobStatus::Postponed => {
                self.alert_applicants(job, TemplateKind::JobPostponed, false)
                    .await;
            }
            _ => {}
        }
    }

    async fn notify_creator(&self, job: &Job, kind: NotificationKind) {
        let Some(creator) = load_user(self.repo.store().as_ref(), &job.creator).await else {
            return;
        };
        let draft = NotificationDraft::new(kind, party_ref(&job.creator, &creator)).about_job(
            JobRef {
                id: job.id.clone(),
                name: job.name.clone(),
            },
        );
        if let Err(err) = self.notifier.notify(draft).await {
            warn!(job = %job.id, error = %err, "creator notification failed");
        }
    }

    async fn alert_applicants(&self, job: &Job, kind: TemplateKind, honor_opt_out: bool) {
        let applicants = match self.repo.applicants(&job.id).await {
            Ok(applicants) => applicants,
            Err(err) => {
                warn!(job = %job.id, error = %err, "applicant alerts skipped");
                return;
            }
        };
        for applicant in &applicants {
            self.alert_user(&applicant.id, job, kind, honor_opt_out).await;
        }
    }

    /// One templated email. `honor_opt_out` respects the account's
    /// cancelled-job mail setting.
    async fn alert_user(&self, id: &UserId, job: &Job, kind: TemplateKind, honor_opt_out: bool) {
        let Some(user) = load_user(self.repo.store().as_ref(), id).await else {
            return;
        };
        if honor_opt_out
            && user
                .settings
                .as_ref()
                .is_some_and(|settings| !settings.cancelled_job_mail)
        {
            return;
        }
        let data = DynamicData {
            user_name: Some(user.general.name.clone()),
            job_name: Some(job.name.clone()),
            ..DynamicData::default()
        };
        let receipt = self
            .messenger
            .send(kind, user.general.locale, &user.general.email, &data)
            .await;
        if !receipt.delivered {
            warn!(
                job = %job.id,
                recipient = %id,
                error = receipt.error.as_deref().unwrap_or("unknown"),
                "job alert not delivered"
            );
        }
    }
}

/// Reads a user for display purposes. Absence or a decode failure is
/// logged and treated as missing, so side-effect paths degrade instead
/// of failing.
pub(crate) async fn load_user<S: DocumentStore>(store: &S, id: &UserId) -> Option<User> {
    let path = CollectionPath::new("users").doc(id.0.clone());
    match store.get(&path).await {
        Ok(Some(doc)) => match user_from_doc(&doc) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(user = %id, error = %err, "user does not decode");
                None
            }
        },
        Ok(None) => {
            warn!(user = %id, "user missing");
            None
        }
        Err(err) => {
            warn!(user = %id, error = %err, "user lookup failed");
            None
        }
    }
}

/// Display snapshot of an account for a notification party slot.
pub(crate) fn party_ref(id: &UserId, user: &User) -> crate::workflows::notifications::PartyRef {
    crate::workflows::notifications::PartyRef::new(
        id.0.clone(),
        user.general.name.clone(),
        user.general
            .photo
            .as_ref()
            .map(|photo| photo.url.clone())
            .unwrap_or_default(),
    )
}

/// Canned history entries per milestone.
fn canned_log(status: JobStatus) -> (&'static str, &'static str) {
    match status {
        JobStatus::InReview => ("Verkefni stofnað", "Verkefni stofnað og bíður samþykkis"),
        JobStatus::Approved => (
            "Verkefni samþykkt",
            "Verkefnið hefur staðist yfirferð og er nú sýnilegt giggurum",
        ),
        JobStatus::ChooseFreelancers => (
            "Giggarar valdir",
            "Giggarar valdir og tilkynning send á stofnanda verkefnis",
        ),
        JobStatus::RequiresSignature => (
            "Samningur í undirritun",
            "Samningsferli er hafið og beðið er eftir undirritunum",
        ),
        JobStatus::InProgress => (
            "Verkefni hafið",
            "Báðir aðilar hafa skrifað undir og verkefnið er formlega hafið",
        ),
        JobStatus::ReadyForReview => (
            "Verkefni tilbúið til yfirferðar",
            "Giggari hefur skilað verkefninu og óskar eftir endurgjöf",
        ),
        JobStatus::Completed => (
            "Verkefni lokið",
            "Fyrirtæki hefur veitt endurgjöf og verkefni því formlega lokið",
        ),
        JobStatus::Denied => ("Verkefni hafnað", "Verkefnið stóðst ekki yfirferð"),
        JobStatus::Cancelled => ("Verkefni afturkallað", "Fyrirtæki hefur afturkallað verkefnið"),
        JobStatus::Postponed => ("Verkefni frestað", "Fyrirtæki hefur frestað verkefninu"),
    }
}
