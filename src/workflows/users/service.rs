use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::warn;

use super::docs::{
    review_from_doc, user_from_doc, FreelancerContractDoc, FreelancerDoc, GeneralDoc, ReviewDoc,
    UserDoc, USERS,
};
use super::domain::{
    Address, Education, EmployerUser, Experience, Freelancer, FreelancerStatus, FreelancerUser,
    Gender, General, OwnBusiness, Phone, Photo, Review, ReviewCompany, ReviewId, Settings, Social,
    User, UserId,
};
use crate::storage::{ObjectStorage, StorageError};
use crate::store::{
    decode, encode, CollectionPath, ConvertError, DocPath, DocumentStore, Patch, Stamp, StoreError,
};
use crate::workflows::alerts::Locale;
use crate::workflows::companies::docs::company_from_doc;
use crate::workflows::companies::domain::{Company, CompanyId};
use crate::workflows::jobs::domain::JobId;
use crate::workflows::notifications::{
    CompanyRef, JobRef, NotificationDraft, NotificationKind, Notifier, PartyRef,
};
use crate::workflows::tags::{TagId, TagKind, UnapprovedTags};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user {0} not found")]
    NotFound(UserId),
    #[error("user {0} has no freelancer profile")]
    NotFreelancer(UserId),
    #[error("user {0} has no employer profile")]
    NotEmployer(UserId),
    #[error("user {0} has no contract to sign")]
    NoContract(UserId),
    #[error("review {0} not found")]
    ReviewNotFound(ReviewId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything a freelancer submits on the profile form.
#[derive(Debug, Clone)]
pub struct FreelancerForm {
    pub name: String,
    pub phone: Phone,
    pub ssn: String,
    pub gender: Gender,
    pub job_titles: Vec<TagId>,
    pub skills: Vec<TagId>,
    pub languages: Vec<TagId>,
    pub unapproved_tags: Option<UnapprovedTags>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub address: Option<Address>,
    pub own_business: Option<OwnBusiness>,
    pub social: Option<Social>,
    pub photo: Option<PhotoUpload>,
}

#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Input for a post-completion review of a freelancer.
#[derive(Debug, Clone)]
pub struct ReviewDraft {
    pub job: JobId,
    pub job_name: String,
    pub job_description: String,
    pub company: CompanyId,
    pub company_name: String,
    pub employer_name: String,
    pub company_logo: String,
    pub stars: u8,
    pub text: String,
}

pub struct UserService<S, O> {
    store: Arc<S>,
    storage: Arc<O>,
    notifier: Arc<Notifier<S>>,
}

impl<S, O> UserService<S, O>
where
    S: DocumentStore,
    O: ObjectStorage,
{
    pub fn new(store: Arc<S>, storage: Arc<O>, notifier: Arc<Notifier<S>>) -> Self {
        Self {
            store,
            storage,
            notifier,
        }
    }

    fn users() -> CollectionPath {
        CollectionPath::new(USERS)
    }

    fn doc(id: &UserId) -> DocPath {
        Self::users().doc(id.0.clone())
    }

    fn reviews_collection(id: &UserId) -> CollectionPath {
        CollectionPath::new(format!("{USERS}/{id}/reviews"))
    }

    /// Minimal account record written at signup. Idempotent: an existing
    /// account is returned untouched.
    pub async fn create(&self, id: UserId, email: &str) -> Result<User, UserError> {
        if let Some(doc) = self.store.get(&Self::doc(&id)).await? {
            return Ok(user_from_doc(&doc)?);
        }
        let user = User {
            id: id.clone(),
            general: General {
                name: String::new(),
                email: email.to_string(),
                ssn: String::new(),
                phone: Phone::default(),
                photo: None,
                locale: Locale::default(),
                created_at: Utc::now(),
                updated_at: None,
            },
            settings: None,
            freelancer: None,
            employer: None,
        };
        self.store
            .set(&Self::doc(&id), encode(&UserDoc::from_user(&user))?)
            .await?;
        Ok(user)
    }

    pub async fn user(&self, id: &UserId) -> Result<User, UserError> {
        let doc = self
            .store
            .get(&Self::doc(id))
            .await?
            .ok_or_else(|| UserError::NotFound(id.clone()))?;
        Ok(user_from_doc(&doc)?)
    }

    /// The user, proven to be a freelancer.
    pub async fn freelancer(&self, id: &UserId) -> Result<FreelancerUser, UserError> {
        let user = self.user(id).await?;
        let freelancer = user
            .freelancer
            .ok_or_else(|| UserError::NotFreelancer(id.clone()))?;
        Ok(FreelancerUser {
            id: user.id,
            general: user.general,
            freelancer,
        })
    }

    /// The user, proven to be an employer, with the active company and
    /// company list resolved. A company that fails to load is logged and
    /// dropped from the view rather than failing the whole projection.
    pub async fn employer(&self, id: &UserId) -> Result<EmployerUser, UserError> {
        let user = self.user(id).await?;
        let employer = user
            .employer
            .ok_or_else(|| UserError::NotEmployer(id.clone()))?;

        let companies = join_all(
            employer
                .companies
                .iter()
                .map(|company| self.load_company(company)),
        )
        .await
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        let company = match &employer.active_company {
            Some(active) => match companies.iter().find(|company| company.id == *active) {
                Some(company) => Some(company.clone()),
                None => self.load_company(active).await,
            },
            None => companies.first().cloned(),
        };

        Ok(EmployerUser {
            id: user.id,
            general: user.general,
            position: employer.position,
            company,
            companies,
        })
    }

    async fn load_company(&self, id: &CompanyId) -> Option<Company> {
        let path = CollectionPath::new("companies").doc(id.0.clone());
        match self.store.get(&path).await {
            Ok(Some(doc)) => match company_from_doc(&doc) {
                Ok(company) => Some(company),
                Err(err) => {
                    warn!(company = %id, error = %err, "dropping undecodable company from employer view");
                    None
                }
            },
            Ok(None) => {
                warn!(company = %id, "employer references a missing company");
                None
            }
            Err(err) => {
                warn!(company = %id, error = %err, "company lookup failed");
                None
            }
        }
    }

    /// Create or update the freelancer profile from the submitted form.
    /// Tag suggestions are normalized, a fresh photo replaces the old one
    /// in blob storage, and a previously denied profile goes back into
    /// review.
    pub async fn save_freelancer_profile(
        &self,
        id: &UserId,
        form: FreelancerForm,
    ) -> Result<FreelancerUser, UserError> {
        let user = self.user(id).await?;
        let existing = user.freelancer;

        let photo = match form.photo {
            Some(upload) => {
                let path = format!("users/{id}/profile/{}", upload.file_name);
                let url = self.storage.upload(&path, upload.bytes).await?;
                if let Some(previous) = existing.as_ref().map(|f| &f.photo) {
                    if !previous.url.is_empty() && previous.url != url {
                        if let Err(err) = self.storage.delete(&previous.url).await {
                            warn!(user = %id, error = %err, "stale profile photo not deleted");
                        }
                    }
                }
                Photo {
                    url: url.clone(),
                    original_url: url,
                }
            }
            None => existing
                .as_ref()
                .map(|f| f.photo.clone())
                .unwrap_or_default(),
        };

        let status = match existing.as_ref().map(|f| f.status) {
            None | Some(FreelancerStatus::Denied) => FreelancerStatus::InReview,
            Some(status) => status,
        };

        let freelancer = Freelancer {
            status,
            gender: form.gender,
            photo,
            job_titles: form.job_titles,
            skills: form.skills,
            languages: form.languages,
            unapproved_tags: UnapprovedTags::normalize(form.unapproved_tags),
            experience: form.experience,
            education: form.education,
            jobs: existing.as_ref().map(|f| f.jobs.clone()).unwrap_or_default(),
            contract: existing.as_ref().and_then(|f| f.contract.clone()),
            selected_reviews: existing
                .as_ref()
                .map(|f| f.selected_reviews.clone())
                .unwrap_or_default(),
            address: form.address,
            own_business: form.own_business,
            social: form.social,
        };

        let general = General {
            name: form.name,
            ssn: form.ssn,
            phone: form.phone,
            updated_at: Some(Utc::now()),
            ..user.general
        };

        let patch = Patch::new()
            .set("general", encode(&GeneralDoc::from_general(&general))?)
            .set(
                "freelancer",
                encode(&FreelancerDoc::from_freelancer(&freelancer))?,
            );
        self.store.update(&Self::doc(id), patch).await?;

        Ok(FreelancerUser {
            id: id.clone(),
            general,
            freelancer,
        })
    }

    /// Moves an approved suggestion into the freelancer's tag id set and
    /// replaces the pending suggestions with whatever is still waiting.
    pub async fn approve_freelancer_tag(
        &self,
        id: &UserId,
        kind: TagKind,
        tag: TagId,
        remaining: Option<UnapprovedTags>,
    ) -> Result<(), UserError> {
        self.freelancer(id).await?;
        let field = format!("freelancer.{}", kind.collection_name());
        let patch = Patch::new()
            .array_union(field, vec![encode(&tag)?])
            .set(
                "freelancer.unapprovedTags",
                encode(&UnapprovedTags::normalize(remaining))?,
            );
        self.store.update(&Self::doc(id), patch).await?;
        Ok(())
    }

    pub async fn set_locale(&self, id: &UserId, locale: Locale) -> Result<(), UserError> {
        match self
            .store
            .update(&Self::doc(id), Patch::new().set("general.lang", encode(&locale)?))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(UserError::NotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn update_settings(&self, id: &UserId, settings: Settings) -> Result<(), UserError> {
        match self
            .store
            .update(&Self::doc(id), Patch::new().set("settings", encode(&settings)?))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(UserError::NotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Attach a platform contract to the freelancer. A profile that was
    /// parked awaiting a signature goes back into review, and the
    /// freelancer is notified.
    pub async fn add_contract(
        &self,
        id: &UserId,
        document_id: &str,
        link: &str,
    ) -> Result<FreelancerUser, UserError> {
        let current = self.freelancer(id).await?;
        let contract = FreelancerContractDoc {
            document_id: document_id.to_string(),
            link: link.to_string(),
            signed: false,
            date: None,
        };
        let mut patch = Patch::new().set("freelancer.contract", encode(&contract)?);
        if current.freelancer.status == FreelancerStatus::RequiresSignature {
            patch = patch.set("freelancer.status", encode(&FreelancerStatus::InReview)?);
        }
        self.store.update(&Self::doc(id), patch).await?;

        let draft = NotificationDraft::new(
            NotificationKind::NewFreelancerContract,
            PartyRef::new(
                id.0.clone(),
                current.general.name.clone(),
                current
                    .general
                    .photo
                    .as_ref()
                    .map(|photo| photo.url.clone())
                    .unwrap_or_default(),
            ),
        );
        if let Err(err) = self.notifier.notify(draft).await {
            warn!(user = %id, error = %err, "contract notification not delivered");
        }

        self.freelancer(id).await
    }

    /// Record the freelancer's signature on their platform contract.
    pub async fn sign_contract(&self, id: &UserId) -> Result<(), UserError> {
        let current = self.freelancer(id).await?;
        if current.freelancer.contract.is_none() {
            return Err(UserError::NoContract(id.clone()));
        }
        let patch = Patch::new()
            .set("freelancer.contract.signed", encode(&true)?)
            .set("freelancer.contract.date", encode(&Stamp::now())?);
        self.store.update(&Self::doc(id), patch).await?;
        Ok(())
    }

    /// Write a review onto the freelancer's profile; reviews start hidden
    /// until the freelancer chooses to show them.
    pub async fn add_review(&self, id: &UserId, draft: ReviewDraft) -> Result<Review, UserError> {
        let freelancer = self.freelancer(id).await?;
        let review = Review {
            id: ReviewId(String::new()),
            job_name: draft.job_name.clone(),
            job_description: draft.job_description.clone(),
            company: ReviewCompany {
                name: draft.company_name.clone(),
                employer_name: draft.employer_name.clone(),
                logo: draft.company_logo.clone(),
            },
            stars: draft.stars,
            text: draft.text.clone(),
            show: false,
            date: Utc::now(),
        };
        let path = self
            .store
            .create(&Self::reviews_collection(id), encode(&ReviewDoc::from_review(&review))?)
            .await?;
        let review = Review {
            id: ReviewId(path.id().to_string()),
            ..review
        };

        let notification = NotificationDraft::new(
            NotificationKind::ReviewReceived,
            PartyRef::new(
                id.0.clone(),
                freelancer.general.name.clone(),
                freelancer
                    .general
                    .photo
                    .as_ref()
                    .map(|photo| photo.url.clone())
                    .unwrap_or_default(),
            ),
        )
        .from_sender(PartyRef::new(
            draft.company.0.clone(),
            draft.company_name.clone(),
            draft.company_logo.clone(),
        ))
        .about_job(JobRef {
            id: draft.job.clone(),
            name: draft.job_name.clone(),
        })
        .about_company(CompanyRef {
            id: draft.company.clone(),
            name: draft.company_name,
            photo: draft.company_logo,
        });
        if let Err(err) = self.notifier.notify(notification).await {
            warn!(user = %id, error = %err, "review notification not delivered");
        }

        Ok(review)
    }

    pub async fn set_review_visibility(
        &self,
        id: &UserId,
        review: &ReviewId,
        show: bool,
    ) -> Result<(), UserError> {
        let path = Self::reviews_collection(id).doc(review.0.clone());
        match self
            .store
            .update(&path, Patch::new().set("show", encode(&show)?))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(UserError::ReviewNotFound(review.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Curate which reviews appear on the public profile, in order. Every
    /// id must name an existing review of this freelancer.
    pub async fn set_selected_reviews(
        &self,
        id: &UserId,
        reviews: Vec<ReviewId>,
    ) -> Result<(), UserError> {
        self.freelancer(id).await?;
        for review in &reviews {
            let path = Self::reviews_collection(id).doc(review.0.clone());
            if self.store.get(&path).await?.is_none() {
                return Err(UserError::ReviewNotFound(review.clone()));
            }
        }
        let ids: Vec<String> = reviews.into_iter().map(|review| review.0).collect();
        self.store
            .update(
                &Self::doc(id),
                Patch::new().set("freelancer.selectedReviews", encode(&ids)?),
            )
            .await?;
        Ok(())
    }

    /// All reviews of the freelancer, newest first.
    pub async fn reviews(&self, id: &UserId) -> Result<Vec<Review>, UserError> {
        let docs = self.store.list(&Self::reviews_collection(id)).await?;
        let mut reviews = Vec::with_capacity(docs.len());
        for doc in docs {
            match review_from_doc(&doc) {
                Ok(review) => reviews.push(review),
                Err(err) => warn!(error = %err, "skipping undecodable review"),
            }
        }
        reviews.sort_by_key(|review| std::cmp::Reverse(review.date));
        Ok(reviews)
    }

    /// Reviews the freelancer has not (yet) chosen to show.
    pub async fn hidden_reviews(&self, id: &UserId) -> Result<Vec<Review>, UserError> {
        let mut reviews = self.reviews(id).await?;
        reviews.retain(|review| !review.show);
        Ok(reviews)
    }

    /// Reviews the freelancer curated onto the profile, in curated order.
    pub async fn selected_reviews(&self, id: &UserId) -> Result<Vec<Review>, UserError> {
        let freelancer = self.freelancer(id).await?;
        let mut reviews = Vec::new();
        for review_id in &freelancer.freelancer.selected_reviews {
            let path = Self::reviews_collection(id).doc(review_id.0.clone());
            match self.store.get(&path).await? {
                Some(doc) => match decode::<ReviewDoc>(&doc) {
                    Ok(review) => reviews.push(review.into_review(review_id.clone())),
                    Err(err) => warn!(error = %err, "skipping undecodable selected review"),
                },
                None => warn!(review = %review_id, "selected review no longer exists"),
            }
        }
        Ok(reviews)
    }
}
