use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use tracing::{info, warn};

use super::docs::{company_from_doc, CompanyDoc, CompanyEmployeeDoc, InviteDoc, COMPANIES};
use super::domain::{
    Company, CompanyBatch, CompanyEmployee, CompanyFailure, CompanyId, CompanyRole,
    CompanyWithCreator, CompanyWithEmployees, EmployeeProfile, Invite, Logo,
};
use crate::storage::{ObjectStorage, StorageError};
use crate::store::{
    decode, encode, CollectionPath, ConvertError, DocPath, DocRef, DocumentStore, Patch,
    StoreError, WriteBatch,
};
use crate::workflows::alerts::{AlertMessenger, DynamicData, Locale, TemplateKind};
use crate::workflows::users::docs::{user_from_doc, USERS};
use crate::workflows::users::domain::{Address, Phone, UserId};

const GUARDED_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CompanyError {
    #[error("company {0} not found")]
    NotFound(CompanyId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("user {user} is not a member of company {company}")]
    NotAMember { company: CompanyId, user: UserId },
    #[error("user {user} must be an admin of company {company}")]
    AdminRequired { company: CompanyId, user: UserId },
    #[error("invite {token} not found on company {company}")]
    InviteNotFound { company: CompanyId, token: String },
    #[error("a company with ssn {0} is already registered")]
    DuplicateSsn(String),
    #[error("company {0} kept changing concurrently; giving up")]
    Contention(CompanyId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
pub struct CompanyForm {
    pub name: String,
    pub ssn: String,
    pub phone: Phone,
    pub address: Address,
    pub website: String,
    pub size: u32,
    pub logo: Option<LogoUpload>,
}

#[derive(Debug, Clone)]
pub struct LogoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// What an invited colleague fills in when joining.
#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub name: String,
    pub phone: Phone,
    pub position: String,
}

pub struct CompanyService<S, O, M> {
    store: Arc<S>,
    storage: Arc<O>,
    messenger: Arc<M>,
}

impl<S, O, M> CompanyService<S, O, M>
where
    S: DocumentStore,
    O: ObjectStorage,
    M: AlertMessenger,
{
    pub fn new(store: Arc<S>, storage: Arc<O>, messenger: Arc<M>) -> Self {
        Self {
            store,
            storage,
            messenger,
        }
    }

    fn companies() -> CollectionPath {
        CollectionPath::new(COMPANIES)
    }

    fn doc(id: &CompanyId) -> DocPath {
        Self::companies().doc(id.0.clone())
    }

    fn employees(id: &CompanyId) -> CollectionPath {
        CollectionPath::new(format!("{COMPANIES}/{id}/employees"))
    }

    fn user_doc(id: &UserId) -> DocPath {
        CollectionPath::new(USERS).doc(id.0.clone())
    }

    pub async fn company(&self, id: &CompanyId) -> Result<Company, CompanyError> {
        let doc = self
            .store
            .get(&Self::doc(id))
            .await?
            .ok_or_else(|| CompanyError::NotFound(id.clone()))?;
        Ok(company_from_doc(&doc)?)
    }

    async fn company_with_version(&self, id: &CompanyId) -> Result<(Company, u64), CompanyError> {
        let doc = self
            .store
            .get(&Self::doc(id))
            .await?
            .ok_or_else(|| CompanyError::NotFound(id.clone()))?;
        Ok((company_from_doc(&doc)?, doc.version))
    }

    /// Membership check backing every company mutation.
    pub async fn member_role(
        &self,
        company: &CompanyId,
        user: &UserId,
    ) -> Result<CompanyRole, CompanyError> {
        let path = Self::employees(company).doc(user.0.clone());
        let doc = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| CompanyError::NotAMember {
                company: company.clone(),
                user: user.clone(),
            })?;
        Ok(decode::<CompanyEmployeeDoc>(&doc)?.role)
    }

    pub async fn require_admin(
        &self,
        company: &CompanyId,
        user: &UserId,
    ) -> Result<(), CompanyError> {
        match self.member_role(company, user).await? {
            CompanyRole::Admin => Ok(()),
            CompanyRole::Employee => Err(CompanyError::AdminRequired {
                company: company.clone(),
                user: user.clone(),
            }),
        }
    }

    pub async fn exists_by_ssn(&self, ssn: &str) -> Result<bool, CompanyError> {
        let docs = self.store.list(&Self::companies()).await?;
        for doc in docs {
            match decode::<CompanyDoc>(&doc) {
                Ok(company) if company.ssn == ssn => return Ok(true),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "skipping undecodable company in ssn lookup"),
            }
        }
        Ok(false)
    }

    /// Register a company. One atomic batch writes the company document,
    /// the creator's admin membership and the creator's employer profile;
    /// the logo lands in blob storage first so the batch only carries its
    /// url.
    pub async fn create(
        &self,
        form: CompanyForm,
        creator: &UserId,
        position: &str,
    ) -> Result<Company, CompanyError> {
        if self.exists_by_ssn(&form.ssn).await? {
            return Err(CompanyError::DuplicateSsn(form.ssn));
        }
        if self.store.get(&Self::user_doc(creator)).await?.is_none() {
            return Err(CompanyError::UserNotFound(creator.clone()));
        }

        let id = CompanyId(self.store.allocate_id(&Self::companies()).await?);
        let logo = match form.logo {
            Some(upload) => Logo {
                url: self
                    .storage
                    .upload(
                        &format!("companies/{id}/logo/{}", upload.file_name),
                        upload.bytes,
                    )
                    .await?,
            },
            None => Logo::default(),
        };

        let company = Company {
            id: id.clone(),
            name: form.name,
            ssn: form.ssn,
            phone: form.phone,
            address: form.address,
            website: form.website,
            size: form.size,
            logo,
            invites: Vec::new(),
            jobs: Vec::new(),
            creator: creator.clone(),
            created_at: Utc::now(),
        };

        let company_ref = encode(&DocRef::new(COMPANIES, &id))?;
        let membership = CompanyEmployeeDoc {
            position: position.to_string(),
            role: CompanyRole::Admin,
        };

        let mut batch = WriteBatch::new();
        batch.set(Self::doc(&id), encode(&CompanyDoc::from_company(&company))?);
        batch.set(
            Self::employees(&id).doc(creator.0.clone()),
            encode(&membership)?,
        );
        batch.update(
            Self::user_doc(creator),
            Patch::new()
                .set("employer.position", json!(position))
                .set("employer.activeCompany", company_ref.clone())
                .array_union("employer.companies", vec![company_ref]),
        );
        self.store.commit(batch).await?;

        info!(company = %id, creator = %creator, "company registered");
        Ok(company)
    }

    /// Admin-only profile update; a new logo replaces the stored object.
    pub async fn update(
        &self,
        id: &CompanyId,
        form: CompanyForm,
        caller: &UserId,
    ) -> Result<Company, CompanyError> {
        self.require_admin(id, caller).await?;
        let current = self.company(id).await?;
        if form.ssn != current.ssn && self.exists_by_ssn(&form.ssn).await? {
            return Err(CompanyError::DuplicateSsn(form.ssn));
        }

        let mut patch = Patch::new()
            .set("name", json!(form.name))
            .set("ssn", json!(form.ssn))
            .set("phone", encode(&form.phone)?)
            .set("address", encode(&form.address)?)
            .set("website", json!(form.website))
            .set("size", json!(form.size));

        if let Some(upload) = form.logo {
            let url = self
                .storage
                .upload(
                    &format!("companies/{id}/logo/{}", upload.file_name),
                    upload.bytes,
                )
                .await?;
            if !current.logo.url.is_empty() && current.logo.url != url {
                if let Err(err) = self.storage.delete(&current.logo.url).await {
                    warn!(company = %id, error = %err, "stale logo not deleted");
                }
            }
            patch = patch.set("logo", encode(&Logo { url })?);
        }

        self.store.update(&Self::doc(id), patch).await?;
        self.company(id).await
    }

    /// Invite a colleague by email. The invite rides on the company
    /// document; the email goes out through the messenger and a failed
    /// delivery is logged, not raised.
    pub async fn add_invite(
        &self,
        id: &CompanyId,
        email: &str,
        role: CompanyRole,
        caller: &UserId,
    ) -> Result<Invite, CompanyError> {
        self.require_admin(id, caller).await?;
        let company = self.company(id).await?;

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        let invite = Invite {
            token,
            email: email.to_string(),
            role,
            date: Utc::now(),
        };
        self.store
            .update(
                &Self::doc(id),
                Patch::new().array_union("invites", vec![encode(&InviteDoc::from_invite(&invite))?]),
            )
            .await?;

        let data = DynamicData {
            company_name: Some(company.name.clone()),
            ..DynamicData::default()
        };
        let receipt = self
            .messenger
            .send(TemplateKind::CompanyInvite, Locale::default(), email, &data)
            .await;
        if !receipt.delivered {
            warn!(
                company = %id,
                recipient = email,
                error = receipt.error.as_deref().unwrap_or("unknown"),
                "invite email not delivered"
            );
        }
        Ok(invite)
    }

    pub async fn remove_invite(
        &self,
        id: &CompanyId,
        token: &str,
        caller: &UserId,
    ) -> Result<(), CompanyError> {
        self.require_admin(id, caller).await?;
        for _ in 0..GUARDED_ATTEMPTS {
            let (company, version) = self.company_with_version(id).await?;
            if !company.invites.iter().any(|invite| invite.token == token) {
                return Err(CompanyError::InviteNotFound {
                    company: id.clone(),
                    token: token.to_string(),
                });
            }
            let remaining: Vec<InviteDoc> = company
                .invites
                .iter()
                .filter(|invite| invite.token != token)
                .map(InviteDoc::from_invite)
                .collect();

            let mut batch = WriteBatch::new();
            batch.update_if_version(
                Self::doc(id),
                Patch::new().set("invites", encode(&remaining)?),
                version,
            );
            match self.store.commit(batch).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(CompanyError::Contention(id.clone()))
    }

    /// Redeem an invite: one atomic, contention-guarded batch writes the
    /// membership, consumes the invite and fills in the user's employer
    /// profile.
    pub async fn register_via_invite(
        &self,
        id: &CompanyId,
        token: &str,
        user: &UserId,
        form: RegistrationForm,
    ) -> Result<CompanyEmployee, CompanyError> {
        if self.store.get(&Self::user_doc(user)).await?.is_none() {
            return Err(CompanyError::UserNotFound(user.clone()));
        }

        for _ in 0..GUARDED_ATTEMPTS {
            let (company, version) = self.company_with_version(id).await?;
            let invite = company
                .invites
                .iter()
                .find(|invite| invite.token == token)
                .ok_or_else(|| CompanyError::InviteNotFound {
                    company: id.clone(),
                    token: token.to_string(),
                })?;
            let role = invite.role;
            let remaining: Vec<InviteDoc> = company
                .invites
                .iter()
                .filter(|invite| invite.token != token)
                .map(InviteDoc::from_invite)
                .collect();

            let membership = CompanyEmployeeDoc {
                position: form.position.clone(),
                role,
            };
            let company_ref = encode(&DocRef::new(COMPANIES, id))?;

            let mut batch = WriteBatch::new();
            batch.set(Self::employees(id).doc(user.0.clone()), encode(&membership)?);
            batch.update_if_version(
                Self::doc(id),
                Patch::new().set("invites", encode(&remaining)?),
                version,
            );
            batch.update(
                Self::user_doc(user),
                Patch::new()
                    .set("general.name", json!(form.name))
                    .set("general.phone", encode(&form.phone)?)
                    .set("general.updatedAt", encode(&crate::store::Stamp::now())?)
                    .set("employer.position", json!(form.position))
                    .set("employer.activeCompany", company_ref.clone())
                    .array_union("employer.companies", vec![company_ref]),
            );
            match self.store.commit(batch).await {
                Ok(()) => {
                    info!(company = %id, user = %user, "employee registered via invite");
                    return Ok(CompanyEmployee {
                        user: user.clone(),
                        position: form.position,
                        role,
                    });
                }
                Err(StoreError::Conflict(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(CompanyError::Contention(id.clone()))
    }

    /// Remove a member. One batch deletes the company membership, the
    /// member's roster entry on every job of the company, and fixes the
    /// user's employer profile; the active company pointer is cleared only
    /// when it pointed here.
    pub async fn remove_employee(
        &self,
        id: &CompanyId,
        user: &UserId,
        caller: &UserId,
    ) -> Result<(), CompanyError> {
        self.require_admin(id, caller).await?;
        let company = self.company(id).await?;
        self.member_role(id, user).await?;

        let user_doc = self
            .store
            .get(&Self::user_doc(user))
            .await?
            .ok_or_else(|| CompanyError::UserNotFound(user.clone()))?;
        let account = user_from_doc(&user_doc)?;
        let active_here = account
            .employer
            .as_ref()
            .and_then(|employer| employer.active_company.as_ref())
            .is_some_and(|active| active == id);

        let company_ref = encode(&DocRef::new(COMPANIES, id))?;
        let mut user_patch = Patch::new().array_remove("employer.companies", vec![company_ref]);
        if active_here {
            user_patch = user_patch.remove("employer.activeCompany");
        }

        let mut batch = WriteBatch::new();
        batch.delete(Self::employees(id).doc(user.0.clone()));
        for job in &company.jobs {
            batch.delete(CollectionPath::new(format!("jobs/{job}/employees")).doc(user.0.clone()));
        }
        batch.update(Self::user_doc(user), user_patch);
        self.store.commit(batch).await?;

        info!(company = %id, user = %user, jobs = company.jobs.len(), "employee removed");
        Ok(())
    }

    /// The company with its employee roster joined to account display
    /// data; members whose account cannot be loaded are logged and listed
    /// with what the membership record alone knows.
    pub async fn company_with_employees(
        &self,
        id: &CompanyId,
    ) -> Result<CompanyWithEmployees, CompanyError> {
        let company = self.company(id).await?;
        let docs = self.store.list(&Self::employees(id)).await?;

        let employees = join_all(docs.into_iter().map(|doc| async move {
            let user = UserId(doc.path.id().to_string());
            let membership = match decode::<CompanyEmployeeDoc>(&doc) {
                Ok(membership) => membership,
                Err(err) => {
                    warn!(error = %err, "skipping undecodable membership");
                    return None;
                }
            };
            let (name, email) = match self.store.get(&Self::user_doc(&user)).await {
                Ok(Some(user_doc)) => match user_from_doc(&user_doc) {
                    Ok(account) => (account.general.name, account.general.email),
                    Err(err) => {
                        warn!(user = %user, error = %err, "membership user does not decode");
                        (String::new(), String::new())
                    }
                },
                _ => {
                    warn!(user = %user, "membership user missing");
                    (String::new(), String::new())
                }
            };
            Some(EmployeeProfile {
                user,
                name,
                email,
                position: membership.position,
                role: membership.role,
            })
        }))
        .await
        .into_iter()
        .flatten()
        .collect();

        Ok(CompanyWithEmployees { company, employees })
    }

    /// Companies referenced by an employer profile; unresolvable ids are
    /// logged and dropped.
    pub async fn employer_companies(&self, ids: &[CompanyId]) -> Result<Vec<Company>, CompanyError> {
        let companies = join_all(ids.iter().map(|id| async move {
            match self.store.get(&Self::doc(id)).await {
                Ok(Some(doc)) => match company_from_doc(&doc) {
                    Ok(company) => Some(company),
                    Err(err) => {
                        warn!(company = %id, error = %err, "skipping undecodable company");
                        None
                    }
                },
                Ok(None) => {
                    warn!(company = %id, "referenced company missing");
                    None
                }
                Err(err) => {
                    warn!(company = %id, error = %err, "company lookup failed");
                    None
                }
            }
        }))
        .await;
        Ok(companies.into_iter().flatten().collect())
    }

    /// Admin overview: every company joined with its creator. A company
    /// whose document or creator cannot be resolved lands in `failed`
    /// with the reason; the batch itself never aborts.
    pub async fn companies_with_creators(&self) -> Result<CompanyBatch, CompanyError> {
        let docs = self.store.list(&Self::companies()).await?;
        let results = join_all(docs.into_iter().map(|doc| async move {
            let id = CompanyId(doc.path.id().to_string());
            let company = match company_from_doc(&doc) {
                Ok(company) => company,
                Err(err) => {
                    return Err(CompanyFailure {
                        company: id,
                        reason: err.to_string(),
                    })
                }
            };
            match self.store.get(&Self::user_doc(&company.creator)).await {
                Ok(Some(user_doc)) => match user_from_doc(&user_doc) {
                    Ok(creator) => Ok(CompanyWithCreator {
                        company,
                        creator_name: creator.general.name,
                        creator_email: creator.general.email,
                    }),
                    Err(err) => Err(CompanyFailure {
                        company: id,
                        reason: err.to_string(),
                    }),
                },
                Ok(None) => Err(CompanyFailure {
                    company: id,
                    reason: format!("creator {} not found", company.creator),
                }),
                Err(err) => Err(CompanyFailure {
                    company: id,
                    reason: err.to_string(),
                }),
            }
        }))
        .await;

        let mut batch = CompanyBatch::default();
        for result in results {
            match result {
                Ok(entry) => batch.companies.push(entry),
                Err(failure) => {
                    warn!(company = %failure.company, reason = %failure.reason, "company left out of overview");
                    batch.failed.push(failure);
                }
            }
        }
        Ok(batch)
    }
}
