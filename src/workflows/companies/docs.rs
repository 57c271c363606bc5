//! Stored shapes for `companies/{id}` and its employees subcollection.

use serde::{Deserialize, Serialize};

use super::domain::{Company, CompanyEmployee, CompanyId, CompanyRole, Invite, Logo};
use crate::store::{decode, ConvertError, DocRef, Document, Stamp};
use crate::workflows::jobs::domain::JobId;
use crate::workflows::users::domain::{Address, Phone, UserId};

pub(crate) const COMPANIES: &str = "companies";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InviteDoc {
    pub token: String,
    pub email: String,
    pub role: CompanyRole,
    pub date: Stamp,
}

impl InviteDoc {
    pub fn from_invite(invite: &Invite) -> Self {
        Self {
            token: invite.token.clone(),
            email: invite.email.clone(),
            role: invite.role,
            date: Stamp::from(invite.date),
        }
    }

    pub fn into_invite(self) -> Invite {
        Invite {
            token: self.token,
            email: self.email,
            role: self.role,
            date: self.date.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompanyDoc {
    pub name: String,
    pub ssn: String,
    #[serde(default)]
    pub phone: Phone,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub logo: Logo,
    #[serde(default)]
    pub invites: Vec<InviteDoc>,
    #[serde(default)]
    pub jobs: Vec<DocRef>,
    pub creator: DocRef,
    pub created_at: Stamp,
}

impl CompanyDoc {
    pub fn from_company(company: &Company) -> Self {
        Self {
            name: company.name.clone(),
            ssn: company.ssn.clone(),
            phone: company.phone.clone(),
            address: company.address.clone(),
            website: company.website.clone(),
            size: company.size,
            logo: company.logo.clone(),
            invites: company.invites.iter().map(InviteDoc::from_invite).collect(),
            jobs: company
                .jobs
                .iter()
                .map(|job| DocRef::new("jobs", job))
                .collect(),
            creator: DocRef::new("users", &company.creator),
            created_at: Stamp::from(company.created_at),
        }
    }

    pub fn into_company(self, id: CompanyId) -> Company {
        Company {
            id,
            name: self.name,
            ssn: self.ssn,
            phone: self.phone,
            address: self.address,
            website: self.website,
            size: self.size,
            logo: self.logo,
            invites: self.invites.into_iter().map(InviteDoc::into_invite).collect(),
            jobs: self
                .jobs
                .iter()
                .map(|job| JobId(job.doc_id().to_string()))
                .collect(),
            creator: UserId(self.creator.doc_id().to_string()),
            created_at: self.created_at.into(),
        }
    }
}

pub(crate) fn company_from_doc(doc: &Document) -> Result<Company, ConvertError> {
    Ok(decode::<CompanyDoc>(doc)?.into_company(CompanyId(doc.path.id().to_string())))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompanyEmployeeDoc {
    pub position: String,
    pub role: CompanyRole,
}

impl CompanyEmployeeDoc {
    pub fn into_employee(self, user: UserId) -> CompanyEmployee {
        CompanyEmployee {
            user,
            position: self.position,
            role: self.role,
        }
    }
}
