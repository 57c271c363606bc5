//! Companies and their memberships. Employees live in a subcollection
//! under the company document; every job of the company mirrors its own
//! employee roster, which is why removals cascade.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::jobs::domain::JobId;
use crate::workflows::users::domain::{Address, Phone, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub String);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompanyRole {
    Employee,
    Admin,
}

/// Pending invitation into the company, redeemed by token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invite {
    pub token: String,
    pub email: String,
    pub role: CompanyRole,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logo {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub ssn: String,
    pub phone: Phone,
    pub address: Address,
    pub website: String,
    pub size: u32,
    pub logo: Logo,
    pub invites: Vec<Invite>,
    pub jobs: Vec<JobId>,
    pub creator: UserId,
    pub created_at: DateTime<Utc>,
}

/// Membership record stored under `companies/{id}/employees/{userId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyEmployee {
    pub user: UserId,
    pub position: String,
    pub role: CompanyRole,
}

/// Employee joined with account display data.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeProfile {
    pub user: UserId,
    pub name: String,
    pub email: String,
    pub position: String,
    pub role: CompanyRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyWithEmployees {
    pub company: Company,
    pub employees: Vec<EmployeeProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyWithCreator {
    pub company: Company,
    pub creator_name: String,
    pub creator_email: String,
}

/// One company the bulk listing could not fully resolve.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyFailure {
    pub company: CompanyId,
    pub reason: String,
}

/// Bulk listing result: failures ride alongside the successes instead of
/// aborting the batch.
#[derive(Debug, Default, Serialize)]
pub struct CompanyBatch {
    pub companies: Vec<CompanyWithCreator>,
    pub failed: Vec<CompanyFailure>,
}
