//! Companies: registration, the invite flow and the employee roster.

pub mod domain;
pub mod service;

pub(crate) mod docs;

pub use domain::{
    Company, CompanyBatch, CompanyEmployee, CompanyFailure, CompanyId, CompanyRole,
    CompanyWithCreator, CompanyWithEmployees, EmployeeProfile, Invite, Logo,
};
pub use service::{CompanyError, CompanyForm, CompanyService, LogoUpload, RegistrationForm};
