//! Accounts: shared identity, the freelancer and employer role profiles,
//! per-user settings, contracts and reviews.

pub mod domain;
pub(crate) mod docs;
pub mod service;

pub use domain::{
    Address, Education, Employer, EmployerUser, Experience, Freelancer, FreelancerContract,
    FreelancerStatus, FreelancerUser, Gender, General, OwnBusiness, Phone, Photo, Review,
    ReviewCompany, ReviewId, Settings, Social, User, UserId,
};
pub use service::{FreelancerForm, PhotoUpload, ReviewDraft, UserError, UserService};
