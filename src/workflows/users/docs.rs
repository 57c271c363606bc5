//! Stored shapes for `users/{id}` and `users/{id}/reviews/{id}`.
//! Conversion is limited to timestamp/date and reference/id substitution;
//! nothing here makes decisions.

use serde::{Deserialize, Serialize};

use super::domain::{
    Address, Education, Employer, Experience, Freelancer, FreelancerContract, FreelancerStatus,
    Gender, General, OwnBusiness, Phone, Photo, Review, ReviewCompany, ReviewId, Settings, Social,
    User, UserId,
};
use crate::store::{decode, ConvertError, DocRef, Document, Stamp};
use crate::workflows::alerts::Locale;
use crate::workflows::companies::domain::CompanyId;
use crate::workflows::jobs::domain::JobId;
use crate::workflows::tags::{TagId, UnapprovedTags};

pub(crate) const USERS: &str = "users";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeneralDoc {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub ssn: String,
    #[serde(default)]
    pub phone: Phone,
    #[serde(default)]
    pub photo: Option<Photo>,
    #[serde(default)]
    pub lang: Option<Locale>,
    pub created_at: Stamp,
    #[serde(default)]
    pub updated_at: Option<Stamp>,
}

impl GeneralDoc {
    pub fn from_general(general: &General) -> Self {
        Self {
            name: general.name.clone(),
            email: general.email.clone(),
            ssn: general.ssn.clone(),
            phone: general.phone.clone(),
            photo: general.photo.clone(),
            lang: Some(general.locale),
            created_at: Stamp::from(general.created_at),
            updated_at: general.updated_at.map(Stamp::from),
        }
    }

    pub fn into_general(self) -> General {
        General {
            name: self.name,
            email: self.email,
            ssn: self.ssn,
            phone: self.phone,
            photo: self.photo,
            locale: self.lang.unwrap_or_default(),
            created_at: self.created_at.into(),
            updated_at: self.updated_at.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FreelancerContractDoc {
    pub document_id: String,
    pub link: String,
    pub signed: bool,
    #[serde(default)]
    pub date: Option<Stamp>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FreelancerDoc {
    pub status: FreelancerStatus,
    pub gender: Gender,
    #[serde(default)]
    pub photo: Photo,
    #[serde(default)]
    pub job_titles: Vec<TagId>,
    #[serde(default)]
    pub skills: Vec<TagId>,
    #[serde(default)]
    pub languages: Vec<TagId>,
    #[serde(default)]
    pub unapproved_tags: Option<UnapprovedTags>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub jobs: Vec<DocRef>,
    #[serde(default)]
    pub contract: Option<FreelancerContractDoc>,
    #[serde(default)]
    pub selected_reviews: Vec<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(rename = "company", default)]
    pub own_business: Option<OwnBusiness>,
    #[serde(default)]
    pub social: Option<Social>,
}

impl FreelancerDoc {
    pub fn from_freelancer(freelancer: &Freelancer) -> Self {
        Self {
            status: freelancer.status,
            gender: freelancer.gender,
            photo: freelancer.photo.clone(),
            job_titles: freelancer.job_titles.clone(),
            skills: freelancer.skills.clone(),
            languages: freelancer.languages.clone(),
            unapproved_tags: UnapprovedTags::normalize(freelancer.unapproved_tags.clone()),
            experience: freelancer.experience.clone(),
            education: freelancer.education.clone(),
            jobs: freelancer
                .jobs
                .iter()
                .map(|job| DocRef::new("jobs", job))
                .collect(),
            contract: freelancer.contract.as_ref().map(|contract| FreelancerContractDoc {
                document_id: contract.document_id.clone(),
                link: contract.link.clone(),
                signed: contract.signed,
                date: contract.date.map(Stamp::from),
            }),
            selected_reviews: freelancer
                .selected_reviews
                .iter()
                .map(|review| review.0.clone())
                .collect(),
            address: freelancer.address.clone(),
            own_business: freelancer.own_business.clone(),
            social: freelancer.social.clone(),
        }
    }

    pub fn into_freelancer(self) -> Freelancer {
        Freelancer {
            status: self.status,
            gender: self.gender,
            photo: self.photo,
            job_titles: self.job_titles,
            skills: self.skills,
            languages: self.languages,
            unapproved_tags: UnapprovedTags::normalize(self.unapproved_tags),
            experience: self.experience,
            education: self.education,
            jobs: self
                .jobs
                .iter()
                .map(|job| JobId(job.doc_id().to_string()))
                .collect(),
            contract: self.contract.map(|contract| FreelancerContract {
                document_id: contract.document_id,
                link: contract.link,
                signed: contract.signed,
                date: contract.date.map(Into::into),
            }),
            selected_reviews: self.selected_reviews.into_iter().map(ReviewId).collect(),
            address: self.address,
            own_business: self.own_business,
            social: self.social,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmployerDoc {
    pub position: String,
    #[serde(default)]
    pub active_company: Option<DocRef>,
    #[serde(default)]
    pub companies: Vec<DocRef>,
}

impl EmployerDoc {
    pub fn from_employer(employer: &Employer) -> Self {
        Self {
            position: employer.position.clone(),
            active_company: employer
                .active_company
                .as_ref()
                .map(|company| DocRef::new("companies", company)),
            companies: employer
                .companies
                .iter()
                .map(|company| DocRef::new("companies", company))
                .collect(),
        }
    }

    pub fn into_employer(self) -> Employer {
        Employer {
            position: self.position,
            active_company: self
                .active_company
                .map(|company| CompanyId(company.doc_id().to_string())),
            companies: self
                .companies
                .iter()
                .map(|company| CompanyId(company.doc_id().to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserDoc {
    pub general: GeneralDoc,
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub freelancer: Option<FreelancerDoc>,
    #[serde(default)]
    pub employer: Option<EmployerDoc>,
}

impl UserDoc {
    pub fn from_user(user: &User) -> Self {
        Self {
            general: GeneralDoc::from_general(&user.general),
            settings: user.settings.clone(),
            freelancer: user.freelancer.as_ref().map(FreelancerDoc::from_freelancer),
            employer: user.employer.as_ref().map(EmployerDoc::from_employer),
        }
    }

    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            general: self.general.into_general(),
            settings: self.settings,
            freelancer: self.freelancer.map(FreelancerDoc::into_freelancer),
            employer: self.employer.map(EmployerDoc::into_employer),
        }
    }
}

pub(crate) fn user_from_doc(doc: &Document) -> Result<User, ConvertError> {
    Ok(decode::<UserDoc>(doc)?.into_user(UserId(doc.path.id().to_string())))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewDoc {
    pub job_name: String,
    #[serde(default)]
    pub job_description: String,
    pub company: ReviewCompany,
    pub stars: u8,
    #[serde(default)]
    pub text: String,
    pub show: bool,
    pub date: Stamp,
}

impl ReviewDoc {
    pub fn from_review(review: &Review) -> Self {
        Self {
            job_name: review.job_name.clone(),
            job_description: review.job_description.clone(),
            company: review.company.clone(),
            stars: review.stars,
            text: review.text.clone(),
            show: review.show,
            date: Stamp::from(review.date),
        }
    }

    pub fn into_review(self, id: ReviewId) -> Review {
        Review {
            id,
            job_name: self.job_name,
            job_description: self.job_description,
            company: self.company,
            stars: self.stars,
            text: self.text,
            show: self.show,
            date: self.date.into(),
        }
    }
}

pub(crate) fn review_from_doc(doc: &Document) -> Result<Review, ConvertError> {
    Ok(decode::<ReviewDoc>(doc)?.into_review(ReviewId(doc.path.id().to_string())))
}
