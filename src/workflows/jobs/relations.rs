//! Read-side joins: one job with a requested subset of its relations,
//! and the paginated admin overview assembled from four bulk reads.
//!
//! Relations not asked for stay absent rather than empty, and a relation
//! that fails to resolve is logged and left out instead of sinking the
//! whole read.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::warn;

use super::docs::job_from_doc;
use super::domain::{
    FreelancerApplicant, JobEmployeeProfile, JobFailure, JobId, JobOverview, JobOverviewBatch,
    JobRelation, JobSummary, JobWithRelations, OverviewCompany,
};
use super::lifecycle::load_user;
use super::repository::{JobError, JobRepository};
use crate::store::{CollectionPath, DocumentStore};
use crate::workflows::companies::docs::company_from_doc;
use crate::workflows::companies::domain::{Company, CompanyId};
use crate::workflows::users::docs::user_from_doc;
use crate::workflows::users::domain::{FreelancerUser, UserId};

pub struct RelationResolver<S> {
    repo: JobRepository<S>,
}

impl<S: DocumentStore> RelationResolver<S> {
    pub fn new(repo: JobRepository<S>) -> Self {
        Self { repo }
    }

    /// One job plus the requested relations. The shortlist and hire
    /// views are filters over the applicant join, so asking for either
    /// resolves applicants first; the independent relations are fetched
    /// concurrently.
    pub async fn job_with_relations(
        &self,
        id: &JobId,
        relations: &[JobRelation],
    ) -> Result<JobWithRelations, JobError> {
        let (job, _) = self.repo.job(id).await?;
        let want = |relation: JobRelation| relations.contains(&relation);

        let resolved = if relations.iter().any(|relation| relation.requires_applicants()) {
            self.freelancer_applicants(id).await
        } else {
            None
        };

        let (creator, company, employees) = tokio::join!(
            async {
                if want(JobRelation::Creator) {
                    load_user(self.repo.store().as_ref(), &job.creator).await
                } else {
                    None
                }
            },
            async {
                if want(JobRelation::Company) {
                    self.company(&job.company).await
                } else {
                    None
                }
            },
            async {
                if want(JobRelation::Employees) {
                    self.employee_profiles(id).await
                } else {
                    None
                }
            },
        );

        let filter = |ids: &[UserId]| -> Option<Vec<FreelancerApplicant>> {
            resolved.as_ref().map(|applicants| {
                applicants
                    .iter()
                    .filter(|applicant| ids.contains(&applicant.user.id))
                    .cloned()
                    .collect()
            })
        };
        let selected_applicants = want(JobRelation::SelectedApplicants)
            .then(|| filter(&job.selected_applicants))
            .flatten();
        let freelancers = want(JobRelation::Freelancers)
            .then(|| filter(&job.freelancers))
            .flatten();
        let applicants = if want(JobRelation::Applicants) {
            resolved
        } else {
            None
        };

        Ok(JobWithRelations {
            job,
            creator,
            company,
            employees,
            applicants,
            selected_applicants,
            freelancers,
        })
    }

    /// One admin overview page. Everything the page needs is pulled in
    /// four concurrent bulk reads and joined in memory; a job that
    /// cannot be assembled becomes a failure row instead of hiding the
    /// rest of the page.
    pub async fn jobs_overview(
        &self,
        page_size: usize,
        cursor: Option<&JobId>,
    ) -> Result<JobOverviewBatch, JobError> {
        let store = self.repo.store();
        let jobs_collection = JobRepository::<S>::collection();
        let companies_collection = CollectionPath::new("companies");
        let users_collection = CollectionPath::new("users");
        let (jobs, applications, companies, users) = tokio::join!(
            store.list(&jobs_collection),
            store.list_group("applicants"),
            store.list(&companies_collection),
            store.list(&users_collection),
        );
        let (mut jobs, applications, companies, users) = (jobs?, applications?, companies?, users?);

        let mut company_rows: HashMap<String, OverviewCompany> = HashMap::new();
        for doc in &companies {
            match company_from_doc(doc) {
                Ok(company) => {
                    company_rows.insert(
                        company.id.0.clone(),
                        OverviewCompany {
                            id: company.id,
                            name: company.name,
                            logo: company.logo.url,
                            phone: company.phone.number,
                        },
                    );
                }
                Err(err) => {
                    warn!(company = doc.path.id(), error = %err, "skipping undecodable company")
                }
            }
        }

        let mut user_names: HashMap<String, String> = HashMap::new();
        for doc in &users {
            match user_from_doc(doc) {
                Ok(user) => {
                    user_names.insert(user.id.0, user.general.name);
                }
                Err(err) => warn!(user = doc.path.id(), error = %err, "skipping undecodable user"),
            }
        }

        let mut applicant_counts: HashMap<String, usize> = HashMap::new();
        for doc in &applications {
            if let Some(parent) = doc.path.parent_doc() {
                *applicant_counts.entry(parent.id().to_string()).or_insert(0) += 1;
            }
        }

        jobs.sort_by(|a, b| a.path.id().cmp(b.path.id()));
        let mut batch = JobOverviewBatch::default();
        let mut seen = 0;
        for doc in jobs
            .iter()
            .filter(|doc| cursor.map_or(true, |after| doc.path.id() > after.0.as_str()))
            .take(page_size)
        {
            seen += 1;
            let id = JobId(doc.path.id().to_string());
            batch.cursor = Some(id.clone());

            let job = match job_from_doc(doc) {
                Ok(job) => job,
                Err(err) => {
                    batch.failed.push(JobFailure {
                        job: id,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            let Some(company) = company_rows.get(&job.company.0) else {
                batch.failed.push(JobFailure {
                    job: id,
                    reason: format!("company {} missing", job.company),
                });
                continue;
            };
            let Some(creator_name) = user_names.get(&job.creator.0) else {
                batch.failed.push(JobFailure {
                    job: id,
                    reason: format!("creator {} missing", job.creator),
                });
                continue;
            };

            let applicant_count = applicant_counts.get(&job.id.0).copied().unwrap_or(0);
            batch.jobs.push(JobOverview {
                job: JobSummary {
                    id: job.id,
                    title: job.name,
                    status: job.status,
                    deadline: job.job_info.deadline,
                    info: job.job_info,
                },
                logs: job.logs,
                company: company.clone(),
                applicant_count,
                creator: job.creator,
                creator_name: creator_name.clone(),
            });
        }
        batch.has_more = page_size > 0 && seen == page_size;
        Ok(batch)
    }

    /// The applicant join: each application merged with the freelancer
    /// account behind it. Entries whose account is gone or no longer
    /// carries the freelancer role are logged and skipped.
    async fn freelancer_applicants(&self, id: &JobId) -> Option<Vec<FreelancerApplicant>> {
        let applicants = match self.repo.applicants(id).await {
            Ok(applicants) => applicants,
            Err(err) => {
                warn!(job = %id, error = %err, "applicants did not resolve");
                return None;
            }
        };
        let joined = join_all(applicants.into_iter().map(|applicant| async move {
            let user = load_user(self.repo.store().as_ref(), &applicant.id).await?;
            let Some(freelancer) = user.freelancer else {
                warn!(job = %id, user = %applicant.id, "applicant has no freelancer profile");
                return None;
            };
            Some(FreelancerApplicant {
                user: FreelancerUser {
                    id: applicant.id,
                    general: user.general,
                    freelancer,
                },
                offer: applicant.offer,
                contact_approval: applicant.contact_approval,
            })
        }))
        .await;
        Some(joined.into_iter().flatten().collect())
    }

    async fn company(&self, id: &CompanyId) -> Option<Company> {
        let path = CollectionPath::new("companies").doc(id.0.clone());
        match self.repo.store().get(&path).await {
            Ok(Some(doc)) => match company_from_doc(&doc) {
                Ok(company) => Some(company),
                Err(err) => {
                    warn!(company = %id, error = %err, "company does not decode");
                    None
                }
            },
            Ok(None) => {
                warn!(company = %id, "company missing");
                None
            }
            Err(err) => {
                warn!(company = %id, error = %err, "company lookup failed");
                None
            }
        }
    }

    /// Roster entries joined with display names; a vanished account keeps
    /// its entry with a blank name.
    async fn employee_profiles(&self, id: &JobId) -> Option<Vec<JobEmployeeProfile>> {
        let employees = match self.repo.employees(id).await {
            Ok(employees) => employees,
            Err(err) => {
                warn!(job = %id, error = %err, "roster did not resolve");
                return None;
            }
        };
        let joined = join_all(employees.into_iter().map(|employee| async move {
            let name = load_user(self.repo.store().as_ref(), &employee.id)
                .await
                .map(|user| user.general.name)
                .unwrap_or_default();
            JobEmployeeProfile {
                user: employee.id,
                name,
                permission: employee.permission,
                signer: employee.signer,
            }
        }))
        .await;
        Some(joined)
    }
}
