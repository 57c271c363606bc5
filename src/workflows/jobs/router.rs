use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ContactStatus, JobId, JobRelation, JobStatus, JobType, NotSelectedReason, Offer, RateKind,
    SignatureParty,
};
use super::lifecycle::{InfoUpdate, JobForm, JobInfoForm, JobLifecycle, LogDraft};
use super::relations::RelationResolver;
use super::repository::JobError;
use super::selection::{SelectionManager, SelectionOutcome};
use super::signatures::SignatureCoordinator;
use crate::store::DocumentStore;
use crate::workflows::alerts::AlertMessenger;
use crate::workflows::companies::domain::CompanyId;
use crate::workflows::error_reports::{EntityRef, ErrorReporter, Severity};
use crate::workflows::tags::{TagId, TagKind, UnapprovedTags};
use crate::workflows::users::domain::UserId;

/// Everything the lifecycle surface needs, cloned per request.
pub struct JobsApi<S, M> {
    pub lifecycle: Arc<JobLifecycle<S, M>>,
    pub signatures: Arc<SignatureCoordinator<S, M>>,
    pub selection: Arc<SelectionManager<S, M>>,
    pub relations: Arc<RelationResolver<S>>,
    pub reporter: ErrorReporter<S>,
}

impl<S, M> Clone for JobsApi<S, M> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Arc::clone(&self.lifecycle),
            signatures: Arc::clone(&self.signatures),
            selection: Arc::clone(&self.selection),
            relations: Arc::clone(&self.relations),
            reporter: self.reporter.clone(),
        }
    }
}

/// Router builder exposing the job lifecycle endpoints.
pub fn jobs_router<S, M>(api: JobsApi<S, M>) -> Router
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    Router::new()
        .route("/api/v1/jobs", post(create_handler::<S, M>))
        .route("/api/v1/jobs/overview", get(overview_handler::<S, M>))
        .route(
            "/api/v1/jobs/:job_id",
            get(fetch_handler::<S, M>)
                .patch(update_info_handler::<S, M>)
                .delete(remove_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/transition",
            post(transition_handler::<S, M>),
        )
        .route("/api/v1/jobs/:job_id/terms", post(terms_handler::<S, M>))
        .route("/api/v1/jobs/:job_id/finish", post(finish_handler::<S, M>))
        .route(
            "/api/v1/jobs/:job_id/employees",
            put(employees_handler::<S, M>),
        )
        .route("/api/v1/jobs/:job_id/signer", put(signer_handler::<S, M>))
        .route(
            "/api/v1/jobs/:job_id/signatures",
            post(signature_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/contract",
            post(contract_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/contract/reset",
            post(reset_contract_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/applications",
            post(apply_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/applications/:user_id",
            delete(withdraw_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/applications/:user_id/offer",
            put(offer_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/applications/:user_id/accept-rate",
            post(accept_rate_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/shortlist",
            put(shortlist_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/shortlist/submit",
            post(submit_shortlist_handler::<S, M>),
        )
        .route("/api/v1/jobs/:job_id/select", post(select_handler::<S, M>))
        .route(
            "/api/v1/jobs/:job_id/contact-approval",
            post(contact_approval_handler::<S, M>),
        )
        .route(
            "/api/v1/jobs/:job_id/tags/approve",
            post(approve_tag_handler::<S, M>),
        )
        .with_state(api)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobPayload {
    company_id: String,
    creator_id: String,
    name: String,
    description: String,
    #[serde(rename = "type")]
    kind: JobType,
    #[serde(default)]
    job_titles: Vec<TagId>,
    #[serde(default)]
    skills: Vec<TagId>,
    #[serde(default)]
    languages: Vec<TagId>,
    unapproved_tags: Option<UnapprovedTags>,
    #[serde(default)]
    info: InfoPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoPayload {
    start: Option<String>,
    end: Option<String>,
    percentage: Option<u32>,
    num_of_hours: Option<u32>,
    deadline_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TransitionPayload {
    status: JobStatus,
    log: Option<LogPayload>,
}

#[derive(Debug, Deserialize)]
struct LogPayload {
    title: String,
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInfoPayload {
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: Option<JobType>,
    start: Option<String>,
    end: Option<String>,
    percentage: Option<u32>,
    num_of_hours: Option<u32>,
    deadline_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterPayload {
    employees: Vec<String>,
    caller_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignerPayload {
    signer_id: String,
    caller_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignaturePayload {
    party: SignatureParty,
    signer_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractPayload {
    document_id: String,
    document_storage_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetContractPayload {
    document_id: String,
    document_storage_url: String,
    actor_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyPayload {
    user_id: String,
    offer: Offer,
}

#[derive(Debug, Deserialize)]
struct OfferPayload {
    offer: Offer,
}

#[derive(Debug, Deserialize)]
struct RatePayload {
    rate: RateKind,
}

#[derive(Debug, Deserialize)]
struct ShortlistPayload {
    applicants: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectPayload {
    applicant_id: String,
    status: Option<JobStatus>,
    document_id: Option<String>,
    document_storage_url: Option<String>,
    not_selected_reason: Option<NotSelectedReason>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactApprovalPayload {
    freelancer_id: String,
    status: ContactStatus,
}

#[derive(Debug, Deserialize)]
struct ApproveTagPayload {
    kind: TagKind,
    tag: TagId,
    remaining: Option<UnapprovedTags>,
}

#[derive(Debug, Default, Deserialize)]
struct IncludeQuery {
    include: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverviewQuery {
    #[serde(default = "default_page_size")]
    page_size: usize,
    cursor: Option<String>,
}

fn default_page_size() -> usize {
    20
}

/// Comma-separated relation names; unknown names are ignored.
fn parse_include(raw: Option<&str>) -> Vec<JobRelation> {
    raw.map(|value| {
        value
            .split(',')
            .filter_map(|name| JobRelation::from_name(name.trim()))
            .collect()
    })
    .unwrap_or_default()
}

pub(crate) async fn create_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    axum::Json(payload): axum::Json<CreateJobPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let form = JobForm {
        name: payload.name,
        description: payload.description,
        kind: payload.kind,
        job_titles: payload.job_titles,
        skills: payload.skills,
        languages: payload.languages,
        unapproved_tags: payload.unapproved_tags,
        info: JobInfoForm {
            start: payload.info.start,
            end: payload.info.end,
            percentage: payload.info.percentage,
            num_of_hours: payload.info.num_of_hours,
            deadline_days: payload.info.deadline_days,
        },
    };
    let company = CompanyId(payload.company_id);
    let creator = UserId(payload.creator_id);
    match api.lifecycle.create(form, &company, &creator).await {
        Ok(job) => (StatusCode::CREATED, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, None, err).await,
    }
}

pub(crate) async fn overview_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Query(query): Query<OverviewQuery>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let cursor = query.cursor.map(JobId);
    match api
        .relations
        .jobs_overview(query.page_size, cursor.as_ref())
        .await
    {
        Ok(batch) => (StatusCode::OK, axum::Json(batch)).into_response(),
        Err(err) => error_response(&api.reporter, None, err).await,
    }
}

pub(crate) async fn fetch_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    Query(query): Query<IncludeQuery>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let relations = parse_include(query.include.as_deref());
    match api.relations.job_with_relations(&id, &relations).await {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn update_info_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<UpdateInfoPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let update = InfoUpdate {
        name: payload.name,
        description: payload.description,
        kind: payload.kind,
        start: payload.start,
        end: payload.end,
        percentage: payload.percentage,
        num_of_hours: payload.num_of_hours,
        deadline_days: payload.deadline_days,
    };
    match api.lifecycle.update_info(&id, update).await {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn remove_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    match api.lifecycle.remove(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn transition_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<TransitionPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let log = payload.log.map(|log| LogDraft {
        title: log.title,
        description: log.description,
    });
    match api.lifecycle.transition(&id, payload.status, log).await {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn terms_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    match api.lifecycle.agree_terms(&id).await {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn finish_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    match api.lifecycle.finish(&id).await {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn employees_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<RosterPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let roster = payload.employees.into_iter().map(UserId).collect();
    let caller = UserId(payload.caller_id);
    match api.lifecycle.set_employees(&id, roster, &caller).await {
        Ok(roster) => (StatusCode::OK, axum::Json(roster)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn signer_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<SignerPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let signer = UserId(payload.signer_id);
    let caller = UserId(payload.caller_id);
    match api.lifecycle.set_signer(&id, &signer, &caller).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn signature_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<SignaturePayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let signer = UserId(payload.signer_id);
    match api
        .signatures
        .add_signature(&id, payload.party, &signer)
        .await
    {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn contract_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<ContractPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    match api
        .signatures
        .attach_contract(&id, payload.document_id, payload.document_storage_url)
        .await
    {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn reset_contract_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<ResetContractPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    match api
        .signatures
        .reset_contract(
            &id,
            payload.document_id,
            payload.document_storage_url,
            &payload.actor_name,
        )
        .await
    {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn apply_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<ApplyPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let user = UserId(payload.user_id);
    match api.selection.apply(&id, &user, payload.offer).await {
        Ok(applicant) => (StatusCode::CREATED, axum::Json(applicant)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn withdraw_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path((job_id, user_id)): Path<(String, String)>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let user = UserId(user_id);
    match api.selection.withdraw(&id, &user).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn offer_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path((job_id, user_id)): Path<(String, String)>,
    axum::Json(payload): axum::Json<OfferPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let user = UserId(user_id);
    match api.selection.change_offer(&id, &user, payload.offer).await {
        Ok(applicant) => (StatusCode::OK, axum::Json(applicant)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn accept_rate_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path((job_id, user_id)): Path<(String, String)>,
    axum::Json(payload): axum::Json<RatePayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let user = UserId(user_id);
    match api.selection.accept_rate(&id, &user, payload.rate).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn shortlist_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<ShortlistPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let ids = payload.applicants.into_iter().map(UserId).collect();
    match api.selection.update_selected_applicants(&id, ids).await {
        Ok(shortlist) => (StatusCode::OK, axum::Json(shortlist)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn submit_shortlist_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    match api.selection.submit_shortlist(&id).await {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn select_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<SelectPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let applicant = UserId(payload.applicant_id);
    let outcome = SelectionOutcome {
        status: payload.status,
        document_id: payload.document_id,
        document_storage_url: payload.document_storage_url,
        not_selected_reason: payload.not_selected_reason,
    };
    match api
        .selection
        .select_freelancer(&id, &applicant, outcome)
        .await
    {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn contact_approval_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<ContactApprovalPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    let freelancer = UserId(payload.freelancer_id);
    match api
        .selection
        .update_contact_approval(&id, &freelancer, payload.status)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

pub(crate) async fn approve_tag_handler<S, M>(
    State(api): State<JobsApi<S, M>>,
    Path(job_id): Path<String>,
    axum::Json(payload): axum::Json<ApproveTagPayload>,
) -> Response
where
    S: DocumentStore + 'static,
    M: AlertMessenger + 'static,
{
    let id = JobId(job_id);
    match api
        .lifecycle
        .approve_tag(&id, payload.kind, payload.tag, payload.remaining)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&api.reporter, Some(EntityRef::job(id.0)), err).await,
    }
}

/// Maps the job error taxonomy onto HTTP statuses and files a report for
/// server-side failures.
async fn error_response<S>(
    reporter: &ErrorReporter<S>,
    entity: Option<EntityRef>,
    err: JobError,
) -> Response
where
    S: DocumentStore,
{
    let status = match &err {
        JobError::NotFound(_)
        | JobError::ApplicantNotFound { .. }
        | JobError::UserNotFound(_)
        | JobError::CompanyNotFound(_) => StatusCode::NOT_FOUND,
        JobError::NotCompanyMember { .. } | JobError::NotAnEmployee { .. } => {
            StatusCode::FORBIDDEN
        }
        JobError::IllegalTransition { .. }
        | JobError::EmptyShortlist(_)
        | JobError::NotSignable { .. }
        | JobError::Contention(_) => StatusCode::CONFLICT,
        JobError::NotAnApplicant { .. }
        | JobError::NotFreelancer(_)
        | JobError::AlreadyApplied { .. }
        | JobError::JobClosed { .. }
        | JobError::InvalidSchedule { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        JobError::Store(_) | JobError::Convert(_) | JobError::Notification(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        reporter
            .record("jobs", Severity::Error, err.to_string(), entity)
            .await;
    }
    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
