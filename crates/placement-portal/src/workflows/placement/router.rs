use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::documents::{DocumentError, DocumentStore};
use super::domain::{
    ApplicationId, ApplicationKey, ApprovalDecision, CompanyId, CompanyRegistration, DocumentKind,
    DocumentRef, OpportunityDraft, OpportunityId, RecommendationDecision, ReviewStatus,
    StudentRegistration,
};
use super::identity::{Actor, IdentityClaim, IdentityError, IdentityProvider, Role};
use super::query::ApplicationFilter;
use super::repository::PlacementRepository;
use super::service::{PlacementError, PlacementService};

pub const ROLE_HEADER: &str = "x-placement-role";
pub const IDENTITY_HEADER: &str = "x-placement-identity";
pub const SECRET_HEADER: &str = "x-placement-secret";

/// Shared handler state: the workflow service plus its two collaborators.
pub struct PlacementState<R> {
    pub service: Arc<PlacementService<R>>,
    pub identity: Arc<dyn IdentityProvider>,
    pub documents: Arc<dyn DocumentStore>,
}

impl<R> Clone for PlacementState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            identity: Arc::clone(&self.identity),
            documents: Arc::clone(&self.documents),
        }
    }
}

/// Router exposing registration, postings, the application workflow and uploads.
pub fn placement_router<R>(
    service: Arc<PlacementService<R>>,
    identity: Arc<dyn IdentityProvider>,
    documents: Arc<dyn DocumentStore>,
) -> Router
where
    R: PlacementRepository + 'static,
{
    let state = PlacementState {
        service,
        identity,
        documents,
    };

    Router::new()
        .route("/api/v1/students", post(register_student_handler::<R>))
        .route("/api/v1/companies", post(register_company_handler::<R>))
        .route("/api/v1/opportunities", get(open_opportunities_handler::<R>))
        .route(
            "/api/v1/companies/:company_id/opportunities",
            post(add_opportunity_handler::<R>),
        )
        .route(
            "/api/v1/companies/:company_id/opportunities/:opportunity_id",
            put(update_opportunity_handler::<R>).delete(remove_opportunity_handler::<R>),
        )
        .route(
            "/api/v1/applications",
            post(apply_handler::<R>).get(list_applications_handler::<R>),
        )
        .route(
            "/api/v1/applications/pending",
            get(pending_applications_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/review",
            put(review_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/recommendation",
            put(recommendation_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/approval",
            put(approval_handler::<R>),
        )
        .route("/api/v1/documents/:kind", post(upload_document_handler::<R>))
        .with_state(state)
}

/// Resolve the caller from the identity headers through the identity collaborator.
pub(crate) fn actor_from_headers(
    identity: &dyn IdentityProvider,
    headers: &HeaderMap,
) -> Result<Actor, PlacementError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let role: Role = header(ROLE_HEADER)
        .ok_or(IdentityError::MissingIdentity)?
        .parse()?;
    let claim = IdentityClaim {
        role,
        identity: header(IDENTITY_HEADER)
            .ok_or(IdentityError::MissingIdentity)?
            .to_string(),
        secret: header(SECRET_HEADER).map(str::to_string),
    };
    Ok(identity.resolve(&claim)?)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApplyRequest {
    pub company_id: CompanyId,
    pub opportunity_id: OpportunityId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewUpdate {
    pub status: ReviewStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecommendationUpdate {
    pub decision: RecommendationDecision,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalUpdate {
    pub decision: ApprovalDecision,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadParams {
    pub filename: String,
}

/// Registrations may only carry references the document store handed out.
fn issued(
    documents: &dyn DocumentStore,
    reference: Option<DocumentRef>,
) -> Result<Option<DocumentRef>, PlacementError> {
    Ok(reference
        .map(|reference| documents.verify(&reference))
        .transpose()?)
}

pub(crate) async fn register_student_handler<R>(
    State(state): State<PlacementState<R>>,
    Json(mut registration): Json<StudentRegistration>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    registration.resume = issued(state.documents.as_ref(), registration.resume)?;
    let student = state.service.register_student(registration)?;
    Ok((StatusCode::CREATED, Json(student)).into_response())
}

pub(crate) async fn register_company_handler<R>(
    State(state): State<PlacementState<R>>,
    Json(mut registration): Json<CompanyRegistration>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    registration.logo = issued(state.documents.as_ref(), registration.logo)?;
    let company = state.service.register_company(registration)?;
    Ok((StatusCode::CREATED, Json(company)).into_response())
}

pub(crate) async fn open_opportunities_handler<R>(
    State(state): State<PlacementState<R>>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let listings = state.service.open_opportunities()?;
    Ok(Json(listings).into_response())
}

pub(crate) async fn add_opportunity_handler<R>(
    State(state): State<PlacementState<R>>,
    Path(company_id): Path<String>,
    headers: HeaderMap,
    Json(draft): Json<OpportunityDraft>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let opportunity =
        state
            .service
            .add_opportunity(&actor, &CompanyId::from_email(&company_id), draft)?;
    Ok((StatusCode::CREATED, Json(opportunity)).into_response())
}

pub(crate) async fn update_opportunity_handler<R>(
    State(state): State<PlacementState<R>>,
    Path((company_id, opportunity_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(draft): Json<OpportunityDraft>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let opportunity = state.service.update_opportunity(
        &actor,
        &CompanyId::from_email(&company_id),
        &OpportunityId(opportunity_id),
        draft,
    )?;
    Ok(Json(opportunity).into_response())
}

pub(crate) async fn remove_opportunity_handler<R>(
    State(state): State<PlacementState<R>>,
    Path((company_id, opportunity_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let opportunity = state.service.remove_opportunity(
        &actor,
        &CompanyId::from_email(&company_id),
        &OpportunityId(opportunity_id),
    )?;
    Ok(Json(opportunity).into_response())
}

pub(crate) async fn apply_handler<R>(
    State(state): State<PlacementState<R>>,
    headers: HeaderMap,
    Json(request): Json<ApplyRequest>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let student = match &actor {
        Actor::Student(id) => id.clone(),
        other => return Err(PlacementError::unauthorized(other, "apply to opportunities")),
    };
    let key = ApplicationKey {
        student,
        company: CompanyId::from_email(&request.company_id.0),
        opportunity: request.opportunity_id,
    };
    let record = state.service.apply(&actor, key)?;
    Ok((StatusCode::CREATED, Json(record.status_view())).into_response())
}

pub(crate) async fn list_applications_handler<R>(
    State(state): State<PlacementState<R>>,
    headers: HeaderMap,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let views = state
        .service
        .list_applications_for(&actor, &filter)?
        .collect_views()?;
    Ok(Json(views).into_response())
}

pub(crate) async fn pending_applications_handler<R>(
    State(state): State<PlacementState<R>>,
    headers: HeaderMap,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let views = state.service.pending_items(&actor)?.collect_views()?;
    Ok(Json(views).into_response())
}

pub(crate) async fn application_handler<R>(
    State(state): State<PlacementState<R>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let view = state
        .service
        .application_view(&actor, &ApplicationId(application_id))?;
    Ok(Json(view).into_response())
}

pub(crate) async fn review_handler<R>(
    State(state): State<PlacementState<R>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<ReviewUpdate>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let record =
        state
            .service
            .set_review_status(&actor, &ApplicationId(application_id), update.status)?;
    Ok(Json(record.status_view()).into_response())
}

pub(crate) async fn recommendation_handler<R>(
    State(state): State<PlacementState<R>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<RecommendationUpdate>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let record = state.service.set_recommendation(
        &actor,
        &ApplicationId(application_id),
        update.decision,
    )?;
    Ok(Json(record.status_view()).into_response())
}

pub(crate) async fn approval_handler<R>(
    State(state): State<PlacementState<R>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<ApprovalUpdate>,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let actor = actor_from_headers(state.identity.as_ref(), &headers)?;
    let record =
        state
            .service
            .set_approval(&actor, &ApplicationId(application_id), update.decision)?;
    Ok(Json(record.status_view()).into_response())
}

pub(crate) async fn upload_document_handler<R>(
    State(state): State<PlacementState<R>>,
    Path(kind): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Response, PlacementError>
where
    R: PlacementRepository + 'static,
{
    let kind: DocumentKind = kind
        .parse()
        .map_err(|_| PlacementError::not_found("document kind", &kind))?;
    let reference = state.documents.store(kind, &params.filename, &body)?;
    Ok((StatusCode::CREATED, Json(reference)).into_response())
}

impl IntoResponse for PlacementError {
    fn into_response(self) -> Response {
        let status = match &self {
            PlacementError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PlacementError::Duplicate { .. }
            | PlacementError::DuplicateApplication(_)
            | PlacementError::GateNotSatisfied { .. } => StatusCode::CONFLICT,
            PlacementError::NotFound { .. } => StatusCode::NOT_FOUND,
            PlacementError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            PlacementError::Identity(_) => StatusCode::UNAUTHORIZED,
            PlacementError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PlacementError::Document(DocumentError::Io(_)) => StatusCode::SERVICE_UNAVAILABLE,
            PlacementError::Document(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };

        let payload = match &self {
            PlacementError::GateNotSatisfied { current, .. } => json!({
                "error": self.to_string(),
                "current": current,
            }),
            _ => json!({
                "error": self.to_string(),
            }),
        };
        (status, Json(payload)).into_response()
    }
}
