use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    Actor, ActorRole, AnswerPatch, AssessmentId, LeadId, QuestionId, QuestionType,
    VerifiedSection,
};
use super::error::AssessmentError;
use super::repository::{AssessmentRepository, RepositoryError};
use super::service::{AssessmentService, ReviewCommand, SubmitCommand};
use super::snapshot::{NewQuestion, QuestionEdit};
use super::templates::TemplateBank;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";

type SharedService<R, B> = Arc<AssessmentService<R, B>>;

/// HTTP surface for the assessment engine. Identity comes from headers set by the host.
pub fn assessment_router<R, B>(service: SharedService<R, B>) -> Router
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    Router::new()
        .route("/api/v1/assessments", post(start_handler::<R, B>))
        .route(
            "/api/v1/assessments/:assessment_id",
            get(detail_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/answers",
            put(save_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/submit",
            post(submit_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/approve",
            post(approve_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/reject",
            post(reject_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/restart",
            post(restart_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/verify",
            post(verify_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/version",
            get(version_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/reviews",
            get(reviews_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/questions",
            post(add_question_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/questions/reorder",
            post(reorder_handler::<R, B>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/questions/:question_id",
            patch(update_question_handler::<R, B>).delete(delete_question_handler::<R, B>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub lead_id: LeadId,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub section: VerifiedSection,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub question_type: QuestionType,
    pub question_ids: Vec<QuestionId>,
}

#[derive(Debug)]
pub enum ApiError {
    MissingActor,
    UnknownRole(String),
    Assessment(AssessmentError),
}

impl From<AssessmentError> for ApiError {
    fn from(value: AssessmentError) -> Self {
        Self::Assessment(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingActor => error_response(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                format!("the {ACTOR_ID_HEADER} and {ACTOR_ROLE_HEADER} headers are required"),
            ),
            ApiError::UnknownRole(role) => error_response(
                StatusCode::BAD_REQUEST,
                "unknown_role",
                format!("role `{role}` is neither assessor nor reviewer"),
            ),
            ApiError::Assessment(err) => err.into_response(),
        }
    }
}

impl IntoResponse for AssessmentError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match &self {
            AssessmentError::Validation(_) => {
                error_response(StatusCode::UNPROCESSABLE_ENTITY, self.code(), message)
            }
            AssessmentError::Forbidden { .. } => {
                error_response(StatusCode::FORBIDDEN, self.code(), message)
            }
            AssessmentError::NotFound(_) | AssessmentError::QuestionNotFound(_) => {
                error_response(StatusCode::NOT_FOUND, self.code(), message)
            }
            AssessmentError::InvalidState { .. } | AssessmentError::InvalidTransition { .. } => {
                error_response(StatusCode::CONFLICT, "invalid_transition", message)
            }
            AssessmentError::QuestionsOutdated {
                snapshot_version,
                current_version,
            } => {
                let body = json!({
                    "code": self.code(),
                    "message": message,
                    "requires_confirmation": true,
                    "snapshot_version": snapshot_version,
                    "current_version": current_version,
                });
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
            AssessmentError::ConcurrentModification(_) => {
                error_response(StatusCode::CONFLICT, self.code(), message)
            }
            AssessmentError::ReorderMismatch {
                missing,
                unexpected,
                ..
            } => {
                let body = json!({
                    "code": self.code(),
                    "message": message,
                    "missing": missing,
                    "unexpected": unexpected,
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AssessmentError::Repository(RepositoryError::Conflict(_)) => {
                error_response(StatusCode::CONFLICT, "already_exists", message)
            }
            AssessmentError::Repository(_) => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, self.code(), message)
            }
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    (status, Json(json!({ "code": code, "message": message }))).into_response()
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let id = header(ACTOR_ID_HEADER).ok_or(ApiError::MissingActor)?;
    let raw_role = header(ACTOR_ROLE_HEADER).ok_or(ApiError::MissingActor)?;
    let role =
        ActorRole::parse(raw_role).ok_or_else(|| ApiError::UnknownRole(raw_role.to_string()))?;
    let name = header(ACTOR_NAME_HEADER).unwrap_or(id);

    Ok(Actor {
        id: id.to_string(),
        role,
        name: name.to_string(),
    })
}

pub(crate) async fn start_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    headers: HeaderMap,
    Json(request): Json<StartRequest>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let assessment = service.start(&actor, request.lead_id)?;
    Ok((StatusCode::CREATED, Json(assessment)).into_response())
}

pub(crate) async fn detail_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let assessment = service.get(&AssessmentId(assessment_id))?;
    Ok(Json(assessment).into_response())
}

pub(crate) async fn save_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<AnswerPatch>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let receipt = service.save_answers(&actor, &AssessmentId(assessment_id), patch)?;
    Ok(Json(receipt).into_response())
}

pub(crate) async fn submit_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
    headers: HeaderMap,
    command: Option<Json<SubmitCommand>>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let command = command.map(|Json(command)| command).unwrap_or_default();
    let assessment = service.submit(&actor, &AssessmentId(assessment_id), command)?;
    Ok(Json(assessment).into_response())
}

pub(crate) async fn approve_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
    headers: HeaderMap,
    command: Option<Json<ReviewCommand>>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let command = command.map(|Json(command)| command).unwrap_or_default();
    let assessment = service.approve(&actor, &AssessmentId(assessment_id), command)?;
    Ok(Json(assessment).into_response())
}

pub(crate) async fn reject_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
    headers: HeaderMap,
    command: Option<Json<ReviewCommand>>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let command = command.map(|Json(command)| command).unwrap_or_default();
    let assessment = service.reject(&actor, &AssessmentId(assessment_id), command)?;
    Ok(Json(assessment).into_response())
}

pub(crate) async fn restart_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let assessment = service.restart_with_new_questions(&actor, &AssessmentId(assessment_id))?;
    Ok(Json(assessment).into_response())
}

pub(crate) async fn verify_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let assessment = service.verify(&actor, &AssessmentId(assessment_id), request.section)?;
    Ok(Json(assessment).into_response())
}

pub(crate) async fn version_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let check = service.check_version(&AssessmentId(assessment_id))?;
    Ok(Json(check).into_response())
}

pub(crate) async fn reviews_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let entries = service.review_history(&AssessmentId(assessment_id))?;
    Ok(Json(entries).into_response())
}

pub(crate) async fn add_question_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
    headers: HeaderMap,
    Json(question): Json<NewQuestion>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let added = service.add_question(&actor, &AssessmentId(assessment_id), question)?;
    Ok((StatusCode::CREATED, Json(added)).into_response())
}

pub(crate) async fn update_question_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path((assessment_id, question_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(edit): Json<QuestionEdit>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let updated = service.update_question(
        &actor,
        &AssessmentId(assessment_id),
        &QuestionId(question_id),
        edit,
    )?;
    Ok(Json(updated).into_response())
}

pub(crate) async fn delete_question_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path((assessment_id, question_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    service.delete_question(&actor, &AssessmentId(assessment_id), &QuestionId(question_id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn reorder_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(assessment_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ReorderRequest>,
) -> Result<Response, ApiError>
where
    R: AssessmentRepository + 'static,
    B: TemplateBank + 'static,
{
    let actor = actor_from_headers(&headers)?;
    let questions = service.reorder_questions(
        &actor,
        &AssessmentId(assessment_id),
        request.question_type,
        &request.question_ids,
    )?;
    Ok(Json(questions).into_response())
}
