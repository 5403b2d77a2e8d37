//! REST endpoints driving the wizard.
//!
//! Each request loads the visitor's session, applies one transition and
//! stores the result, so a page reload picks up where the visitor left off.
//! A successful finish deletes the session.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DatabaseError, WizardError};
use crate::store::SessionStore;

use super::controller::{Registration, WizardController};
use super::state::WizardSession;
use super::view::{FormView, ValidationFeedback};

/// Shared state for the wizard routes.
#[derive(Clone)]
pub struct RegisterRouteState {
    pub controller: Arc<WizardController>,
    pub sessions: Arc<dyn SessionStore>,
}

/// A rendered form for one session.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    /// True when the whole form should be redrawn.
    pub rebuild: bool,
    pub form: FormView,
}

/// Outcome of a finish. The session no longer exists; `form` is a blank form.
#[derive(Debug, Serialize)]
pub struct FinishResponse {
    pub session_id: Uuid,
    pub registration: Registration,
    pub form: FormView,
}

#[derive(Debug, Deserialize)]
pub struct FieldChange {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Errors returned by the wizard routes.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Recoverable validation error; carries the annotated form.
    Validation { error: WizardError, form: FormView },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "bad_request", "message": message})),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "not_found", "message": message})),
            )
                .into_response(),
            ApiError::Validation { error, form } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({
                    "error": error.code(),
                    "message": error.to_string(),
                    "form": form,
                })),
            )
                .into_response(),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal_error", "message": message})),
            )
                .into_response(),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        warn!("Session store failure: {}", err);
        ApiError::Internal(err.to_string())
    }
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest("Invalid session ID".to_string()))
}

async fn load(state: &RegisterRouteState, id: Uuid) -> Result<WizardSession, ApiError> {
    state
        .sessions
        .load_session(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session {id} not found")))
}

/// Map a wizard error to a response without touching the stored session.
fn rejected(state: &RegisterRouteState, session: &WizardSession, error: WizardError) -> ApiError {
    match error {
        WizardError::Store(e) => e.into(),
        error => {
            let form = state.controller.render_with_error(session, &error);
            ApiError::Validation { error, form }
        }
    }
}

/// Render `session`, consume its rebuild flag and persist it.
async fn respond(
    state: &RegisterRouteState,
    id: Uuid,
    mut session: WizardSession,
) -> Result<Json<SessionResponse>, ApiError> {
    let form = state.controller.render(&session);
    let rebuild = session.take_rebuild();
    state.sessions.save_session(id, &session).await?;
    Ok(Json(SessionResponse {
        session_id: id,
        rebuild,
        form,
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "multistep-register"
    }))
}

/// POST /api/register/sessions
async fn create_session(
    State(state): State<RegisterRouteState>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let id = Uuid::new_v4();
    let response = respond(&state, id, WizardSession::new()).await?;
    info!(session_id = %id, "Registration session started");
    Ok((StatusCode::CREATED, response))
}

/// GET /api/register/sessions/{id}
async fn get_session(
    State(state): State<RegisterRouteState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_id(&id)?;
    let session = load(&state, id).await?;
    respond(&state, id, session).await
}

/// POST /api/register/sessions/{id}/field
async fn field_changed(
    State(state): State<RegisterRouteState>,
    Path(id): Path<String>,
    Json(change): Json<FieldChange>,
) -> Result<Json<ValidationFeedback>, ApiError> {
    let id = parse_id(&id)?;
    let session = load(&state, id).await?;
    let feedback = state
        .controller
        .on_field_changed(&session, &change.key, &change.value)
        .await;
    Ok(Json(feedback))
}

/// POST /api/register/sessions/{id}/forward
async fn forward(
    State(state): State<RegisterRouteState>,
    Path(id): Path<String>,
    Json(submission): Json<Submission>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_id(&id)?;
    let mut session = load(&state, id).await?;
    if let Err(e) = state.controller.advance(&mut session, submission.values) {
        return Err(rejected(&state, &session, e));
    }
    respond(&state, id, session).await
}

/// POST /api/register/sessions/{id}/back
async fn back(
    State(state): State<RegisterRouteState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_id(&id)?;
    let mut session = load(&state, id).await?;
    state.controller.retreat(&mut session);
    respond(&state, id, session).await
}

/// POST /api/register/sessions/{id}/reset
async fn reset(
    State(state): State<RegisterRouteState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_id(&id)?;
    let mut session = load(&state, id).await?;
    state.controller.reset(&mut session);
    respond(&state, id, session).await
}

/// POST /api/register/sessions/{id}/finish
async fn finish(
    State(state): State<RegisterRouteState>,
    Path(id): Path<String>,
    Json(submission): Json<Submission>,
) -> Result<Json<FinishResponse>, ApiError> {
    let id = parse_id(&id)?;
    let mut session = load(&state, id).await?;

    let registration = match state.controller.finish(&mut session, submission.values).await {
        Ok(registration) => registration,
        Err(e) => return Err(rejected(&state, &session, e)),
    };

    // Account already created; a leftover row is removed by the purge task.
    if let Err(e) = state.sessions.delete_session(id).await {
        warn!(
            session_id = %id,
            account_id = %registration.account_id,
            "Failed to discard finished session: {}",
            e
        );
    }

    Ok(Json(FinishResponse {
        session_id: id,
        form: state.controller.render(&session),
        registration,
    }))
}

/// Build the wizard REST routes.
pub fn register_routes(state: RegisterRouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/register/sessions", post(create_session))
        .route("/api/register/sessions/{id}", get(get_session))
        .route("/api/register/sessions/{id}/field", post(field_changed))
        .route("/api/register/sessions/{id}/forward", post(forward))
        .route("/api/register/sessions/{id}/back", post(back))
        .route("/api/register/sessions/{id}/reset", post(reset))
        .route("/api/register/sessions/{id}/finish", post(finish))
        .layer(cors)
        .with_state(state)
}
