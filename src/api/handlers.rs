//! HTTP request handlers

use super::assets::{serve_index, serve_static};
use super::sse::sse_stream;
use super::types::{
    ChatRequest, CreateSessionResponse, ErrorResponse, SettingsInfoResponse, SettingsRequest,
};
use super::AppState;
use crate::conversation::{
    ConversationSnapshot, GenerationSettings, SettingsBounds, SettingsError, TransitionError,
    CSV_CONTENT_TYPE, HISTORY_FILENAME,
};
use crate::runtime::{SessionError, SseEvent};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat page
        .route("/", get(serve_index))
        .route("/assets/*path", get(serve_static))
        // Slider bounds and model
        .route("/api/settings", get(get_settings))
        // Sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/chat", post(send_chat))
        .route("/api/sessions/:id/reset", post(reset_session))
        .route("/api/sessions/:id/settings", put(update_settings))
        .route("/api/sessions/:id/export", get(export_history))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Settings
// ============================================================

async fn get_settings(State(state): State<AppState>) -> Json<SettingsInfoResponse> {
    Json(SettingsInfoResponse {
        model: state.sessions.model_id().to_string(),
        bounds: SettingsBounds::current(),
    })
}

async fn update_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<GenerationSettings>, AppError> {
    let settings = GenerationSettings::new(req.max_output_tokens, req.temperature)?;
    let handle = state.sessions.get(&id).await?;
    Ok(Json(handle.update_settings(settings).await?))
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let handle = state.sessions.create().await;
    let session = handle.snapshot().await?;
    let live_sessions = state.sessions.session_count().await;
    tracing::info!(
        session_id = %handle.id,
        live_sessions,
        "Session created"
    );

    Ok(Json(CreateSessionResponse {
        session_id: handle.id,
        session,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationSnapshot>, AppError> {
    let handle = state.sessions.get(&id).await?;
    Ok(Json(handle.snapshot().await?))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.sessions.get(&id).await?;

    // Subscribe first so nothing falls between the snapshot and the stream
    let broadcast_rx = handle.subscribe();
    let snapshot = handle.snapshot().await?;

    Ok(sse_stream(SseEvent::Init { snapshot }, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ConversationSnapshot>, AppError> {
    let handle = state.sessions.get(&id).await?;
    Ok(Json(handle.submit(req.text).await?))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationSnapshot>, AppError> {
    let handle = state.sessions.get(&id).await?;
    Ok(Json(handle.reset().await?))
}

async fn export_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.sessions.get(&id).await?;
    let csv = handle.export_csv().await?;

    Ok((
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{HISTORY_FILENAME}\""),
            ),
        ],
        csv,
    ))
}

async fn get_version() -> &'static str {
    concat!("parlor ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        let message = e.to_string();
        match e {
            SessionError::NotFound(_) | SessionError::Closed => AppError::NotFound(message),
            SessionError::Rejected(TransitionError::EmptyMessage) => AppError::BadRequest(message),
            SessionError::Rejected(TransitionError::Busy) => AppError::Conflict(message),
            SessionError::Rejected(
                TransitionError::NotPending | TransitionError::StaleGeneration { .. },
            ) => AppError::Internal(message),
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
