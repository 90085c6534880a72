use crate::api::{ApiResponse, response::ApiResult, state::AppState};
use auroramind_core::models::{ChatMessage, ChatSession};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub default_kb_id: String,
}

// POST /v1/sessions
pub async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ChatSession>>)> {
    let Json(request) = payload?;
    let session = state
        .store
        .create_session(request.title, request.default_kb_id)
        .await?;

    tracing::debug!(session_id = %session.id, "Session created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(session, "Session created")),
    ))
}

// GET /v1/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<ChatSession>>>> {
    let mut sessions = state.store.list_sessions().await?;
    sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    Ok(Json(ApiResponse::ok(sessions)))
}

// GET /v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<ChatSession>>> {
    let session = state.store.get_session(&id).await?;
    Ok(Json(ApiResponse::ok(session)))
}

// GET /v1/sessions/{id}/messages
pub async fn list_session_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<ChatMessage>>>> {
    let messages = state.store.list_messages(&id).await?;
    Ok(Json(ApiResponse::ok(messages)))
}
