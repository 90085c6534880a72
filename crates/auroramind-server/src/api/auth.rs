use crate::api::response::{ApiResponse, ApiResult};
use axum::{Json, extract::rejection::JsonRejection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    #[allow(dead_code)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

// GET /health
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

// POST /v1/auth/login
// Issues a demo token for any well-formed request; credentials are not checked.
pub async fn login(
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<LoginResponse>>> {
    let Json(request) = payload?;
    tracing::debug!(email = %request.email, "Issuing demo token");

    Ok(Json(ApiResponse::ok(LoginResponse {
        token: format!("demo-{}", Uuid::new_v4()),
        user_id: Uuid::new_v4().to_string(),
        expires_in_seconds: TOKEN_TTL_SECONDS,
    })))
}
