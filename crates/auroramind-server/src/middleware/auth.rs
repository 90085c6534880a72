use crate::api::response::ApiError;
use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Placeholder guard: any non-empty `Authorization` header is accepted.
/// Tokens are not validated.
pub async fn require_credential(req: Request, next: Next) -> Response {
    if has_credential(req.headers().get(header::AUTHORIZATION)) {
        return next.run(req).await;
    }

    tracing::debug!(path = %req.uri().path(), "Rejecting request without credentials");
    ApiError::Unauthorized("missing Authorization header".to_string()).into_response()
}

fn has_credential(header: Option<&HeaderValue>) -> bool {
    header
        .and_then(|value| value.to_str().ok())
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}
