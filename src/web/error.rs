use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// API error taxonomy. Validation accumulates every violation; the rest
/// carry a single message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Expired(String),
    #[error("forbidden")]
    Forbidden,
    #[error("too many requests")]
    RateLimited,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": { "message": "validation failed", "details": details } }),
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": { "message": msg } }),
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                json!({ "error": { "message": msg } }),
            ),
            ApiError::InvalidState(msg) | ApiError::Expired(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": { "message": msg } }),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "error": { "message": "forbidden" } }),
            ),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": { "message": "too many requests" } }),
            ),
            // Message surfaced on purpose: development convenience, not
            // hardened for production.
            ApiError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": { "message": e.to_string() } }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        let cases = [
            (
                ApiError::Validation(vec!["bad".into()]).into_response(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::not_found("survey run not found").into_response(),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Conflict("token already used".into()).into_response(),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::InvalidState("run is not active".into()).into_response(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Expired("survey has expired".into()).into_response(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::RateLimited.into_response(),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ApiError::Internal(anyhow::anyhow!("boom")).into_response(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (response, expected) in cases {
            assert_eq!(response.status(), expected);
        }
    }
}
