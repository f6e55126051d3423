//! Error types shared across the edge layer

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Control-plane error taxonomy.
///
/// Every variant maps onto exactly one HTTP status; the message of the
/// variant becomes the `error` field of the JSON body.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Shared secret mismatch
    #[error("{0}")]
    Unauthorized(String),

    /// Missing or malformed required field
    #[error("{0}")]
    InvalidInput(String),

    /// Unknown tenant or object
    #[error("{0}")]
    NotFound(String),

    /// Resource name already taken
    #[error("{0}")]
    Conflict(String),

    /// A remote cloud-resource call failed; `details` is surfaced verbatim
    #[error("{message}")]
    UpstreamFailure {
        /// Operation-level summary
        message: String,
        /// Upstream error payload
        details: serde_json::Value,
    },
}

impl ApiError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UpstreamFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body for this error
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::UpstreamFailure { message, details } => serde_json::json!({
                "error": message,
                "details": details,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend unreachable or rejected the call
    #[error("store backend error: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_upstream_body_keeps_details() {
        let err = ApiError::UpstreamFailure {
            message: "Registration failed".into(),
            details: serde_json::json!([{ "code": 10000, "message": "Authentication error" }]),
        };

        let body = err.body();
        assert_eq!(body["error"], "Registration failed");
        assert_eq!(body["details"][0]["code"], 10000);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_plain_body() {
        let body = ApiError::NotFound("Trainer not found".into()).body();
        assert_eq!(body, serde_json::json!({ "error": "Trainer not found" }));
    }
}
