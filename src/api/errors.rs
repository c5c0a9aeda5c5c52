//! API error handling.
//!
//! Structured error responses with proper HTTP status codes and request
//! tracking.

use crate::errors::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (NOT_FOUND, BAD_REQUEST, CONFLICT, INTERNAL_ERROR).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error types with request tracking.
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InternalError(String),
}

impl ApiError {
    pub fn not_found(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::NotFound(message),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }

    /// Map an engine error onto the HTTP taxonomy: validation errors are the
    /// caller's fault, conflicts surface as 409 only if the engine's internal
    /// retries were exhausted, everything else is a server fault.
    pub fn from_engine(request_id: String, err: EngineError) -> Self {
        let kind = match &err {
            e if e.is_validation() => ApiErrorKind::BadRequest(err.to_string()),
            EngineError::NotFound(_) => ApiErrorKind::NotFound(err.to_string()),
            EngineError::Conflict(_) => ApiErrorKind::Conflict(err.to_string()),
            _ => ApiErrorKind::InternalError(err.to_string()),
        };
        Self { kind, request_id }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::BadRequest(msg) => {
                write!(f, "[{}] Bad Request: {}", self.request_id, msg)
            }
            ApiErrorKind::Conflict(msg) => write!(f, "[{}] Conflict: {}", self.request_id, msg),
            ApiErrorKind::InternalError(msg) => {
                write!(f, "[{}] Internal Error: {}", self.request_id, msg)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiErrorKind::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_mapping() {
        let err = ApiError::from_engine(
            "req-1".to_string(),
            EngineError::BettingClosed { secs_remaining: 2 },
        );
        assert!(matches!(err.kind, ApiErrorKind::BadRequest(_)));

        let err = ApiError::from_engine(
            "req-2".to_string(),
            EngineError::NotFound("wager x".to_string()),
        );
        assert!(matches!(err.kind, ApiErrorKind::NotFound(_)));

        let err = ApiError::from_engine(
            "req-3".to_string(),
            EngineError::ConsistencyViolation("dup".to_string()),
        );
        assert!(matches!(err.kind, ApiErrorKind::InternalError(_)));
    }
}
