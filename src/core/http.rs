//! HTTP helpers shared by every API module
//!
//! All request-facing errors render the same `{error, code}` body; the code
//! is a stable machine-checkable kind.

use axum::{
    Json,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use uuid::Uuid;

/// Stable error kinds exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCredentials,
    InvalidToken,
    Unauthorized,
    Forbidden,
    NotFound,
    InvalidId,
    Conflict,
    BadRequest,
    Protected,
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidCredentials | ErrorKind::InvalidToken | ErrorKind::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidId | ErrorKind::BadRequest | ErrorKind::Protected => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorKind::InvalidToken => "INVALID_TOKEN",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidId => "INVALID_ID",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Protected => "PROTECTED",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: &'static str,
}

/// Render an error of `kind` with a human-readable message
pub fn error_response(kind: ErrorKind, message: String) -> Response {
    if kind == ErrorKind::Internal {
        tracing::error!("Request failed: {}", message);
    }

    let body = ApiError {
        error: message,
        code: kind.code(),
    };

    (kind.status(), Json(body)).into_response()
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();

    (!token.is_empty()).then_some(token)
}

/// Parse a path identifier; `None` when it is not a UUID
pub fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Generic message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
