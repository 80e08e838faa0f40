//! API Error Handling
//!
//! Structured error responses with proper HTTP status codes and request
//! tracking. Engine errors map to stable machine-readable codes so clients
//! can branch on the exact failure instead of parsing messages.

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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code (NOT_FOUND, INSUFFICIENT_FUNDS, ...).
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub request_id: String,
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            request_id,
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message,
        }
    }

    /// Map an engine failure to its HTTP shape. Validation and resource
    /// errors are 4xx the caller can fix; storage failures are opaque 500s
    /// that are safe to retry because nothing committed.
    pub fn engine(request_id: String, err: EngineError) -> Self {
        let (status, code) = match &err {
            EngineError::InvalidAmount { .. } => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            EngineError::InvalidMineCount { .. } => {
                (StatusCode::BAD_REQUEST, "INVALID_MINE_COUNT")
            }
            EngineError::InvalidGridSize { .. } => {
                (StatusCode::BAD_REQUEST, "INVALID_GRID_SIZE")
            }
            EngineError::InvalidTile { .. } => (StatusCode::BAD_REQUEST, "INVALID_TILE"),
            EngineError::InsufficientFunds { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS")
            }
            EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            EngineError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            EngineError::InvalidState { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
            EngineError::AlreadyRevealed { .. } => (StatusCode::CONFLICT, "ALREADY_REVEALED"),
            EngineError::NothingToCashOut => (StatusCode::CONFLICT, "NOTHING_TO_CASH_OUT"),
            EngineError::Storage(_) | EngineError::Corrupted(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        Self {
            request_id,
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.request_id, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: self.code.to_string(),
                message: self.message,
                details: None,
            },
        });

        (self.status, body).into_response()
    }
}
