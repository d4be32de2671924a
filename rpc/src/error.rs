//! RPC error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use linkid_ledger::LedgerError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ledger rejected call: {0}")]
    Rejected(#[from] LedgerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("server error: {0}")]
    Server(String),
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        match self {
            RpcError::Rejected(error) => {
                (StatusCode::CONFLICT, Json(json!({ "error": error }))).into_response()
            }
            other => {
                let status = match other {
                    RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    RpcError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                    RpcError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, Json(json!({ "message": other.to_string() }))).into_response()
            }
        }
    }
}
