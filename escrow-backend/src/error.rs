//! Error types for the escrow backend

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid public key: {0}")]
    InvalidPubkey(String),

    #[error("Offer not found: {0}")]
    OfferNotFound(String),

    #[error("Offer already exists: {0}")]
    OfferAlreadyExists(String),

    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl BackendError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            BackendError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            BackendError::InvalidPubkey(_) => (StatusCode::BAD_REQUEST, "INVALID_PUBKEY"),
            BackendError::OfferNotFound(_) => (StatusCode::NOT_FOUND, "OFFER_NOT_FOUND"),
            BackendError::OfferAlreadyExists(_) => (StatusCode::CONFLICT, "OFFER_ALREADY_EXISTS"),
            BackendError::Rpc(_) => (StatusCode::BAD_GATEWAY, "RPC_ERROR"),
            BackendError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for BackendError {
    fn from(err: anyhow::Error) -> Self {
        BackendError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Rpc(err.to_string())
    }
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
