//! Daemon error types.

use crate::backend::BackendError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure to apply a change event.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Unknown event type {kind:?} in event {id}")]
    UnknownEvent { id: u64, kind: String },

    #[error("Malformed {kind} payload in event {id}: {source}")]
    Payload {
        id: u64,
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ReconcileError {
    /// Errors that must stop the daemon rather than leave the event pending.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReconcileError::UnknownEvent { .. } | ReconcileError::Payload { .. }
        )
    }
}

/// Rejection or failure of a handset transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("No DECT user with temporary number {0}")]
    TempAccountNotFound(String),

    #[error("{0} is not a temporary number")]
    NotTemporary(String),

    #[error("No DECT user with token {0}")]
    TokenNotFound(String),

    #[error("No handset is bound to {0}")]
    NotBound(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl TransferError {
    /// Rejections that happen before any backend mutation.
    pub fn is_lookup_miss(&self) -> bool {
        !matches!(self, TransferError::Backend(_))
    }
}

/// Failures of the event ingestor.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Guru3 error: {0}")]
    Guru3(#[from] guru3_client::Guru3Error),

    #[error("Job queue closed")]
    QueueClosed,

    #[error("Startup aborted before the backend index was ready")]
    StartupAborted,
}

/// Errors answered by the registration endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request body is not JSON")]
    NotJson,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("Reconciler is not accepting jobs")]
    Unavailable,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotJson => StatusCode::BAD_REQUEST,
            ApiError::MissingField(_) => StatusCode::EXPECTATION_FAILED,
            ApiError::Transfer(e) if e.is_lookup_miss() => StatusCode::NOT_FOUND,
            ApiError::Transfer(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        };

        let body = match &self {
            ApiError::NotJson | ApiError::MissingField(_) => "NAK".to_string(),
            other => format!("NAK: {}", other),
        };

        (status, body).into_response()
    }
}
