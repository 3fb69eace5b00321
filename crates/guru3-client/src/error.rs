//! Guru3 client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Guru3Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid API key header: {0}")]
    InvalidApiKey(String),

    #[error("Unknown push action: {0:?}")]
    UnknownAction(String),

    #[error("Push channel closed by server")]
    PushClosed,
}

impl Guru3Error {
    /// Whether the server broke the message contract, as opposed to being unreachable.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Guru3Error::Json(_) | Guru3Error::UnknownAction(_))
    }
}
