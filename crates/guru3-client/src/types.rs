//! Guru3 API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A change event as delivered by the Guru3 message queue.
///
/// `kind` is kept as the raw type string; interpreting it is up to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

/// Message received on the status stream.
#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    pub action: String,
    #[serde(default)]
    pub queuelength: u64,
}

/// The only push action Guru3 emits on the status stream.
pub const MESSAGE_COUNT_ACTION: &str = "messagecount";
