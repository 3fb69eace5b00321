//! Typed change events.
//!
//! Guru3 delivers events as `{id, type, data, timestamp}`. The `type` string selects the
//! payload shape; anything not listed here is rejected.

use crate::error::ReconcileError;
use guru3_client::ChangeEvent;
use serde::de::{DeserializeOwned, Error as _};
use serde::Deserialize;

pub const UPDATE_EXTENSION: &str = "UPDATE_EXTENSION";
pub const DELETE_EXTENSION: &str = "DELETE_EXTENSION";
pub const RENAME_EXTENSION: &str = "RENAME_EXTENSION";
pub const UNSUBSCRIBE_DEVICE: &str = "UNSUBSCRIBE_DEVICE";
pub const UPDATE_CALLGROUP: &str = "UPDATE_CALLGROUP";

/// A parsed change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    UpdateExtension(ExtensionUpdate),
    DeleteExtension { number: String },
    RenameExtension { old: String, new: String },
    UnsubscribeDevice { number: String },
    UpdateCallGroup(CallGroupUpdate),
}

/// Kind of an extension as seen by Guru3.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ExtensionKind {
    Sip,
    Dect,
    Group,
    /// Any kind neither backend provisions (announcements, special numbers...).
    Other(String),
}

impl From<String> for ExtensionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SIP" => ExtensionKind::Sip,
            "DECT" => ExtensionKind::Dect,
            "GROUP" => ExtensionKind::Group,
            _ => ExtensionKind::Other(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtensionUpdate {
    pub number: String,
    #[serde(rename = "type")]
    pub kind: ExtensionKind,
    #[serde(default)]
    pub name: String,
    /// SIP password; required for SIP extensions.
    #[serde(default)]
    pub password: Option<String>,
    /// Provisioning token of a DECT extension.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallGroupUpdate {
    pub number: String,
    pub extensions: Vec<CallGroupMember>,
}

impl CallGroupUpdate {
    /// Extensions that should be members. Duplicates collapse.
    pub fn desired_members(&self) -> std::collections::BTreeSet<String> {
        self.extensions
            .iter()
            .filter(|m| m.active)
            .map(|m| m.extension.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallGroupMember {
    pub extension: String,
    pub active: bool,
}

#[derive(Deserialize)]
struct NumberPayload {
    number: String,
}

#[derive(Deserialize)]
struct RenamePayload {
    old_extension: String,
    new_extension: String,
}

impl Event {
    /// Parse the payload of `event` according to its type.
    pub fn from_change(event: &ChangeEvent) -> Result<Self, ReconcileError> {
        match event.kind.as_str() {
            UPDATE_EXTENSION => {
                let update: ExtensionUpdate = payload(event)?;
                if update.kind == ExtensionKind::Sip && update.password.is_none() {
                    return Err(ReconcileError::Payload {
                        id: event.id,
                        kind: event.kind.clone(),
                        source: serde_json::Error::missing_field("password"),
                    });
                }
                Ok(Event::UpdateExtension(update))
            }
            DELETE_EXTENSION => {
                let NumberPayload { number } = payload(event)?;
                Ok(Event::DeleteExtension { number })
            }
            RENAME_EXTENSION => {
                let rename: RenamePayload = payload(event)?;
                Ok(Event::RenameExtension {
                    old: rename.old_extension,
                    new: rename.new_extension,
                })
            }
            UNSUBSCRIBE_DEVICE => {
                let NumberPayload { number } = payload(event)?;
                Ok(Event::UnsubscribeDevice { number })
            }
            UPDATE_CALLGROUP => Ok(Event::UpdateCallGroup(payload(event)?)),
            other => Err(ReconcileError::UnknownEvent {
                id: event.id,
                kind: other.to_string(),
            }),
        }
    }
}

fn payload<T: DeserializeOwned>(event: &ChangeEvent) -> Result<T, ReconcileError> {
    T::deserialize(&event.data).map_err(|source| ReconcileError::Payload {
        id: event.id,
        kind: event.kind.clone(),
        source,
    })
}

/// Reduce a display name to what the OMM accepts.
pub fn sanitize_name(name: &str) -> String {
    const MAX_CHARS: usize = 19;
    const ALLOWED_PUNCTUATION: &str = "-_.,()+&'/";

    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || ALLOWED_PUNCTUATION.contains(*c))
        .collect();
    kept.trim().chars().take(MAX_CHARS).collect::<String>().trim_end().to_string()
}
