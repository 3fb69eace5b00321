//! Call routing records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Dialplan context for regular endpoints.
pub const CONTEXT_PERMANENT: &str = "call-router";
/// Dialplan context for temporary endpoints; only the registration service is reachable.
pub const CONTEXT_TEMPORARY: &str = "call-router-temp";
/// Codecs offered by every endpoint.
pub const ENDPOINT_CODECS: &str = "!all,g722,alaw,ulaw,gsm";

/// A PJSIP endpoint with its AOR and auth rows, all keyed by the extension number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipAccount {
    pub number: String,
    pub password: String,
    pub temporary: bool,
}

impl SipAccount {
    pub fn new(number: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            password: password.into(),
            temporary: false,
        }
    }

    pub fn temporary(number: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            temporary: true,
            ..Self::new(number, password)
        }
    }

    pub fn context(&self) -> &'static str {
        if self.temporary {
            CONTEXT_TEMPORARY
        } else {
            CONTEXT_PERMANENT
        }
    }
}

/// A group of extensions that ring together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGroup {
    pub number: String,
    pub name: String,
    pub members: BTreeSet<String>,
}

impl CallGroup {
    pub fn new(number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            members: BTreeSet::new(),
        }
    }
}
