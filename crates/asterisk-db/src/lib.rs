//! Asterisk realtime database access.
//!
//! SIP identities are the PJSIP realtime rows (`ps_aors`, `ps_auths`, `ps_endpoints`);
//! call groups use the `callgroups` and `callgroup_members` tables created by the embedded
//! migration.

mod db;
mod error;
mod types;

pub use db::{AsteriskDb, DbConfig};
pub use error::{AsteriskError, AsteriskResult};
pub use types::*;
