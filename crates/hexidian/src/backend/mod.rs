//! Backend seams consumed by the reconciler.
//!
//! The reconciler only ever talks to these traits, so tests can swap the SQL database and
//! the OMM for in-memory fakes.

mod asterisk;
mod omm;

pub use omm::OmmDeviceManager;

use asterisk_db::{AsteriskError, CallGroup, SipAccount};
use async_trait::async_trait;
use omm_client::{DectUser, Device, NewDectUser, OmmError, SubscriptionMode, UserField};
use thiserror::Error;

/// Failure of a backend operation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("OMM error: {0}")]
    Omm(#[from] OmmError),

    #[error("Asterisk database error: {0}")]
    Asterisk(#[from] AsteriskError),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Call-routing store: SIP accounts and call groups.
#[async_trait]
pub trait CallRouter: Send + Sync {
    async fn sip_exists(&self, number: &str) -> BackendResult<bool>;

    async fn create_sip(&self, account: &SipAccount) -> BackendResult<()>;

    async fn delete_sip(&self, number: &str) -> BackendResult<()>;

    /// Move every row of a SIP identity, group memberships included.
    async fn rename_sip(&self, old: &str, new: &str) -> BackendResult<()>;

    async fn update_sip_password(&self, number: &str, password: &str) -> BackendResult<()>;

    async fn callgroup(&self, number: &str) -> BackendResult<Option<CallGroup>>;

    async fn create_callgroup(&self, group: &CallGroup) -> BackendResult<()>;

    async fn update_callgroup_name(&self, number: &str, name: &str) -> BackendResult<()>;

    async fn delete_callgroup(&self, number: &str) -> BackendResult<()>;

    async fn rename_callgroup(&self, old: &str, new: &str) -> BackendResult<()>;

    async fn add_callgroup_member(&self, group: &str, extension: &str) -> BackendResult<()>;

    async fn remove_callgroup_member(&self, group: &str, extension: &str) -> BackendResult<()>;
}

/// Handset device manager: DECT users and the devices bound to them.
#[async_trait]
pub trait DeviceManager: Send + Sync {
    async fn login(&self) -> BackendResult<()>;

    async fn logout(&self) -> BackendResult<()>;

    /// All users carrying `ownership_tag`.
    async fn list_users(&self, ownership_tag: &str) -> BackendResult<Vec<DectUser>>;

    async fn find_user(&self, field: UserField, value: &str) -> BackendResult<Option<DectUser>>;

    async fn create_user(&self, user: &NewDectUser) -> BackendResult<DectUser>;

    async fn update_user(&self, user: &DectUser) -> BackendResult<()>;

    async fn delete_user(&self, uid: u32) -> BackendResult<()>;

    async fn list_devices(&self) -> BackendResult<Vec<Device>>;

    async fn attach_device(&self, uid: u32, ppn: u32) -> BackendResult<()>;

    async fn detach_device(&self, uid: u32, ppn: u32) -> BackendResult<()>;

    async fn set_subscription(&self, mode: SubscriptionMode) -> BackendResult<()>;
}
