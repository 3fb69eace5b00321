use super::{BackendResult, DeviceManager};
use async_trait::async_trait;
use omm_client::{DectUser, Device, NewDectUser, OmmClient, SubscriptionMode, UserField};
use secrecy::SecretString;

/// [`DeviceManager`] backed by an AXI session.
pub struct OmmDeviceManager {
    client: OmmClient,
    username: String,
    password: SecretString,
}

impl OmmDeviceManager {
    pub fn new(client: OmmClient, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            client,
            username: username.into(),
            password,
        }
    }
}

#[async_trait]
impl DeviceManager for OmmDeviceManager {
    async fn login(&self) -> BackendResult<()> {
        Ok(self.client.login(&self.username, &self.password, true).await?)
    }

    async fn logout(&self) -> BackendResult<()> {
        Ok(self.client.logout().await?)
    }

    async fn list_users(&self, ownership_tag: &str) -> BackendResult<Vec<DectUser>> {
        Ok(self.client.list_users(Some(ownership_tag)).await?)
    }

    async fn find_user(&self, field: UserField, value: &str) -> BackendResult<Option<DectUser>> {
        Ok(self.client.find_user(field, value).await?)
    }

    async fn create_user(&self, user: &NewDectUser) -> BackendResult<DectUser> {
        Ok(self.client.create_user(user).await?)
    }

    async fn update_user(&self, user: &DectUser) -> BackendResult<()> {
        Ok(self.client.update_user(user).await?)
    }

    async fn delete_user(&self, uid: u32) -> BackendResult<()> {
        Ok(self.client.delete_user(uid).await?)
    }

    async fn list_devices(&self) -> BackendResult<Vec<Device>> {
        Ok(self.client.list_devices().await?)
    }

    async fn attach_device(&self, uid: u32, ppn: u32) -> BackendResult<()> {
        Ok(self.client.attach_device(uid, ppn).await?)
    }

    async fn detach_device(&self, uid: u32, ppn: u32) -> BackendResult<()> {
        Ok(self.client.detach_device(uid, ppn).await?)
    }

    async fn set_subscription(&self, mode: SubscriptionMode) -> BackendResult<()> {
        Ok(self.client.set_subscription(mode).await?)
    }
}
