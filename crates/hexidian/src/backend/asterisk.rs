use super::{BackendResult, CallRouter};
use asterisk_db::{AsteriskDb, CallGroup, SipAccount};
use async_trait::async_trait;

#[async_trait]
impl CallRouter for AsteriskDb {
    async fn sip_exists(&self, number: &str) -> BackendResult<bool> {
        Ok(AsteriskDb::sip_exists(self, number).await?)
    }

    async fn create_sip(&self, account: &SipAccount) -> BackendResult<()> {
        Ok(AsteriskDb::create_sip(self, account).await?)
    }

    async fn delete_sip(&self, number: &str) -> BackendResult<()> {
        Ok(AsteriskDb::delete_sip(self, number).await?)
    }

    async fn rename_sip(&self, old: &str, new: &str) -> BackendResult<()> {
        Ok(AsteriskDb::rename_sip(self, old, new).await?)
    }

    async fn update_sip_password(&self, number: &str, password: &str) -> BackendResult<()> {
        Ok(AsteriskDb::update_sip_password(self, number, password).await?)
    }

    async fn callgroup(&self, number: &str) -> BackendResult<Option<CallGroup>> {
        Ok(AsteriskDb::callgroup(self, number).await?)
    }

    async fn create_callgroup(&self, group: &CallGroup) -> BackendResult<()> {
        Ok(AsteriskDb::create_callgroup(self, group).await?)
    }

    async fn update_callgroup_name(&self, number: &str, name: &str) -> BackendResult<()> {
        Ok(AsteriskDb::update_callgroup_name(self, number, name).await?)
    }

    async fn delete_callgroup(&self, number: &str) -> BackendResult<()> {
        Ok(AsteriskDb::delete_callgroup(self, number).await?)
    }

    async fn rename_callgroup(&self, old: &str, new: &str) -> BackendResult<()> {
        Ok(AsteriskDb::rename_callgroup(self, old, new).await?)
    }

    async fn add_callgroup_member(&self, group: &str, extension: &str) -> BackendResult<()> {
        Ok(AsteriskDb::add_callgroup_member(self, group, extension).await?)
    }

    async fn remove_callgroup_member(&self, group: &str, extension: &str) -> BackendResult<()> {
        Ok(AsteriskDb::remove_callgroup_member(self, group, extension).await?)
    }
}
