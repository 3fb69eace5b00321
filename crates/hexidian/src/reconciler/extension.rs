use super::Reconciler;
use crate::backend::BackendError;
use crate::events::{sanitize_name, ExtensionKind, ExtensionUpdate};
use crate::generate;
use asterisk_db::{CallGroup, SipAccount};
use omm_client::{NewDectUser, UNBOUND_PPN};
use tracing::{debug, info};

impl Reconciler {
    pub(super) async fn update_extension(&mut self, update: ExtensionUpdate) -> Result<(), BackendError> {
        let number = update.number.as_str();

        match &update.kind {
            ExtensionKind::Sip => {
                self.remove_dect_user(number).await?;
                self.remove_callgroup(number).await?;
                let password = update.password.as_deref().unwrap_or_default();
                if self.router.sip_exists(number).await? {
                    self.router.update_sip_password(number, password).await?;
                } else {
                    self.router
                        .create_sip(&SipAccount::new(number, password))
                        .await?;
                }
            }
            ExtensionKind::Dect => {
                self.remove_callgroup(number).await?;
                self.upsert_dect(&update).await?;
            }
            ExtensionKind::Group => {
                self.remove_dect_user(number).await?;
                self.remove_sip(number).await?;
                match self.router.callgroup(number).await? {
                    Some(group) if group.name == update.name => {}
                    Some(_) => self.router.update_callgroup_name(number, &update.name).await?,
                    None => {
                        self.router
                            .create_callgroup(&CallGroup::new(number, &update.name))
                            .await?
                    }
                }
            }
            ExtensionKind::Other(kind) => {
                debug!(number, kind = %kind, "Extension is not provisioned in any backend");
                self.remove_dect_user(number).await?;
                self.remove_sip(number).await?;
                self.remove_callgroup(number).await?;
            }
        }
        Ok(())
    }

    async fn upsert_dect(&mut self, update: &ExtensionUpdate) -> Result<(), BackendError> {
        let number = update.number.as_str();
        let name = sanitize_name(&update.name);
        let token = update.token.clone().unwrap_or_default();

        if let Some(existing) = self.index.get(number) {
            if existing.name == name && existing.token == token {
                return Ok(());
            }
            let mut user = existing.clone();
            user.name = name;
            user.token = token;
            self.devices.update_user(&user).await?;
            self.index.insert(user);
            info!(number, "Updated DECT user");
            return Ok(());
        }

        self.remove_sip(number).await?;
        let password = generate::password(self.settings.password_length);
        self.router
            .create_sip(&SipAccount::new(number, &password))
            .await?;
        let user = self
            .devices
            .create_user(&NewDectUser {
                num: number.to_string(),
                name,
                ownership_tag: self.settings.ownership_tag.clone(),
                token: Some(token),
                sip_auth_id: number.to_string(),
                sip_password: password,
            })
            .await?;
        info!(number, uid = user.uid, "Created DECT user");
        self.index.insert(user);
        Ok(())
    }

    pub(super) async fn delete_extension(&mut self, number: &str) -> Result<(), BackendError> {
        self.remove_sip(number).await?;
        self.remove_dect_user(number).await?;
        self.remove_callgroup(number).await?;
        Ok(())
    }

    pub(super) async fn rename_extension(&mut self, old: &str, new: &str) -> Result<(), BackendError> {
        if old == new {
            return Ok(());
        }

        if self.router.sip_exists(old).await? {
            self.router.rename_sip(old, new).await?;
        }

        if let Some(user) = self.index.get(old) {
            let mut moved = user.clone();
            moved.num = new.to_string();
            moved.sip_auth_id = new.to_string();
            self.devices.update_user(&moved).await?;
            self.index.rename(old, new);
        }

        if self.router.callgroup(old).await?.is_some() {
            self.router.rename_callgroup(old, new).await?;
        }

        info!(old, new, "Renamed extension");
        Ok(())
    }

    pub(super) async fn unsubscribe_device(&mut self, number: &str) -> Result<(), BackendError> {
        let Some(user) = self.index.get(number).filter(|u| u.is_bound()) else {
            debug!(number, "No handset bound, nothing to unsubscribe");
            return Ok(());
        };

        let (uid, ppn) = (user.uid, user.ppn);
        self.devices.detach_device(uid, ppn).await?;
        self.index.set_device(number, UNBOUND_PPN);
        info!(number, ppn, "Detached handset");
        Ok(())
    }

    pub(super) async fn remove_dect_user(&mut self, number: &str) -> Result<(), BackendError> {
        if let Some(user) = self.index.get(number) {
            self.devices.delete_user(user.uid).await?;
            self.index.remove(number);
            info!(number, "Deleted DECT user");
        }
        Ok(())
    }

    pub(super) async fn remove_sip(&self, number: &str) -> Result<(), BackendError> {
        if self.router.sip_exists(number).await? {
            self.router.delete_sip(number).await?;
        }
        Ok(())
    }

    async fn remove_callgroup(&self, number: &str) -> Result<(), BackendError> {
        if self.router.callgroup(number).await?.is_some() {
            self.router.delete_callgroup(number).await?;
        }
        Ok(())
    }
}
