use super::{Reconciler, TEMP_USER_NAME};
use crate::backend::BackendError;
use crate::error::ReconcileError;
use crate::generate;
use asterisk_db::SipAccount;
use omm_client::NewDectUser;
use tracing::{debug, info};

impl Reconciler {
    /// Give every unbound handset a temporary account.
    ///
    /// The first failure aborts the scan; remaining handsets are picked up next cycle.
    /// Handsets detached by an unfinished transfer are left alone.
    pub async fn provision_unbound(&mut self) -> Result<usize, ReconcileError> {
        let devices = self.devices.list_devices().await?;
        let unbound: Vec<u32> = devices
            .iter()
            .filter(|d| d.is_unbound())
            .map(|d| d.ppn)
            .filter(|ppn| !self.interrupted_transfers.values().any(|p| p == ppn))
            .collect();
        debug!(devices = devices.len(), unbound = unbound.len(), "Scanned handsets");

        for ppn in &unbound {
            self.provision_device(*ppn).await?;
        }
        Ok(unbound.len())
    }

    async fn provision_device(&mut self, ppn: u32) -> Result<(), BackendError> {
        let number = self.allocate_temp_number().await?;
        let password = generate::password(self.settings.password_length);

        let mut user = self
            .devices
            .create_user(&NewDectUser {
                num: number.clone(),
                name: TEMP_USER_NAME.to_string(),
                ownership_tag: self.settings.ownership_tag.clone(),
                token: None,
                sip_auth_id: number.clone(),
                sip_password: password.clone(),
            })
            .await?;
        self.devices.attach_device(user.uid, ppn).await?;
        user.ppn = ppn;
        self.index.insert(user);

        self.router
            .create_sip(&SipAccount::temporary(&number, password))
            .await?;

        info!(ppn, number = %number, "Provisioned temporary account for handset");
        Ok(())
    }

    /// Roll temporary numbers until one is free in both backends.
    async fn allocate_temp_number(&self) -> Result<String, BackendError> {
        loop {
            let candidate =
                generate::temp_number(&self.settings.temp_prefix, self.settings.temp_digits);
            if self.index.contains(&candidate) || self.router.sip_exists(&candidate).await? {
                debug!(candidate = %candidate, "Temporary number taken, rolling again");
                continue;
            }
            return Ok(candidate);
        }
    }
}
