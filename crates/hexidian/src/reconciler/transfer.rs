use super::Reconciler;
use crate::error::TransferError;
use omm_client::{UserField, UNBOUND_PPN};
use tracing::info;

/// A handset that dialled in with the token of its permanent account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Caller id: the temporary number the handset currently uses.
    pub temp_number: String,
    /// Provisioning token of the permanent account, service prefix already removed.
    pub token: String,
}

impl Reconciler {
    /// Move the handset of a temporary account to the account owning `token`, then delete
    /// the temporary account in both backends.
    ///
    /// Nothing is mutated until both accounts are found. Each step is existence-checked, so
    /// repeating a request that failed midway finishes the job.
    pub async fn transfer(&mut self, request: &TransferRequest) -> Result<(), TransferError> {
        let temp_number = request.temp_number.as_str();
        if !temp_number.starts_with(&self.settings.temp_prefix) {
            return Err(TransferError::NotTemporary(temp_number.to_string()));
        }
        if request.token.is_empty() {
            return Err(TransferError::TokenNotFound(String::new()));
        }

        let temp = self.devices.find_user(UserField::Number, temp_number).await?;
        let interrupted = self.interrupted_transfers.get(temp_number).copied();
        let ppn = match (&temp, interrupted) {
            (Some(user), _) if user.is_bound() => user.ppn,
            (_, Some(ppn)) => ppn,
            (Some(_), None) => return Err(TransferError::NotBound(temp_number.to_string())),
            (None, None) => return Err(TransferError::TempAccountNotFound(temp_number.to_string())),
        };

        let target = self
            .devices
            .find_user(UserField::Token, &request.token)
            .await?
            .ok_or_else(|| TransferError::TokenNotFound(request.token.clone()))?;

        self.interrupted_transfers.insert(temp_number.to_string(), ppn);

        if let Some(user) = temp.as_ref().filter(|u| u.is_bound()) {
            self.devices.detach_device(user.uid, ppn).await?;
            self.index.set_device(temp_number, UNBOUND_PPN);
        }
        if target.ppn != ppn {
            self.devices.attach_device(target.uid, ppn).await?;
            self.index.set_device(&target.num, ppn);
        }
        if let Some(user) = &temp {
            self.devices.delete_user(user.uid).await?;
            self.index.remove(temp_number);
        }
        self.remove_sip(temp_number).await?;

        self.interrupted_transfers.remove(temp_number);
        info!(ppn, from = %temp_number, to = %target.num, "Transferred handset");
        Ok(())
    }
}
