//! In-memory view of the DECT users this daemon manages.

use omm_client::DectUser;
use std::collections::HashMap;

/// DECT users keyed by extension number.
///
/// Populated once from the OMM at startup and kept current by the reconciler after every
/// successful device-manager mutation.
#[derive(Debug, Default, Clone)]
pub struct BackendIndex {
    users: HashMap<String, DectUser>,
}

impl BackendIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(users: impl IntoIterator<Item = DectUser>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.num.clone(), u)).collect(),
        }
    }

    pub fn get(&self, number: &str) -> Option<&DectUser> {
        self.users.get(number)
    }

    pub fn contains(&self, number: &str) -> bool {
        self.users.contains_key(number)
    }

    pub fn insert(&mut self, user: DectUser) {
        self.users.insert(user.num.clone(), user);
    }

    pub fn remove(&mut self, number: &str) -> Option<DectUser> {
        self.users.remove(number)
    }

    /// Re-key a user under `new`, updating its number and SIP auth id. Returns the moved user.
    pub fn rename(&mut self, old: &str, new: &str) -> Option<&DectUser> {
        let mut user = self.users.remove(old)?;
        user.num = new.to_string();
        user.sip_auth_id = new.to_string();
        self.users.insert(new.to_string(), user);
        self.users.get(new)
    }

    /// Record the handset bound to `number`.
    pub fn set_device(&mut self, number: &str, ppn: u32) {
        if let Some(user) = self.users.get_mut(number) {
            user.ppn = ppn;
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
