//! In-memory backends and helpers shared by the integration tests.

#![allow(dead_code)]

use asterisk_db::{CallGroup, SipAccount};
use async_trait::async_trait;
use chrono::Utc;
use guru3_client::ChangeEvent;
use hexidian::backend::{BackendError, BackendResult, CallRouter, DeviceManager};
use hexidian::reconciler::{Acknowledge, Reconciler, ReconcilerSettings};
use omm_client::{
    DectUser, Device, DeviceRelation, NewDectUser, SubscriptionMode, UserField, UNBOUND_PPN,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const TAG: &str = "GURU_MGR";

/// Operation log plus one-shot failure injection.
#[derive(Default)]
struct Ops {
    log: Mutex<Vec<String>>,
    fail: Mutex<Option<String>>,
}

impl Ops {
    fn record(&self, op: &str, arg: impl std::fmt::Display) -> BackendResult<()> {
        let mut fail = self.fail.lock().unwrap();
        if fail.as_deref() == Some(op) {
            *fail = None;
            return Err(BackendError::Unavailable(format!("injected failure in {}", op)));
        }
        self.log.lock().unwrap().push(format!("{} {}", op, arg));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Call router
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCallRouter {
    sips: Mutex<BTreeMap<String, SipAccount>>,
    groups: Mutex<BTreeMap<String, CallGroup>>,
    ops: Ops,
}

impl FakeCallRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_sip(&self, account: SipAccount) {
        self.sips.lock().unwrap().insert(account.number.clone(), account);
    }

    pub fn insert_group(&self, number: &str, name: &str, members: &[&str]) {
        let mut group = CallGroup::new(number, name);
        group.members = members.iter().map(|m| m.to_string()).collect();
        self.groups.lock().unwrap().insert(number.to_string(), group);
    }

    pub fn sip(&self, number: &str) -> Option<SipAccount> {
        self.sips.lock().unwrap().get(number).cloned()
    }

    pub fn group(&self, number: &str) -> Option<CallGroup> {
        self.groups.lock().unwrap().get(number).cloned()
    }

    pub fn sip_numbers(&self) -> Vec<String> {
        self.sips.lock().unwrap().keys().cloned().collect()
    }

    /// Mutations performed so far, e.g. `"create_sip 2000"`.
    pub fn ops(&self) -> Vec<String> {
        self.ops.log.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.log.lock().unwrap().clear();
    }

    /// Make the next call of `op` fail.
    pub fn fail_next(&self, op: &str) {
        *self.ops.fail.lock().unwrap() = Some(op.to_string());
    }
}

#[async_trait]
impl CallRouter for FakeCallRouter {
    async fn sip_exists(&self, number: &str) -> BackendResult<bool> {
        Ok(self.sips.lock().unwrap().contains_key(number))
    }

    async fn create_sip(&self, account: &SipAccount) -> BackendResult<()> {
        self.ops.record("create_sip", &account.number)?;
        self.insert_sip(account.clone());
        Ok(())
    }

    async fn delete_sip(&self, number: &str) -> BackendResult<()> {
        self.ops.record("delete_sip", number)?;
        self.sips.lock().unwrap().remove(number);
        Ok(())
    }

    async fn rename_sip(&self, old: &str, new: &str) -> BackendResult<()> {
        self.ops.record("rename_sip", format!("{}->{}", old, new))?;
        let mut sips = self.sips.lock().unwrap();
        if let Some(mut account) = sips.remove(old) {
            account.number = new.to_string();
            sips.insert(new.to_string(), account);
        }
        rename_member(&mut self.groups.lock().unwrap(), old, new);
        Ok(())
    }

    async fn update_sip_password(&self, number: &str, password: &str) -> BackendResult<()> {
        self.ops.record("update_sip_password", number)?;
        if let Some(account) = self.sips.lock().unwrap().get_mut(number) {
            account.password = password.to_string();
        }
        Ok(())
    }

    async fn callgroup(&self, number: &str) -> BackendResult<Option<CallGroup>> {
        Ok(self.group(number))
    }

    async fn create_callgroup(&self, group: &CallGroup) -> BackendResult<()> {
        self.ops.record("create_callgroup", &group.number)?;
        self.groups
            .lock()
            .unwrap()
            .insert(group.number.clone(), group.clone());
        Ok(())
    }

    async fn update_callgroup_name(&self, number: &str, name: &str) -> BackendResult<()> {
        self.ops.record("update_callgroup_name", number)?;
        if let Some(group) = self.groups.lock().unwrap().get_mut(number) {
            group.name = name.to_string();
        }
        Ok(())
    }

    async fn delete_callgroup(&self, number: &str) -> BackendResult<()> {
        self.ops.record("delete_callgroup", number)?;
        self.groups.lock().unwrap().remove(number);
        Ok(())
    }

    async fn rename_callgroup(&self, old: &str, new: &str) -> BackendResult<()> {
        self.ops.record("rename_callgroup", format!("{}->{}", old, new))?;
        let mut groups = self.groups.lock().unwrap();
        if let Some(mut group) = groups.remove(old) {
            group.number = new.to_string();
            groups.insert(new.to_string(), group);
        }
        rename_member(&mut groups, old, new);
        Ok(())
    }

    async fn add_callgroup_member(&self, group: &str, extension: &str) -> BackendResult<()> {
        self.ops.record("add_callgroup_member", format!("{}+{}", group, extension))?;
        if let Some(group) = self.groups.lock().unwrap().get_mut(group) {
            group.members.insert(extension.to_string());
        }
        Ok(())
    }

    async fn remove_callgroup_member(&self, group: &str, extension: &str) -> BackendResult<()> {
        self.ops.record("remove_callgroup_member", format!("{}-{}", group, extension))?;
        if let Some(group) = self.groups.lock().unwrap().get_mut(group) {
            group.members.remove(extension);
        }
        Ok(())
    }
}

fn rename_member(groups: &mut BTreeMap<String, CallGroup>, old: &str, new: &str) {
    for group in groups.values_mut() {
        if group.members.remove(old) {
            group.members.insert(new.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Device manager
// ---------------------------------------------------------------------------

#[derive(Default)]
struct OmmState {
    users: BTreeMap<u32, DectUser>,
    devices: BTreeMap<u32, Device>,
    passwords: BTreeMap<u32, String>,
    next_uid: u32,
}

#[derive(Default)]
pub struct FakeDeviceManager {
    state: Mutex<OmmState>,
    ops: Ops,
}

impl FakeDeviceManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add an unbound handset.
    pub fn add_device(&self, ppn: u32) {
        self.state.lock().unwrap().devices.insert(
            ppn,
            Device {
                ppn,
                relation: DeviceRelation::Unbound,
                uid: None,
            },
        );
    }

    /// Add a user, bound to `ppn` unless it is [`UNBOUND_PPN`]. Returns its uid.
    pub fn add_user(&self, num: &str, name: &str, tag: &str, token: &str, ppn: u32) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.next_uid += 1;
        let uid = state.next_uid;
        state.users.insert(
            uid,
            DectUser {
                uid,
                num: num.into(),
                name: name.into(),
                ownership_tag: tag.into(),
                token: token.into(),
                ppn,
                sip_auth_id: num.into(),
            },
        );
        if ppn != UNBOUND_PPN {
            state.devices.insert(
                ppn,
                Device {
                    ppn,
                    relation: DeviceRelation::Fixed,
                    uid: Some(uid),
                },
            );
        }
        uid
    }

    pub fn user_by_num(&self, num: &str) -> Option<DectUser> {
        self.state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.num == num)
            .cloned()
    }

    pub fn user_by_uid(&self, uid: u32) -> Option<DectUser> {
        self.state.lock().unwrap().users.get(&uid).cloned()
    }

    pub fn device(&self, ppn: u32) -> Option<Device> {
        self.state.lock().unwrap().devices.get(&ppn).cloned()
    }

    pub fn sip_password(&self, uid: u32) -> Option<String> {
        self.state.lock().unwrap().passwords.get(&uid).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.log.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.log.lock().unwrap().clear();
    }

    pub fn fail_next(&self, op: &str) {
        *self.ops.fail.lock().unwrap() = Some(op.to_string());
    }
}

#[async_trait]
impl DeviceManager for FakeDeviceManager {
    async fn login(&self) -> BackendResult<()> {
        self.ops.record("login", "")
    }

    async fn logout(&self) -> BackendResult<()> {
        self.ops.record("logout", "")
    }

    async fn list_users(&self, ownership_tag: &str) -> BackendResult<Vec<DectUser>> {
        self.ops.record("list_users", ownership_tag)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .filter(|u| u.ownership_tag == ownership_tag)
            .cloned()
            .collect())
    }

    async fn find_user(&self, field: UserField, value: &str) -> BackendResult<Option<DectUser>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| field.matches(u, value))
            .cloned())
    }

    async fn create_user(&self, user: &NewDectUser) -> BackendResult<DectUser> {
        self.ops.record("create_user", &user.num)?;
        let mut state = self.state.lock().unwrap();
        state.next_uid += 1;
        let uid = state.next_uid;
        let created = DectUser {
            uid,
            num: user.num.clone(),
            name: user.name.clone(),
            ownership_tag: user.ownership_tag.clone(),
            token: user.token.clone().unwrap_or_default(),
            ppn: UNBOUND_PPN,
            sip_auth_id: user.sip_auth_id.clone(),
        };
        state.users.insert(uid, created.clone());
        state.passwords.insert(uid, user.sip_password.clone());
        Ok(created)
    }

    async fn update_user(&self, user: &DectUser) -> BackendResult<()> {
        self.ops.record("update_user", &user.num)?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.users.get_mut(&user.uid) {
            let ppn = existing.ppn;
            *existing = user.clone();
            existing.ppn = ppn;
        }
        Ok(())
    }

    async fn delete_user(&self, uid: u32) -> BackendResult<()> {
        self.ops.record("delete_user", uid)?;
        let mut state = self.state.lock().unwrap();
        state.users.remove(&uid);
        for device in state.devices.values_mut().filter(|d| d.uid == Some(uid)) {
            device.relation = DeviceRelation::Unbound;
            device.uid = None;
        }
        Ok(())
    }

    async fn list_devices(&self) -> BackendResult<Vec<Device>> {
        self.ops.record("list_devices", "")?;
        Ok(self.state.lock().unwrap().devices.values().cloned().collect())
    }

    async fn attach_device(&self, uid: u32, ppn: u32) -> BackendResult<()> {
        self.ops.record("attach_device", format!("{}@{}", ppn, uid))?;
        let mut state = self.state.lock().unwrap();
        state.devices.insert(
            ppn,
            Device {
                ppn,
                relation: DeviceRelation::Fixed,
                uid: Some(uid),
            },
        );
        if let Some(user) = state.users.get_mut(&uid) {
            user.ppn = ppn;
        }
        Ok(())
    }

    async fn detach_device(&self, uid: u32, ppn: u32) -> BackendResult<()> {
        self.ops.record("detach_device", format!("{}@{}", ppn, uid))?;
        let mut state = self.state.lock().unwrap();
        if let Some(device) = state.devices.get_mut(&ppn) {
            device.relation = DeviceRelation::Unbound;
            device.uid = None;
        }
        if let Some(user) = state.users.get_mut(&uid) {
            user.ppn = UNBOUND_PPN;
        }
        Ok(())
    }

    async fn set_subscription(&self, mode: SubscriptionMode) -> BackendResult<()> {
        self.ops.record("set_subscription", mode)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Records acknowledged ids; ids in `reject` are refused.
#[derive(Default)]
pub struct RecordingAcks {
    pub acked: Mutex<Vec<u64>>,
    pub reject: Mutex<Vec<u64>>,
}

#[async_trait]
impl Acknowledge for RecordingAcks {
    async fn acknowledge(&self, id: u64) -> bool {
        if self.reject.lock().unwrap().contains(&id) {
            return false;
        }
        self.acked.lock().unwrap().push(id);
        true
    }
}

pub fn settings() -> ReconcilerSettings {
    ReconcilerSettings::default()
}

pub fn reconciler(router: &Arc<FakeCallRouter>, devices: &Arc<FakeDeviceManager>) -> Reconciler {
    reconciler_with(router, devices, settings())
}

pub fn reconciler_with(
    router: &Arc<FakeCallRouter>,
    devices: &Arc<FakeDeviceManager>,
    settings: ReconcilerSettings,
) -> Reconciler {
    Reconciler::new(router.clone(), devices.clone(), settings)
}

/// Fakes plus a started reconciler.
pub async fn started() -> (Arc<FakeCallRouter>, Arc<FakeDeviceManager>, Reconciler) {
    let router = FakeCallRouter::new();
    let devices = FakeDeviceManager::new();
    let mut reconciler = reconciler(&router, &devices);
    reconciler.start().await.unwrap();
    (router, devices, reconciler)
}

pub fn event(id: u64, kind: &str, data: serde_json::Value) -> ChangeEvent {
    ChangeEvent {
        id,
        kind: kind.to_string(),
        data,
        timestamp: Utc::now(),
    }
}
