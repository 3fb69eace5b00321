//! Unbound handset discovery and temporary number allocation.

mod common;

use asterisk_db::{SipAccount, CONTEXT_TEMPORARY};
use common::*;
use hexidian::discovery::{keep_subscription, DiscoveryLoop};
use hexidian::reconciler::{Job, TEMP_USER_NAME};
use omm_client::UNBOUND_PPN;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_provisions_each_unbound_handset() {
    let router = FakeCallRouter::new();
    let devices = FakeDeviceManager::new();
    devices.add_device(11);
    devices.add_device(12);
    devices.add_user("2000", "Alice", TAG, "ABCD", 13);
    let mut reconciler = reconciler(&router, &devices);
    reconciler.start().await.unwrap();

    assert_eq!(reconciler.provision_unbound().await.unwrap(), 2);

    for ppn in [11, 12] {
        let device = devices.device(ppn).unwrap();
        assert!(!device.is_unbound());

        let uid = device.uid.unwrap();
        let user = devices.user_by_uid(uid).unwrap();
        assert_eq!(reconciler.index().get(&user.num), Some(&user));

        assert_eq!(user.name, TEMP_USER_NAME);
        assert_eq!(user.ownership_tag, TAG);
        assert_eq!(user.ppn, ppn);
        assert!(user.num.starts_with("010"));
        assert_eq!(user.num.len(), 7);

        let account = router.sip(&user.num).unwrap();
        assert!(account.temporary);
        assert_eq!(account.context(), CONTEXT_TEMPORARY);
        assert_eq!(devices.sip_password(uid), Some(account.password));
    }

    // Everything is bound now.
    assert_eq!(reconciler.provision_unbound().await.unwrap(), 0);
}

#[tokio::test]
async fn test_allocation_skips_occupied_numbers() {
    let router = FakeCallRouter::new();
    let devices = FakeDeviceManager::new();
    for digit in 0..9 {
        let number = format!("010{}", digit);
        if digit == 5 {
            devices.add_user(&number, "Bob", TAG, "", UNBOUND_PPN);
        } else {
            router.insert_sip(SipAccount::new(number, "pw"));
        }
    }
    devices.add_device(42);

    let mut settings = settings();
    settings.temp_digits = 1;
    let mut reconciler = reconciler_with(&router, &devices, settings);
    reconciler.start().await.unwrap();

    assert_eq!(reconciler.provision_unbound().await.unwrap(), 1);
    assert!(router.sip("0109").unwrap().temporary);
    assert_eq!(devices.user_by_num("0109").unwrap().ppn, 42);
}

#[tokio::test]
async fn test_failure_aborts_the_cycle() {
    let router = FakeCallRouter::new();
    let devices = FakeDeviceManager::new();
    devices.add_device(11);
    devices.add_device(12);
    let mut reconciler = reconciler(&router, &devices);
    reconciler.start().await.unwrap();
    devices.fail_next("attach_device");

    assert!(reconciler.provision_unbound().await.is_err());

    let creates = devices
        .ops()
        .iter()
        .filter(|op| op.starts_with("create_user"))
        .count();
    assert_eq!(creates, 1);
    assert!(router.sip_numbers().is_empty());

    // The next cycle picks both handsets up again.
    assert_eq!(reconciler.provision_unbound().await.unwrap(), 2);
}

#[tokio::test]
async fn test_discovery_loop_goes_through_reconciler() {
    let router = FakeCallRouter::new();
    let devices = FakeDeviceManager::new();
    devices.add_device(11);
    let reconciler = reconciler(&router, &devices);
    let cancel = CancellationToken::new();

    let (jobs, rx) = mpsc::channel(8);
    let (gate_tx, _gate_rx) = oneshot::channel();
    let handle = tokio::spawn(reconciler.run(
        rx,
        gate_tx,
        Arc::new(RecordingAcks::default()),
        cancel.clone(),
    ));

    let discovery = DiscoveryLoop::new(jobs, Duration::from_secs(60));
    assert_eq!(discovery.scan().await.unwrap().unwrap(), 1);
    assert_eq!(discovery.scan().await.unwrap().unwrap(), 0);

    cancel.cancel();
    handle.await.unwrap().unwrap();
    assert!(discovery.scan().await.is_none());
}

#[tokio::test]
async fn test_keep_subscription_submits_refresh_jobs() {
    let (jobs, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(keep_subscription(jobs, Duration::from_millis(10), cancel.clone()));

    for _ in 0..2 {
        let job = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(job, Job::RefreshSubscription));
    }

    cancel.cancel();
    drop(rx);
    handle.await.unwrap();
}
