//! The reconciler: sole writer to both backends.
//!
//! Every backend mutation arrives as a [`Job`] on one queue and is applied to completion
//! before the next job is taken, so change events, handset provisioning and transfers
//! never interleave.

mod callgroup;
mod extension;
mod provision;
mod transfer;

use crate::backend::{BackendError, CallRouter, DeviceManager};
use crate::error::{ReconcileError, TransferError};
use crate::events::Event;
use crate::index::BackendIndex;
use async_trait::async_trait;
use guru3_client::ChangeEvent;
use omm_client::SubscriptionMode;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use transfer::TransferRequest;

/// Display name of a temporary handset account.
pub const TEMP_USER_NAME: &str = "Unbound Handset";

/// Work item for the reconciler.
#[derive(Debug)]
pub enum Job {
    /// Apply a change event and acknowledge it on success.
    Event(ChangeEvent),
    /// Provision temporary accounts for unbound handsets; replies with the count.
    Discover {
        reply: oneshot::Sender<Result<usize, ReconcileError>>,
    },
    /// Move a handset from its temporary account to a permanent one.
    Transfer {
        request: TransferRequest,
        reply: oneshot::Sender<Result<(), TransferError>>,
    },
    /// Re-arm the OMM subscription mode.
    RefreshSubscription,
}

/// Upstream confirmation of a processed event.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    /// Returns `true` once the event source has accepted the acknowledgement.
    async fn acknowledge(&self, id: u64) -> bool;
}

/// Result of handling one change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Type is on the ignore list; acknowledged without touching a backend.
    Ignored,
}

/// Tunables of the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// `hierarchy1` value marking managed DECT users.
    pub ownership_tag: String,
    /// Event types acknowledged without processing.
    pub ignored_types: HashSet<String>,
    /// Length of generated SIP passwords.
    pub password_length: usize,
    /// Leading digits of temporary handset numbers.
    pub temp_prefix: String,
    /// Random digits following the prefix.
    pub temp_digits: usize,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            ownership_tag: "GURU_MGR".into(),
            ignored_types: ["SYNC_STARTED", "SYNC_ENDED"].into_iter().map(String::from).collect(),
            password_length: 16,
            temp_prefix: "010".into(),
            temp_digits: 4,
        }
    }
}

pub struct Reconciler {
    router: Arc<dyn CallRouter>,
    devices: Arc<dyn DeviceManager>,
    settings: ReconcilerSettings,
    index: BackendIndex,
    /// Temporary numbers whose transfer stopped after detaching the handset, with its PPN.
    interrupted_transfers: HashMap<String, u32>,
}

impl Reconciler {
    pub fn new(
        router: Arc<dyn CallRouter>,
        devices: Arc<dyn DeviceManager>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            router,
            devices,
            settings,
            index: BackendIndex::new(),
            interrupted_transfers: HashMap::new(),
        }
    }

    pub fn index(&self) -> &BackendIndex {
        &self.index
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Log in to the device manager and load the managed users.
    pub async fn start(&mut self) -> Result<(), BackendError> {
        self.devices.login().await?;
        let users = self.devices.list_users(&self.settings.ownership_tag).await?;
        self.index = BackendIndex::load(users);
        info!(
            users = self.index.len(),
            tag = %self.settings.ownership_tag,
            "Backend index populated"
        );
        Ok(())
    }

    /// Start, open the startup gate, then process jobs until cancelled or the queue closes.
    ///
    /// Returns an error only for failures that must stop the daemon.
    pub async fn run(
        mut self,
        mut jobs: mpsc::Receiver<Job>,
        gate: oneshot::Sender<()>,
        acks: Arc<dyn Acknowledge>,
        cancel: CancellationToken,
    ) -> Result<(), ReconcileError> {
        self.start().await?;
        if gate.send(()).is_err() {
            warn!("Event ingestor went away before startup completed");
        }

        loop {
            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.process(job, acks.as_ref()).await?;
        }

        info!("Reconciler stopped");
        Ok(())
    }

    async fn process(&mut self, job: Job, acks: &dyn Acknowledge) -> Result<(), ReconcileError> {
        match job {
            Job::Event(event) => match self.handle_change(&event).await {
                Ok(outcome) => {
                    if acks.acknowledge(event.id).await {
                        debug!(event_id = event.id, ?outcome, "Event acknowledged");
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(event_id = event.id, error = %e, "Cannot process event");
                    return Err(e);
                }
                Err(e) => {
                    error!(event_id = event.id, error = %e, "Failed to apply event, leaving it pending");
                }
            },
            Job::Discover { reply } => {
                let result = self.provision_unbound().await;
                if let Err(e) = &result {
                    warn!(error = %e, "Handset discovery aborted");
                }
                let _ = reply.send(result);
            }
            Job::Transfer { request, reply } => {
                let result = self.transfer(&request).await;
                if let Err(e) = &result {
                    warn!(temp_number = %request.temp_number, error = %e, "Handset transfer failed");
                }
                let _ = reply.send(result);
            }
            Job::RefreshSubscription => {
                if let Err(e) = self.devices.set_subscription(SubscriptionMode::Configured).await {
                    warn!(error = %e, "Failed to refresh subscription mode");
                }
            }
        }
        Ok(())
    }

    /// Apply one change event.
    pub async fn handle_change(&mut self, event: &ChangeEvent) -> Result<Outcome, ReconcileError> {
        if self.settings.ignored_types.contains(&event.kind) {
            debug!(event_id = event.id, kind = %event.kind, "Ignoring event");
            return Ok(Outcome::Ignored);
        }

        let parsed = Event::from_change(event)?;
        info!(event_id = event.id, kind = %event.kind, "Applying event");

        match parsed {
            Event::UpdateExtension(update) => self.update_extension(update).await?,
            Event::DeleteExtension { number } => self.delete_extension(&number).await?,
            Event::RenameExtension { old, new } => self.rename_extension(&old, &new).await?,
            Event::UnsubscribeDevice { number } => self.unsubscribe_device(&number).await?,
            Event::UpdateCallGroup(update) => self.update_callgroup(&update).await?,
        }
        Ok(Outcome::Applied)
    }
}
