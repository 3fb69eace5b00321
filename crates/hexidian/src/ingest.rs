//! Event ingestion from Guru3.

use crate::error::IngestError;
use crate::reconciler::{Acknowledge, Job};
use async_trait::async_trait;
use guru3_client::{ChangeEvent, Guru3Client};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pulls change events from Guru3 and hands them to the reconciler exactly once.
///
/// An event id stays in the pending set from delivery until Guru3 accepts its
/// acknowledgement, so refetches never deliver it twice.
#[derive(Clone)]
pub struct EventIngestor {
    client: Guru3Client,
    pending: Arc<Mutex<HashSet<u64>>>,
}

impl EventIngestor {
    pub fn new(client: Guru3Client) -> Self {
        Self {
            client,
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Ids delivered but not yet acknowledged, ascending.
    pub async fn pending_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.pending.lock().await.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Fetch the outstanding events and forward the ones not already pending.
    pub async fn fetch_and_forward(&self, jobs: &mpsc::Sender<Job>) -> Result<usize, IngestError> {
        // Held across the GET so no id leaves the set between the server snapshot and the
        // filter. Released before sending: a full queue must not block acknowledgements.
        let fresh: Vec<ChangeEvent> = {
            let mut pending = self.pending.lock().await;
            let events = self.client.fetch_events().await?;
            events.into_iter().filter(|e| pending.insert(e.id)).collect()
        };

        let count = fresh.len();
        for event in fresh {
            debug!(event_id = event.id, kind = %event.kind, "Forwarding event");
            jobs.send(Job::Event(event))
                .await
                .map_err(|_| IngestError::QueueClosed)?;
        }
        Ok(count)
    }

    /// Wait for the startup gate, then follow the push channel until cancelled.
    pub async fn run(
        self,
        gate: oneshot::Receiver<()>,
        jobs: mpsc::Sender<Job>,
        cancel: CancellationToken,
    ) -> Result<(), IngestError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            opened = gate => opened.map_err(|_| IngestError::StartupAborted)?,
        }

        self.refresh(&jobs).await?;

        let mut push = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            push = self.client.connect_push() => push?,
        };
        info!("Connected to Guru3 push channel");

        loop {
            let queue_length = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    push.close().await;
                    return Ok(());
                }
                hint = push.next_hint() => hint?,
            };
            if queue_length > 0 {
                self.refresh(&jobs).await?;
            }
        }
    }

    /// Fetch once; transient failures are logged and left for the next hint.
    async fn refresh(&self, jobs: &mpsc::Sender<Job>) -> Result<(), IngestError> {
        match self.fetch_and_forward(jobs).await {
            Ok(count) => {
                debug!(count, "Fetched new events");
                Ok(())
            }
            Err(IngestError::Guru3(e)) if !e.is_protocol_violation() => {
                warn!(error = %e, "Failed to fetch events, waiting for the next hint");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Acknowledge for EventIngestor {
    async fn acknowledge(&self, id: u64) -> bool {
        match self.client.acknowledge(&[id]).await {
            Ok(()) => {
                self.pending.lock().await.remove(&id);
                true
            }
            Err(e) => {
                warn!(event_id = id, error = %e, "Acknowledgement failed, event is stuck until restart");
                false
            }
        }
    }
}
