//! Periodic handset discovery and subscription keep-alive.
//!
//! Both loops only submit jobs; the reconciler performs the backend work.

use crate::error::ReconcileError;
use crate::reconciler::Job;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Scans for unbound handsets every `interval`.
pub struct DiscoveryLoop {
    jobs: mpsc::Sender<Job>,
    interval: Duration,
}

impl DiscoveryLoop {
    pub fn new(jobs: mpsc::Sender<Job>, interval: Duration) -> Self {
        Self { jobs, interval }
    }

    /// Run one scan through the reconciler. `None` once the reconciler has stopped.
    pub async fn scan(&self) -> Option<Result<usize, ReconcileError>> {
        let (reply, response) = oneshot::channel();
        self.jobs.send(Job::Discover { reply }).await.ok()?;
        response.await.ok()
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.scan().await {
                Some(Ok(0)) => debug!("No handsets to provision"),
                Some(Ok(count)) => info!(count, "Provisioned unbound handsets"),
                Some(Err(e)) => debug!(error = %e, "Retrying discovery next cycle"),
                None => break,
            }
        }
        debug!("Discovery loop stopped");
    }
}

/// Re-arm the OMM subscription mode every `interval`.
pub async fn keep_subscription(jobs: mpsc::Sender<Job>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if jobs.send(Job::RefreshSubscription).await.is_err() {
            warn!("Reconciler gone, stopping subscription keeper");
            break;
        }
    }
}
