//! Handset registration: turns a dial-in from a temporary handset into a transfer job.

use crate::error::ApiError;
use crate::reconciler::{Job, TransferRequest};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Submits transfers to the reconciler and waits for their outcome.
#[derive(Clone)]
pub struct RegistrationGateway {
    jobs: mpsc::Sender<Job>,
    token_prefix_len: usize,
}

impl RegistrationGateway {
    pub fn new(jobs: mpsc::Sender<Job>, token_prefix_len: usize) -> Self {
        Self {
            jobs,
            token_prefix_len,
        }
    }

    /// Build a transfer from what the dialplan reports: the caller id and the dialled digits,
    /// which start with the registration service number.
    pub fn request(&self, callerid: &str, dialled: &str) -> TransferRequest {
        TransferRequest {
            temp_number: callerid.trim().to_string(),
            token: dialled.trim().chars().skip(self.token_prefix_len).collect(),
        }
    }

    pub async fn submit(&self, request: TransferRequest) -> Result<(), ApiError> {
        info!(temp_number = %request.temp_number, "Handset registration requested");

        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Job::Transfer { request, reply })
            .await
            .map_err(|_| ApiError::Unavailable)?;
        response.await.map_err(|_| ApiError::Unavailable)??;
        Ok(())
    }
}
