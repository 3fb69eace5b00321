//! Wires the backends, the reconciler and its producers together.

use crate::api::{create_router, AppState, RateLimitState};
use crate::backend::{DeviceManager, OmmDeviceManager};
use crate::config::Config;
use crate::discovery::{keep_subscription, DiscoveryLoop};
use crate::ingest::EventIngestor;
use crate::reconciler::{Acknowledge, Reconciler};
use crate::registration::RegistrationGateway;
use anyhow::{Context, Result};
use asterisk_db::AsteriskDb;
use guru3_client::Guru3Client;
use omm_client::OmmClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run until `cancel` fires or a task fails.
///
/// The first task to finish cancels the others. Connections are closed only after every
/// task has stopped, so an in-flight job always completes.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<()> {
    let guru3 = Guru3Client::new(config.guru3_base_url(), config.guru3.api_key.clone())
        .context("Failed to create Guru3 client")?;

    let db = AsteriskDb::connect(&config.db_config())
        .await
        .context("Failed to connect to the Asterisk database")?;
    db.migrate()
        .await
        .context("Failed to migrate the Asterisk database")?;

    let omm = OmmClient::connect(&config.omm.host, config.omm.port, config.omm.accept_invalid_certs)
        .await
        .context("Failed to connect to the OMM")?;
    let devices = Arc::new(OmmDeviceManager::new(
        omm,
        &config.omm.username,
        config.omm.password.clone(),
    ));

    let addr = SocketAddr::new(
        config
            .registration
            .listen_addr
            .parse()
            .context("Invalid registration listen address")?,
        config.registration.port,
    );
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Registration endpoint listening on {}", addr);

    let (jobs_tx, jobs_rx) = mpsc::channel(config.reconciler.queue_capacity.max(1));
    let (gate_tx, gate_rx) = oneshot::channel();

    let ingestor = EventIngestor::new(guru3);
    let acks: Arc<dyn Acknowledge> = Arc::new(ingestor.clone());
    let reconciler = Reconciler::new(
        Arc::new(db.clone()),
        devices.clone(),
        config.reconciler_settings(),
    );

    let gateway = RegistrationGateway::new(jobs_tx.clone(), config.registration.token_prefix_len);
    let app = create_router(
        AppState::new(gateway),
        RateLimitState::new(config.registration.requests_per_minute),
    );

    let mut tasks: JoinSet<(&'static str, Result<()>)> = JoinSet::new();

    let token = cancel.clone();
    tasks.spawn(async move {
        let result = reconciler.run(jobs_rx, gate_tx, acks, token).await;
        ("reconciler", result.map_err(Into::into))
    });

    let (jobs, token) = (jobs_tx.clone(), cancel.clone());
    tasks.spawn(async move {
        let result = ingestor.run(gate_rx, jobs, token).await;
        ("ingestor", result.map_err(Into::into))
    });

    let discovery = DiscoveryLoop::new(jobs_tx.clone(), config.discovery.interval);
    let token = cancel.clone();
    tasks.spawn(async move {
        discovery.run(token).await;
        ("discovery", Ok(()))
    });

    let (jobs, interval, token) = (jobs_tx, config.omm.subscription_interval, cancel.clone());
    tasks.spawn(async move {
        keep_subscription(jobs, interval, token).await;
        ("subscription", Ok(()))
    });

    let token = cancel.clone();
    tasks.spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await;
        ("registration", result.map_err(Into::into))
    });

    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((task, Ok(()))) => info!(task, "Task stopped"),
            Ok((task, Err(e))) => {
                error!(task, error = %e, "Task failed");
                failure.get_or_insert(e.context(format!("{} failed", task)));
            }
            Err(e) => {
                error!(error = %e, "Task panicked");
                failure.get_or_insert(anyhow::Error::new(e));
            }
        }
        cancel.cancel();
    }

    if let Err(e) = devices.logout().await {
        warn!(error = %e, "OMM logout failed");
    }
    db.close().await;
    info!("Shutdown complete");

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
