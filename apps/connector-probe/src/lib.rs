//! Connector Probe
//!
//! Small service that keeps a MongoDB connection alive through
//! [`ConnectionManager`] and logs every lifecycle event until shutdown.
//!
//! ## Flow
//!
//! ```text
//! ConnectorConfig::from_env()
//!   ↓
//! ManagerScope::instance()
//!   ↓ collection("probe")     (connects, retries in the background on failure)
//! LifecycleEvent stream  ──>  tracing
//!   ↓ SIGINT / SIGTERM
//! shutdown()
//! ```

use core_config::{Environment, FromEnv};
use eyre::{Result, WrapErr};
use mongo_connector::mongodb::{MongoDriver, MongoManagerScope};
use mongo_connector::{ConnectionManager, ConnectorConfig, LifecycleEvent};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

const PROBE_COLLECTION: &str = "probe";

/// Log lifecycle events until the manager is dropped
fn spawn_event_logger(manager: &ConnectionManager<MongoDriver>) -> tokio::task::JoinHandle<()> {
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(LifecycleEvent::ConnectionFailed { reason, client }) => {
                    warn!(reason = %reason, had_client = client.is_some(), "connection-failed");
                }
                Ok(LifecycleEvent::Disconnect(_)) => warn!("disconnect"),
                Ok(event) => info!(event = event.name(), "Lifecycle event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Run the probe
///
/// 1. Sets up color-eyre and structured logging
/// 2. Loads the connector configuration from the environment
/// 3. Opens the probe collection, leaving retries to the manager
/// 4. Waits for a shutdown signal
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the signal handler
/// cannot be installed. Connection failures are retried, not returned.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    info!(environment = ?environment, "Starting connector probe");

    let config = ConnectorConfig::from_env().wrap_err("Failed to load MongoDB configuration")?;
    info!(
        database = %config.database,
        retry_delay_ms = config.retry_delay_ms,
        reconnect_on_change = config.reconnect_on_change,
        "Connector configuration loaded"
    );

    let scope = MongoManagerScope::new(MongoDriver, config);
    let manager = scope.instance(None, None);
    let logger = spawn_event_logger(&manager);

    match manager.collection(PROBE_COLLECTION).await {
        Ok(collection) => info!(collection = %collection.name(), "Probe collection ready"),
        Err(e) => warn!(error = %e, "Probe collection unavailable, retrying in background"),
    }

    let health = manager.check_health().await;
    info!(
        healthy = health.healthy,
        response_time_ms = health.response_time_ms,
        message = ?health.message,
        "Health check"
    );

    if let Err(e) = shutdown_signal().await {
        error!("Error waiting for shutdown signal: {}", e);
    }

    manager.shutdown();
    logger.abort();
    info!("Connector probe stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.wrap_err("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), eyre::Report>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
            result
        }
        result = terminate => {
            info!("Received SIGTERM, shutting down");
            result
        }
    }
}
