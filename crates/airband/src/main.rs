//! Airband session server.
//!
//! Wires together configuration, logging, the connection registry, the
//! liveness monitor and the HTTP/`WebSocket` server, then serves until
//! Ctrl-C or SIGTERM.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`AIRBAND_CONFIG`, default `airband-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the registry
//! 4. Start the liveness monitor
//! 5. Serve until a shutdown signal
//!
//! # Shutdown Sequence
//!
//! 1. Stop the liveness monitor (no sweep runs after this)
//! 2. Close every open connection and wait for its disconnect path
//! 3. Let the HTTP server drain

mod error;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use airband_server::{AppState, start_server};
use airband_session::{AirbandConfig, DEFAULT_CONFIG_PATH, LivenessMonitor, Registry};
use tracing::{info, warn};

use crate::error::AppError;

/// Upper bound on how long shutdown waits for connection tasks.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the server cannot bind.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration.
    let config_path = std::env::var_os("AIRBAND_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = AirbandConfig::load(&config_path)?;

    // 2. Initialize structured logging.
    logging::init(&config.logging);
    info!(
        config_path = %config_path.display(),
        host = config.server.host,
        port = config.server.port,
        ws_path = config.server.ws_path,
        heartbeat_timeout_ms = config.session.heartbeat_timeout_ms,
        sweep_interval_ms = config.session.sweep_interval_ms,
        "airband starting"
    );

    // 3. Create the registry.
    let registry = Arc::new(Registry::default());

    // 4. Start the liveness monitor.
    let monitor = LivenessMonitor::start(Arc::clone(&registry), config.session);

    // 5. Serve.
    let state = Arc::new(AppState::new(registry));
    let shutdown = {
        let state = Arc::clone(&state);
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            monitor.stop().await;
            if tokio::time::timeout(CLOSE_GRACE, state.close_connections())
                .await
                .is_err()
            {
                warn!(
                    open = state.open_connections(),
                    "Timed out waiting for connections to close"
                );
            }
        }
    };
    start_server(&config.server, state, shutdown).await?;

    info!("airband shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
