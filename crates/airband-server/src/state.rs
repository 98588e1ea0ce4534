//! Shared application state for the Airband server.
//!
//! [`AppState`] holds the event router (and through it the registry) plus
//! a shutdown signal that every connection task watches. Handlers receive
//! it as `State<Arc<AppState>>`.

use std::sync::Arc;

use airband_session::{EventRouter, Registry};
use tokio::sync::watch;
use tracing::info;

/// State shared by every HTTP handler and connection task.
#[derive(Debug)]
pub struct AppState {
    router: EventRouter,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Wrap an existing registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            router: EventRouter::new(registry),
            shutdown,
        }
    }

    /// The router connection tasks feed inbound frames to.
    pub const fn router(&self) -> &EventRouter {
        &self.router
    }

    /// The registry behind the router.
    pub fn registry(&self) -> &Arc<Registry> {
        self.router.registry()
    }

    /// Subscribe to the shutdown signal. Each connection task holds one
    /// receiver for its whole lifetime.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Number of connection tasks still running.
    pub fn open_connections(&self) -> usize {
        self.shutdown.receiver_count()
    }

    /// Tell every connection task to close, then wait until all of them
    /// have run their disconnect path.
    pub async fn close_connections(&self) {
        let open = self.open_connections();
        info!(open, "Closing open connections");
        self.shutdown.send_replace(true);
        self.shutdown.closed().await;
        info!("All connections closed");
    }
}
