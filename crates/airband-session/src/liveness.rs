//! Periodic eviction of silent devices.
//!
//! The [`LivenessMonitor`] owns one background task that wakes every
//! sweep interval and asks the registry to drop devices whose `lastSeen`
//! is older than the heartbeat timeout. It is started explicitly at
//! service start and stopped explicitly on shutdown; once
//! [`stop`](LivenessMonitor::stop) returns, no further sweep can run.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::registry::Registry;

/// Handle to the running sweep task.
#[derive(Debug)]
pub struct LivenessMonitor {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl LivenessMonitor {
    /// Spawn the sweep task on the current Tokio runtime.
    ///
    /// The first sweep runs one full interval after start.
    pub fn start(registry: Arc<Registry>, settings: SessionConfig) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        info!(
            heartbeat_timeout_ms = settings.heartbeat_timeout_ms,
            sweep_interval_ms = settings.sweep_interval_ms,
            "Liveness monitor starting"
        );
        let task = tokio::spawn(run(
            registry,
            settings.heartbeat_timeout_ms,
            settings.sweep_interval(),
            shutdown_rx,
        ));
        Self { shutdown, task }
    }

    /// Cancel the sweep task and wait for it to finish.
    pub async fn stop(self) {
        // The task may already be gone if the runtime is shutting down.
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Liveness monitor task ended abnormally");
        }
        info!("Liveness monitor stopped");
    }
}

async fn run(
    registry: Arc<Registry>,
    timeout_ms: u64,
    period: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick.
    ticker.reset();

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => return,
            _ = ticker.tick() => {
                let evicted = registry.sweep_stale(timeout_ms).await;
                debug!(evicted = evicted.len(), "Liveness sweep complete");
            }
        }
    }
}
