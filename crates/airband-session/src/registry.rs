//! The authoritative store of live peers.
//!
//! [`Registry`] owns every connection handle, grouped into three role
//! slots: devices keyed by their client-supplied id, and dashboards and
//! screens keyed by [`ConnectionId`]. Callers never see the underlying
//! collections; every access goes through a method that takes the lock.
//!
//! # Broadcast side effects
//!
//! Mutations that change the device list are followed by a `devices`
//! broadcast to all dashboards. Frames are queued while the write lock is
//! still held. Queueing never waits (see [`PeerConnection::send_frame`]),
//! so the lock is never held across I/O, and every dashboard receives
//! snapshots in the same order the mutations were applied.

use std::collections::HashMap;
use std::sync::Arc;

use airband_types::{AccelerometerReading, ConnectionId, DeviceSummary, ServerMessage};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::connection::PeerConnection;
use crate::fanout::{FanoutReport, broadcast_to_set};

/// Per-device state. The connection handle never leaves this struct.
#[derive(Debug)]
struct DeviceEntry {
    connected_at: u64,
    last_seen: u64,
    ping: Option<f64>,
    accelerometer: Option<AccelerometerReading>,
    instrument: Option<String>,
    connection: PeerConnection,
}

impl DeviceEntry {
    fn summary(&self, id: &str) -> DeviceSummary {
        DeviceSummary {
            id: id.to_owned(),
            connected_at: self.connected_at,
            last_seen: self.last_seen,
            ping: self.ping,
            accelerometer: self.accelerometer,
            instrument: self.instrument.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    devices: HashMap<String, DeviceEntry>,
    dashboards: HashMap<ConnectionId, PeerConnection>,
    screens: HashMap<ConnectionId, PeerConnection>,
}

impl RegistryState {
    /// Devices in registration order (ties broken by id).
    fn snapshot(&self) -> Vec<DeviceSummary> {
        let mut devices: Vec<DeviceSummary> = self
            .devices
            .iter()
            .map(|(id, entry)| entry.summary(id))
            .collect();
        devices.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        devices
    }

    /// Queue the current device list to every dashboard.
    fn send_device_list(&self) -> FanoutReport {
        broadcast_to_set(
            self.dashboards.values(),
            &ServerMessage::Devices {
                devices: self.snapshot(),
            },
        )
    }
}

/// Point-in-time peer counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Live devices.
    pub devices: usize,
    /// Registered dashboards.
    pub dashboards: usize,
    /// Registered screens.
    pub screens: usize,
}

/// Thread-safe registry of devices, dashboards and screens.
///
/// Construct one per server and share it behind an [`Arc`] with the
/// connection handlers and the liveness monitor.
pub struct Registry {
    state: RwLock<RegistryState>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Registry {
    /// Create an empty registry stamping entries with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            clock,
        }
    }

    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    /// Insert a device, or refresh `lastSeen` and the connection of an
    /// existing one. `connectedAt` keeps the value of the first call.
    pub async fn register_device(&self, id: &str, connection: PeerConnection) {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;
        if let Some(entry) = state.devices.get_mut(id) {
            entry.last_seen = now;
            entry.connection = connection;
            debug!(device_id = id, "Device registration refreshed");
        } else {
            state.devices.insert(
                id.to_owned(),
                DeviceEntry {
                    connected_at: now,
                    last_seen: now,
                    ping: None,
                    accelerometer: None,
                    instrument: None,
                    connection,
                },
            );
            info!(device_id = id, "Device connected");
        }
        state.send_device_list();
    }

    /// Refresh `lastSeen` for a heartbeat.
    ///
    /// Returns `false` for an unknown id, in which case nothing is sent.
    /// Otherwise dashboards get the device list and screens get a
    /// `heartbeat_event`.
    pub async fn touch_device(&self, id: &str) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;
        let Some(entry) = state.devices.get_mut(id) else {
            return false;
        };
        entry.last_seen = now;
        state.send_device_list();
        broadcast_to_set(
            state.screens.values(),
            &ServerMessage::HeartbeatEvent {
                device_id: id.to_owned(),
            },
        );
        true
    }

    /// Refresh `lastSeen` without notifying anyone.
    pub async fn note_activity(&self, id: &str) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;
        state.devices.get_mut(id).is_some_and(|entry| {
            entry.last_seen = now;
            true
        })
    }

    /// Store the round-trip time a device reported.
    pub async fn update_ping(&self, id: &str, rtt_ms: f64) -> bool {
        self.update_entry(id, false, |entry| entry.ping = Some(rtt_ms))
            .await
    }

    /// Store the instrument a device selected and refresh `lastSeen`.
    pub async fn update_instrument(&self, id: &str, instrument: &str) -> bool {
        self.update_entry(id, true, |entry| {
            entry.instrument = Some(instrument.to_owned());
        })
        .await
    }

    /// Store the latest motion sample and refresh `lastSeen`.
    pub async fn update_accelerometer(&self, id: &str, reading: AccelerometerReading) -> bool {
        self.update_entry(id, true, |entry| entry.accelerometer = Some(reading))
            .await
    }

    /// Apply `update` to a known device and broadcast the new list.
    async fn update_entry<F>(&self, id: &str, refresh: bool, update: F) -> bool
    where
        F: FnOnce(&mut DeviceEntry),
    {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;
        let Some(entry) = state.devices.get_mut(id) else {
            return false;
        };
        update(entry);
        if refresh {
            entry.last_seen = now;
        }
        state.send_device_list();
        true
    }

    /// Delete a device unconditionally. Idempotent.
    pub async fn remove_device(&self, id: &str) {
        let mut state = self.state.write().await;
        if state.devices.remove(id).is_some() {
            info!(device_id = id, "Device removed");
        }
        state.send_device_list();
    }

    /// Delete a device only if `connection_id` still owns the entry.
    ///
    /// Used on transport close so that an old socket going away after the
    /// device reconnected on a new one cannot evict the fresh entry.
    pub async fn release_device(&self, id: &str, connection_id: ConnectionId) -> bool {
        let mut state = self.state.write().await;
        let owned = state
            .devices
            .get(id)
            .is_some_and(|entry| entry.connection.id() == connection_id);
        if !owned {
            debug!(device_id = id, %connection_id, "Stale connection closed, device kept");
            return false;
        }
        state.devices.remove(id);
        info!(device_id = id, %connection_id, "Device disconnected");
        state.send_device_list();
        true
    }

    /// Read-only projection of every live device.
    pub async fn snapshot_devices(&self) -> Vec<DeviceSummary> {
        self.state.read().await.snapshot()
    }

    /// Evict every device idle for longer than `timeout_ms`.
    ///
    /// Dashboards receive a single `devices` broadcast if anything was
    /// evicted. Returns the evicted ids.
    pub async fn sweep_stale(&self, timeout_ms: u64) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut state = self.state.write().await;
        let evicted: Vec<String> = state
            .devices
            .iter()
            .filter(|(_, entry)| now.saturating_sub(entry.last_seen) > timeout_ms)
            .map(|(id, _)| id.clone())
            .collect();
        if evicted.is_empty() {
            return evicted;
        }
        for id in &evicted {
            state.devices.remove(id);
        }
        info!(count = evicted.len(), devices = ?evicted, "Evicted stale devices");
        state.send_device_list();
        evicted
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    /// Add a dashboard and send it the current device list.
    ///
    /// Only the new dashboard receives a message.
    pub async fn register_dashboard(&self, connection: PeerConnection) {
        let connection_id = connection.id();
        let mut state = self.state.write().await;
        let snapshot = ServerMessage::Devices {
            devices: state.snapshot(),
        };
        if let Err(e) = connection.send(&snapshot) {
            warn!(%connection_id, error = %e, "Failed to send device snapshot");
        }
        state.dashboards.insert(connection_id, connection);
        info!(%connection_id, "Dashboard connected");
    }

    /// Remove a dashboard. Returns whether it was registered.
    pub async fn unregister_dashboard(&self, connection_id: ConnectionId) -> bool {
        let removed = self
            .state
            .write()
            .await
            .dashboards
            .remove(&connection_id)
            .is_some();
        if removed {
            info!(%connection_id, "Dashboard disconnected");
        }
        removed
    }

    /// Add a screen. Screens render transient events, so no snapshot is sent.
    pub async fn register_screen(&self, connection: PeerConnection) {
        let connection_id = connection.id();
        self.state
            .write()
            .await
            .screens
            .insert(connection_id, connection);
        info!(%connection_id, "Screen connected");
    }

    /// Remove a screen. Returns whether it was registered.
    pub async fn unregister_screen(&self, connection_id: ConnectionId) -> bool {
        let removed = self
            .state
            .write()
            .await
            .screens
            .remove(&connection_id)
            .is_some();
        if removed {
            info!(%connection_id, "Screen disconnected");
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Broadcasts
    // -----------------------------------------------------------------------

    /// Send `message` to every registered screen.
    pub async fn broadcast_to_screens(&self, message: &ServerMessage) -> FanoutReport {
        broadcast_to_set(self.state.read().await.screens.values(), message)
    }

    /// Send `message` to every registered dashboard.
    pub async fn broadcast_to_dashboards(&self, message: &ServerMessage) -> FanoutReport {
        broadcast_to_set(self.state.read().await.dashboards.values(), message)
    }

    /// Send the current device list to every dashboard.
    ///
    /// Takes the write lock so the frame is ordered against concurrent
    /// mutations' own broadcasts.
    pub async fn broadcast_device_list(&self) -> FanoutReport {
        self.state.write().await.send_device_list()
    }

    /// Current peer counts.
    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.read().await;
        RegistryStats {
            devices: state.devices.len(),
            dashboards: state.dashboards.len(),
            screens: state.screens.len(),
        }
    }
}
