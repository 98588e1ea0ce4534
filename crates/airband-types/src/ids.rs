//! Server-side connection identity.
//!
//! Connections are identified by a UUID v7 so that log lines sort in
//! accept order. Devices are *not* listed here: their ids are opaque
//! strings chosen by the phone client and survive reconnects.

use uuid::Uuid;

/// Unique identifier for one accepted WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
