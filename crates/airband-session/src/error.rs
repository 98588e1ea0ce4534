//! Error types for the session layer.
//!
//! None of these are fatal to the process. Each one is contained to the
//! single frame or single delivery target that produced it.

use airband_types::ConnectionId;

use crate::session::Role;

/// Errors raised by connection handles and sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// An outbound message could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The target connection's writer has gone away.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// The target connection's outbound queue is full; the frame was
    /// discarded.
    #[error("connection {0} is not keeping up, frame dropped")]
    OutboundFull(ConnectionId),

    /// The connection already declared a different role.
    #[error("connection already acts as {current}, cannot become {requested}")]
    RoleConflict {
        /// Role the connection holds.
        current: Role,
        /// Role the rejected message asked for.
        requested: Role,
    },
}
