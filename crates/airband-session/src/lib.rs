//! Session management for Airband.
//!
//! This crate owns everything that happens between "a socket was
//! accepted" and "a socket went away", independent of the HTTP layer:
//!
//! - [`registry`] -- the live set of devices, dashboards and screens
//! - [`router`] -- dispatch of inbound messages into registry operations
//! - [`liveness`] -- the periodic sweep that evicts silent devices
//! - [`fanout`] -- best-effort delivery of one message to many peers
//! - [`session`] -- the per-connection role record
//! - [`connection`] -- the outbound handle for one peer
//! - [`clock`] -- wall-clock source, swappable in tests
//! - [`config`] -- YAML configuration with environment overrides
//!
//! The transport adapter (see the `airband-server` crate) creates a
//! [`PeerConnection`] per socket, wraps it in a [`Session`], feeds text
//! frames to [`EventRouter::handle_text`], and calls
//! [`EventRouter::disconnect`] exactly once when the socket closes.

pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod fanout;
pub mod liveness;
pub mod registry;
pub mod router;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AirbandConfig, ConfigError, DEFAULT_CONFIG_PATH, LogFormat, LoggingConfig, ServerConfig,
    SessionConfig,
};
pub use connection::{OUTBOUND_CAPACITY, OutboundFrame, OutboundReceiver, PeerConnection};
pub use error::SessionError;
pub use fanout::FanoutReport;
pub use liveness::LivenessMonitor;
pub use registry::{Registry, RegistryStats};
pub use router::{Disposition, EventRouter};
pub use session::{Role, Session};
