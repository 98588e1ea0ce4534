//! Shared type definitions for the Airband session server.
//!
//! This crate is the single source of truth for the JSON protocol spoken
//! between the server and its browser peers (phone controllers,
//! dashboards, effect screens). Types flow downstream to `TypeScript`
//! via `ts-rs` so the front-end decodes exactly what the server encodes.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for server-side identifiers
//! - [`device`] -- Device projections shown on dashboards
//! - [`protocol`] -- Inbound and outbound WebSocket messages

pub mod device;
pub mod ids;
pub mod protocol;

// Re-export all public types at crate root for convenience.
pub use device::{AccelerometerReading, DeviceSummary};
pub use ids::ConnectionId;
pub use protocol::{ClientMessage, DEFAULT_STRUM_INTENSITY, ProtocolError, ServerMessage};
