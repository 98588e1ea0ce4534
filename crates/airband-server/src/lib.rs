//! HTTP and `WebSocket` transport for the Airband session manager.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws` by default) shared by devices,
//!   dashboards and screens; each socket becomes one
//!   [`Session`](airband_session::Session) driven by the
//!   [`EventRouter`](airband_session::EventRouter)
//! - **REST endpoints** for a device snapshot and a health probe
//!
//! # Shutdown
//!
//! [`AppState::close_connections`] signals every connection task to send
//! a Close frame and run its disconnect path, and waits for them. The
//! binary calls it from the graceful-shutdown future passed to
//! [`start_server`], after the liveness monitor has been stopped.

pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerError, serve, start_server};
pub use state::AppState;
