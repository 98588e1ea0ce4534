//! Inbound message dispatch.
//!
//! [`EventRouter`] turns one decoded frame from one connection into
//! registry mutations and broadcasts. It never closes a connection: a
//! frame that cannot be decoded is logged and dropped, and a frame with
//! missing fields is a no-op.
//!
//! | type | effect |
//! |------|--------|
//! | `connect` | register the device, role becomes `Device(id)` |
//! | `heartbeat` | touch the device; echo `timestamp` back as `heartbeat_ack` |
//! | `dashboard` | register a dashboard, which gets a device snapshot |
//! | `screen` | register a screen |
//! | `strum` | refresh the device, send `strum_event` to screens |
//! | `ping_update` | store the device's round-trip time |
//! | `instrument` | store the selected instrument, reply `instrument_ack` |
//! | `accelerometer` | store the latest motion sample |

use std::sync::Arc;

use airband_types::{
    AccelerometerReading, ClientMessage, DEFAULT_STRUM_INTENSITY, ProtocolError, ServerMessage,
};
use tracing::{debug, warn};

use crate::registry::Registry;
use crate::session::{Role, Session};

/// What the router did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The frame mutated the registry or produced output.
    Applied,
    /// The frame decoded but had no effect (missing fields, unknown
    /// device, role conflict, repeated role declaration).
    Ignored,
    /// The frame could not be decoded.
    Dropped,
}

/// Routes inbound frames for every connection into one shared registry.
#[derive(Debug, Clone)]
pub struct EventRouter {
    registry: Arc<Registry>,
}

impl EventRouter {
    /// Create a router over `registry`.
    pub const fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry this router mutates.
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Decode and dispatch one text frame received on `session`.
    pub async fn handle_text(&self, session: &mut Session, text: &str) -> Disposition {
        let connection_id = session.connection().id();
        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(ProtocolError::UnknownType(kind)) => {
                warn!(%connection_id, %kind, "Dropping message of unknown type");
                return Disposition::Dropped;
            }
            Err(e) => {
                warn!(%connection_id, error = %e, "Dropping malformed message");
                return Disposition::Dropped;
            }
        };
        debug!(
            %connection_id,
            kind = message.kind(),
            device_id = message.device_id(),
            "Routing message"
        );
        self.dispatch(session, message).await
    }

    /// Apply one decoded message.
    pub async fn dispatch(&self, session: &mut Session, message: ClientMessage) -> Disposition {
        match message {
            ClientMessage::Connect { device_id } => {
                let Some(device_id) = present(device_id) else {
                    return Disposition::Ignored;
                };
                self.connect(session, device_id).await
            }
            ClientMessage::Heartbeat {
                device_id,
                timestamp,
            } => {
                let Some(device_id) = present(device_id) else {
                    return Disposition::Ignored;
                };
                let touched = self.registry.touch_device(&device_id).await;
                let acked = timestamp.is_some_and(|timestamp| {
                    reply(
                        session,
                        &ServerMessage::HeartbeatAck {
                            device_id,
                            timestamp,
                        },
                    )
                });
                applied_if(touched || acked)
            }
            ClientMessage::Dashboard => self.observe(session, Role::Dashboard).await,
            ClientMessage::Screen => self.observe(session, Role::Screen).await,
            ClientMessage::Strum {
                device_id,
                instrument,
                intensity,
            } => {
                let (Some(device_id), Some(instrument)) = (present(device_id), present(instrument))
                else {
                    return Disposition::Ignored;
                };
                if !self.registry.note_activity(&device_id).await {
                    debug!(%device_id, "Strum from unknown device ignored");
                    return Disposition::Ignored;
                }
                self.registry
                    .broadcast_to_screens(&ServerMessage::StrumEvent {
                        device_id,
                        instrument,
                        intensity: strum_intensity(intensity),
                    })
                    .await;
                Disposition::Applied
            }
            ClientMessage::PingUpdate { device_id, ping } => {
                let (Some(device_id), Some(ping)) = (present(device_id), ping) else {
                    return Disposition::Ignored;
                };
                applied_if(self.registry.update_ping(&device_id, ping).await)
            }
            ClientMessage::Instrument {
                device_id,
                instrument,
            } => {
                let (Some(device_id), Some(instrument)) = (present(device_id), present(instrument))
                else {
                    return Disposition::Ignored;
                };
                if !self
                    .registry
                    .update_instrument(&device_id, &instrument)
                    .await
                {
                    return Disposition::Ignored;
                }
                debug!(%device_id, %instrument, "Instrument selected");
                reply(
                    session,
                    &ServerMessage::InstrumentAck {
                        device_id,
                        instrument,
                    },
                );
                Disposition::Applied
            }
            ClientMessage::Accelerometer { device_id, x, y, z } => {
                let Some(device_id) = present(device_id) else {
                    return Disposition::Ignored;
                };
                let reading = AccelerometerReading { x, y, z };
                applied_if(
                    self.registry
                        .update_accelerometer(&device_id, reading)
                        .await,
                )
            }
        }
    }

    /// Run the cleanup path matching the session's role. Consumes the
    /// session so it can only happen once.
    pub async fn disconnect(&self, session: Session) {
        let connection_id = session.connection().id();
        match session.role() {
            Role::Unassigned => {
                debug!(%connection_id, "Connection closed before declaring a role");
            }
            Role::Device(device_id) => {
                self.registry.release_device(device_id, connection_id).await;
            }
            Role::Dashboard => {
                self.registry.unregister_dashboard(connection_id).await;
            }
            Role::Screen => {
                self.registry.unregister_screen(connection_id).await;
            }
        }
    }

    async fn connect(&self, session: &mut Session, device_id: String) -> Disposition {
        if let Err(e) = session.assign(Role::Device(device_id.clone())) {
            warn!(connection_id = %session.connection().id(), error = %e, "Ignoring connect");
            return Disposition::Ignored;
        }
        self.registry
            .register_device(&device_id, session.connection().clone())
            .await;
        Disposition::Applied
    }

    async fn observe(&self, session: &mut Session, role: Role) -> Disposition {
        let connection_id = session.connection().id();
        if session.role() == &role {
            debug!(%connection_id, %role, "Repeated role declaration ignored");
            return Disposition::Ignored;
        }
        if let Err(e) = session.assign(role.clone()) {
            warn!(%connection_id, error = %e, "Ignoring role declaration");
            return Disposition::Ignored;
        }
        let connection = session.connection().clone();
        if role == Role::Dashboard {
            self.registry.register_dashboard(connection).await;
        } else {
            self.registry.register_screen(connection).await;
        }
        Disposition::Applied
    }
}

/// A missing or zero intensity means a default strum.
fn strum_intensity(intensity: Option<f64>) -> f64 {
    intensity
        .filter(|value| value.abs() > 0.0)
        .unwrap_or(DEFAULT_STRUM_INTENSITY)
}

/// Treat empty strings the same as absent fields.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

const fn applied_if(applied: bool) -> Disposition {
    if applied {
        Disposition::Applied
    } else {
        Disposition::Ignored
    }
}

/// Send `message` back to the session's own connection.
fn reply(session: &Session, message: &ServerMessage) -> bool {
    match session.connection().send(message) {
        Ok(()) => true,
        Err(e) => {
            warn!(connection_id = %session.connection().id(), error = %e, "Reply failed");
            false
        }
    }
}
