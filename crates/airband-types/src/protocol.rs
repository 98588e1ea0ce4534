//! JSON text-frame protocol spoken over the `/ws` endpoint.
//!
//! Every frame is an object with a `type` discriminator. Inbound frames
//! decode into [`ClientMessage`]; outbound frames are built from
//! [`ServerMessage`].
//!
//! Inbound fields are all optional at the decoding layer. A frame with a
//! known `type` but missing fields is still a valid [`ClientMessage`];
//! deciding that it is a no-op is the router's job. Numeric fields are
//! read leniently: a value that is not a JSON number decodes as absent
//! instead of failing the frame. `timestamp` is opaque and echoed as sent.
//! Only frames that are not JSON, lack a `type`, or carry an unknown
//! `type` are rejected here.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::device::DeviceSummary;

/// Intensity applied to a strum that does not carry one.
pub const DEFAULT_STRUM_INTENSITY: f64 = 1.0;

/// Errors produced while decoding an inbound text frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON, or a field has the wrong JSON type.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame has no string `type` field.
    #[error("frame has no type discriminator")]
    MissingType,

    /// The `type` field names a message this server does not handle.
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

/// A message sent by a browser peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A controller announces itself.
    Connect {
        /// Client-chosen device id.
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
    },
    /// Liveness signal from a controller.
    Heartbeat {
        /// Device the heartbeat refreshes.
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
        /// Client clock value to echo back for round-trip measurement.
        /// Any JSON value, `null` included, counts as present.
        #[serde(default, deserialize_with = "present_value")]
        #[ts(type = "unknown")]
        timestamp: Option<Value>,
    },
    /// The connection is a dashboard observer.
    Dashboard,
    /// The connection is a shared effects screen.
    Screen,
    /// A gameplay strum on an instrument.
    Strum {
        /// Device that strummed.
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
        /// Instrument that was played.
        instrument: Option<String>,
        /// Strum strength; defaults to [`DEFAULT_STRUM_INTENSITY`].
        #[serde(default, deserialize_with = "lenient_f64")]
        intensity: Option<f64>,
    },
    /// Round-trip time the device measured from a heartbeat ack.
    PingUpdate {
        /// Device reporting its ping.
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
        /// Round-trip time in milliseconds.
        #[serde(default, deserialize_with = "lenient_f64")]
        ping: Option<f64>,
    },
    /// The device switched instruments.
    Instrument {
        /// Device selecting an instrument.
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
        /// Selected instrument name.
        instrument: Option<String>,
    },
    /// Motion sample from the device sensors.
    Accelerometer {
        /// Device reporting motion.
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
        /// Acceleration along the x axis.
        #[serde(default, deserialize_with = "lenient_f64")]
        x: Option<f64>,
        /// Acceleration along the y axis.
        #[serde(default, deserialize_with = "lenient_f64")]
        y: Option<f64>,
        /// Acceleration along the z axis.
        #[serde(default, deserialize_with = "lenient_f64")]
        z: Option<f64>,
    },
}

impl ClientMessage {
    /// Every `type` value this server recognizes.
    pub const KNOWN_TYPES: [&'static str; 8] = [
        "connect",
        "heartbeat",
        "dashboard",
        "screen",
        "strum",
        "ping_update",
        "instrument",
        "accelerometer",
    ];

    /// Decode one inbound text frame.
    ///
    /// Unknown types are reported as [`ProtocolError::UnknownType`] rather
    /// than a generic JSON error so callers can log them distinctly.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !Self::KNOWN_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_owned()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The wire name of this message's `type`.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Dashboard => "dashboard",
            Self::Screen => "screen",
            Self::Strum { .. } => "strum",
            Self::PingUpdate { .. } => "ping_update",
            Self::Instrument { .. } => "instrument",
            Self::Accelerometer { .. } => "accelerometer",
        }
    }

    /// The device id carried by the message, if any.
    ///
    /// Empty strings are treated as absent.
    pub fn device_id(&self) -> Option<&str> {
        let id = match self {
            Self::Connect { device_id }
            | Self::Heartbeat { device_id, .. }
            | Self::Strum { device_id, .. }
            | Self::PingUpdate { device_id, .. }
            | Self::Instrument { device_id, .. }
            | Self::Accelerometer { device_id, .. } => device_id.as_deref(),
            Self::Dashboard | Self::Screen => None,
        };
        id.filter(|id| !id.is_empty())
    }
}

/// Keep any JSON value, `null` included. Paired with `#[serde(default)]`
/// so only a missing key reads as `None`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A number, or `None` for anything else.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| value.as_f64())
}

/// A message pushed by the server to one or more peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full device list snapshot for dashboards.
    Devices {
        /// Every live device, in registration order.
        devices: Vec<DeviceSummary>,
    },
    /// Echo of a heartbeat timestamp, sent to the originating device only.
    HeartbeatAck {
        /// Device that sent the heartbeat.
        #[serde(rename = "deviceId")]
        device_id: String,
        /// The timestamp exactly as the device sent it.
        #[ts(type = "unknown")]
        timestamp: Value,
    },
    /// A device's heartbeat was processed; sent to screens.
    HeartbeatEvent {
        /// Device whose heartbeat landed.
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    /// A gameplay strum; sent to screens.
    StrumEvent {
        /// Device that strummed.
        #[serde(rename = "deviceId")]
        device_id: String,
        /// Instrument that was played.
        instrument: String,
        /// Strum strength.
        intensity: f64,
    },
    /// Confirms an instrument selection to the selecting device.
    InstrumentAck {
        /// Device that selected the instrument.
        #[serde(rename = "deviceId")]
        device_id: String,
        /// The instrument now stored for the device.
        instrument: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_connect() {
        let msg = ClientMessage::parse(r#"{"type":"connect","deviceId":"d1"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Connect {
                device_id: Some(String::from("d1"))
            }
        );
        assert_eq!(msg.device_id(), Some("d1"));
    }

    #[test]
    fn role_declarations_ignore_extra_fields() {
        let msg = ClientMessage::parse(r#"{"type":"dashboard","deviceId":"x"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Dashboard);
        assert_eq!(msg.device_id(), None);
    }

    #[test]
    fn missing_fields_still_decode() {
        let msg = ClientMessage::parse(r#"{"type":"strum"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Strum {
                device_id: None,
                instrument: None,
                intensity: None
            }
        );
    }

    #[test]
    fn empty_device_id_counts_as_absent() {
        let msg = ClientMessage::parse(r#"{"type":"heartbeat","deviceId":""}"#).unwrap();
        assert_eq!(msg.device_id(), None);
    }

    fn heartbeat_timestamp(text: &str) -> Option<Value> {
        let ClientMessage::Heartbeat { timestamp, .. } = ClientMessage::parse(text).unwrap()
        else {
            panic!("expected heartbeat");
        };
        timestamp
    }

    #[test]
    fn heartbeat_timestamp_is_kept_verbatim() {
        assert_eq!(
            heartbeat_timestamp(r#"{"type":"heartbeat","deviceId":"d1","timestamp":1234}"#),
            Some(json!(1234))
        );
        assert_eq!(
            heartbeat_timestamp(r#"{"type":"heartbeat","deviceId":"d1","timestamp":"t-1"}"#),
            Some(json!("t-1"))
        );
        assert_eq!(
            heartbeat_timestamp(r#"{"type":"heartbeat","deviceId":"d1","timestamp":null}"#),
            Some(Value::Null)
        );
        assert_eq!(
            heartbeat_timestamp(r#"{"type":"heartbeat","deviceId":"d1"}"#),
            None
        );
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn rejects_missing_type() {
        assert!(matches!(
            ClientMessage::parse(r#"{"deviceId":"d1"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            ClientMessage::parse("[1,2,3]"),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = ClientMessage::parse(r#"{"type":"teleport"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(ref kind) if kind == "teleport"));
    }

    #[test]
    fn non_numeric_numbers_decode_as_absent() {
        let msg =
            ClientMessage::parse(r#"{"type":"ping_update","deviceId":"d1","ping":"fast"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::PingUpdate {
                device_id: Some(String::from("d1")),
                ping: None
            }
        );

        let msg = ClientMessage::parse(
            r#"{"type":"strum","deviceId":"d1","instrument":"bass","intensity":"loud"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::Strum { intensity: None, .. }));

        let msg =
            ClientMessage::parse(r#"{"type":"accelerometer","deviceId":"d1","x":0.5,"y":[],"z":null}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Accelerometer {
                device_id: Some(String::from("d1")),
                x: Some(0.5),
                y: None,
                z: None
            }
        );
    }

    #[test]
    fn wrongly_typed_ids_are_still_malformed() {
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"connect","deviceId":42}"#),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn kind_matches_wire_tag() {
        for kind in ClientMessage::KNOWN_TYPES {
            let msg = ClientMessage::parse(&json!({ "type": kind }).to_string()).unwrap();
            assert_eq!(msg.kind(), kind);
        }
    }

    #[test]
    fn outbound_shapes_match_the_wire_contract() {
        let ack = ServerMessage::HeartbeatAck {
            device_id: String::from("d1"),
            timestamp: json!(1234),
        };
        assert_eq!(
            serde_json::to_value(&ack).unwrap(),
            json!({ "type": "heartbeat_ack", "deviceId": "d1", "timestamp": 1234 })
        );

        let event = ServerMessage::HeartbeatEvent {
            device_id: String::from("d1"),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "heartbeat_event", "deviceId": "d1" })
        );

        let strum = ServerMessage::StrumEvent {
            device_id: String::from("d1"),
            instrument: String::from("guitar"),
            intensity: 0.7,
        };
        assert_eq!(
            serde_json::to_value(&strum).unwrap(),
            json!({ "type": "strum_event", "deviceId": "d1", "instrument": "guitar", "intensity": 0.7 })
        );

        let devices = ServerMessage::Devices { devices: vec![] };
        assert_eq!(
            serde_json::to_value(&devices).unwrap(),
            json!({ "type": "devices", "devices": [] })
        );
    }
}
