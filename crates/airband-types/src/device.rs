//! Read-only device projections sent to dashboards.
//!
//! A [`DeviceSummary`] is everything an observer may learn about a
//! controller. The connection handle behind it never leaves the registry.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Latest motion sample reported by a controller.
///
/// Browsers report `null` for axes the sensor cannot provide, so every
/// axis is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AccelerometerReading {
    /// Acceleration along the x axis (m/s^2).
    pub x: Option<f64>,
    /// Acceleration along the y axis (m/s^2).
    pub y: Option<f64>,
    /// Acceleration along the z axis (m/s^2).
    pub z: Option<f64>,
}

/// Dashboard view of one live device.
///
/// Timestamps are Unix epoch milliseconds taken from the registry clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DeviceSummary {
    /// Client-supplied device id.
    pub id: String,
    /// When the id was first registered.
    #[serde(rename = "connectedAt")]
    #[ts(type = "number")]
    pub connected_at: u64,
    /// Last inbound activity for this id.
    #[serde(rename = "lastSeen")]
    #[ts(type = "number")]
    pub last_seen: u64,
    /// Last round-trip time reported by the device, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub ping: Option<f64>,
    /// Latest motion sample, if the device streams one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub accelerometer: Option<AccelerometerReading>,
    /// Instrument currently selected on the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub instrument: Option<String>,
}
