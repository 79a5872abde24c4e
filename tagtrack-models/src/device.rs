use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Connectivity state of a device as last reported by the device itself.
///
/// This is the only source of truth for online-ness: the registry never
/// infers staleness from `last_seen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

/// Last-known geographic position reported by a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Live state of a field device (tracker or fixed NFC reader).
///
/// Created on the first message from an unseen identity, merged on every
/// subsequent message, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device identity (MQTT topic entity segment)
    pub device_id: String,
    /// Connectivity state from the last explicit status message
    pub status: DeviceStatus,
    /// Receipt time of the most recent message of any kind
    pub last_seen: DateTime<Utc>,
    /// Battery level 0-100, if the device reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
    /// Signal strength 0-100, if the device reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<u8>,
    /// Last-known location, if the device reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl Device {
    /// A fresh record for a device seen for the first time.
    ///
    /// Status starts `Offline`: online-ness only ever comes from an
    /// explicit status message.
    pub fn new(device_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            status: DeviceStatus::Offline,
            last_seen: now,
            battery: None,
            signal: None,
            location: None,
        }
    }
}

/// Partial device update extracted from one inbound message.
///
/// `None` fields leave the current value untouched.
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub status: Option<DeviceStatus>,
    pub battery: Option<u8>,
    pub signal: Option<u8>,
    pub location: Option<GeoPoint>,
}

/// One timestamped telemetry reading attributed to a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub device_id: String,
    /// Arbitrary structured sensor readings, as published
    pub payload: Json,
    pub received_at: DateTime<Utc>,
}

/// Aggregate connectivity/battery view over the whole registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkHealth {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    /// 100.0 when the registry is empty (no data is not an outage)
    pub online_percentage: f64,
    /// `null` when no device reports a battery level
    pub avg_battery_level: Option<f64>,
}
