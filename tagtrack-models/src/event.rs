use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::device::DeviceStatus;

/// Fan-out category. Each category has its own bus channel and its own
/// wildcard subscription on the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Telemetry,
    Status,
    NfcScan,
}

impl EventCategory {
    pub const ALL: [EventCategory; 3] = [
        EventCategory::Telemetry,
        EventCategory::Status,
        EventCategory::NfcScan,
    ];
}

/// Typed event fanned out to local subscribers and observer streams.
///
/// Ephemeral: exists only for the duration of fan-out, never persisted.
/// The tag doubles as the wire-format discriminator on observer streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackEvent {
    /// A telemetry reading from a tracker.
    Telemetry {
        #[serde(rename = "deviceId")]
        device_id: String,
        payload: Json,
        timestamp: DateTime<Utc>,
    },
    /// An explicit connectivity report from a device.
    Status {
        #[serde(rename = "deviceId")]
        device_id: String,
        status: DeviceStatus,
        payload: Json,
        timestamp: DateTime<Utc>,
    },
    /// A tagged asset detected by a fixed reader.
    NfcScan {
        #[serde(rename = "readerId")]
        reader_id: String,
        payload: Json,
        timestamp: DateTime<Utc>,
    },
}

impl TrackEvent {
    /// The bus channel this event fans out on.
    pub fn category(&self) -> EventCategory {
        match self {
            TrackEvent::Telemetry { .. } => EventCategory::Telemetry,
            TrackEvent::Status { .. } => EventCategory::Status,
            TrackEvent::NfcScan { .. } => EventCategory::NfcScan,
        }
    }

    /// Identity of the device or reader the event is attributed to.
    pub fn entity_id(&self) -> &str {
        match self {
            TrackEvent::Telemetry { device_id, .. } => device_id,
            TrackEvent::Status { device_id, .. } => device_id,
            TrackEvent::NfcScan { reader_id, .. } => reader_id,
        }
    }
}
