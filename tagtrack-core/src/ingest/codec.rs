//! Topic and payload decoding for inbound broker messages.
//!
//! Topic shape: `<namespace>/<entityId>/<kind>` where kind is one of
//! `telemetry`, `status`, `nfc`. Payloads are JSON objects. Anything
//! that does not match is rejected here, before it can touch shared
//! state.

use serde_json::{Map, Value};
use tagtrack_error::ingest::IngestError;
use tagtrack_models::constants::{KIND_NFC, KIND_STATUS, KIND_TELEMETRY};
use tagtrack_models::{DevicePatch, DeviceStatus, GeoPoint};

/// Message kind extracted from the topic's last segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Telemetry,
    Status,
    Nfc,
}

/// Parse `<namespace>/<entityId>/<kind>` into entity id and kind.
///
/// Returns None for topics outside our namespace or shape; the caller
/// treats those as foreign traffic, not as errors.
pub fn parse_topic<'t>(namespace: &str, topic: &'t str) -> Option<(&'t str, MessageKind)> {
    let rest = topic.strip_prefix(namespace)?.strip_prefix('/')?;
    let (entity, kind) = rest.split_once('/')?;
    if entity.is_empty() || kind.contains('/') {
        return None;
    }
    let kind = match kind {
        KIND_TELEMETRY => MessageKind::Telemetry,
        KIND_STATUS => MessageKind::Status,
        KIND_NFC => MessageKind::Nfc,
        _ => return None,
    };
    Some((entity, kind))
}

/// Decode a payload as a JSON object.
pub fn decode_payload(topic: &str, payload: &[u8]) -> Result<Map<String, Value>, IngestError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| IngestError::MalformedMessage {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(IngestError::MalformedMessage {
            topic: topic.to_string(),
            reason: format!("expected JSON object, got {}", json_type_name(&other)),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract the registry update carried by a decoded payload.
///
/// Battery, signal and location may arrive on any message kind; the
/// connectivity field is only honored on explicit status messages.
pub fn patch_from_payload(
    kind: MessageKind,
    topic: &str,
    payload: &Map<String, Value>,
) -> Result<DevicePatch, IngestError> {
    let mut patch = DevicePatch {
        battery: read_level(payload, "battery"),
        signal: read_level(payload, "signal"),
        location: read_location(payload),
        ..Default::default()
    };

    if kind == MessageKind::Status {
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::MalformedMessage {
                topic: topic.to_string(),
                reason: "status message without a `status` field".into(),
            })?;
        patch.status = Some(match status {
            "online" => DeviceStatus::Online,
            "offline" => DeviceStatus::Offline,
            other => {
                return Err(IngestError::MalformedMessage {
                    topic: topic.to_string(),
                    reason: format!("unknown status `{other}`"),
                })
            }
        });
    }

    Ok(patch)
}

/// Read a 0-100 level field, clamping out-of-range values.
fn read_level(payload: &Map<String, Value>, field: &str) -> Option<u8> {
    payload
        .get(field)
        .and_then(Value::as_u64)
        .map(|v| v.min(100) as u8)
}

fn read_location(payload: &Map<String, Value>) -> Option<GeoPoint> {
    let location = payload.get("location")?;
    Some(GeoPoint {
        lat: location.get("lat")?.as_f64()?,
        lng: location.get("lng")?.as_f64()?,
    })
}
