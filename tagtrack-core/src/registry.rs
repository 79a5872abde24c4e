//! In-memory registry of last-known device state.
//!
//! Single-writer/multiple-readers: the ingestion path is the only writer,
//! queries read concurrently. One lock guards the whole map: inserts of
//! new keys mutate the map structure itself, so per-device locking would
//! not be enough.

use chrono::Utc;
use std::collections::HashMap;
use tagtrack_models::{Device, DevicePatch, DeviceStatus, NetworkHealth};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a partial update into the device record, creating it if this
    /// identity has never been seen. Refreshes `last_seen` either way.
    pub async fn upsert(&self, device_id: &str, patch: DevicePatch) -> Device {
        let now = Utc::now();
        let mut devices = self.devices.write().await;
        let device = devices
            .entry(device_id.to_string())
            .or_insert_with(|| {
                debug!(device_id = %device_id, "registering new device");
                Device::new(device_id, now)
            });

        device.last_seen = now;
        if let Some(status) = patch.status {
            device.status = status;
        }
        if let Some(battery) = patch.battery {
            device.battery = Some(battery);
        }
        if let Some(signal) = patch.signal {
            device.signal = Some(signal);
        }
        if let Some(location) = patch.location {
            device.location = Some(location);
        }

        device.clone()
    }

    /// Snapshot of one device, or None for an unknown identity.
    pub async fn get(&self, device_id: &str) -> Option<Device> {
        self.devices.read().await.get(device_id).cloned()
    }

    /// Snapshot of every known device.
    pub async fn list(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    /// Aggregate connectivity and battery view.
    ///
    /// A device counts as online iff its most recent explicit status
    /// message said so; `last_seen` age is deliberately not consulted.
    /// An empty registry reports 100% online and no battery data.
    pub async fn health(&self) -> NetworkHealth {
        let devices = self.devices.read().await;
        let total = devices.len();
        let online = devices
            .values()
            .filter(|d| d.status == DeviceStatus::Online)
            .count();

        let batteries: Vec<f64> = devices
            .values()
            .filter_map(|d| d.battery.map(f64::from))
            .collect();

        NetworkHealth {
            total,
            online,
            offline: total - online,
            online_percentage: if total == 0 {
                100.0
            } else {
                online as f64 * 100.0 / total as f64
            },
            avg_battery_level: if batteries.is_empty() {
                None
            } else {
                Some(batteries.iter().sum::<f64>() / batteries.len() as f64)
            },
        }
    }
}
