//! Bounded per-device history of recent telemetry samples.

use std::collections::{HashMap, VecDeque};
use tagtrack_models::constants::{DEFAULT_HISTORY_LIMIT, TELEMETRY_HISTORY_BOUND};
use tagtrack_models::TelemetrySample;
use tokio::sync::RwLock;

pub struct TelemetryStore {
    bound: usize,
    samples: RwLock<HashMap<String, VecDeque<TelemetrySample>>>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::with_bound(TELEMETRY_HISTORY_BOUND)
    }
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bound(bound: usize) -> Self {
        Self {
            bound,
            samples: RwLock::new(HashMap::new()),
        }
    }

    /// Append a sample to the device's history, evicting the oldest when
    /// the bound is reached. Takes ownership of the sample's payload.
    pub async fn append(&self, device_id: &str, sample: TelemetrySample) {
        let mut samples = self.samples.write().await;
        let history = samples.entry(device_id.to_string()).or_default();
        if history.len() >= self.bound {
            history.pop_front();
        }
        history.push_back(sample);
    }

    /// The most recent `limit` samples in chronological order.
    ///
    /// `limit` defaults to 50 and is capped at the store bound. Unknown
    /// devices yield an empty vec; the registry is built reactively from
    /// traffic, so a device nobody has heard from is not exceptional.
    pub async fn history(&self, device_id: &str, limit: Option<usize>) -> Vec<TelemetrySample> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(self.bound);
        let samples = self.samples.read().await;
        match samples.get(device_id) {
            Some(history) => {
                let skip = history.len().saturating_sub(limit);
                history.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample(device_id: &str, seq: u64) -> TelemetrySample {
        TelemetrySample {
            device_id: device_id.into(),
            payload: json!({ "seq": seq }),
            received_at: Utc::now(),
        }
    }

    fn seq_of(s: &TelemetrySample) -> u64 {
        s.payload["seq"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn history_is_chronological_and_limited() {
        let store = TelemetryStore::new();
        for seq in 0..10 {
            store.append("dev1", sample("dev1", seq)).await;
        }

        let recent = store.history("dev1", Some(3)).await;
        assert_eq!(recent.iter().map(seq_of).collect::<Vec<_>>(), vec![7, 8, 9]);

        // Default limit is 50, larger than what we inserted
        let all = store.history("dev1", None).await;
        assert_eq!(all.len(), 10);
    }

    #[tokio::test]
    async fn overflow_evicts_oldest_first() {
        let store = TelemetryStore::new();
        for seq in 0..250 {
            store.append("dev1", sample("dev1", seq)).await;
        }

        let full = store.history("dev1", Some(200)).await;
        assert_eq!(full.len(), 200);
        assert_eq!(seq_of(&full[0]), 50);
        assert_eq!(seq_of(&full[199]), 249);
    }

    #[tokio::test]
    async fn history_caps_limit_at_bound() {
        let store = TelemetryStore::with_bound(5);
        for seq in 0..8 {
            store.append("dev1", sample("dev1", seq)).await;
        }
        let capped = store.history("dev1", Some(1000)).await;
        assert_eq!(capped.len(), 5);
        assert_eq!(seq_of(&capped[0]), 3);
    }

    #[tokio::test]
    async fn unknown_device_yields_empty_history() {
        let store = TelemetryStore::new();
        assert!(store.history("ghost", Some(10)).await.is_empty());
    }

    #[tokio::test]
    async fn history_is_a_pure_read() {
        let store = TelemetryStore::new();
        for seq in 0..4 {
            store.append("dev1", sample("dev1", seq)).await;
        }
        let first = store.history("dev1", Some(10)).await;
        let second = store.history("dev1", Some(10)).await;
        assert_eq!(
            first.iter().map(seq_of).collect::<Vec<_>>(),
            second.iter().map(seq_of).collect::<Vec<_>>()
        );
    }
}
