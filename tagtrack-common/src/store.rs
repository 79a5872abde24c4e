use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Last-sighting record for a tagged asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// NFC tag identity as reported by readers
    pub tag_id: String,
    /// Reader that last detected the tag
    pub last_reader: String,
    pub last_seen_at: DateTime<Utc>,
    pub sighting_count: u64,
}

/// Persistence collaborator seam for asset records.
///
/// The ingestion pipeline records NFC sightings through this trait; the
/// document store behind it is external plumbing. Failures are the
/// implementation's problem to report, the ingestion path only logs them.
#[async_trait]
pub trait AssetStore: Send + Sync + 'static {
    /// Record that `tag_id` was detected by `reader_id`.
    async fn record_sighting(&self, tag_id: &str, reader_id: &str, at: DateTime<Utc>);

    /// Fetch the sighting record for one tag, if any.
    async fn find(&self, tag_id: &str) -> Option<AssetRecord>;

    /// All known sighting records.
    async fn list(&self) -> Vec<AssetRecord>;
}

/// In-memory asset store. The default when no document store is wired.
#[derive(Default)]
pub struct InMemoryAssetStore {
    records: DashMap<String, AssetRecord>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn record_sighting(&self, tag_id: &str, reader_id: &str, at: DateTime<Utc>) {
        self.records
            .entry(tag_id.to_string())
            .and_modify(|r| {
                r.last_reader = reader_id.to_string();
                r.last_seen_at = at;
                r.sighting_count += 1;
            })
            .or_insert_with(|| AssetRecord {
                tag_id: tag_id.to_string(),
                last_reader: reader_id.to_string(),
                last_seen_at: at,
                sighting_count: 1,
            });
    }

    async fn find(&self, tag_id: &str) -> Option<AssetRecord> {
        self.records.get(tag_id).map(|r| r.value().clone())
    }

    async fn list(&self) -> Vec<AssetRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sightings_accumulate_per_tag() {
        let store = InMemoryAssetStore::new();
        let now = Utc::now();
        store.record_sighting("tag-1", "reader-a", now).await;
        store.record_sighting("tag-1", "reader-b", now).await;

        let rec = store.find("tag-1").await.unwrap();
        assert_eq!(rec.sighting_count, 2);
        assert_eq!(rec.last_reader, "reader-b");
        assert!(store.find("tag-2").await.is_none());
        assert_eq!(store.list().await.len(), 1);
    }
}
