//! Metadata store seam and cache record type

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::key::CacheKey;

/// Hash field holding the last access time, in Unix seconds
pub const LAST_ACCESS_FIELD: &str = "lastaccess";
/// Hash field holding the persisted size, in bytes
pub const SIZE_FIELD: &str = "size";

/// Metadata kept for each cached image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub last_access: i64,
    pub size: u64,
}

/// Per-key metadata operations used by the cache writer and reader.
///
/// Implementations must be safe to call concurrently through `&self`, and
/// [`MetadataStore::record`] must set both fields in one step so a reader
/// never sees a record with only one of them.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn exists(&self, key: &CacheKey) -> Result<bool>;

    /// Create or overwrite the record for `key`
    async fn record(&self, key: &CacheKey, record: &CacheRecord) -> Result<()>;

    /// Set the last access time of an existing record. A missing record
    /// stays missing; nothing is created.
    async fn touch(&self, key: &CacheKey, last_access: i64) -> Result<()>;

    async fn fetch(&self, key: &CacheKey) -> Result<Option<CacheRecord>>;
}

/// In-process metadata store.
///
/// Used when no Redis is available (single-process deployments, tests).
/// Records live as long as the store.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: RwLock<HashMap<String, CacheRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.records.read().await.contains_key(key.store_key()))
    }

    async fn record(&self, key: &CacheKey, record: &CacheRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.store_key().to_string(), *record);
        Ok(())
    }

    async fn touch(&self, key: &CacheKey, last_access: i64) -> Result<()> {
        if let Some(record) = self.records.write().await.get_mut(key.store_key()) {
            record.last_access = last_access;
        }
        Ok(())
    }

    async fn fetch(&self, key: &CacheKey) -> Result<Option<CacheRecord>> {
        Ok(self.records.read().await.get(key.store_key()).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_record_serialization() {
        let record = CacheRecord {
            last_access: 1_700_000_000,
            size: 12345,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"lastAccess\":1700000000"));
        assert!(json.contains("\"size\":12345"));

        let deserialized: CacheRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, record);
    }

    #[tokio::test]
    async fn test_memory_store_record_and_touch() {
        let store = MemoryMetadataStore::new();
        let key = CacheKey::new("thumb/cat.jpg").unwrap();

        assert!(!store.exists(&key).await.unwrap());
        assert!(store.is_empty().await);

        store
            .record(&key, &CacheRecord { last_access: 100, size: 42 })
            .await
            .unwrap();
        assert!(store.exists(&key).await.unwrap());

        store.touch(&key, 200).await.unwrap();
        let record = store.fetch(&key).await.unwrap().unwrap();
        assert_eq!(record, CacheRecord { last_access: 200, size: 42 });
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_touch_missing_is_noop() {
        let store = MemoryMetadataStore::new();
        let key = CacheKey::new("thumb/missing.jpg").unwrap();

        store.touch(&key, 200).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        assert!(store.fetch(&key).await.unwrap().is_none());
    }
}
