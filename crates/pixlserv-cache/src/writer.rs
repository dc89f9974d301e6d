//! Cache writer: persist the image, then record its metadata

use chrono::Utc;
use image_store::{DynamicImage, ImageFormat, ImageStore};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::metadata::{CacheRecord, MetadataStore};
use crate::stats::CacheCounters;
use crate::timeout::bounded;

pub struct CacheWriter {
    metadata: Arc<dyn MetadataStore>,
    images: Arc<dyn ImageStore>,
    counters: Arc<CacheCounters>,
    timeout: Duration,
    /// One lock per path with a `put` in flight
    key_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl CacheWriter {
    pub(crate) fn new(
        metadata: Arc<dyn MetadataStore>,
        images: Arc<dyn ImageStore>,
        counters: Arc<CacheCounters>,
        timeout: Duration,
    ) -> Self {
        Self {
            metadata,
            images,
            counters,
            timeout,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Add an image to the cache under `path`, returning its persisted size.
    ///
    /// The record is written only after the image store has accepted the
    /// bytes. A failed save returns [`CacheError::Persist`] and leaves no
    /// record behind. A failed record write after a successful save returns
    /// [`CacheError::MetadataWrite`]; the bytes stay in the image store without
    /// a record until the path is written again.
    ///
    /// A save that runs past the timeout returns [`CacheError::Timeout`], but
    /// the encode and the rename are not cancelled and may still land
    /// afterwards. That leaves the same bytes-without-record gap as a failed
    /// record write, without the counter.
    ///
    /// Puts to the same path within this writer run one at a time, so the
    /// recorded size always belongs to the bytes left on disk. Writers in
    /// other processes are not serialised.
    pub async fn put(&self, path: &str, image: &DynamicImage, format: ImageFormat) -> Result<u64> {
        let key = CacheKey::new(path)?;
        debug!(key = %key, ?format, "Adding to cache");

        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let size = bounded("save", &key, self.timeout, async {
            self.images
                .save(image, format, key.path())
                .await
                .map_err(|e| CacheError::Persist(Box::new(e)))
        })
        .await?;

        let record = CacheRecord {
            last_access: Utc::now().timestamp(),
            size,
        };

        if let Err(e) = bounded(
            "record",
            &key,
            self.timeout,
            self.metadata.record(&key, &record),
        )
        .await
        {
            self.counters.orphaned_write();
            error!(key = %key, size, error = %e, "Image persisted without a cache record");
            return Err(CacheError::MetadataWrite {
                key: key.path().to_string(),
                size,
                source: Box::new(e),
            });
        }

        self.counters.write();
        debug!(key = %key, size, "Added to cache");
        Ok(size)
    }

    async fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        if let Some(lock) = locks.get(key.path()).and_then(Weak::upgrade) {
            return lock;
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(key.path().to_string(), Arc::downgrade(&lock));
        lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MemoryMetadataStore;
    use image_store::FsImageStore;

    #[tokio::test]
    async fn test_key_locks_shared_per_path_and_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CacheWriter::new(
            Arc::new(MemoryMetadataStore::new()),
            Arc::new(FsImageStore::new(dir.path())),
            Arc::new(CacheCounters::default()),
            Duration::from_secs(5),
        );
        let cat = CacheKey::new("thumb/cat.png").unwrap();
        let dog = CacheKey::new("thumb/dog.png").unwrap();

        let first = writer.key_lock(&cat).await;
        let second = writer.key_lock(&cat).await;
        assert!(Arc::ptr_eq(&first, &second));

        drop(first);
        drop(second);
        let _dog = writer.key_lock(&dog).await;

        let locks = writer.key_locks.lock().await;
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key("thumb/dog.png"));
    }
}
