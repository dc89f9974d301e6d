//! Cache reader: existence check, last-access refresh, image load

use chrono::Utc;
use image_store::{ImageStore, StoredImage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::metadata::MetadataStore;
use crate::stats::CacheCounters;
use crate::timeout::bounded;

pub struct CacheReader {
    metadata: Arc<dyn MetadataStore>,
    images: Arc<dyn ImageStore>,
    counters: Arc<CacheCounters>,
    timeout: Duration,
}

impl CacheReader {
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
        }
    }

    /// Load a cached image.
    ///
    /// Returns [`CacheError::NotFound`] when no record exists for `path`. On a
    /// hit the record's last access time is refreshed; a failed refresh is
    /// logged and counted but does not fail the read.
    pub async fn get(&self, path: &str) -> Result<StoredImage> {
        let key = CacheKey::new(path)?;
        debug!(key = %key, "Cache lookup");

        if !self.lookup(&key).await? {
            self.counters.miss();
            return Err(CacheError::NotFound(key.path().to_string()));
        }

        self.counters.hit();
        self.refresh(&key).await;

        bounded("load", &key, self.timeout, async {
            self.images
                .load(key.path())
                .await
                .map_err(|e| CacheError::Load(Box::new(e)))
        })
        .await
    }

    /// Whether a record exists for `path`, without refreshing it
    pub async fn contains(&self, path: &str) -> Result<bool> {
        let key = CacheKey::new(path)?;
        self.lookup(&key).await
    }

    async fn lookup(&self, key: &CacheKey) -> Result<bool> {
        bounded("exists", key, self.timeout, self.metadata.exists(key)).await
    }

    async fn refresh(&self, key: &CacheKey) {
        let now = Utc::now().timestamp();
        if let Err(e) = bounded("touch", key, self.timeout, self.metadata.touch(key, now)).await {
            self.counters.refresh_failure();
            warn!(key = %key, error = %e, "Failed to refresh last access");
        }
    }
}
