//! Image cache facade over one metadata store and one image store

use image_store::{DynamicImage, FsImageStore, ImageFormat, ImageStore, StoredImage};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::connection::RedisConnection;
use crate::error::Result;
use crate::key::CacheKey;
use crate::metadata::{CacheRecord, MetadataStore};
use crate::reader::CacheReader;
use crate::stats::{CacheCounters, CacheStats};
use crate::timeout::bounded;
use crate::writer::CacheWriter;

/// Writer and reader sharing the same stores and counters.
///
/// All methods take `&self`; share one `ImageCache` across request handlers
/// behind an `Arc`.
pub struct ImageCache {
    writer: CacheWriter,
    reader: CacheReader,
    metadata: Arc<dyn MetadataStore>,
    counters: Arc<CacheCounters>,
    timeout: Duration,
    /// Set when the cache owns its Redis connection
    connection: Option<Arc<RedisConnection>>,
}

impl ImageCache {
    /// `timeout` bounds every individual store round-trip
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        images: Arc<dyn ImageStore>,
        timeout: Duration,
    ) -> Self {
        let counters = Arc::new(CacheCounters::default());
        Self {
            writer: CacheWriter::new(
                metadata.clone(),
                images.clone(),
                counters.clone(),
                timeout,
            ),
            reader: CacheReader::new(metadata.clone(), images, counters.clone(), timeout),
            metadata,
            counters,
            timeout,
            connection: None,
        }
    }

    /// Open Redis and a filesystem image store as described by `config`
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let connection = Arc::new(RedisConnection::open(config).await?);
        let images = Arc::new(FsImageStore::new(&config.image_dir));

        let mut cache = Self::new(connection.clone(), images, config.timeout);
        cache.connection = Some(connection);
        Ok(cache)
    }

    /// Close the owned Redis connection, if any. Later calls fail with
    /// [`crate::CacheError::Closed`].
    pub fn close(&self) {
        if let Some(connection) = &self.connection {
            connection.close();
        }
    }

    pub fn writer(&self) -> &CacheWriter {
        &self.writer
    }

    pub fn reader(&self) -> &CacheReader {
        &self.reader
    }

    pub async fn put(&self, path: &str, image: &DynamicImage, format: ImageFormat) -> Result<u64> {
        self.writer.put(path, image, format).await
    }

    pub async fn get(&self, path: &str) -> Result<StoredImage> {
        self.reader.get(path).await
    }

    pub async fn contains(&self, path: &str) -> Result<bool> {
        self.reader.contains(path).await
    }

    /// Current record for `path`, for inspection
    pub async fn record(&self, path: &str) -> Result<Option<CacheRecord>> {
        let key = CacheKey::new(path)?;
        bounded("fetch", &key, self.timeout, self.metadata.fetch(&key)).await
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}
