//! Error types for the pixlserv cache

use deadpool_redis::redis::RedisError;
use image_store::ImageStoreError;
use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// Metadata store unreachable when opening the connection
    Connection(String),
    /// A metadata store command failed on an established connection
    Store(Box<RedisError>),
    /// No cache record for the path
    NotFound(String),
    /// The image store failed to save; no record was written
    Persist(Box<ImageStoreError>),
    /// The image store failed to load bytes for a recorded path
    Load(Box<ImageStoreError>),
    /// The image was persisted but its cache record could not be written
    MetadataWrite {
        key: String,
        size: u64,
        source: Box<CacheError>,
    },
    Timeout {
        operation: &'static str,
        key: String,
    },
    /// The connection was used after `close`
    Closed,
    InvalidKey(String),
    Config(String),
}

impl CacheError {
    /// Cache misses are expected and mean "recompute"
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Connection(msg) => write!(f, "Connection error: {}", msg),
            CacheError::Store(err) => write!(f, "Store error: {}", err),
            CacheError::NotFound(key) => write!(f, "Image not found in cache: {}", key),
            CacheError::Persist(err) => write!(f, "Persist error: {}", err),
            CacheError::Load(err) => write!(f, "Load error: {}", err),
            CacheError::MetadataWrite { key, size, source } => write!(
                f,
                "Metadata write error for {} ({} bytes persisted): {}",
                key, size, source
            ),
            CacheError::Timeout { operation, key } => {
                write!(f, "Timed out during {} for {}", operation, key)
            }
            CacheError::Closed => write!(f, "Metadata store connection is closed"),
            CacheError::InvalidKey(msg) => write!(f, "Invalid cache key: {}", msg),
            CacheError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Store(err) => Some(err.as_ref()),
            CacheError::Persist(err) => Some(err.as_ref()),
            CacheError::Load(err) => Some(err.as_ref()),
            CacheError::MetadataWrite { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        CacheError::Store(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for CacheError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        CacheError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
