//! pixlserv image cache core
//!
//! Decides whether a transformed image variant is already cached and records
//! new variants after they are persisted. Metadata (last access, size) lives
//! in Redis under `image:<path>`; the encoded bytes live in an
//! [`image_store::ImageStore`].
//!
//! Lifecycle: open one [`RedisConnection`] at startup, wrap it in an `Arc`,
//! build an [`ImageCache`] over it, and call [`RedisConnection::close`] on
//! shutdown (dropping the last handle closes it as well).

mod cache;
pub mod config;
mod connection;
mod error;
mod key;
mod metadata;
mod reader;
mod stats;
pub mod telemetry;
mod timeout;
mod writer;

pub use cache::ImageCache;
pub use config::CacheConfig;
pub use connection::RedisConnection;
pub use error::{CacheError, Result};
pub use key::{CacheKey, KEY_PREFIX};
pub use metadata::{CacheRecord, MemoryMetadataStore, MetadataStore};
pub use reader::CacheReader;
pub use stats::CacheStats;
pub use writer::CacheWriter;
