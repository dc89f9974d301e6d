//! Pooled connection to the Redis metadata store
//!
//! One [`RedisConnection`] is opened at startup and shared (behind an `Arc`)
//! by every writer and reader. Each store command checks a connection out of
//! the pool, so concurrent callers never interleave commands on one socket.

use async_trait::async_trait;
use deadpool_redis::redis::{self, aio::ConnectionLike, ErrorKind, RedisError};
use deadpool_redis::{Pool, PoolConfig, PoolError, Runtime, Timeouts};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::metadata::{CacheRecord, MetadataStore, LAST_ACCESS_FIELD, SIZE_FIELD};

pub struct RedisConnection {
    pool: Pool,
    port: u16,
}

impl RedisConnection {
    /// Build the pool and verify the store answers `PING`.
    ///
    /// Fails with [`CacheError::Connection`] when the store cannot be reached
    /// within the configured timeout.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let url = config.redis_url();
        debug!(url = %url, pool_size = config.pool_size, "Opening metadata store pool");

        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts = Timeouts {
            wait: Some(config.timeout),
            create: Some(config.timeout),
            recycle: Some(config.timeout),
        };

        let mut redis_config = deadpool_redis::Config::from_url(url.clone());
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Connection(format!("{}: {}", url, e)))?;

        let connection = Self::from_pool(pool, config.redis_port);

        match tokio::time::timeout(config.timeout, connection.ping()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                connection.close();
                return Err(CacheError::Connection(format!("{}: {}", url, e)));
            }
            Err(_) => {
                connection.close();
                return Err(CacheError::Connection(format!(
                    "{}: no answer within {:?}",
                    url, config.timeout
                )));
            }
        }

        info!("Cache ready, using port {}", config.redis_port);
        Ok(connection)
    }

    fn from_pool(pool: Pool, port: u16) -> Self {
        Self { pool, port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| pool_error(e, "ping", ""))?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Close the pool. Idempotent; later operations fail with
    /// [`CacheError::Closed`].
    pub fn close(&self) {
        if !self.pool.is_closed() {
            info!("Closing redis connection for the cache");
            self.pool.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    async fn checkout(
        &self,
        operation: &'static str,
        key: &CacheKey,
    ) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| pool_error(e, operation, key.path()))
    }
}

impl Drop for RedisConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn pool_error(err: PoolError, operation: &'static str, key: &str) -> CacheError {
    match err {
        PoolError::Closed => CacheError::Closed,
        PoolError::Timeout(_) => CacheError::Timeout {
            operation,
            key: key.to_string(),
        },
        PoolError::Backend(e) => CacheError::Store(Box::new(e)),
        other => CacheError::Connection(other.to_string()),
    }
}

/// Refreshes `lastaccess` only while the hash exists, so a record purged
/// between `EXISTS` and the refresh is not recreated without its size
const TOUCH_SCRIPT: &str = "if redis.call('EXISTS', KEYS[1]) == 1 then \
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2]) return 1 end return 0";

#[async_trait]
impl MetadataStore for RedisConnection {
    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        let mut conn = self.checkout("exists", key).await?;
        exists_on(&mut conn, key).await
    }

    async fn record(&self, key: &CacheKey, record: &CacheRecord) -> Result<()> {
        let mut conn = self.checkout("record", key).await?;
        record_on(&mut conn, key, record).await
    }

    async fn touch(&self, key: &CacheKey, last_access: i64) -> Result<()> {
        let mut conn = self.checkout("touch", key).await?;
        if !touch_on(&mut conn, key, last_access).await? {
            debug!(key = %key, "Record vanished before refresh");
        }
        Ok(())
    }

    async fn fetch(&self, key: &CacheKey) -> Result<Option<CacheRecord>> {
        let mut conn = self.checkout("fetch", key).await?;
        fetch_on(&mut conn, key).await
    }
}

async fn exists_on<C: ConnectionLike + Send>(conn: &mut C, key: &CacheKey) -> Result<bool> {
    let exists: bool = redis::cmd("EXISTS")
        .arg(key.store_key())
        .query_async(conn)
        .await?;
    Ok(exists)
}

async fn record_on<C: ConnectionLike + Send>(
    conn: &mut C,
    key: &CacheKey,
    record: &CacheRecord,
) -> Result<()> {
    // One HSET carrying both fields, so the record is never half-written
    let _: () = redis::cmd("HSET")
        .arg(key.store_key())
        .arg(LAST_ACCESS_FIELD)
        .arg(record.last_access)
        .arg(SIZE_FIELD)
        .arg(record.size)
        .query_async(conn)
        .await?;
    Ok(())
}

/// Returns whether a record was there to refresh
async fn touch_on<C: ConnectionLike + Send>(
    conn: &mut C,
    key: &CacheKey,
    last_access: i64,
) -> Result<bool> {
    let refreshed: bool = redis::cmd("EVAL")
        .arg(TOUCH_SCRIPT)
        .arg(1)
        .arg(key.store_key())
        .arg(LAST_ACCESS_FIELD)
        .arg(last_access)
        .query_async(conn)
        .await?;
    Ok(refreshed)
}

async fn fetch_on<C: ConnectionLike + Send>(
    conn: &mut C,
    key: &CacheKey,
) -> Result<Option<CacheRecord>> {
    let fields: HashMap<String, String> = redis::cmd("HGETALL")
        .arg(key.store_key())
        .query_async(conn)
        .await?;
    parse_record(&fields)
}

/// Decode a record hash; an empty hash means no record
fn parse_record(fields: &HashMap<String, String>) -> Result<Option<CacheRecord>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let last_access = fields
        .get(LAST_ACCESS_FIELD)
        .and_then(|v| v.parse::<i64>().ok());
    let size = fields.get(SIZE_FIELD).and_then(|v| v.parse::<u64>().ok());

    match (last_access, size) {
        (Some(last_access), Some(size)) => Ok(Some(CacheRecord { last_access, size })),
        _ => Err(CacheError::Store(Box::new(RedisError::from((
            ErrorKind::TypeError,
            "incomplete cache record",
        ))))),
    }
}
