//! Cache configuration parsed from environment variables

use std::path::PathBuf;
use std::time::Duration;

pub const REDIS_PORT_ENV: &str = "PIXLSERV_REDIS_PORT";
pub const REDIS_HOST_ENV: &str = "PIXLSERV_REDIS_HOST";
pub const POOL_SIZE_ENV: &str = "PIXLSERV_REDIS_POOL_SIZE";
pub const TIMEOUT_ENV: &str = "PIXLSERV_CACHE_TIMEOUT_MS";
pub const IMAGE_DIR_ENV: &str = "PIXLSERV_IMAGE_DIR";

pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
pub const DEFAULT_POOL_SIZE: usize = 16;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_IMAGE_DIR: &str = "./local-cache";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_host: String,
    pub redis_port: u16,
    /// Maximum pooled connections to Redis
    pub pool_size: usize,
    /// Upper bound for every store round-trip
    pub timeout: Duration,
    pub image_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_host: DEFAULT_REDIS_HOST.to_string(),
            redis_port: DEFAULT_REDIS_PORT,
            pool_size: DEFAULT_POOL_SIZE,
            timeout: DEFAULT_TIMEOUT,
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
        }
    }
}

impl CacheConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse configuration through `lookup`.
    ///
    /// Absent, non-numeric and zero values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let redis_port = lookup(REDIS_PORT_ENV)
            .and_then(|s| s.trim().parse::<u16>().ok())
            .filter(|&p| p != 0)
            .unwrap_or(DEFAULT_REDIS_PORT);

        let redis_host = lookup(REDIS_HOST_ENV)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string());

        let pool_size = lookup(POOL_SIZE_ENV)
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_POOL_SIZE);

        let timeout = lookup(TIMEOUT_ENV)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let image_dir = lookup(IMAGE_DIR_ENV)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_DIR));

        Self {
            redis_host,
            redis_port,
            pool_size,
            timeout,
            image_dir,
        }
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }
}
