//! Tracing setup for processes embedding the cache

use tracing_subscriber::{prelude::*, EnvFilter};

use crate::error::{CacheError, Result};

/// Install the global tracing subscriber.
///
/// Honours `RUST_LOG` on top of `default_directive` (e.g.
/// `pixlserv_cache=info`). `LOG_FORMAT=json` switches to Stackdriver-style
/// JSON lines for Cloud Logging. Fails if a subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let env_filter = EnvFilter::from_default_env().add_directive(default_directive.parse()?);

    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .try_init()
            .map_err(|e| CacheError::Config(e.to_string()))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init()
            .map_err(|e| CacheError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_only_once() {
        assert!(init_tracing("pixlserv_cache=debug").is_ok());
        assert!(matches!(
            init_tracing("pixlserv_cache=debug"),
            Err(CacheError::Config(_))
        ));
    }
}
