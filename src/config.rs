//! Gateway configuration: cache entry lifetimes.

use crate::error::{Error, Result};
use std::time::Duration;

/// Default lifetime of a per-entity entry (1 hour).
pub const DEFAULT_ITEM_TTL: Duration = Duration::from_secs(3600);

/// Default lifetime of the collection snapshot (30 minutes).
pub const DEFAULT_COLLECTION_TTL: Duration = Duration::from_secs(1800);

/// Environment variable overriding [`GatewayConfig::item_ttl`], in seconds.
pub const ITEM_TTL_ENV: &str = "CACHE_ITEM_TTL_SECS";

/// Environment variable overriding [`GatewayConfig::collection_ttl`], in seconds.
pub const COLLECTION_TTL_ENV: &str = "CACHE_COLLECTION_TTL_SECS";

/// TTL policy of an [`EntityCacheGateway`](crate::EntityCacheGateway).
///
/// # Example
///
/// ```
/// use entity_cache_gateway::GatewayConfig;
/// use std::time::Duration;
///
/// let config = GatewayConfig::default()
///     .with_item_ttl(Duration::from_secs(600))
///     .with_collection_ttl(Duration::from_secs(60));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Lifetime of `"{prefix}:{id}"` entries.
    pub item_ttl: Duration,
    /// Lifetime of the `"{collection}:all"` entry.
    pub collection_ttl: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            item_ttl: DEFAULT_ITEM_TTL,
            collection_ttl: DEFAULT_COLLECTION_TTL,
        }
    }
}

impl GatewayConfig {
    pub fn with_item_ttl(mut self, ttl: Duration) -> Self {
        self.item_ttl = ttl;
        self
    }

    pub fn with_collection_ttl(mut self, ttl: Duration) -> Self {
        self.collection_ttl = ttl;
        self
    }

    /// Defaults, overridden by `CACHE_ITEM_TTL_SECS` / `CACHE_COLLECTION_TTL_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` when a variable is set but is not a
    /// positive integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = GatewayConfig::default();

        if let Some(raw) = lookup(ITEM_TTL_ENV) {
            config.item_ttl = parse_secs(ITEM_TTL_ENV, &raw)?;
        }
        if let Some(raw) = lookup(COLLECTION_TTL_ENV) {
            config.collection_ttl = parse_secs(COLLECTION_TTL_ENV, &raw)?;
        }

        config.validate()?;
        debug!(
            "Gateway config: item ttl {:?}, collection ttl {:?}",
            config.item_ttl, config.collection_ttl
        );
        Ok(config)
    }

    /// Reject zero lifetimes; an entry that expires on write is never useful
    /// and Redis refuses it outright.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.item_ttl.is_zero() {
            return Err(Error::ConfigError("item_ttl must be non-zero".to_string()));
        }
        if self.collection_ttl.is_zero() {
            return Err(Error::ConfigError(
                "collection_ttl must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_secs(name: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| Error::ConfigError(format!("{}={:?} is not a number: {}", name, raw, e)))
}
