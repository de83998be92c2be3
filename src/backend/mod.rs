//! Cache backend implementations.

use crate::error::Result;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Outcome of a cache lookup.
///
/// A backend reports absence explicitly instead of handing back an empty or
/// falsy value, so an entity that legitimately serializes to something
/// "empty-looking" is still a hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<V> {
    /// Key present and not expired.
    Hit(V),
    /// Key absent or expired.
    Miss,
}

impl<V> CacheLookup<V> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn into_option(self) -> Option<V> {
        match self {
            CacheLookup::Hit(v) => Some(v),
            CacheLookup::Miss => None,
        }
    }
}

impl<V> From<Option<V>> for CacheLookup<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(v) => CacheLookup::Hit(v),
            None => CacheLookup::Miss,
        }
    }
}

/// Trait for cache backend implementations (the Cache Store).
///
/// All methods take `&self`; implementations use interior mutability or an
/// external server. Failures should be reported as
/// [`Error::CacheUnavailable`](crate::Error::CacheUnavailable).
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve value by key.
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached.
    async fn get(&self, key: &str) -> Result<CacheLookup<Vec<u8>>>;

    /// Store value, overwriting any previous entry for `key`.
    ///
    /// `ttl = None` means no expiry.
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove value. Deleting an absent key is not an error.
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if key exists.
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_hit())
    }

    /// Bulk delete. Default implementation calls `delete()` for each key.
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached.
    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Health check, for readiness probes.
    ///
    /// # Errors
    /// Returns `Err` if the backend is not accessible.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Clear the whole cache (use with caution).
    ///
    /// # Errors
    /// Returns `Err` if not implemented or the backend fails.
    async fn clear_all(&self) -> Result<()> {
        Err(crate::error::Error::NotImplemented(
            "clear_all not implemented for this backend".to_string(),
        ))
    }
}
