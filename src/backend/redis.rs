//! Redis cache backend.

use super::{CacheBackend, CacheLookup};
use crate::error::{Error, Result};
use deadpool_redis::{redis::AsyncCommands, Config as PoolConfig, Connection, Pool, Runtime};
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Override with the `REDIS_POOL_SIZE` environment variable.
const DEFAULT_POOL_SIZE: u32 = 16;

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl RedisConfig {
    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => format!(
                "redis://{}:{}@{}:{}/{}",
                username, password, self.host, self.port, self.database
            ),
            (None, Some(password)) => format!(
                "redis://default:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// Redis backend with connection pooling.
///
/// The gateway assumes the server is already reachable; a dead connection
/// surfaces as [`Error::CacheUnavailable`] on the first call and is absorbed
/// there.
///
/// # Example
///
/// ```no_run
/// # use entity_cache_gateway::backend::{CacheBackend, RedisBackend, RedisConfig};
/// # async fn example() -> entity_cache_gateway::Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default())?;
/// backend.set("user:1", b"value".to_vec(), None).await?;
/// let lookup = backend.get("user:1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create a backend from configuration.
    ///
    /// # Errors
    /// Returns `Err` if the pool cannot be built from the configuration.
    pub fn new(config: RedisConfig) -> Result<Self> {
        let backend = Self::with_pool_size(&config.connection_string(), config.pool_size)?;
        info!(
            "✓ Redis backend initialized: {}:{} (db {})",
            config.host, config.port, config.database
        );
        Ok(backend)
    }

    /// Create from connection string directly.
    ///
    /// Pool size comes from `REDIS_POOL_SIZE` when set, else the default (16).
    ///
    /// # Errors
    /// Returns `Err` if `REDIS_POOL_SIZE` is not a number or the pool cannot be built.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = match std::env::var("REDIS_POOL_SIZE") {
            Ok(raw) => raw.trim().parse::<u32>().map_err(|e| {
                Error::ConfigError(format!("REDIS_POOL_SIZE={:?} is not a number: {}", raw, e))
            })?,
            Err(_) => DEFAULT_POOL_SIZE,
        };

        let backend = Self::with_pool_size(conn_str, pool_size)?;
        info!(
            "✓ Redis backend initialized from connection string (pool size: {})",
            pool_size
        );
        Ok(backend)
    }

    fn with_pool_size(conn_str: &str, pool_size: u32) -> Result<Self> {
        let mut cfg = PoolConfig::from_url(conn_str);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_size as usize));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))?;

        Ok(RedisBackend { pool })
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::CacheUnavailable(format!("Failed to get Redis connection: {}", e)))
    }
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<CacheLookup<Vec<u8>>> {
        let mut conn = self.conn().await?;

        let value: Option<Vec<u8>> = conn.get(key).await.map_err(|e| {
            Error::CacheUnavailable(format!("Redis GET failed for key {}: {}", key, e))
        })?;

        if value.is_some() {
            debug!("✓ Redis GET {} -> HIT", key);
        } else {
            debug!("✓ Redis GET {} -> MISS", key);
        }

        Ok(value.into())
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn().await?;

        match ttl {
            Some(duration) => {
                // PSETEX rejects 0; clamp sub-millisecond ttls to the smallest valid one.
                let millis = duration.as_millis().clamp(1, u64::MAX as u128) as u64;
                conn.pset_ex::<_, _, ()>(key, value, millis)
                    .await
                    .map_err(|e| {
                        Error::CacheUnavailable(format!(
                            "Redis PSETEX failed for key {}: {}",
                            key, e
                        ))
                    })?;
                debug!("✓ Redis SET {} (TTL: {}ms)", key, millis);
            }
            None => {
                conn.set::<_, _, ()>(key, value).await.map_err(|e| {
                    Error::CacheUnavailable(format!("Redis SET failed for key {}: {}", key, e))
                })?;
                debug!("✓ Redis SET {}", key);
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;

        conn.del::<_, ()>(key).await.map_err(|e| {
            Error::CacheUnavailable(format!("Redis DEL failed for key {}: {}", key, e))
        })?;

        debug!("✓ Redis DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;

        conn.exists(key).await.map_err(|e| {
            Error::CacheUnavailable(format!("Redis EXISTS failed for key {}: {}", key, e))
        })
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn().await?;

        conn.del::<_, ()>(keys)
            .await
            .map_err(|e| Error::CacheUnavailable(format!("Redis DEL (bulk) failed: {}", e)))?;

        debug!("✓ Redis MDELETE {} keys", keys.len());
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.conn().await?;

        let pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::CacheUnavailable(format!("Redis PING failed: {}", e)))?;

        Ok(pong.contains("PONG"))
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn().await?;

        deadpool_redis::redis::cmd("FLUSHDB")
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| Error::CacheUnavailable(format!("Redis FLUSHDB failed: {}", e)))?;

        warn!("⚠ Redis FLUSHDB executed - all cache cleared!");
        Ok(())
    }
}
