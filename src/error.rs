//! Error types for the gateway.

use std::fmt;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the entity cache gateway.
///
/// Only two variants ever reach a caller of the gateway's CRUD operations:
/// [`Error::NotFound`] and [`Error::StoreUnavailable`]. Everything raised by the
/// cache side is advisory and gets absorbed by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The record store has no entity with the given id.
    ///
    /// Raised by `find_one`, `update` and `remove`. The id is carried in its
    /// display form. No cache mutation is performed when this is returned.
    NotFound(String),

    /// A record store call failed.
    ///
    /// Common causes:
    /// - Database connection lost
    /// - Query or constraint error
    /// - Storage server error
    ///
    /// Propagated immediately; the gateway never retries.
    StoreUnavailable(String),

    /// A cache backend call failed.
    ///
    /// Common causes:
    /// - Redis connection lost or pool exhausted
    /// - Network timeout
    /// - Backend protocol error
    ///
    /// **Recovery:** none needed. The gateway falls through to the record store
    /// on reads and logs-and-continues after writes.
    CacheUnavailable(String),

    /// Encoding an entity into cache bytes failed.
    SerializationError(String),

    /// Cache bytes could not be decoded into the expected type.
    ///
    /// **Recovery:** the entry is evicted and recomputed from the store.
    DeserializationError(String),

    /// Cache entry header is not ours (bad magic, truncated envelope).
    InvalidCacheEntry(String),

    /// Cache entry was written with a different schema version.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Entity failed its own validation after being read back from cache.
    ValidationError(String),

    /// Invalid gateway or backend configuration.
    ConfigError(String),

    /// Operation not supported by this backend.
    NotImplemented(String),

    /// Generic error with custom message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(id) => write!(f, "Entity not found: {}", id),
            Error::StoreUnavailable(msg) => write!(f, "Record store unavailable: {}", msg),
            Error::CacheUnavailable(msg) => write!(f, "Cache unavailable: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
