//! Versioned postcard envelopes for cache values.
//!
//! Every value the gateway writes to a cache backend, single entity or whole
//! collection snapshot, is wrapped like this:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (varint) │POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "ECGW"              u32                postcard::to_allocvec(T)
//! ```
//!
//! A value that fails either check is never returned to a caller. The gateway
//! evicts it and reloads from the record store.
//!
//! ```rust
//! use entity_cache_gateway::serialization::{decode, encode};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # fn main() -> entity_cache_gateway::Result<()> {
//! let users = vec![User { id: 1, name: "Alice".to_string() }];
//! let bytes = encode(&users)?;
//! let back: Vec<User> = decode(&bytes)?;
//! assert_eq!(users, back);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Magic header of gateway cache values.
pub const CACHE_MAGIC: [u8; 4] = *b"ECGW";

/// Current schema version.
///
/// Bump when the serialized shape of cached entities changes. Entries written
/// under another version are evicted on first read.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Envelope around every cached payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    pub magic: [u8; 4],
    pub version: u32,
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Encode a value for cache storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if postcard rejects the value.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(&CacheEnvelope::new(value)).map_err(|e| {
        error!("Cache serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Decode a cache value, checking magic and schema version.
///
/// # Errors
///
/// - `Error::DeserializationError`: envelope or payload does not parse
/// - `Error::InvalidCacheEntry`: magic header mismatch
/// - `Error::VersionMismatch`: written under another schema version
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        debug!("Cache deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != CACHE_MAGIC {
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct Note {
        id: u64,
        body: String,
    }

    fn note() -> Note {
        Note {
            id: 9,
            body: "remember the milk".to_string(),
        }
    }

    #[test]
    fn test_collection_roundtrip_preserves_order() {
        let notes = vec![
            Note {
                id: 3,
                body: "c".into(),
            },
            Note {
                id: 1,
                body: "a".into(),
            },
        ];

        let bytes = encode(&notes).unwrap();
        let back: Vec<Note> = decode(&bytes).unwrap();

        assert_eq!(back, notes);
    }

    #[test]
    fn test_envelope_structure() {
        let bytes = encode(&note()).unwrap();
        let envelope: CacheEnvelope<Note> = postcard::from_bytes(&bytes).unwrap();

        assert_eq!(envelope.magic, CACHE_MAGIC);
        assert_eq!(envelope.version, CURRENT_SCHEMA_VERSION);
        assert_eq!(envelope.payload, note());
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let envelope = CacheEnvelope {
            magic: *b"XXXX",
            version: CURRENT_SCHEMA_VERSION,
            payload: note(),
        };
        let bytes = postcard::to_allocvec(&envelope).unwrap();

        match decode::<Note>(&bytes) {
            Err(Error::InvalidCacheEntry(_)) => {}
            other => panic!("Expected InvalidCacheEntry, got {:?}", other),
        }
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut envelope = CacheEnvelope::new(note());
        envelope.version = 999;
        let bytes = postcard::to_allocvec(&envelope).unwrap();

        match decode::<Note>(&bytes) {
            Err(Error::VersionMismatch { expected, found }) => {
                assert_eq!(expected, CURRENT_SCHEMA_VERSION);
                assert_eq!(found, 999);
            }
            other => panic!("Expected VersionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut bytes = encode(&note()).unwrap();
        bytes.truncate(bytes.len() / 2);

        assert!(matches!(
            decode::<Note>(&bytes),
            Err(Error::DeserializationError(_))
        ));
    }

    #[test]
    fn test_foreign_bytes_rejected() {
        // Plain text someone else put under our key.
        assert!(decode::<Note>(b"hello").is_err());
    }
}
