//! Read strategies for gateway lookups.
//!
//! | Strategy | Cache read | On miss / skip | Use case |
//! |----------|-----------|----------------|----------|
//! | **Refresh** | yes | store, then populate | Default cache-aside read |
//! | **Invalidate** | key deleted first | store, then populate | Caller suspects a stale entry |
//! | **Bypass** | no | store, then populate | Read-your-own-write outside the gateway |
//!
//! Writes never take a strategy: they always refresh the per-id entry and
//! invalidate the collection snapshot.

/// Strategy controlling how a read consults the cache.
///
/// ```
/// use entity_cache_gateway::ReadStrategy;
///
/// assert_eq!(ReadStrategy::default(), ReadStrategy::Refresh);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReadStrategy {
    /// Try cache first, fall back to the record store on miss and populate.
    #[default]
    Refresh,

    /// Delete the entry, then read through the store and repopulate.
    Invalidate,

    /// Skip the cache read; read the store and repopulate for other callers.
    Bypass,
}

impl std::fmt::Display for ReadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadStrategy::Refresh => write!(f, "Refresh"),
            ReadStrategy::Invalidate => write!(f, "Invalidate"),
            ReadStrategy::Bypass => write!(f, "Bypass"),
        }
    }
}
