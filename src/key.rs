//! Cache key construction.

use crate::entity::Entity;

/// Suffix of the collection snapshot key.
pub const COLLECTION_SUFFIX: &str = "all";

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Key of a single entity: `"{prefix}:{id}"`.
    pub fn entity<T: Entity>(id: &T::Id) -> String {
        Self::build_with_prefix(T::cache_prefix(), id)
    }

    /// Key of the collection snapshot: `"{collection}:all"`.
    pub fn collection<T: Entity>() -> String {
        format!("{}:{}", T::collection_prefix(), COLLECTION_SUFFIX)
    }

    /// Build cache key with custom prefix.
    pub fn build_with_prefix(prefix: &str, id: &dyn std::fmt::Display) -> String {
        format!("{}:{}", prefix, id)
    }

    /// Split a key into prefix and remainder.
    ///
    /// Only the first `:` separates; ids containing `:` stay intact.
    pub fn parse(key: &str) -> Option<(&str, &str)> {
        key.split_once(':')
    }
}
