//! Entity trait for records managed by the gateway.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::hash::Hash;

/// A record managed by the gateway.
///
/// The gateway never inspects attributes beyond [`Entity::id`]; the rest of the
/// value is opaque and only needs to round-trip through serde.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use entity_cache_gateway::Entity;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub id: String,
///     pub name: String,
/// }
///
/// pub struct NewUser {
///     pub name: String,
/// }
///
/// #[derive(Default)]
/// pub struct UserPatch {
///     pub name: Option<String>,
/// }
///
/// impl Entity for User {
///     type Id = String;
///     type Draft = NewUser;
///     type Patch = UserPatch;
///
///     fn id(&self) -> Self::Id {
///         self.id.clone()
///     }
///
///     fn cache_prefix() -> &'static str {
///         "user"
///     }
///
///     fn collection_prefix() -> &'static str {
///         "users"
///     }
/// }
/// ```
pub trait Entity: Send + Sync + Serialize + DeserializeOwned + Clone {
    /// Identity assigned by the record store at creation.
    type Id: Display + Clone + Send + Sync + Eq + Hash + 'static;

    /// Creation payload. Carries no id.
    type Draft: Send;

    /// Partial update. Fields left unset keep their stored value.
    type Patch: Send;

    /// Return the entity's id.
    fn id(&self) -> Self::Id;

    /// Prefix for per-entity keys: `"{prefix}:{id}"`.
    fn cache_prefix() -> &'static str;

    /// Prefix for the collection snapshot key: `"{collection}:all"`.
    ///
    /// Must differ from [`Entity::cache_prefix`], or an entity with id `"all"`
    /// would collide with the snapshot.
    fn collection_prefix() -> &'static str;

    /// Optional: validate an entity decoded from cache.
    ///
    /// A failing entity is treated like a corrupt cache entry: it is evicted
    /// and the value is reloaded from the record store.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
