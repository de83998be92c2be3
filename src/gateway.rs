//! Entity cache gateway: coherent cache-aside CRUD over one collection.
//!
//! Reads check the cache, fall back to the record store on a miss and
//! populate the cache on the way out. Writes go to the record store first;
//! only after it succeeds is the affected `"{prefix}:{id}"` entry refreshed
//! (or dropped) and the `"{collection}:all"` snapshot invalidated.
//!
//! The record store is the source of truth. Cache failures never fail an
//! operation: reads fall through to the store, and cache errors after a
//! successful persist are logged and swallowed.
//!
//! # Concurrency
//!
//! Operations take `&self`, hold no locks and may run concurrently from any
//! number of tasks. Steps within one operation run strictly in order; across
//! operations there is no ordering, so coherence is eventual:
//!
//! - A read miss racing an `update`/`remove` can write back a value that the
//!   write has just superseded. It stays until its ttl expires or the next
//!   write to that id invalidates it.
//! - Concurrent writers to one id each refresh the entry independently; the
//!   last cache write wins, and matches the last store write only if the store
//!   serializes those writes itself.
//! - Concurrent misses on one key each read the store (no single-flight).
//!
//! Unknown ids are never cached as absent, so an entity created right after a
//! failed lookup is visible immediately.

use crate::backend::{CacheBackend, CacheLookup};
use crate::config::GatewayConfig;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::repository::RecordStore;
use crate::serialization;
use crate::strategy::ReadStrategy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache-aside gateway for entities of type `T`.
///
/// Clones are cheap and share the record store, the backend and the metrics
/// sink.
///
/// # Example
///
/// ```ignore
/// use entity_cache_gateway::{EntityCacheGateway, backend::InMemoryBackend};
/// use std::sync::Arc;
///
/// let gateway = EntityCacheGateway::new(Arc::new(user_store), InMemoryBackend::new());
///
/// let user = gateway.create(NewUser { name: "Ada".into() }).await?;
/// let same = gateway.find_one(&user.id).await?; // served from cache
/// gateway.update(&user.id, UserPatch { name: Some("Grace".into()) }).await?;
/// gateway.remove(&user.id).await?;
/// ```
pub struct EntityCacheGateway<T, R, B>
where
    T: Entity,
    R: RecordStore<T>,
    B: CacheBackend,
{
    store: Arc<R>,
    backend: B,
    config: GatewayConfig,
    metrics: Arc<dyn CacheMetrics>,
    collection_key: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T, R, B> Clone for EntityCacheGateway<T, R, B>
where
    T: Entity,
    R: RecordStore<T>,
    B: CacheBackend,
{
    fn clone(&self) -> Self {
        EntityCacheGateway {
            store: Arc::clone(&self.store),
            backend: self.backend.clone(),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
            collection_key: self.collection_key.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T, R, B> EntityCacheGateway<T, R, B>
where
    T: Entity,
    R: RecordStore<T>,
    B: CacheBackend,
{
    /// Create a gateway over an already-connected store and backend, with the
    /// default ttls (item 1h, collection 30min).
    ///
    /// `T::cache_prefix()` and `T::collection_prefix()` must differ, otherwise
    /// an entity with id `"all"` would share the collection snapshot key.
    pub fn new(store: Arc<R>, backend: B) -> Self {
        debug_assert_ne!(
            T::cache_prefix(),
            T::collection_prefix(),
            "entity and collection key prefixes must differ"
        );
        EntityCacheGateway {
            store,
            backend,
            config: GatewayConfig::default(),
            metrics: Arc::new(NoOpMetrics),
            collection_key: CacheKeyBuilder::collection::<T>(),
            _entity: PhantomData,
        }
    }

    /// Replace the ttl configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the configuration does not validate.
    pub fn with_config(mut self, config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Install a metrics sink.
    pub fn with_metrics<M: CacheMetrics + 'static>(mut self, metrics: M) -> Self {
        self.metrics = Arc::new(metrics);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get record store reference (for advanced use).
    pub fn store(&self) -> &R {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Persist a new entity and cache it.
    ///
    /// After the store assigns an id, `"{prefix}:{id}"` is set with the item
    /// ttl and the collection snapshot is dropped.
    ///
    /// # Errors
    ///
    /// `Error::StoreUnavailable` if the store write fails; the cache is not
    /// touched in that case.
    pub async fn create(&self, draft: T::Draft) -> Result<T> {
        let created = self
            .store
            .create(draft)
            .await
            .map_err(store_failure("create"))?;

        let key = CacheKeyBuilder::entity::<T>(&created.id());
        self.refresh(&key, &created, self.config.item_ttl).await;
        self.evict(&self.collection_key).await;

        info!("✓ Created {}", key);
        Ok(created)
    }

    /// Merge `patch` into the stored entity and refresh its cache entry.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the id is unknown (no cache mutation)
    /// - `Error::StoreUnavailable` if the store call fails (no cache mutation)
    pub async fn update(&self, id: &T::Id, patch: T::Patch) -> Result<T> {
        let updated = self
            .store
            .preload_and_merge(id, patch)
            .await
            .map_err(store_failure("preload_and_merge"))?
            .ok_or_else(|| not_found(id))?;

        let key = CacheKeyBuilder::entity::<T>(id);
        self.refresh(&key, &updated, self.config.item_ttl).await;
        self.evict(&self.collection_key).await;

        info!("✓ Updated {}", key);
        Ok(updated)
    }

    /// Delete the entity, then drop its entry and the collection snapshot.
    ///
    /// The store delete completes before either cache delete is issued.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the id is unknown (no cache mutation)
    /// - `Error::StoreUnavailable` if a store call fails
    pub async fn remove(&self, id: &T::Id) -> Result<()> {
        if self
            .store
            .find_one(id)
            .await
            .map_err(store_failure("find_one"))?
            .is_none()
        {
            return Err(not_found(id));
        }

        self.store
            .delete(id)
            .await
            .map_err(store_failure("delete"))?;

        let key = CacheKeyBuilder::entity::<T>(id);
        self.evict(&key).await;
        self.evict(&self.collection_key).await;

        info!("✓ Removed {}", key);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Every entity, served from the collection snapshot when present.
    ///
    /// # Errors
    ///
    /// `Error::StoreUnavailable` if the cache misses and the store read fails.
    pub async fn find_all(&self) -> Result<Vec<T>> {
        self.find_all_with(ReadStrategy::Refresh).await
    }

    /// [`find_all`](Self::find_all) with an explicit read strategy.
    ///
    /// # Errors
    ///
    /// `Error::StoreUnavailable` if the store read fails.
    pub async fn find_all_with(&self, strategy: ReadStrategy) -> Result<Vec<T>> {
        let key = &self.collection_key;
        let timer = Instant::now();
        debug!("» find_all {} (strategy: {})", key, strategy);

        if let Some(cached) = self.lookup::<Vec<T>>(key, strategy, validate_all::<T>).await {
            self.metrics.record_hit(key, timer.elapsed());
            return Ok(cached);
        }

        self.metrics.record_miss(key, timer.elapsed());

        let all = self
            .store
            .find_all()
            .await
            .map_err(store_failure("find_all"))?;

        self.refresh(key, &all, self.config.collection_ttl).await;
        Ok(all)
    }

    /// One entity, served from its cache entry when present.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the store has no such entity. Absence is not
    ///   cached.
    /// - `Error::StoreUnavailable` if the cache misses and the store read fails.
    pub async fn find_one(&self, id: &T::Id) -> Result<T> {
        self.find_one_with(id, ReadStrategy::Refresh).await
    }

    /// [`find_one`](Self::find_one) with an explicit read strategy.
    ///
    /// With [`ReadStrategy::Invalidate`] the entry is deleted before the store
    /// is consulted, even if the store then reports the id unknown.
    ///
    /// # Errors
    ///
    /// Same as [`find_one`](Self::find_one).
    pub async fn find_one_with(&self, id: &T::Id, strategy: ReadStrategy) -> Result<T> {
        let key = CacheKeyBuilder::entity::<T>(id);
        let timer = Instant::now();
        debug!("» find_one {} (strategy: {})", key, strategy);

        if let Some(cached) = self.lookup::<T>(&key, strategy, T::validate).await {
            self.metrics.record_hit(&key, timer.elapsed());
            return Ok(cached);
        }

        self.metrics.record_miss(&key, timer.elapsed());

        let entity = self
            .store
            .find_one(id)
            .await
            .map_err(store_failure("find_one"))?
            .ok_or_else(|| not_found(id))?;

        self.refresh(&key, &entity, self.config.item_ttl).await;
        Ok(entity)
    }

    // ------------------------------------------------------------------------
    // Cache plumbing. Nothing below returns an error: every failure is logged,
    // reported to metrics and absorbed.
    // ------------------------------------------------------------------------

    /// Apply the strategy's cache step. `Some` only on a usable hit.
    async fn lookup<V: DeserializeOwned>(
        &self,
        key: &str,
        strategy: ReadStrategy,
        check: fn(&V) -> Result<()>,
    ) -> Option<V> {
        match strategy {
            ReadStrategy::Refresh => self.read_cached(key, check).await,
            ReadStrategy::Invalidate => {
                self.evict(key).await;
                None
            }
            ReadStrategy::Bypass => {
                debug!("Bypassing cache read for {}", key);
                None
            }
        }
    }

    async fn read_cached<V: DeserializeOwned>(
        &self,
        key: &str,
        check: fn(&V) -> Result<()>,
    ) -> Option<V> {
        let bytes = match self.backend.get(key).await {
            Ok(CacheLookup::Hit(bytes)) => bytes,
            Ok(CacheLookup::Miss) => {
                debug!("✗ Cache miss for {}, falling back to record store", key);
                return None;
            }
            Err(e) => {
                self.absorb(key, "read", &e);
                return None;
            }
        };

        match serialization::decode::<V>(&bytes).and_then(|value| check(&value).map(|_| value)) {
            Ok(value) => {
                debug!("✓ Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                // Unusable entry: drop it so the store read below replaces it.
                self.absorb(key, "decode", &e);
                self.evict(key).await;
                None
            }
        }
    }

    /// Set `key`; if that fails, delete it so no older value stays behind.
    async fn refresh<V: Serialize>(&self, key: &str, value: &V, ttl: Duration) {
        let timer = Instant::now();
        let result = match serialization::encode(value) {
            Ok(bytes) => self.backend.set(key, bytes, Some(ttl)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => self.metrics.record_set(key, timer.elapsed()),
            Err(e) => {
                self.absorb(key, "set", &e);
                self.evict(key).await;
            }
        }
    }

    async fn evict(&self, key: &str) {
        let timer = Instant::now();
        match self.backend.delete(key).await {
            Ok(()) => self.metrics.record_delete(key, timer.elapsed()),
            Err(e) => self.absorb(key, "delete", &e),
        }
    }

    fn absorb(&self, key: &str, step: &str, error: &Error) {
        warn!("⚠ Cache {} failed for {} (ignored): {}", step, key, error);
        self.metrics.record_error(key, &error.to_string());
    }
}

#[allow(clippy::ptr_arg)]
fn validate_all<T: Entity>(all: &Vec<T>) -> Result<()> {
    all.iter().try_for_each(T::validate)
}

fn not_found<I: std::fmt::Display>(id: &I) -> Error {
    debug!("Entity {} not found in record store", id);
    Error::NotFound(id.to_string())
}

/// Normalize any record store failure to `StoreUnavailable`.
fn store_failure(op: &'static str) -> impl FnOnce(Error) -> Error {
    move |e| {
        warn!("✗ Record store {} failed: {}", op, e);
        match e {
            Error::StoreUnavailable(_) => e,
            other => Error::StoreUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::repository::{InMemoryRecordStore, MemoryRecord};
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: u64,
        label: String,
    }

    impl Entity for Item {
        type Id = u64;
        type Draft = String;
        type Patch = String;

        fn id(&self) -> Self::Id {
            self.id
        }

        fn cache_prefix() -> &'static str {
            "entity"
        }

        fn collection_prefix() -> &'static str {
            "entities"
        }
    }

    impl MemoryRecord for Item {
        fn assign_id(seq: u64) -> u64 {
            seq
        }

        fn from_draft(id: u64, label: String) -> Self {
            Item { id, label }
        }

        fn merge(&mut self, label: String) {
            self.label = label;
        }
    }

    type TestGateway = EntityCacheGateway<Item, InMemoryRecordStore<Item>, InMemoryBackend>;

    fn gateway() -> (TestGateway, Arc<InMemoryRecordStore<Item>>, InMemoryBackend) {
        let store = Arc::new(InMemoryRecordStore::new());
        let backend = InMemoryBackend::new();
        let gateway = EntityCacheGateway::new(Arc::clone(&store), backend.clone());
        (gateway, store, backend)
    }

    async fn cached<V: DeserializeOwned>(backend: &InMemoryBackend, key: &str) -> Option<V> {
        backend
            .get(key)
            .await
            .unwrap()
            .into_option()
            .map(|bytes| serialization::decode(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_create_caches_item_and_drops_collection() {
        let (gateway, _store, backend) = gateway();
        let empty = serialization::encode(&Vec::<Item>::new()).unwrap();
        backend.set("entities:all", empty, None).await.unwrap();

        let item = gateway.create("first".to_string()).await.unwrap();

        assert_eq!(cached::<Item>(&backend, "entity:1").await, Some(item));
        assert!(!backend.exists("entities:all").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_uses_item_ttl() {
        let (gateway, _store, backend) = gateway();
        let gateway = gateway
            .with_config(GatewayConfig::default().with_item_ttl(Duration::from_secs(60)))
            .unwrap();

        gateway.create("ttl".to_string()).await.unwrap();

        let remaining = backend.ttl_remaining("entity:1").expect("entry has a ttl");
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_find_one_miss_populates_then_hits() {
        let (gateway, store, backend) = gateway();
        store
            .put(Item {
                id: 7,
                label: "seeded".into(),
            })
            .await;

        let first = gateway.find_one(&7).await.unwrap();
        let second = gateway.find_one(&7).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.calls().find_one, 1);
        assert!(backend.exists("entity:7").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_one_unknown_is_not_found_and_not_cached() {
        let (gateway, store, backend) = gateway();

        let err = gateway.find_one(&404).await.unwrap_err();
        assert_eq!(err, Error::NotFound("404".to_string()));
        assert!(backend.is_empty());

        // A later create under that id is visible at once.
        store
            .put(Item {
                id: 404,
                label: "late".into(),
            })
            .await;
        assert_eq!(gateway.find_one(&404).await.unwrap().label, "late");
    }

    #[tokio::test]
    async fn test_find_all_caches_snapshot_with_collection_ttl() {
        let (gateway, store, backend) = gateway();
        gateway.create("a".to_string()).await.unwrap();
        gateway.create("b".to_string()).await.unwrap();

        let first = gateway.find_all().await.unwrap();
        let second = gateway.find_all().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.calls().find_all, 1);
        let remaining = backend.ttl_remaining("entities:all").unwrap();
        assert!(remaining <= Duration::from_secs(1800));
        assert!(remaining > Duration::from_secs(1790));
    }

    #[tokio::test]
    async fn test_update_refreshes_item_and_drops_collection() {
        let (gateway, _store, backend) = gateway();
        let item = gateway.create("old".to_string()).await.unwrap();
        gateway.find_all().await.unwrap();

        let updated = gateway.update(&item.id, "new".to_string()).await.unwrap();

        assert_eq!(updated.label, "new");
        assert_eq!(cached::<Item>(&backend, "entity:1").await, Some(updated));
        assert!(!backend.exists("entities:all").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_unknown_touches_nothing() {
        let (gateway, _store, backend) = gateway();
        gateway.create("keep".to_string()).await.unwrap();
        gateway.find_all().await.unwrap();
        let before = backend.len();

        let err = gateway.update(&9, "nope".to_string()).await.unwrap_err();

        assert_eq!(err, Error::NotFound("9".to_string()));
        assert_eq!(backend.len(), before);
        assert!(backend.exists("entities:all").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_evicts_both_keys() {
        let (gateway, store, backend) = gateway();
        let item = gateway.create("gone".to_string()).await.unwrap();
        gateway.find_all().await.unwrap();

        gateway.remove(&item.id).await.unwrap();

        assert!(store.is_empty().await);
        assert!(backend.is_empty());
        assert!(matches!(
            gateway.find_one(&item.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_unknown_is_not_found() {
        let (gateway, store, _backend) = gateway();

        let err = gateway.remove(&3).await.unwrap_err();

        assert_eq!(err, Error::NotFound("3".to_string()));
        assert_eq!(store.calls().delete, 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_evicted_and_reloaded() {
        let (gateway, store, backend) = gateway();
        store
            .put(Item {
                id: 1,
                label: "truth".into(),
            })
            .await;
        backend
            .set("entity:1", b"garbage".to_vec(), None)
            .await
            .unwrap();

        let item = gateway.find_one(&1).await.unwrap();

        assert_eq!(item.label, "truth");
        assert_eq!(cached::<Item>(&backend, "entity:1").await, Some(item));
    }

    #[tokio::test]
    async fn test_bypass_reads_store_and_repopulates() {
        let (gateway, store, backend) = gateway();
        let item = gateway.create("cached".to_string()).await.unwrap();

        // Out-of-band store write the cache does not know about.
        store
            .put(Item {
                id: item.id,
                label: "changed".into(),
            })
            .await;
        assert_eq!(gateway.find_one(&item.id).await.unwrap().label, "cached");

        let fresh = gateway
            .find_one_with(&item.id, ReadStrategy::Bypass)
            .await
            .unwrap();

        assert_eq!(fresh.label, "changed");
        assert_eq!(cached::<Item>(&backend, "entity:1").await, Some(fresh));
    }

    #[tokio::test]
    async fn test_invalidate_drops_entry_even_when_unknown() {
        let (gateway, _store, backend) = gateway();
        let stale = Item {
            id: 5,
            label: "stale".into(),
        };
        backend
            .set("entity:5", serialization::encode(&stale).unwrap(), None)
            .await
            .unwrap();

        let err = gateway
            .find_one_with(&5, ReadStrategy::Invalidate)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (gateway, _store, _backend) = gateway();
        let result = gateway.with_config(GatewayConfig::default().with_item_ttl(Duration::ZERO));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[derive(Clone, Serialize, Deserialize)]
    struct SamePrefix {
        id: String,
    }

    impl Entity for SamePrefix {
        type Id = String;
        type Draft = String;
        type Patch = String;

        fn id(&self) -> Self::Id {
            self.id.clone()
        }

        fn cache_prefix() -> &'static str {
            "thing"
        }

        fn collection_prefix() -> &'static str {
            "thing"
        }
    }

    impl MemoryRecord for SamePrefix {
        fn assign_id(seq: u64) -> String {
            seq.to_string()
        }

        fn from_draft(id: String, _draft: String) -> Self {
            SamePrefix { id }
        }

        fn merge(&mut self, _patch: String) {}
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "prefixes must differ")]
    fn test_identical_prefixes_rejected() {
        let store = Arc::new(InMemoryRecordStore::<SamePrefix>::new());
        let _ = EntityCacheGateway::new(store, InMemoryBackend::new());
    }

    #[derive(Default)]
    struct MissCounter(std::sync::atomic::AtomicUsize);

    impl CacheMetrics for Arc<MissCounter> {
        fn record_miss(&self, _key: &str, _duration: Duration) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_miss_counted_even_when_store_read_fails() {
        let (gateway, store, _backend) = gateway();
        let misses = Arc::new(MissCounter::default());
        let gateway = gateway.with_metrics(Arc::clone(&misses));

        assert!(matches!(
            gateway.find_one(&42).await,
            Err(Error::NotFound(_))
        ));
        store.set_unavailable(true);
        assert!(matches!(
            gateway.find_all().await,
            Err(Error::StoreUnavailable(_))
        ));

        assert_eq!(misses.0.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_store_failure_normalizes() {
        let e = store_failure("find_one")(Error::Other("socket closed".into()));
        assert_eq!(
            e,
            Error::StoreUnavailable("Error: socket closed".to_string())
        );

        let e = store_failure("create")(Error::StoreUnavailable("down".into()));
        assert_eq!(e, Error::StoreUnavailable("down".to_string()));
    }
}
