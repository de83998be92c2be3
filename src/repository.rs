//! Record store trait: the durable source of truth behind the gateway.
//!
//! Implement [`RecordStore`] for your database client (SQLx, tokio-postgres,
//! an HTTP API, ...). The gateway only ever issues these five calls and never
//! holds a transaction across them.
//!
//! # Error Handling
//!
//! Return `Err` for connectivity problems, timeouts, constraint violations and
//! any other failed call; the gateway reports all of them to its caller as
//! [`Error::StoreUnavailable`]. Absence is **not** an error: `find_one` and
//! `preload_and_merge` return `Ok(None)` for an unknown id.
//!
//! [`InMemoryRecordStore`] is a ready-made implementation for tests and demos.

use crate::entity::Entity;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Durable storage for one entity collection.
///
/// Every call is expected to be strongly consistent on its own.
#[allow(async_fn_in_trait)]
pub trait RecordStore<T: Entity>: Send + Sync {
    /// Persist a new entity. The store assigns its id.
    ///
    /// # Errors
    /// Returns `Err` if the write fails.
    async fn create(&self, draft: T::Draft) -> Result<T>;

    /// Every entity, in the store's own order.
    ///
    /// # Errors
    /// Returns `Err` if the read fails.
    async fn find_all(&self) -> Result<Vec<T>>;

    /// Fetch one entity.
    ///
    /// # Returns
    /// - `Ok(Some(entity))` - Entity found
    /// - `Ok(None)` - No entity with this id (not an error)
    ///
    /// # Errors
    /// Returns `Err` if the read fails.
    async fn find_one(&self, id: &T::Id) -> Result<Option<T>>;

    /// Load the entity, merge `patch` over it and persist the result.
    ///
    /// Fields absent from the patch keep their stored value. Returns
    /// `Ok(None)` without writing anything when the id is unknown.
    ///
    /// # Errors
    /// Returns `Err` if the read or the write fails.
    async fn preload_and_merge(&self, id: &T::Id, patch: T::Patch) -> Result<Option<T>>;

    /// Delete the entity. Deleting an unknown id is not an error.
    ///
    /// # Errors
    /// Returns `Err` if the write fails.
    async fn delete(&self, id: &T::Id) -> Result<()>;
}

// ============================================================================
// In-Memory Record Store
// ============================================================================

/// Entities that [`InMemoryRecordStore`] knows how to build and patch.
pub trait MemoryRecord: Entity {
    /// Id for the `seq`-th created entity (1-based).
    fn assign_id(seq: u64) -> Self::Id;

    /// Materialize a draft under an assigned id.
    fn from_draft(id: Self::Id, draft: Self::Draft) -> Self;

    /// Apply a partial update in place.
    fn merge(&mut self, patch: Self::Patch);
}

/// Snapshot of how often each [`RecordStore`] method was called.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCallStats {
    pub create: u64,
    pub find_all: u64,
    pub find_one: u64,
    pub preload_and_merge: u64,
    pub delete: u64,
}

impl StoreCallStats {
    /// Calls that read existing rows.
    pub fn reads(&self) -> u64 {
        self.find_all + self.find_one
    }

    pub fn total(&self) -> u64 {
        self.create + self.find_all + self.find_one + self.preload_and_merge + self.delete
    }
}

#[derive(Default)]
struct CallCounters {
    create: AtomicU64,
    find_all: AtomicU64,
    find_one: AtomicU64,
    preload_and_merge: AtomicU64,
    delete: AtomicU64,
}

impl CallCounters {
    fn snapshot(&self) -> StoreCallStats {
        StoreCallStats {
            create: self.create.load(Ordering::Relaxed),
            find_all: self.find_all.load(Ordering::Relaxed),
            find_one: self.find_one.load(Ordering::Relaxed),
            preload_and_merge: self.preload_and_merge.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
        }
    }
}

/// In-memory record store for tests and demos.
///
/// - Keeps insertion order, so `find_all` is deterministic.
/// - Counts calls per method ([`InMemoryRecordStore::calls`]), which makes
///   "served from cache without touching the store" assertable.
/// - Can be flipped into an outage ([`InMemoryRecordStore::set_unavailable`])
///   where every call fails with [`Error::StoreUnavailable`].
pub struct InMemoryRecordStore<T: MemoryRecord> {
    rows: RwLock<Vec<T>>,
    next_seq: AtomicU64,
    unavailable: AtomicBool,
    calls: CallCounters,
}

impl<T: MemoryRecord> InMemoryRecordStore<T> {
    pub fn new() -> Self {
        InMemoryRecordStore {
            rows: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(1),
            unavailable: AtomicBool::new(false),
            calls: CallCounters::default(),
        }
    }

    /// Insert or replace a row directly, bypassing call counting.
    ///
    /// Useful for seeding state, or for simulating a write that reached the
    /// store without going through the gateway.
    pub async fn put(&self, entity: T) {
        let mut rows = self.rows.write().await;
        let id = entity.id();
        match rows.iter_mut().find(|row| row.id() == id) {
            Some(row) => *row = entity,
            None => rows.push(entity),
        }
    }

    /// Current rows, bypassing call counting.
    pub async fn snapshot(&self) -> Vec<T> {
        self.rows.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub fn calls(&self) -> StoreCallStats {
        self.calls.snapshot()
    }

    /// Simulate an outage (`true`) or recovery (`false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn enter(&self, counter: &AtomicU64, op: &str) -> Result<()> {
        counter.fetch_add(1, Ordering::Relaxed);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(format!(
                "in-memory store offline during {}",
                op
            )));
        }
        Ok(())
    }
}

impl<T: MemoryRecord> Default for InMemoryRecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MemoryRecord> RecordStore<T> for InMemoryRecordStore<T> {
    async fn create(&self, draft: T::Draft) -> Result<T> {
        self.enter(&self.calls.create, "create")?;

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let entity = T::from_draft(T::assign_id(seq), draft);
        self.rows.write().await.push(entity.clone());
        Ok(entity)
    }

    async fn find_all(&self) -> Result<Vec<T>> {
        self.enter(&self.calls.find_all, "find_all")?;
        Ok(self.rows.read().await.clone())
    }

    async fn find_one(&self, id: &T::Id) -> Result<Option<T>> {
        self.enter(&self.calls.find_one, "find_one")?;
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|row| &row.id() == id)
            .cloned())
    }

    async fn preload_and_merge(&self, id: &T::Id, patch: T::Patch) -> Result<Option<T>> {
        self.enter(&self.calls.preload_and_merge, "preload_and_merge")?;

        let mut rows = self.rows.write().await;
        Ok(rows.iter_mut().find(|row| &row.id() == id).map(|row| {
            row.merge(patch);
            row.clone()
        }))
    }

    async fn delete(&self, id: &T::Id) -> Result<()> {
        self.enter(&self.calls.delete, "delete")?;
        self.rows.write().await.retain(|row| &row.id() != id);
        Ok(())
    }
}
