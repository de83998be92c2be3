//! # entity-cache-gateway
//!
//! A cache-aside data-access layer for one mutable entity collection.
//!
//! The gateway sits between callers and a durable record store. Reads are
//! served from a volatile cache backend when possible; every write goes to the
//! store first and then refreshes or invalidates the cache entries it made
//! stale, before returning.
//!
//! ## Features
//!
//! - **Coherent writes:** create/update refresh `"{prefix}:{id}"`, every write
//!   drops `"{collection}:all"`
//! - **Cache is advisory:** a cache outage costs latency, never correctness
//! - **Backend Agnostic:** in-memory (default) and Redis (`redis` feature)
//! - **Database Agnostic:** implement [`RecordStore`] for any store
//! - **Explicit misses:** backends answer [`CacheLookup::Hit`] or [`CacheLookup::Miss`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use entity_cache_gateway::{
//!     backend::InMemoryBackend, Entity, EntityCacheGateway, GatewayConfig,
//! };
//! use std::sync::Arc;
//!
//! // 1. Implement Entity for your record (id, draft, patch, key prefixes)
//! // 2. Implement RecordStore<User> for your database client
//! let gateway = EntityCacheGateway::new(Arc::new(user_store), InMemoryBackend::new())
//!     .with_config(GatewayConfig::from_env()?)?;
//!
//! // 3. Share it - clones are cheap
//! let users = gateway.find_all().await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod key;
pub mod observability;
pub mod repository;
pub mod serialization;
pub mod strategy;

// Re-exports for convenience
pub use backend::{CacheBackend, CacheLookup};
pub use config::GatewayConfig;
pub use entity::Entity;
pub use error::{Error, Result};
pub use gateway::EntityCacheGateway;
pub use repository::{InMemoryRecordStore, MemoryRecord, RecordStore};
pub use strategy::ReadStrategy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
