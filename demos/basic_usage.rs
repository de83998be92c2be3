//! Basic usage: a user collection behind the cache-aside gateway.
//!
//! Run with: `RUST_LOG=debug cargo run --example basic_usage`

use entity_cache_gateway::backend::{CacheBackend, InMemoryBackend};
use entity_cache_gateway::{
    Entity, EntityCacheGateway, Error, GatewayConfig, InMemoryRecordStore, MemoryRecord,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
    email: String,
}

struct CreateUser {
    name: String,
    email: String,
}

#[derive(Default)]
struct UpdateUser {
    name: Option<String>,
    email: Option<String>,
}

impl Entity for User {
    type Id = String;
    type Draft = CreateUser;
    type Patch = UpdateUser;

    fn id(&self) -> Self::Id {
        self.id.clone()
    }

    fn cache_prefix() -> &'static str {
        "user"
    }

    fn collection_prefix() -> &'static str {
        "users"
    }

    fn validate(&self) -> entity_cache_gateway::Result<()> {
        if self.email.contains('@') {
            Ok(())
        } else {
            Err(Error::ValidationError(format!(
                "user {} has malformed email",
                self.id
            )))
        }
    }
}

impl MemoryRecord for User {
    fn assign_id(_seq: u64) -> String {
        Uuid::now_v7().to_string()
    }

    fn from_draft(id: String, draft: CreateUser) -> Self {
        User {
            id,
            name: draft.name,
            email: draft.email,
        }
    }

    fn merge(&mut self, patch: UpdateUser) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let store = Arc::new(InMemoryRecordStore::<User>::new());
    let backend = InMemoryBackend::new();
    let gateway = EntityCacheGateway::new(Arc::clone(&store), backend.clone())
        .with_config(GatewayConfig::from_env()?)?;

    println!("=== Create ===");
    let ada = gateway
        .create(CreateUser {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        })
        .await?;
    println!("created {:?}", ada);

    println!("\n=== Read (served from cache) ===");
    let same = gateway.find_one(&ada.id).await?;
    println!("found {} ({} store reads so far)", same.name, store.calls().reads());

    println!("\n=== List ===");
    let all = gateway.find_all().await?;
    println!("{} user(s); cached snapshot: {}", all.len(), backend.exists("users:all").await?);

    println!("\n=== Update ===");
    let grace = gateway
        .update(
            &ada.id,
            UpdateUser {
                name: Some("Grace".to_string()),
                ..UpdateUser::default()
            },
        )
        .await?;
    println!("renamed to {}, email kept: {}", grace.name, grace.email);
    println!("cached snapshot after write: {}", backend.exists("users:all").await?);

    println!("\n=== Remove ===");
    gateway.remove(&ada.id).await?;
    match gateway.find_one(&ada.id).await {
        Err(Error::NotFound(id)) => println!("user {} is gone", id),
        other => println!("unexpected: {:?}", other),
    }

    backend.log_stats();
    println!("store calls: {:?}", store.calls());
    Ok(())
}
