//! # Tessera Store
//!
//! Server-side storage for token sessions.
//!
//! This crate provides:
//! - [`TokenStore`], the capability interface the session engine depends on
//! - [`RefreshRecord`] / [`AccessRecord`], the persisted record shapes
//! - [`MemoryStore`], an in-process backend for tests and single nodes
//! - [`RedisStore`], a Redis backend with TTL-based eviction
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera_config::StoreConfig;
//! use tessera_store::{RedisStore, TokenStore};
//!
//! let store: Arc<dyn TokenStore> = Arc::new(RedisStore::new(&StoreConfig::from_env()).await?);
//! let live = store.all_refresh_tokens(Some("web")).await?;
//! ```

pub mod keys;
pub mod memory;
pub mod records;
pub mod redis;
pub mod store;

pub use memory::MemoryStore;
pub use records::{
    AccessRecord, CLEARED_ACCESS_EXPIRATION, CLEARED_ACCESS_UID, RefreshRecord, RefreshUpdate,
};
pub use redis::RedisStore;
pub use store::{TokenStore, UpdateOutcome};
