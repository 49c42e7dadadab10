//! Token store connection settings.
//!
//! # Environment Variables
//!
//! - `REDIS_URL`: Redis connection URL (default: `redis://127.0.0.1:6379`)
//! - `TOKEN_STORE_PREFIX`: prefix for every store key (default: `tessera`)
//! - `JWT_LEEWAY`: seconds records outlive their expiration (default: 0)

use crate::env::{non_empty, parsed};

#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Redis connection URL.
    pub redis_url: String,

    /// Prefix for all store keys to avoid collisions with other Redis users.
    pub key_prefix: String,

    /// Extra lifetime given to stored records, the same tolerance the codec
    /// applies to `exp`.
    pub leeway: u64,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: non_empty("REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: non_empty("TOKEN_STORE_PREFIX").unwrap_or(defaults.key_prefix),
            leeway: parsed("JWT_LEEWAY").unwrap_or(defaults.leeway),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".into(),
            key_prefix: "tessera".into(),
            leeway: 0,
        }
    }
}
