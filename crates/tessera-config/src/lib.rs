//! # Tessera Config
//!
//! Immutable configuration values, loaded once from environment variables
//! and then shared (usually behind an `Arc`) by the codec, the store and
//! every session:
//!
//! - [`session`]: signing material, token lifetimes, issuer and leeway
//! - [`store`]: token store connection settings
//!
//! # Example
//!
//! ```ignore
//! use tessera_config::{SessionConfig, StoreConfig};
//!
//! let session_config = SessionConfig::from_env();
//! let store_config = StoreConfig::from_env();
//! ```

pub mod session;
pub mod store;

mod env;

// Re-export commonly used types at crate root
pub use session::SessionConfig;
pub use store::StoreConfig;
