//! # Tessera Core
//!
//! Foundational types shared by every Tessera crate:
//!
//! - [`errors`]: the [`TokenError`] taxonomy and [`StoreError`]
//! - [`ids`]: token uid and CSRF value generation
//! - [`clock`]: epoch-second timestamps

pub mod clock;
pub mod errors;
pub mod ids;

// Re-export commonly used types at crate root
pub use errors::{StoreError, TokenError, TokenResult, Unauthorized};
pub use ids::new_uid;
