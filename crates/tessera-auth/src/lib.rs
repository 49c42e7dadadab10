//! # Tessera Auth
//!
//! The claim codec used by access and refresh tokens.
//!
//! - [`claims`]: the [`ClaimSet`] map and the reserved claim names
//! - [`jwt`]: [`ClaimCodec`], signing and verifying claim sets
//!
//! # Example
//!
//! ```ignore
//! use tessera_auth::{ClaimCodec, ClaimSet};
//!
//! let codec = ClaimCodec::new(&config)?;
//! let token = codec.encode(&claims)?;
//!
//! // Verifies signature and expiration
//! let claims = codec.decode(&token)?;
//!
//! // Verifies the signature only
//! let claims = codec.decode_claimless(&token)?;
//! ```

pub mod claims;
pub mod jwt;

// Re-export commonly used types at crate root
pub use claims::{ClaimSet, Payload, RESERVED_CLAIMS, validate_payload};
pub use jwt::ClaimCodec;
