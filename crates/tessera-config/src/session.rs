//! Session token configuration.
//!
//! # Environment Variables
//!
//! - `JWT_SECRET`: HMAC secret, or PEM private key for asymmetric algorithms
//! - `JWT_PUBLIC_KEY`: PEM public key (asymmetric algorithms only)
//! - `JWT_ALGORITHM`: signing algorithm identifier (default: `HS256`)
//! - `JWT_ACCESS_EXPIRY`: access token lifetime in seconds (default: `3600`)
//! - `JWT_REFRESH_EXPIRY`: refresh token lifetime in seconds (default: `604800`)
//! - `JWT_ISSUER`: issuer embedded as the `iss` claim (optional)
//! - `JWT_LEEWAY`: tolerance in seconds on expiration checks (default: `0`)
//! - `JWT_PERSIST_ACCESS`: also persist access tokens in the store (default: `false`)

use crate::env::{flag, non_empty, parsed};

pub const DEFAULT_ALGORITHM: &str = "HS256";
pub const DEFAULT_ACCESS_EXP_TIME: i64 = 3600; // 1 hour
pub const DEFAULT_REFRESH_EXP_TIME: i64 = 604800; // 7 days

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Signing key material. An HMAC secret or a PEM-encoded private key.
    pub signing_key: String,
    /// Verification key for asymmetric algorithms. HMAC reuses `signing_key`.
    pub verify_key: Option<String>,
    /// Algorithm identifier, e.g. `HS256`, `RS256`, `ES256`, `EdDSA`.
    pub algorithm: String,
    /// Default access token lifetime in seconds.
    pub access_exp_time: i64,
    /// Default refresh token lifetime in seconds.
    pub refresh_exp_time: i64,
    pub issuer: Option<String>,
    /// Seconds of tolerance applied when checking `exp`.
    pub leeway: u64,
    /// Mirror access tokens into the store so they can be revoked one by one.
    pub persist_access_tokens: bool,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            signing_key: non_empty("JWT_SECRET").unwrap_or(defaults.signing_key),
            verify_key: non_empty("JWT_PUBLIC_KEY"),
            algorithm: non_empty("JWT_ALGORITHM").unwrap_or(defaults.algorithm),
            access_exp_time: parsed("JWT_ACCESS_EXPIRY").unwrap_or(defaults.access_exp_time),
            refresh_exp_time: parsed("JWT_REFRESH_EXPIRY").unwrap_or(defaults.refresh_exp_time),
            issuer: non_empty("JWT_ISSUER"),
            leeway: parsed("JWT_LEEWAY").unwrap_or(defaults.leeway),
            persist_access_tokens: flag("JWT_PERSIST_ACCESS")
                .unwrap_or(defaults.persist_access_tokens),
        }
    }

    /// HMAC configuration with the given secret and default lifetimes.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            signing_key: secret.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signing_key: "your-secret-key-change-in-production".to_string(),
            verify_key: None,
            algorithm: DEFAULT_ALGORITHM.to_string(),
            access_exp_time: DEFAULT_ACCESS_EXP_TIME,
            refresh_exp_time: DEFAULT_REFRESH_EXP_TIME,
            issuer: None,
            leeway: 0,
            persist_access_tokens: false,
        }
    }
}
