//! # Tessera
//!
//! Stateful access/refresh token sessions.
//!
//! Plain JWTs cannot be revoked. Tessera pairs every short-lived access token
//! with a refresh token whose record lives in a server-side store, so sessions
//! can be rotated, revoked one at a time or by namespace, and protected
//! against replay of superseded access tokens.
//!
//! ## Architecture
//!
//! ```text
//! crates/
//! ├── tessera-core/     # Error taxonomy, ids, clock
//! ├── tessera-config/   # SessionConfig, StoreConfig
//! ├── tessera-auth/     # ClaimSet + ClaimCodec (jsonwebtoken)
//! ├── tessera-store/    # TokenStore trait, MemoryStore, RedisStore
//! └── tessera-cli/      # Operator CLI
//! src/
//! ├── tokens/           # AccessToken, RefreshToken
//! ├── session/          # Session engine, fallbacks, flushes
//! ├── csrf.rs           # CSRF values and masking
//! ├── logging.rs        # Tracing subscriber setup
//! └── metrics.rs        # Counters
//! ```
//!
//! ## Token Binding
//!
//! ```text
//! access token  {uid, exp, ruid, csrf, ..payload}
//!                 │           │
//!                 │           └──────────────┐
//!                 ▼                          ▼
//! refresh record {csrf, access_uid, access_expiration, expiration, namespace}
//! ```
//!
//! Every rotation rewrites the record's access pointer. A refresh through an
//! access token succeeds only while that token is the one the pointer names.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera::{Session, SessionContext};
//! use tessera_config::SessionConfig;
//! use tessera_store::MemoryStore;
//!
//! let ctx = SessionContext::new(SessionConfig::from_env(), Arc::new(MemoryStore::new()))?;
//! let payload = serde_json::json!({"user_id": 42}).as_object().cloned().unwrap_or_default();
//!
//! let tokens = Session::new(ctx.clone(), payload.clone()).login().await?;
//!
//! // Later, once the access token has expired:
//! let refreshed = Session::new(ctx, payload)
//!     .refresh_by_access_allowed(true)
//!     .access_token(tokens.access)
//!     .refresh_by_access_payload(None)
//!     .await?;
//! ```
//!
//! ## Errors
//!
//! Every operation returns [`TokenResult`]. Verification failures surface as
//! `TokenError::ClaimsVerification`; missing records, replayed access tokens
//! and refused fallbacks as `TokenError::Unauthorized`.

pub mod context;
pub mod csrf;
pub mod logging;
pub mod metrics;
pub mod session;
pub mod tokens;

pub use context::SessionContext;
pub use csrf::CsrfToken;
pub use session::{
    Fallback, LoginTokens, RefreshAttempt, RefreshDecision, RefreshReason, RefreshedTokens,
    Session, SessionState,
};
pub use tessera_auth::Payload;
pub use tessera_core::{TokenError, TokenResult, Unauthorized};
pub use tokens::{AccessToken, RefreshToken};
