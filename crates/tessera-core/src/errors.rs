//! Error taxonomy for token sessions.
//!
//! Two kinds of failure matter to callers:
//!
//! - [`TokenError::ClaimsVerification`]: a presented token string failed
//!   signature verification or has expired.
//! - [`TokenError::Unauthorized`]: a lookup came back empty, a replay check
//!   failed, or a fallback denied an early refresh. The [`Unauthorized`]
//!   reason is informational; callers can match on the variant alone.
//!
//! Everything else (store failures, bad configuration, bad payloads) is
//! surfaced as its own variant and never retried.

use std::fmt;

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unauthorized {
    /// No refresh record for the requested uid/namespace.
    RefreshNotFound,
    /// No access record for the requested uid.
    AccessNotFound,
    /// The stored access record belongs to a different uid.
    AccessUidMismatch,
    /// The presented access token is not the one bound to its refresh token.
    StaleAccessToken,
    /// The bound access token has not expired and no fallback was supplied.
    EarlyRefresh,
    /// A caller-supplied fallback denied the refresh.
    Denied,
    /// The session was not built with refresh-by-access enabled.
    RefreshByAccessDisabled,
}

impl fmt::Display for Unauthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::RefreshNotFound => "refresh token not found",
            Self::AccessNotFound => "access token not found",
            Self::AccessUidMismatch => "access token uid mismatch",
            Self::StaleAccessToken => "access token is no longer bound to its refresh token",
            Self::EarlyRefresh => "refresh attempted before the access token expired",
            Self::Denied => "refresh denied",
            Self::RefreshByAccessDisabled => "refresh by access payload is not allowed",
        };
        f.write_str(msg)
    }
}

/// Failure reported by a token store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Wraps any backend error (connection, protocol, lock) into a [`StoreError`].
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Error type returned by every session, token and codec operation.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Claims verification failed: {0}")]
    ClaimsVerification(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(Unauthorized),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Malconfigured: {0}")]
    Malconfigured(String),

    #[error("Failed to encode token: {0}")]
    Encoding(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TokenError {
    pub fn unauthorized(reason: Unauthorized) -> Self {
        Self::Unauthorized(reason)
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// True for every [`TokenError::Unauthorized`] reason.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn is_claims_verification(&self) -> bool {
        matches!(self, Self::ClaimsVerification(_))
    }

    /// The refusal reason, if this is an [`TokenError::Unauthorized`].
    pub fn unauthorized_reason(&self) -> Option<Unauthorized> {
        match self {
            Self::Unauthorized(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<Unauthorized> for TokenError {
    fn from(reason: Unauthorized) -> Self {
        Self::Unauthorized(reason)
    }
}

pub type TokenResult<T> = Result<T, TokenError>;
