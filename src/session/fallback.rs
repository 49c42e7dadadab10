//! Caller-supplied decisions for early or mismatched refreshes.
//!
//! `refresh` and `refresh_by_access_payload` consult a fallback when the
//! bound access token is still valid, or when the presented access token is
//! not the one its refresh token is bound to. The fallback returns a
//! [`RefreshDecision`]; without a fallback both situations are refused.

use tessera_core::{TokenResult, Unauthorized};

/// Why a fallback is being consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// The access token bound to the refresh token has not expired yet.
    AccessStillValid,
    /// The presented access token is not the one bound to the refresh token.
    AccessMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshAttempt {
    pub refresh_uid: String,
    /// Expiration of the access token the refresh token is bound to.
    pub access_expiration: i64,
    pub reason: RefreshReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    Permit,
    Deny,
}

impl From<bool> for RefreshDecision {
    fn from(permit: bool) -> Self {
        if permit { Self::Permit } else { Self::Deny }
    }
}

pub type Fallback<'a> = &'a (dyn Fn(&RefreshAttempt) -> RefreshDecision + Send + Sync);

/// Fallback that always lets the refresh proceed.
pub fn permit(_: &RefreshAttempt) -> RefreshDecision {
    RefreshDecision::Permit
}

/// Fallback that always refuses.
pub fn deny(_: &RefreshAttempt) -> RefreshDecision {
    RefreshDecision::Deny
}

/// Runs `fallback` for `attempt`; with no fallback, fails with `refusal`.
pub(crate) fn consult(
    fallback: Option<Fallback<'_>>,
    attempt: &RefreshAttempt,
    refusal: Unauthorized,
) -> TokenResult<()> {
    match fallback.map(|decide| decide(attempt)) {
        Some(RefreshDecision::Permit) => Ok(()),
        Some(RefreshDecision::Deny) => Err(Unauthorized::Denied.into()),
        None => Err(refusal.into()),
    }
}
