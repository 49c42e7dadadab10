//! Access tokens.
//!
//! An access token is an immutable value: it is minted on login and on every
//! refresh, and replaced rather than mutated. Its encoded form carries the
//! application payload plus `uid`, `exp`, `ruid` and `csrf`.

use tessera_auth::claims::{CSRF, EXP, RUID, UID};
use tessera_auth::{ClaimSet, Payload};
use tessera_core::{TokenError, TokenResult, Unauthorized, clock, new_uid};
use tessera_store::{AccessRecord, TokenStore};

use crate::context::SessionContext;
use crate::csrf::CsrfToken;

/// Inputs for [`AccessToken::new`].
#[derive(Debug, Clone)]
pub struct NewAccessToken<'a> {
    /// Fresh uid when `None`.
    pub uid: Option<String>,
    pub csrf: &'a str,
    /// `now + access_exp_time` when `None`.
    pub expiration: Option<i64>,
    pub payload: &'a Payload,
    /// Uid of the refresh token issuing this access token.
    pub refresh_uid: &'a str,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    uid: String,
    csrf: String,
    expiration: i64,
    payload: Payload,
    refresh_uid: String,
    token: String,
}

impl AccessToken {
    /// Builds and encodes an access token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidPayload` if the payload uses a reserved
    /// claim, or `TokenError::Encoding` if signing fails.
    pub fn new(ctx: &SessionContext, params: NewAccessToken<'_>) -> TokenResult<Self> {
        let uid = params.uid.unwrap_or_else(new_uid);
        let expiration = params
            .expiration
            .unwrap_or_else(|| clock::expires_in(ctx.config().access_exp_time));

        let claims = ClaimSet::from_payload(params.payload)?
            .with(UID, uid.as_str())
            .with(EXP, expiration)
            .with(RUID, params.refresh_uid)
            .with(CSRF, params.csrf);
        let token = ctx.codec().encode(&claims)?;

        Ok(Self {
            uid,
            csrf: params.csrf.to_owned(),
            expiration,
            payload: params.payload.clone(),
            refresh_uid: params.refresh_uid.to_owned(),
            token,
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn csrf(&self) -> &str {
        &self.csrf
    }

    pub fn expiration(&self) -> i64 {
        self.expiration
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn refresh_uid(&self) -> &str {
        &self.refresh_uid
    }

    /// The encoded, signed token string.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        self.expiration < clock::now()
    }

    /// Checks a raw or masked CSRF value against this token's CSRF value.
    pub fn valid_csrf(&self, presented: &str) -> bool {
        CsrfToken::verify(&self.csrf, presented)
    }

    pub async fn persist(&self, store: &dyn TokenStore) -> TokenResult<()> {
        store
            .persist_access(&self.uid, &self.csrf, self.expiration)
            .await?;
        Ok(())
    }

    /// Looks up a persisted access record.
    ///
    /// Only meaningful when access tokens are persisted.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized::AccessNotFound` when the store has no record and
    /// `Unauthorized::AccessUidMismatch` when the record belongs to another uid.
    pub async fn find(uid: &str, store: &dyn TokenStore) -> TokenResult<AccessRecord> {
        let record = store
            .fetch_access(uid)
            .await?
            .ok_or(TokenError::unauthorized(Unauthorized::AccessNotFound))?;

        if record.uid != uid {
            return Err(Unauthorized::AccessUidMismatch.into());
        }
        Ok(record)
    }

    pub async fn destroy(uid: &str, store: &dyn TokenStore) -> TokenResult<bool> {
        Ok(store.destroy_access(uid).await?)
    }
}
