//! Refresh tokens.
//!
//! The encoded refresh token held by the client carries only `uid`, `exp`
//! and the application payload. Everything else (CSRF value, the pointer to
//! the currently bound access token, namespace) lives in the store record,
//! which is rewritten on every rotation while the uid stays the same.

use tessera_auth::claims::{EXP, UID};
use tessera_auth::{ClaimSet, Payload};
use tessera_core::{TokenError, TokenResult, Unauthorized, clock, new_uid};
use tessera_store::{
    CLEARED_ACCESS_EXPIRATION, CLEARED_ACCESS_UID, RefreshRecord, RefreshUpdate, TokenStore,
    UpdateOutcome,
};

use crate::context::SessionContext;

/// Inputs for [`RefreshToken::create`].
#[derive(Debug, Clone)]
pub struct NewRefreshToken<'a> {
    /// Fresh uid when `None`.
    pub uid: Option<String>,
    pub csrf: &'a str,
    pub access_uid: &'a str,
    pub access_expiration: i64,
    pub payload: &'a Payload,
    pub namespace: Option<&'a str>,
    /// `now + refresh_exp_time` when `None`.
    pub expiration: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RefreshToken {
    uid: String,
    csrf: String,
    access_uid: String,
    access_expiration: i64,
    expiration: i64,
    namespace: Option<String>,
    /// Present only on tokens issued by this process; hydrated records have
    /// no payload to encode.
    token: Option<String>,
}

impl RefreshToken {
    /// Builds, encodes and persists a refresh token.
    pub async fn create(ctx: &SessionContext, params: NewRefreshToken<'_>) -> TokenResult<Self> {
        let uid = params.uid.unwrap_or_else(new_uid);
        let expiration = params
            .expiration
            .unwrap_or_else(|| clock::expires_in(ctx.config().refresh_exp_time));

        let claims = ClaimSet::from_payload(params.payload)?
            .with(UID, uid.as_str())
            .with(EXP, expiration);
        let token = ctx.codec().encode(&claims)?;

        let refresh = Self {
            uid,
            csrf: params.csrf.to_owned(),
            access_uid: params.access_uid.to_owned(),
            access_expiration: params.access_expiration,
            expiration,
            namespace: params.namespace.filter(|ns| !ns.is_empty()).map(str::to_owned),
            token: Some(token),
        };

        ctx.store()
            .persist_refresh(&refresh.uid, &refresh.record())
            .await?;
        Ok(refresh)
    }

    /// Loads a refresh token by uid.
    ///
    /// With `first_match` the namespace is ignored and the first record with
    /// this uid in any namespace is returned.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized::RefreshNotFound` when there is no live record.
    pub async fn find(
        uid: &str,
        store: &dyn TokenStore,
        namespace: Option<&str>,
        first_match: bool,
    ) -> TokenResult<Self> {
        let record = store
            .fetch_refresh(uid, namespace, first_match)
            .await?
            .ok_or(TokenError::unauthorized(Unauthorized::RefreshNotFound))?;

        Ok(Self::from_record(uid.to_owned(), record))
    }

    /// Every live refresh token in exactly `namespace`.
    pub async fn all(namespace: Option<&str>, store: &dyn TokenStore) -> TokenResult<Vec<Self>> {
        Ok(store
            .all_refresh_tokens(namespace)
            .await?
            .into_iter()
            .map(|(uid, record)| Self::from_record(uid, record))
            .collect())
    }

    /// Every live refresh token in every namespace.
    pub async fn all_any_namespace(store: &dyn TokenStore) -> TokenResult<Vec<Self>> {
        Ok(store
            .all_refresh_tokens_any_namespace()
            .await?
            .into_iter()
            .map(|(uid, record)| Self::from_record(uid, record))
            .collect())
    }

    fn from_record(uid: String, record: RefreshRecord) -> Self {
        Self {
            uid,
            csrf: record.csrf,
            access_uid: record.access_uid,
            access_expiration: record.access_expiration,
            expiration: record.expiration,
            namespace: record.namespace,
            token: None,
        }
    }

    fn record(&self) -> RefreshRecord {
        RefreshRecord {
            csrf: self.csrf.clone(),
            access_uid: self.access_uid.clone(),
            access_expiration: self.access_expiration,
            expiration: self.expiration,
            namespace: self.namespace.clone(),
        }
    }

    /// Rebinds this refresh token to a new access token and persists it.
    ///
    /// The store only accepts the write while the record still points at the
    /// access token this value was loaded with.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized::RefreshNotFound` if the record vanished since
    /// it was loaded, `Unauthorized::StaleAccessToken` if another rotation
    /// moved its pointer first.
    pub async fn update(
        &mut self,
        store: &dyn TokenStore,
        access_uid: &str,
        access_expiration: i64,
        csrf: &str,
        expiration: i64,
    ) -> TokenResult<()> {
        let update = RefreshUpdate {
            access_uid: access_uid.to_owned(),
            access_expiration,
            csrf: csrf.to_owned(),
            expiration,
            expected_access_uid: self.access_uid.clone(),
            expected_access_expiration: self.access_expiration,
        };

        match store
            .update_refresh(&self.uid, &update, self.namespace.as_deref())
            .await?
        {
            UpdateOutcome::Updated => {}
            UpdateOutcome::Missing => return Err(Unauthorized::RefreshNotFound.into()),
            UpdateOutcome::Conflict => return Err(Unauthorized::StaleAccessToken.into()),
        }

        self.access_uid = update.access_uid;
        self.access_expiration = access_expiration;
        self.csrf = update.csrf;
        self.expiration = expiration;
        Ok(())
    }

    /// Resets the access pointer to the cleared sentinel, keeping the record.
    pub async fn clear_access_pointer(&mut self, store: &dyn TokenStore) -> TokenResult<()> {
        let csrf = self.csrf.clone();
        self.update(
            store,
            CLEARED_ACCESS_UID,
            CLEARED_ACCESS_EXPIRATION,
            &csrf,
            self.expiration,
        )
        .await
    }

    /// Removes this token's record. Returns `false` if it was already gone.
    pub async fn destroy(&self, store: &dyn TokenStore) -> TokenResult<bool> {
        Ok(store
            .destroy_refresh(&self.uid, self.namespace.as_deref())
            .await?)
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn csrf(&self) -> &str {
        &self.csrf
    }

    pub fn access_uid(&self) -> &str {
        &self.access_uid
    }

    pub fn access_expiration(&self) -> i64 {
        self.access_expiration
    }

    pub fn expiration(&self) -> i64 {
        self.expiration
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn pointer_cleared(&self) -> bool {
        self.access_uid == CLEARED_ACCESS_UID
    }

    /// True while the bound access token would still pass verification,
    /// allowing `leeway` seconds past its expiration.
    pub fn access_still_valid(&self, leeway: u64) -> bool {
        clock::within_leeway(self.access_expiration, leeway)
    }
}
