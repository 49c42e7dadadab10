//! Session lifecycle: login, rotation with replay protection, and flushes.
//!
//! A [`Session`] is cheap to build per request. It borrows nothing from the
//! caller; configuration, codec and store come from a shared
//! [`SessionContext`].
//!
//! ```text
//! Unauthenticated --login--> Active --refresh*--> Active --flush*--> Flushed
//!                                                                  --login--> Active
//! ```

pub mod fallback;
mod flush;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use tessera_auth::{ClaimSet, Payload};
use tessera_core::{TokenResult, Unauthorized, clock, new_uid};

use crate::context::SessionContext;
use crate::csrf::CsrfToken;
use crate::metrics::{track_refresh, track_token_issued};
use crate::tokens::{AccessToken, NewAccessToken, NewRefreshToken, RefreshToken};

pub use fallback::{Fallback, RefreshAttempt, RefreshDecision, RefreshReason, deny, permit};

use fallback::consult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built, no token pair issued yet.
    Unauthenticated,
    /// Holds a bound access/refresh pair.
    Active,
    /// The pair this session issued or was presented with has been flushed.
    Flushed,
}

/// Tokens issued by [`Session::login`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginTokens {
    pub access: String,
    pub access_expires_at: i64,
    pub csrf: String,
    pub refresh: String,
    pub refresh_expires_at: i64,
}

/// Tokens issued by a refresh.
///
/// `refresh` and `refresh_expires_at` are only set when the refresh token
/// itself was renewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshedTokens {
    pub access: String,
    pub access_expires_at: i64,
    pub csrf: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Session {
    ctx: SessionContext,
    payload: Payload,
    namespace: Option<String>,
    access_exp: i64,
    refresh_exp: i64,
    refresh_by_access_allowed: bool,
    renew_on_refresh: bool,
    presented_access: Option<String>,
    access: Option<AccessToken>,
    refresh: Option<RefreshToken>,
    state: SessionState,
}

impl Session {
    /// New session carrying `payload`, with TTLs from the context config.
    pub fn new(ctx: SessionContext, payload: Payload) -> Self {
        let access_exp = ctx.config().access_exp_time;
        let refresh_exp = ctx.config().refresh_exp_time;

        Self {
            ctx,
            payload,
            namespace: None,
            access_exp,
            refresh_exp,
            refresh_by_access_allowed: false,
            renew_on_refresh: false,
            presented_access: None,
            access: None,
            refresh: None,
            state: SessionState::Unauthenticated,
        }
    }

    /// Tags refresh records issued by this session; an empty string means none.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    /// Access token TTL in seconds.
    pub fn access_exp(mut self, seconds: i64) -> Self {
        self.access_exp = seconds;
        self
    }

    /// Refresh token TTL in seconds.
    pub fn refresh_exp(mut self, seconds: i64) -> Self {
        self.refresh_exp = seconds;
        self
    }

    pub fn refresh_by_access_allowed(mut self, allowed: bool) -> Self {
        self.refresh_by_access_allowed = allowed;
        self
    }

    /// Reissue the refresh token, with a new uid and expiration, on every
    /// access-payload refresh.
    pub fn renew_on_refresh(mut self, renew: bool) -> Self {
        self.renew_on_refresh = renew;
        self
    }

    /// The encoded access token presented by the client. Used by
    /// [`Session::refresh_by_access_payload`] and
    /// [`Session::flush_by_access_payload`].
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.presented_access = Some(token.into());
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_access(&self) -> Option<&AccessToken> {
        self.access.as_ref()
    }

    pub fn current_refresh(&self) -> Option<&RefreshToken> {
        self.refresh.as_ref()
    }

    /// Issues a new bound access/refresh pair and persists the refresh record.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidPayload` when the payload uses a reserved
    /// claim (or `iss` while an issuer is configured), or `TokenError::Store`
    /// if the refresh record cannot be written.
    #[instrument(skip_all, fields(session.namespace = self.namespace.as_deref().unwrap_or("")))]
    pub async fn login(&mut self) -> TokenResult<LoginTokens> {
        self.ctx.codec().validate_payload(&self.payload)?;

        let now = clock::now();
        let csrf = CsrfToken::generate().encoded();
        let refresh_uid = new_uid();

        let access = AccessToken::new(
            &self.ctx,
            NewAccessToken {
                uid: None,
                csrf: &csrf,
                expiration: Some(clock::expires_at(now, self.access_exp)),
                payload: &self.payload,
                refresh_uid: &refresh_uid,
            },
        )?;

        let refresh = RefreshToken::create(
            &self.ctx,
            NewRefreshToken {
                uid: Some(refresh_uid),
                csrf: &csrf,
                access_uid: access.uid(),
                access_expiration: access.expiration(),
                payload: &self.payload,
                namespace: self.namespace.as_deref(),
                expiration: Some(clock::expires_at(now, self.refresh_exp)),
            },
        )
        .await?;

        if self.ctx.config().persist_access_tokens {
            access.persist(self.ctx.store()).await?;
        }

        track_token_issued("access");
        track_token_issued("refresh");
        info!(
            target: "tessera::audit",
            {
                audit.action = "session.login",
                refresh.uid = %refresh.uid()
            },
            "Session logged in"
        );

        let tokens = LoginTokens {
            access: access.token().to_owned(),
            access_expires_at: access.expiration(),
            csrf,
            refresh: refresh.token().unwrap_or_default().to_owned(),
            refresh_expires_at: refresh.expiration(),
        };

        self.access = Some(access);
        self.refresh = Some(refresh);
        self.state = SessionState::Active;
        Ok(tokens)
    }

    /// Issues a new access token from a presented refresh token.
    ///
    /// The new access token carries the payload encoded in the refresh token.
    /// While the access token currently bound to the refresh token is still
    /// valid, `fallback` decides; without one the refresh is refused.
    ///
    /// # Errors
    ///
    /// - `TokenError::ClaimsVerification` if the refresh token is invalid or expired
    /// - `Unauthorized::RefreshNotFound` if its record is gone
    /// - `Unauthorized::EarlyRefresh` / `Unauthorized::Denied` per the fallback
    /// - `Unauthorized::StaleAccessToken` if a concurrent refresh rotated first
    #[instrument(skip_all, fields(session.namespace = self.namespace.as_deref().unwrap_or("")))]
    pub async fn refresh(
        &mut self,
        refresh_token: &str,
        fallback: Option<Fallback<'_>>,
    ) -> TokenResult<RefreshedTokens> {
        let claims = self.ctx.codec().decode(refresh_token)?;
        let mut refresh = RefreshToken::find(
            claims.uid()?,
            self.ctx.store(),
            self.namespace.as_deref(),
            false,
        )
        .await?;

        if refresh.access_still_valid(self.ctx.config().leeway) {
            let attempt = RefreshAttempt {
                refresh_uid: refresh.uid().to_owned(),
                access_expiration: refresh.access_expiration(),
                reason: RefreshReason::AccessStillValid,
            };
            if let Err(err) = consult(fallback, &attempt, Unauthorized::EarlyRefresh) {
                warn!(
                    target: "tessera::security",
                    {
                        security.event = "early_refresh_refused",
                        refresh.uid = %refresh.uid()
                    },
                    "Access token still valid"
                );
                track_refresh("refresh_token", "refused");
                return Err(err);
            }
        }

        let tokens = self.rotate(&mut refresh, &claims.payload(), false).await?;
        track_refresh("refresh_token", "rotated");
        info!(
            target: "tessera::audit",
            {
                audit.action = "session.refresh",
                refresh.uid = %refresh.uid()
            },
            "Access token refreshed"
        );

        self.refresh = Some(refresh);
        Ok(tokens)
    }

    /// Issues a new pair from the presented access token, which may be expired.
    ///
    /// The access token must still be the one its refresh token is bound to;
    /// a superseded or foreign access token is refused unless `fallback`
    /// permits it. An unexpired access token is likewise refused unless
    /// `fallback` permits it.
    ///
    /// # Errors
    ///
    /// - `Unauthorized::RefreshByAccessDisabled` unless enabled on this session
    /// - `Unauthorized::AccessNotFound` when no access token was presented
    /// - `TokenError::ClaimsVerification` on a bad signature
    /// - `Unauthorized::RefreshNotFound` if the refresh record is gone
    /// - `Unauthorized::StaleAccessToken` when the replay check fails
    /// - `Unauthorized::EarlyRefresh` / `Unauthorized::Denied` per the fallback
    #[instrument(skip_all, fields(session.namespace = self.namespace.as_deref().unwrap_or("")))]
    pub async fn refresh_by_access_payload(
        &mut self,
        fallback: Option<Fallback<'_>>,
    ) -> TokenResult<RefreshedTokens> {
        if !self.refresh_by_access_allowed {
            return Err(Unauthorized::RefreshByAccessDisabled.into());
        }

        let claims = self.presented_access_claims()?;
        let access_uid = claims.uid()?;
        let access_expiration = claims.exp()?;

        let mut refresh = RefreshToken::find(
            claims.ruid()?,
            self.ctx.store(),
            self.namespace.as_deref(),
            false,
        )
        .await?;

        // Replay check against the pointer the record holds
        let bound = refresh.access_uid() == access_uid
            && refresh.access_expiration() == access_expiration;
        if !bound && !refresh.pointer_cleared() {
            let attempt = RefreshAttempt {
                refresh_uid: refresh.uid().to_owned(),
                access_expiration: refresh.access_expiration(),
                reason: RefreshReason::AccessMismatch,
            };
            if let Err(err) = consult(fallback, &attempt, Unauthorized::StaleAccessToken) {
                warn!(
                    target: "tessera::security",
                    {
                        security.event = "stale_access_token",
                        refresh.uid = %refresh.uid(),
                        access.uid = %access_uid
                    },
                    "Replay check failed"
                );
                track_refresh("access_payload", "refused");
                return Err(err);
            }
        }

        if clock::within_leeway(access_expiration, self.ctx.config().leeway) {
            let attempt = RefreshAttempt {
                refresh_uid: refresh.uid().to_owned(),
                access_expiration,
                reason: RefreshReason::AccessStillValid,
            };
            if let Err(err) = consult(fallback, &attempt, Unauthorized::EarlyRefresh) {
                warn!(
                    target: "tessera::security",
                    {
                        security.event = "early_refresh_refused",
                        refresh.uid = %refresh.uid()
                    },
                    "Access token still valid"
                );
                track_refresh("access_payload", "refused");
                return Err(err);
            }
        }

        let tokens = match self
            .rotate(&mut refresh, &claims.payload(), self.renew_on_refresh)
            .await
        {
            Ok(tokens) => tokens,
            Err(err) => {
                if err.unauthorized_reason() == Some(Unauthorized::StaleAccessToken) {
                    warn!(
                        target: "tessera::security",
                        {
                            security.event = "stale_access_token",
                            refresh.uid = %refresh.uid(),
                            access.uid = %access_uid
                        },
                        "Concurrent rotation won the race"
                    );
                    track_refresh("access_payload", "refused");
                }
                return Err(err);
            }
        };
        track_refresh("access_payload", "rotated");
        info!(
            target: "tessera::audit",
            {
                audit.action = "session.refresh_by_access",
                refresh.uid = %refresh.uid(),
                refresh.renewed = self.renew_on_refresh
            },
            "Access token refreshed by payload"
        );

        self.refresh = Some(refresh);
        Ok(tokens)
    }

    /// Mints a new access token for `refresh` and rebinds the record to it.
    ///
    /// With `renew` a new refresh token with a fresh uid is persisted first
    /// and the old record destroyed afterwards. Without it the record is
    /// rewritten only if its pointer has not moved since it was loaded.
    async fn rotate(
        &mut self,
        refresh: &mut RefreshToken,
        payload: &Payload,
        renew: bool,
    ) -> TokenResult<RefreshedTokens> {
        let now = clock::now();
        let csrf = CsrfToken::generate().encoded();
        let superseded_access =
            (!refresh.pointer_cleared()).then(|| refresh.access_uid().to_owned());
        let refresh_uid = if renew { new_uid() } else { refresh.uid().to_owned() };

        let access = AccessToken::new(
            &self.ctx,
            NewAccessToken {
                uid: None,
                csrf: &csrf,
                expiration: Some(clock::expires_at(now, self.access_exp)),
                payload,
                refresh_uid: &refresh_uid,
            },
        )?;

        let refresh_expiration = clock::expires_at(now, self.refresh_exp);
        let renewed = if renew {
            let renewed = RefreshToken::create(
                &self.ctx,
                NewRefreshToken {
                    uid: Some(refresh_uid),
                    csrf: &csrf,
                    access_uid: access.uid(),
                    access_expiration: access.expiration(),
                    payload,
                    namespace: refresh.namespace(),
                    expiration: Some(refresh_expiration),
                },
            )
            .await?;

            // Flushed or renewed by someone else since lookup
            if !refresh.destroy(self.ctx.store()).await? {
                renewed.destroy(self.ctx.store()).await?;
                return Err(Unauthorized::RefreshNotFound.into());
            }
            track_token_issued("refresh");
            *refresh = renewed;
            true
        } else {
            refresh
                .update(
                    self.ctx.store(),
                    access.uid(),
                    access.expiration(),
                    &csrf,
                    refresh_expiration,
                )
                .await?;
            false
        };

        if self.ctx.config().persist_access_tokens {
            if let Some(uid) = superseded_access {
                AccessToken::destroy(&uid, self.ctx.store()).await?;
            }
            access.persist(self.ctx.store()).await?;
        }
        track_token_issued("access");
        debug!(refresh.uid = %refresh.uid(), access.uid = %access.uid(), "Token pair rotated");

        let tokens = RefreshedTokens {
            access: access.token().to_owned(),
            access_expires_at: access.expiration(),
            csrf,
            refresh: renewed.then(|| refresh.token().unwrap_or_default().to_owned()),
            refresh_expires_at: renewed.then(|| refresh.expiration()),
        };

        self.access = Some(access);
        self.state = SessionState::Active;
        Ok(tokens)
    }

    /// Decodes the presented access token (or the one this session last
    /// issued) without checking its expiration.
    fn presented_access_claims(&self) -> TokenResult<ClaimSet> {
        let token = self
            .presented_access
            .as_deref()
            .or_else(|| self.access.as_ref().map(AccessToken::token))
            .ok_or(Unauthorized::AccessNotFound)?;

        self.ctx.codec().decode_claimless(token)
    }

    /// True when `refresh_token` verifies and its record is still stored.
    ///
    /// Verification and lookup failures read as `false`; store errors are
    /// returned.
    pub async fn session_exists(&self, refresh_token: &str) -> TokenResult<bool> {
        match self.lookup_refresh(refresh_token).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_claims_verification() || err.is_unauthorized() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// CSRF value currently bound to the record behind `refresh_token`.
    pub async fn csrf_for(&self, refresh_token: &str) -> TokenResult<String> {
        Ok(self.lookup_refresh(refresh_token).await?.csrf().to_owned())
    }

    /// Number of live refresh records in this session's namespace.
    pub async fn valid_refresh_count(&self) -> TokenResult<usize> {
        Ok(RefreshToken::all(self.namespace.as_deref(), self.ctx.store())
            .await?
            .len())
    }

    /// Verifies `refresh_token` and loads its record. Sessions without a
    /// namespace search every namespace.
    async fn lookup_refresh(&self, refresh_token: &str) -> TokenResult<RefreshToken> {
        let claims = self.ctx.codec().decode(refresh_token)?;
        self.find_refresh(claims.uid()?).await
    }

    async fn find_refresh(&self, uid: &str) -> TokenResult<RefreshToken> {
        RefreshToken::find(
            uid,
            self.ctx.store(),
            self.namespace.as_deref(),
            self.namespace.is_none(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tessera_config::SessionConfig;
    use tessera_core::TokenError;
    use tessera_store::MemoryStore;

    fn context() -> SessionContext {
        SessionContext::new(
            SessionConfig::with_secret("test-secret-key-at-least-32-characters-long"),
            Arc::new(MemoryStore::new()),
        )
        .unwrap()
    }

    fn context_with_leeway(leeway: u64) -> SessionContext {
        let config = SessionConfig {
            leeway,
            ..SessionConfig::with_secret("test-secret-key-at-least-32-characters-long")
        };
        SessionContext::new(config, Arc::new(MemoryStore::with_leeway(leeway))).unwrap()
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn payload() -> Payload {
        json!({"user_id": 7, "role": "admin"}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_login_binds_access_to_refresh() {
        let mut session = Session::new(context(), payload());
        assert_eq!(session.state(), SessionState::Unauthenticated);

        let tokens = session.login().await.unwrap();
        assert_eq!(session.state(), SessionState::Active);

        let access = session.ctx.codec().decode(&tokens.access).unwrap();
        let refresh = session.current_refresh().unwrap();
        assert_eq!(access.ruid().unwrap(), refresh.uid());
        assert_eq!(access.csrf().unwrap(), tokens.csrf);
        assert_eq!(refresh.access_uid(), access.uid().unwrap());
        assert_eq!(refresh.access_expiration(), tokens.access_expires_at);
        assert_eq!(access.payload(), payload());
    }

    #[tokio::test]
    async fn test_login_rejects_reserved_payload_keys() {
        let payload = json!({"csrf": "mine"}).as_object().cloned().unwrap();
        let mut session = Session::new(context(), payload);

        assert!(matches!(
            session.login().await,
            Err(TokenError::InvalidPayload(_))
        ));
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_rejects_iss_when_issuer_configured() {
        let config = SessionConfig {
            issuer: Some("tessera".to_string()),
            ..SessionConfig::with_secret("test-secret-key-at-least-32-characters-long")
        };
        let ctx = SessionContext::new(config, Arc::new(MemoryStore::new())).unwrap();
        let payload = json!({"iss": "someone-else"}).as_object().cloned().unwrap();

        let mut session = Session::new(ctx, payload);
        assert!(matches!(
            session.login().await,
            Err(TokenError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_extreme_ttls_saturate() {
        let ctx = context();
        let mut session = Session::new(ctx.clone(), payload())
            .access_exp(i64::MAX)
            .refresh_exp(i64::MAX);

        let tokens = session.login().await.unwrap();
        assert_eq!(tokens.access_expires_at, i64::MAX);
        assert_eq!(tokens.refresh_expires_at, i64::MAX);

        let refreshed = session.refresh(&tokens.refresh, Some(&permit)).await.unwrap();
        assert_eq!(refreshed.access_expires_at, i64::MAX);
    }

    #[tokio::test]
    async fn test_events_go_to_audit_and_security_targets() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let ctx = context();
        let tokens = Session::new(ctx.clone(), payload()).login().await.unwrap();
        let _ = Session::new(ctx, payload())
            .refresh(&tokens.refresh, None)
            .await;

        let text = captured.text();
        assert!(text.contains("tessera::audit"));
        assert!(text.contains(r#"audit.action="session.login""#));
        assert!(text.contains("tessera::security"));
        assert!(text.contains(r#"security.event="early_refresh_refused""#));
    }

    #[tokio::test]
    async fn test_leeway_extends_early_refresh_window() {
        let ctx = context_with_leeway(30);
        let tokens = Session::new(ctx.clone(), payload())
            .access_exp(-10)
            .login()
            .await
            .unwrap();

        let err = Session::new(ctx.clone(), payload())
            .refresh(&tokens.refresh, None)
            .await
            .unwrap_err();
        assert_eq!(err.unauthorized_reason(), Some(Unauthorized::EarlyRefresh));

        let err = Session::new(ctx, payload())
            .refresh_by_access_allowed(true)
            .access_token(tokens.access)
            .refresh_by_access_payload(None)
            .await
            .unwrap_err();
        assert_eq!(err.unauthorized_reason(), Some(Unauthorized::EarlyRefresh));
    }

    #[tokio::test]
    async fn test_refresh_token_inside_leeway_still_refreshes() {
        let ctx = context_with_leeway(30);
        let tokens = Session::new(ctx.clone(), payload())
            .access_exp(-60)
            .refresh_exp(-10)
            .login()
            .await
            .unwrap();

        let refreshed = Session::new(ctx, payload())
            .refresh(&tokens.refresh, None)
            .await
            .unwrap();
        assert!(refreshed.access_expires_at > tokens.access_expires_at);
    }

    #[tokio::test]
    async fn test_refresh_while_access_valid_needs_fallback() {
        let ctx = context();
        let tokens = Session::new(ctx.clone(), payload()).login().await.unwrap();

        let mut session = Session::new(ctx, payload());
        let err = session.refresh(&tokens.refresh, None).await.unwrap_err();
        assert_eq!(err.unauthorized_reason(), Some(Unauthorized::EarlyRefresh));

        let err = session
            .refresh(&tokens.refresh, Some(&deny))
            .await
            .unwrap_err();
        assert_eq!(err.unauthorized_reason(), Some(Unauthorized::Denied));

        let refreshed = session.refresh(&tokens.refresh, Some(&permit)).await.unwrap();
        assert_ne!(refreshed.csrf, tokens.csrf);
        assert!(refreshed.refresh.is_none());
    }

    #[tokio::test]
    async fn test_refresh_after_access_expiry_needs_no_fallback() {
        let ctx = context();
        let tokens = Session::new(ctx.clone(), payload())
            .access_exp(-10)
            .login()
            .await
            .unwrap();

        let mut session = Session::new(ctx, payload());
        let refreshed = session.refresh(&tokens.refresh, None).await.unwrap();
        assert!(refreshed.access_expires_at > tokens.access_expires_at);
    }

    #[tokio::test]
    async fn test_refresh_rewrites_record_pointer() {
        let ctx = context();
        let tokens = Session::new(ctx.clone(), payload()).login().await.unwrap();

        let mut session = Session::new(ctx.clone(), payload());
        let refreshed = session.refresh(&tokens.refresh, Some(&permit)).await.unwrap();

        let access = ctx.codec().decode(&refreshed.access).unwrap();
        let record = RefreshToken::find(access.ruid().unwrap(), ctx.store(), None, false)
            .await
            .unwrap();
        assert_eq!(record.access_uid(), access.uid().unwrap());
        assert_eq!(record.csrf(), refreshed.csrf);
    }

    #[tokio::test]
    async fn test_refresh_by_access_disabled_by_default() {
        let ctx = context();
        let tokens = Session::new(ctx.clone(), payload()).login().await.unwrap();

        let mut session = Session::new(ctx, payload()).access_token(tokens.access);
        let err = session.refresh_by_access_payload(None).await.unwrap_err();
        assert_eq!(
            err.unauthorized_reason(),
            Some(Unauthorized::RefreshByAccessDisabled)
        );
    }

    #[tokio::test]
    async fn test_refresh_by_access_without_token() {
        let mut session = Session::new(context(), payload()).refresh_by_access_allowed(true);
        let err = session.refresh_by_access_payload(None).await.unwrap_err();
        assert_eq!(err.unauthorized_reason(), Some(Unauthorized::AccessNotFound));
    }

    #[tokio::test]
    async fn test_mismatch_fallback_can_permit() {
        let ctx = context();
        let tokens = Session::new(ctx.clone(), payload())
            .access_exp(-10)
            .login()
            .await
            .unwrap();

        let mut first = Session::new(ctx.clone(), payload())
            .refresh_by_access_allowed(true)
            .access_token(tokens.access.clone());
        first.refresh_by_access_payload(None).await.unwrap();

        let seen = std::sync::Mutex::new(Vec::new());
        let record_reason = |attempt: &RefreshAttempt| {
            seen.lock().unwrap().push(attempt.reason);
            RefreshDecision::Permit
        };

        let mut replay = Session::new(ctx, payload())
            .refresh_by_access_allowed(true)
            .access_token(tokens.access);
        replay
            .refresh_by_access_payload(Some(&record_reason))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![RefreshReason::AccessMismatch]);
    }

    #[tokio::test]
    async fn test_session_exists_and_csrf_for() {
        let ctx = context();
        let mut session = Session::new(ctx.clone(), payload()).namespace("web");
        let tokens = session.login().await.unwrap();

        assert!(session.session_exists(&tokens.refresh).await.unwrap());
        assert!(!session.session_exists("not-a-token").await.unwrap());
        assert_eq!(session.csrf_for(&tokens.refresh).await.unwrap(), tokens.csrf);

        let other = Session::new(ctx, payload()).namespace("mobile");
        assert!(!other.session_exists(&tokens.refresh).await.unwrap());
    }

    #[tokio::test]
    async fn test_valid_refresh_count() {
        let ctx = context();
        for _ in 0..3 {
            Session::new(ctx.clone(), payload())
                .namespace("web")
                .login()
                .await
                .unwrap();
        }
        Session::new(ctx.clone(), payload()).login().await.unwrap();

        let web = Session::new(ctx.clone(), payload()).namespace("web");
        assert_eq!(web.valid_refresh_count().await.unwrap(), 3);
        assert_eq!(
            Session::new(ctx, payload()).valid_refresh_count().await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_refreshed_tokens_skip_missing_refresh_fields() {
        let tokens = RefreshedTokens {
            access: "a".to_string(),
            access_expires_at: 1,
            csrf: "c".to_string(),
            refresh: None,
            refresh_expires_at: None,
        };
        let value = serde_json::to_value(&tokens).unwrap();
        assert_eq!(value, json!({"access": "a", "access_expires_at": 1, "csrf": "c"}));
    }

    #[tokio::test]
    async fn test_persisted_access_records_follow_rotation() {
        let config = SessionConfig {
            persist_access_tokens: true,
            ..SessionConfig::with_secret("test-secret-key-at-least-32-characters-long")
        };
        let ctx = SessionContext::new(config, Arc::new(MemoryStore::new())).unwrap();

        let mut session = Session::new(ctx.clone(), payload());
        let tokens = session.login().await.unwrap();
        let first_uid = session.current_access().unwrap().uid().to_owned();
        assert!(AccessToken::find(&first_uid, ctx.store()).await.is_ok());

        session.refresh(&tokens.refresh, Some(&permit)).await.unwrap();
        let second_uid = session.current_access().unwrap().uid().to_owned();

        assert!(AccessToken::find(&first_uid, ctx.store()).await.is_err());
        assert!(AccessToken::find(&second_uid, ctx.store()).await.is_ok());
    }
}
