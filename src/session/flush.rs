//! Revocation: single-token flushes, namespace flushes and `flush_all`.

use tracing::{info, instrument, warn};

use tessera_core::{TokenResult, Unauthorized};

use super::{Session, SessionState};
use crate::context::SessionContext;
use crate::metrics::track_flush;
use crate::tokens::{AccessToken, RefreshToken};

impl Session {
    /// Destroys the refresh record behind a verified refresh token.
    ///
    /// # Errors
    ///
    /// `TokenError::ClaimsVerification` if the token does not verify,
    /// `Unauthorized::RefreshNotFound` if the record is already gone.
    #[instrument(skip_all, fields(session.namespace = self.namespace.as_deref().unwrap_or("")))]
    pub async fn flush_by_token(&mut self, refresh_token: &str) -> TokenResult<()> {
        let refresh = self.lookup_refresh(refresh_token).await?;
        self.flush_refresh(&refresh, "token").await
    }

    /// Destroys a refresh record by uid.
    #[instrument(skip(self), fields(session.namespace = self.namespace.as_deref().unwrap_or("")))]
    pub async fn flush_by_uid(&mut self, uid: &str) -> TokenResult<()> {
        let refresh = self.find_refresh(uid).await?;
        self.flush_refresh(&refresh, "uid").await
    }

    /// Destroys the refresh record the presented access token was issued by.
    ///
    /// The access token may be expired. Afterwards any refresh through that
    /// access token fails with `Unauthorized::RefreshNotFound`.
    #[instrument(skip_all, fields(session.namespace = self.namespace.as_deref().unwrap_or("")))]
    pub async fn flush_by_access_payload(&mut self) -> TokenResult<()> {
        let claims = self.presented_access_claims()?;
        let refresh = self.find_refresh(claims.ruid()?).await?;

        self.flush_refresh(&refresh, "access_payload").await?;
        self.state = SessionState::Flushed;
        Ok(())
    }

    async fn flush_refresh(
        &mut self,
        refresh: &RefreshToken,
        scope: &'static str,
    ) -> TokenResult<()> {
        let store = self.ctx.store();
        if !refresh.destroy(store).await? {
            return Err(Unauthorized::RefreshNotFound.into());
        }
        if self.ctx.config().persist_access_tokens && !refresh.pointer_cleared() {
            AccessToken::destroy(refresh.access_uid(), store).await?;
        }

        track_flush(scope, 1);
        info!(
            target: "tessera::audit",
            {
                audit.action = "session.flush",
                flush.scope = scope,
                refresh.uid = %refresh.uid()
            },
            "Refresh token flushed"
        );

        if self
            .refresh
            .as_ref()
            .is_some_and(|own| own.uid() == refresh.uid())
        {
            self.release_pair();
        }
        Ok(())
    }

    /// Destroys every refresh record in this session's namespace.
    ///
    /// A session without a namespace only touches un-namespaced records.
    /// Returns the number of records destroyed.
    #[instrument(skip_all, fields(session.namespace = self.namespace.as_deref().unwrap_or("")))]
    pub async fn flush_namespaced(&mut self) -> TokenResult<usize> {
        let store = self.ctx.store();
        let persist_access = self.ctx.config().persist_access_tokens;
        let mut flushed = 0;

        for refresh in RefreshToken::all(self.namespace.as_deref(), store).await? {
            // Records may expire or be flushed concurrently between listing and delete
            if !refresh.destroy(store).await? {
                continue;
            }
            if persist_access && !refresh.pointer_cleared() {
                AccessToken::destroy(refresh.access_uid(), store).await?;
            }
            flushed += 1;
        }

        track_flush("namespace", flushed);
        info!(
            target: "tessera::audit",
            {
                audit.action = "session.flush_namespaced",
                flush.count = flushed
            },
            "Namespace flushed"
        );

        if flushed > 0 && self.refresh.is_some() {
            self.release_pair();
        }
        Ok(flushed)
    }

    /// Destroys the access records bound to every refresh record in this
    /// session's namespace and clears those records' access pointers.
    ///
    /// The refresh records survive: once the orphaned access tokens expire,
    /// `refresh_by_access_payload` can rotate them again. Returns the number
    /// of refresh records whose pointer was cleared.
    #[instrument(skip_all, fields(session.namespace = self.namespace.as_deref().unwrap_or("")))]
    pub async fn flush_namespaced_access_tokens(&mut self) -> TokenResult<usize> {
        let store = self.ctx.store();
        let persist_access = self.ctx.config().persist_access_tokens;
        let mut cleared = 0;

        for mut refresh in RefreshToken::all(self.namespace.as_deref(), store).await? {
            if persist_access && !refresh.pointer_cleared() {
                AccessToken::destroy(refresh.access_uid(), store).await?;
            }

            match refresh.clear_access_pointer(store).await {
                Ok(()) => cleared += 1,
                Err(err) if err.unauthorized_reason() == Some(Unauthorized::RefreshNotFound) => {
                    warn!(
                        refresh.uid = %refresh.uid(),
                        "Refresh record vanished during access flush"
                    );
                }
                Err(err) if err.unauthorized_reason() == Some(Unauthorized::StaleAccessToken) => {
                    warn!(
                        refresh.uid = %refresh.uid(),
                        "Refresh record rotated during access flush"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        track_flush("namespace_access", cleared);
        info!(
            target: "tessera::audit",
            {
                audit.action = "session.flush_namespaced_access_tokens",
                flush.count = cleared
            },
            "Namespace access tokens flushed"
        );
        Ok(cleared)
    }

    /// Destroys every refresh record in every namespace. Returns the count.
    #[instrument(skip_all)]
    pub async fn flush_all(ctx: &SessionContext) -> TokenResult<usize> {
        let store = ctx.store();
        let persist_access = ctx.config().persist_access_tokens;
        let mut flushed = 0;

        for refresh in RefreshToken::all_any_namespace(store).await? {
            if !refresh.destroy(store).await? {
                continue;
            }
            if persist_access && !refresh.pointer_cleared() {
                AccessToken::destroy(refresh.access_uid(), store).await?;
            }
            flushed += 1;
        }

        track_flush("all", flushed);
        info!(
            target: "tessera::audit",
            {
                audit.action = "session.flush_all",
                flush.count = flushed
            },
            "All sessions flushed"
        );
        Ok(flushed)
    }

    fn release_pair(&mut self) {
        self.access = None;
        self.refresh = None;
        self.state = SessionState::Flushed;
    }
}
