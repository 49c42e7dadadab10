mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use tessera::{Session, SessionContext, TokenError, Unauthorized};
use tessera_core::StoreError;
use tessera_store::{
    AccessRecord, MemoryStore, RefreshRecord, RefreshUpdate, TokenStore, UpdateOutcome,
};

use common::{fake_payload, refresh_exists, refresh_uid_of, test_config};

/// Memory store that yields after every refresh fetch, the way a network
/// round-trip would, and can be told to fail refresh writes.
#[derive(Default)]
struct SlowStore {
    inner: MemoryStore,
    fail_persist: AtomicBool,
}

#[async_trait]
impl TokenStore for SlowStore {
    async fn persist_refresh(&self, uid: &str, record: &RefreshRecord) -> Result<(), StoreError> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(StoreError::backend(std::io::Error::other("write refused")));
        }
        self.inner.persist_refresh(uid, record).await
    }

    async fn fetch_refresh(
        &self,
        uid: &str,
        namespace: Option<&str>,
        first_match: bool,
    ) -> Result<Option<RefreshRecord>, StoreError> {
        let found = self.inner.fetch_refresh(uid, namespace, first_match).await;
        tokio::task::yield_now().await;
        found
    }

    async fn update_refresh(
        &self,
        uid: &str,
        update: &RefreshUpdate,
        namespace: Option<&str>,
    ) -> Result<UpdateOutcome, StoreError> {
        self.inner.update_refresh(uid, update, namespace).await
    }

    async fn destroy_refresh(&self, uid: &str, namespace: Option<&str>) -> Result<bool, StoreError> {
        self.inner.destroy_refresh(uid, namespace).await
    }

    async fn all_refresh_tokens(
        &self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, RefreshRecord>, StoreError> {
        self.inner.all_refresh_tokens(namespace).await
    }

    async fn all_refresh_tokens_any_namespace(
        &self,
    ) -> Result<Vec<(String, RefreshRecord)>, StoreError> {
        self.inner.all_refresh_tokens_any_namespace().await
    }

    async fn persist_access(&self, uid: &str, csrf: &str, expiration: i64) -> Result<(), StoreError> {
        self.inner.persist_access(uid, csrf, expiration).await
    }

    async fn fetch_access(&self, uid: &str) -> Result<Option<AccessRecord>, StoreError> {
        self.inner.fetch_access(uid).await
    }

    async fn destroy_access(&self, uid: &str) -> Result<bool, StoreError> {
        self.inner.destroy_access(uid).await
    }
}

fn slow_context() -> (SessionContext, Arc<SlowStore>) {
    let store = Arc::new(SlowStore::default());
    let ctx = SessionContext::new(test_config(), store.clone()).unwrap();
    (ctx, store)
}

async fn expired_login(ctx: &SessionContext) -> String {
    Session::new(ctx.clone(), fake_payload())
        .access_exp(-10)
        .login()
        .await
        .unwrap()
        .access
}

#[tokio::test]
async fn test_concurrent_refresh_by_same_access_token_rotates_once() {
    let (ctx, _) = slow_context();
    let access = expired_login(&ctx).await;

    let mut first = Session::new(ctx.clone(), fake_payload())
        .refresh_by_access_allowed(true)
        .access_token(access.clone());
    let mut second = Session::new(ctx.clone(), fake_payload())
        .refresh_by_access_allowed(true)
        .access_token(access);

    let (a, b) = tokio::join!(
        first.refresh_by_access_payload(None),
        second.refresh_by_access_payload(None)
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let refused = outcomes.into_iter().find_map(Result::err).unwrap();
    assert_eq!(
        refused.unauthorized_reason(),
        Some(Unauthorized::StaleAccessToken)
    );
}

#[tokio::test]
async fn test_concurrent_renewals_leave_one_record() {
    let (ctx, _) = slow_context();
    let access = expired_login(&ctx).await;
    let old_uid = refresh_uid_of(&ctx, &access);

    let mut first = Session::new(ctx.clone(), fake_payload())
        .refresh_by_access_allowed(true)
        .renew_on_refresh(true)
        .access_token(access.clone());
    let mut second = Session::new(ctx.clone(), fake_payload())
        .refresh_by_access_allowed(true)
        .renew_on_refresh(true)
        .access_token(access);

    let (a, b) = tokio::join!(
        first.refresh_by_access_payload(None),
        second.refresh_by_access_payload(None)
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert!(!refresh_exists(&ctx, &old_uid).await);
    assert_eq!(
        Session::new(ctx, fake_payload())
            .valid_refresh_count()
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_failed_renewal_keeps_old_record() {
    let (ctx, store) = slow_context();
    let access = expired_login(&ctx).await;
    let old_uid = refresh_uid_of(&ctx, &access);

    store.fail_persist.store(true, Ordering::SeqCst);
    let err = Session::new(ctx.clone(), fake_payload())
        .refresh_by_access_allowed(true)
        .renew_on_refresh(true)
        .access_token(access.clone())
        .refresh_by_access_payload(None)
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Store(_)));
    assert!(refresh_exists(&ctx, &old_uid).await);

    // The session survives the failed write and renews once the store recovers
    store.fail_persist.store(false, Ordering::SeqCst);
    let refreshed = Session::new(ctx.clone(), fake_payload())
        .refresh_by_access_allowed(true)
        .renew_on_refresh(true)
        .access_token(access)
        .refresh_by_access_payload(None)
        .await
        .unwrap();
    assert!(refreshed.refresh.is_some());
    assert!(!refresh_exists(&ctx, &old_uid).await);
}
