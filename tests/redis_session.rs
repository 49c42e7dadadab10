mod common;

use std::sync::Arc;

use tessera::session::permit;
use tessera::{Session, SessionContext, Unauthorized};
use tessera_config::StoreConfig;
use tessera_store::RedisStore;

use common::{fake_payload, refresh_uid_of, test_config};

// Integration tests require a running Redis instance

async fn redis_context() -> SessionContext {
    let config = StoreConfig {
        key_prefix: format!("tessera-it-{}", tessera_core::new_uid()),
        ..StoreConfig::from_env()
    };
    let store = RedisStore::new(&config).await.unwrap();
    SessionContext::new(test_config(), Arc::new(store)).unwrap()
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_login_refresh_and_flush_against_redis() {
    let ctx = redis_context().await;
    let mut session = Session::new(ctx.clone(), fake_payload()).namespace("web");
    let tokens = session.login().await.unwrap();

    let refreshed = Session::new(ctx.clone(), fake_payload())
        .namespace("web")
        .refresh(&tokens.refresh, Some(&permit))
        .await
        .unwrap();
    assert_eq!(
        refresh_uid_of(&ctx, &refreshed.access),
        refresh_uid_of(&ctx, &tokens.access)
    );

    assert_eq!(session.valid_refresh_count().await.unwrap(), 1);
    assert_eq!(session.flush_namespaced().await.unwrap(), 1);
    assert!(!session.session_exists(&tokens.refresh).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_replay_protection_against_redis() {
    let ctx = redis_context().await;
    let tokens = Session::new(ctx.clone(), fake_payload())
        .access_exp(-10)
        .login()
        .await
        .unwrap();

    let mut session = Session::new(ctx.clone(), fake_payload())
        .refresh_by_access_allowed(true)
        .access_token(tokens.access);

    session.refresh_by_access_payload(None).await.unwrap();
    let err = session.refresh_by_access_payload(None).await.unwrap_err();
    assert_eq!(err.unauthorized_reason(), Some(Unauthorized::StaleAccessToken));

    assert_eq!(Session::flush_all(&ctx).await.unwrap(), 1);
}
