use std::sync::Arc;

use fake::Fake;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use serde_json::json;

use tessera::{Payload, RefreshToken, SessionContext};
use tessera_config::SessionConfig;
use tessera_store::MemoryStore;

pub const TEST_SECRET: &str = "test_secret_key_for_testing_purposes";

pub fn test_config() -> SessionConfig {
    SessionConfig::with_secret(TEST_SECRET)
}

/// Context over a fresh in-memory store.
pub fn test_context() -> SessionContext {
    test_context_with(test_config())
}

#[allow(dead_code)]
pub fn test_context_with(config: SessionConfig) -> SessionContext {
    SessionContext::new(config, Arc::new(MemoryStore::new())).unwrap()
}

/// A payload with a random user identity.
pub fn fake_payload() -> Payload {
    let email: String = SafeEmail().fake();
    let name: String = Name().fake();

    json!({
        "user_id": (1..10_000).fake::<u32>(),
        "email": email,
        "name": name,
    })
    .as_object()
    .cloned()
    .unwrap()
}

/// The `ruid` claim of an access token, expired or not.
#[allow(dead_code)]
pub fn refresh_uid_of(ctx: &SessionContext, access_token: &str) -> String {
    ctx.codec()
        .decode_claimless(access_token)
        .unwrap()
        .ruid()
        .unwrap()
        .to_owned()
}

/// Whether a refresh record for `uid` is still stored in any namespace.
#[allow(dead_code)]
pub async fn refresh_exists(ctx: &SessionContext, uid: &str) -> bool {
    RefreshToken::find(uid, ctx.store(), None, true).await.is_ok()
}
