//! Store-level session administration.
//!
//! Every command goes through [`Session`] so flushes behave exactly as they
//! do inside the application, access-record cleanup included.

use tracing::info;

use tessera::{Payload, RefreshToken, Session, SessionContext, TokenResult};

/// A session with no payload, used only for lookups and flushes.
fn admin_session(ctx: &SessionContext, namespace: Option<&str>) -> Session {
    Session::new(ctx.clone(), Payload::new()).namespace(namespace.unwrap_or_default())
}

/// Live refresh sessions in `namespace`.
pub async fn count(ctx: &SessionContext, namespace: Option<&str>) -> TokenResult<usize> {
    admin_session(ctx, namespace).valid_refresh_count().await
}

/// Loads one refresh record. Without a namespace every namespace is searched.
pub async fn inspect(
    ctx: &SessionContext,
    uid: &str,
    namespace: Option<&str>,
) -> TokenResult<RefreshToken> {
    RefreshToken::find(uid, ctx.store(), namespace, namespace.is_none()).await
}

pub async fn revoke(ctx: &SessionContext, uid: &str, namespace: Option<&str>) -> TokenResult<()> {
    admin_session(ctx, namespace).flush_by_uid(uid).await?;
    info!(refresh.uid = %uid, "Session revoked");
    Ok(())
}

pub async fn flush_namespace(ctx: &SessionContext, namespace: Option<&str>) -> TokenResult<usize> {
    admin_session(ctx, namespace).flush_namespaced().await
}

pub async fn flush_all(ctx: &SessionContext) -> TokenResult<usize> {
    Session::flush_all(ctx).await
}

/// One line per field, for terminal output.
pub fn describe(refresh: &RefreshToken) -> String {
    let access = if refresh.pointer_cleared() {
        "(cleared)".to_string()
    } else {
        format!("{} (expires {})", refresh.access_uid(), refresh.access_expiration())
    };

    format!(
        "   UID: {}\n   Namespace: {}\n   Expires: {}\n   Access: {}",
        refresh.uid(),
        refresh.namespace().unwrap_or("(none)"),
        refresh.expiration(),
        access
    )
}
