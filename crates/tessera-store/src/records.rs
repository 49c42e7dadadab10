//! Records persisted per token uid.

use serde::{Deserialize, Serialize};

/// `access_uid` of a refresh record whose access pointer was cleared.
pub const CLEARED_ACCESS_UID: &str = "";
/// `access_expiration` of a refresh record whose access pointer was cleared.
pub const CLEARED_ACCESS_EXPIRATION: i64 = 0;

/// Stored state of one refresh token.
///
/// `access_uid`/`access_expiration` point at the access token the refresh
/// token currently considers valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub csrf: String,
    pub access_uid: String,
    pub access_expiration: i64,
    pub expiration: i64,
    pub namespace: Option<String>,
}

impl RefreshRecord {
    /// True once an access-token flush has reset the pointer.
    pub fn pointer_cleared(&self) -> bool {
        self.access_uid == CLEARED_ACCESS_UID
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiration < now
    }

    /// True while the record still points at the access token `update`
    /// expects to replace.
    pub fn matches_expected(&self, update: &RefreshUpdate) -> bool {
        self.access_uid == update.expected_access_uid
            && self.access_expiration == update.expected_access_expiration
    }

    pub fn apply(&mut self, update: &RefreshUpdate) {
        self.access_uid = update.access_uid.clone();
        self.access_expiration = update.access_expiration;
        self.csrf = update.csrf.clone();
        self.expiration = update.expiration;
    }
}

/// Fields rewritten on every rotation. `expiration` is always supplied.
///
/// The update only applies while the stored pointer still equals
/// `expected_access_uid`/`expected_access_expiration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshUpdate {
    pub access_uid: String,
    pub access_expiration: i64,
    pub csrf: String,
    pub expiration: i64,
    pub expected_access_uid: String,
    pub expected_access_expiration: i64,
}

/// Stored state of one access token, kept only when access persistence is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub uid: String,
    pub csrf: String,
    pub expiration: i64,
}

/// Treats an empty namespace the same as no namespace.
pub fn normalize_namespace(namespace: Option<&str>) -> Option<&str> {
    namespace.filter(|ns| !ns.is_empty())
}
