//! The capability interface the session engine depends on.
//!
//! Fetch operations return `Ok(None)` when a key is absent; turning absence
//! into an authorization failure is the caller's job. Updates are
//! compare-and-set on the record's access pointer, so two rotations started
//! from the same fetched record cannot both land.

use std::collections::BTreeMap;

use async_trait::async_trait;

use tessera_core::StoreError;

use crate::records::{AccessRecord, RefreshRecord, RefreshUpdate};

/// Result of a conditional [`TokenStore::update_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// No live record for the uid in that namespace.
    Missing,
    /// The record's access pointer no longer matches the expected one.
    Conflict,
}

/// Storage for refresh records and, optionally, access records.
///
/// A `namespace` of `None` addresses un-namespaced records. `first_match`
/// lookups ignore the namespace entirely.
///
/// The access-record operations have no-op defaults so that a store
/// without access persistence still satisfies the contract.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn persist_refresh(&self, uid: &str, record: &RefreshRecord) -> Result<(), StoreError>;

    async fn fetch_refresh(
        &self,
        uid: &str,
        namespace: Option<&str>,
        first_match: bool,
    ) -> Result<Option<RefreshRecord>, StoreError>;

    /// Rewrites the rotation fields of an existing record, atomically
    /// checking its access pointer against the expected one first.
    async fn update_refresh(
        &self,
        uid: &str,
        update: &RefreshUpdate,
        namespace: Option<&str>,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Returns `true` when a record was removed.
    async fn destroy_refresh(&self, uid: &str, namespace: Option<&str>) -> Result<bool, StoreError>;

    /// Every live refresh record in exactly `namespace`, keyed by uid.
    async fn all_refresh_tokens(
        &self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, RefreshRecord>, StoreError>;

    /// Every live refresh record in every namespace, as `(uid, record)` pairs.
    async fn all_refresh_tokens_any_namespace(
        &self,
    ) -> Result<Vec<(String, RefreshRecord)>, StoreError>;

    async fn persist_access(
        &self,
        _uid: &str,
        _csrf: &str,
        _expiration: i64,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn fetch_access(&self, _uid: &str) -> Result<Option<AccessRecord>, StoreError> {
        Ok(None)
    }

    async fn destroy_access(&self, _uid: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}
