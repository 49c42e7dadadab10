//! In-process token store.
//!
//! Intended for tests and single-process deployments. Expired records stay
//! in the maps until overwritten or flushed but are invisible to reads once
//! their expiration plus the configured leeway has passed.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use tessera_core::{StoreError, clock};

use crate::records::{AccessRecord, RefreshRecord, RefreshUpdate, normalize_namespace};
use crate::store::{TokenStore, UpdateOutcome};

type RefreshKey = (Option<String>, String);

fn refresh_key(uid: &str, namespace: Option<&str>) -> RefreshKey {
    (normalize_namespace(namespace).map(str::to_owned), uid.to_owned())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    refresh: RwLock<HashMap<RefreshKey, RefreshRecord>>,
    access: RwLock<HashMap<String, AccessRecord>>,
    leeway: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps records readable for `leeway` seconds past their expiration,
    /// matching the codec's tolerance.
    pub fn with_leeway(leeway: u64) -> Self {
        Self {
            leeway: i64::try_from(leeway).unwrap_or(i64::MAX),
            ..Self::default()
        }
    }

    /// The instant records are compared against.
    fn cutoff(&self) -> i64 {
        clock::now().saturating_sub(self.leeway)
    }

    /// Number of refresh records physically held, expired ones included.
    pub async fn refresh_len(&self) -> usize {
        self.refresh.read().await.len()
    }

    pub async fn access_len(&self) -> usize {
        self.access.read().await.len()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn persist_refresh(&self, uid: &str, record: &RefreshRecord) -> Result<(), StoreError> {
        let mut record = record.clone();
        record.namespace = normalize_namespace(record.namespace.as_deref()).map(str::to_owned);
        let key = refresh_key(uid, record.namespace.as_deref());

        trace!(store.uid = %uid, "persist refresh");
        self.refresh.write().await.insert(key, record);
        Ok(())
    }

    async fn fetch_refresh(
        &self,
        uid: &str,
        namespace: Option<&str>,
        first_match: bool,
    ) -> Result<Option<RefreshRecord>, StoreError> {
        let now = self.cutoff();
        let refresh = self.refresh.read().await;

        let found = if first_match {
            refresh
                .iter()
                .find(|((_, key_uid), record)| key_uid == uid && !record.is_expired_at(now))
                .map(|(_, record)| record.clone())
        } else {
            refresh
                .get(&refresh_key(uid, namespace))
                .filter(|record| !record.is_expired_at(now))
                .cloned()
        };
        Ok(found)
    }

    async fn update_refresh(
        &self,
        uid: &str,
        update: &RefreshUpdate,
        namespace: Option<&str>,
    ) -> Result<UpdateOutcome, StoreError> {
        let now = self.cutoff();
        let mut refresh = self.refresh.write().await;

        let outcome = match refresh.get_mut(&refresh_key(uid, namespace)) {
            Some(record) if !record.is_expired_at(now) => {
                if record.matches_expected(update) {
                    record.apply(update);
                    UpdateOutcome::Updated
                } else {
                    UpdateOutcome::Conflict
                }
            }
            _ => UpdateOutcome::Missing,
        };
        trace!(store.uid = %uid, store.outcome = ?outcome, "update refresh");
        Ok(outcome)
    }

    async fn destroy_refresh(&self, uid: &str, namespace: Option<&str>) -> Result<bool, StoreError> {
        let removed = self
            .refresh
            .write()
            .await
            .remove(&refresh_key(uid, namespace));
        Ok(removed.is_some())
    }

    async fn all_refresh_tokens(
        &self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, RefreshRecord>, StoreError> {
        let now = self.cutoff();
        let namespace = normalize_namespace(namespace);

        Ok(self
            .refresh
            .read()
            .await
            .iter()
            .filter(|((ns, _), record)| ns.as_deref() == namespace && !record.is_expired_at(now))
            .map(|((_, uid), record)| (uid.clone(), record.clone()))
            .collect())
    }

    async fn all_refresh_tokens_any_namespace(
        &self,
    ) -> Result<Vec<(String, RefreshRecord)>, StoreError> {
        let now = self.cutoff();

        Ok(self
            .refresh
            .read()
            .await
            .iter()
            .filter(|(_, record)| !record.is_expired_at(now))
            .map(|((_, uid), record)| (uid.clone(), record.clone()))
            .collect())
    }

    async fn persist_access(&self, uid: &str, csrf: &str, expiration: i64) -> Result<(), StoreError> {
        let record = AccessRecord {
            uid: uid.to_owned(),
            csrf: csrf.to_owned(),
            expiration,
        };
        self.access.write().await.insert(uid.to_owned(), record);
        Ok(())
    }

    async fn fetch_access(&self, uid: &str) -> Result<Option<AccessRecord>, StoreError> {
        let now = self.cutoff();
        Ok(self
            .access
            .read()
            .await
            .get(uid)
            .filter(|record| record.expiration >= now)
            .cloned())
    }

    async fn destroy_access(&self, uid: &str) -> Result<bool, StoreError> {
        Ok(self.access.write().await.remove(uid).is_some())
    }
}
