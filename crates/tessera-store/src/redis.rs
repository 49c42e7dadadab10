//! Redis-backed token store.
//!
//! Records are stored as JSON strings with a TTL matching their remaining
//! lifetime plus the configured leeway, so Redis evicts them once they
//! expire.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use tessera_config::StoreConfig;
use tessera_core::{StoreError, clock};

use crate::keys::{KeySpace, uid_from_refresh_key};
use crate::records::{AccessRecord, RefreshRecord, RefreshUpdate, normalize_namespace};
use crate::store::{TokenStore, UpdateOutcome};

/// Compare-and-set on a refresh record's access pointer.
///
/// KEYS[1] record key; ARGV expected uid, expected expiration, new JSON, TTL.
/// Returns 1 when written, 0 when the key is gone, -1 on a pointer mismatch.
static UPDATE_REFRESH: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local current = redis.call('GET', KEYS[1])
if not current then
    return 0
end
local record = cjson.decode(current)
if record.access_uid ~= ARGV[1] or record.access_expiration ~= tonumber(ARGV[2]) then
    return -1
end
redis.call('SET', KEYS[1], ARGV[3], 'EX', ARGV[4])
return 1
",
    )
});

/// Redis token store with connection pooling.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    keys: KeySpace,
    leeway: i64,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connects to Redis using `config.redis_url`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the connection fails.
    pub async fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.redis_url.as_str()).map_err(StoreError::backend)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(StoreError::backend)?;

        Ok(Self {
            conn,
            keys: KeySpace::new(config.key_prefix.clone()),
            leeway: i64::try_from(config.leeway).unwrap_or(i64::MAX),
        })
    }

    /// Seconds until `expiration` plus leeway, never less than one.
    fn ttl_until(&self, expiration: i64) -> u64 {
        let remaining = expiration
            .saturating_add(self.leeway)
            .saturating_sub(clock::now());
        u64::try_from(remaining.max(1)).unwrap_or(1)
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut conn = self.conn.clone();
        let value = conn
            .get::<_, Option<String>>(key)
            .await
            .map_err(StoreError::backend)?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        expiration: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(value)?;

        conn.set_ex::<_, _, ()>(key, json, self.ttl_until(expiration))
            .await
            .map_err(StoreError::backend)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed = conn
            .del::<_, u64>(key)
            .await
            .map_err(StoreError::backend)?;
        Ok(removed > 0)
    }

    /// Collects every key matching `pattern` with cursor-based SCAN.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(StoreError::backend)?;

            found.extend(keys);

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(found)
    }

    /// Loads the refresh records behind `keys`, skipping keys that vanished
    /// between SCAN and GET.
    async fn load_refresh(&self, keys: Vec<String>) -> Result<Vec<(String, RefreshRecord)>, StoreError> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(uid) = uid_from_refresh_key(&key) else {
                continue;
            };
            if let Some(record) = self.get_json::<RefreshRecord>(&key).await? {
                records.push((uid.to_owned(), record));
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl TokenStore for RedisStore {
    #[instrument(skip(self, record), fields(store.operation = "PERSIST_REFRESH"))]
    async fn persist_refresh(&self, uid: &str, record: &RefreshRecord) -> Result<(), StoreError> {
        let mut record = record.clone();
        record.namespace = normalize_namespace(record.namespace.as_deref()).map(str::to_owned);
        let key = self.keys.refresh(uid, record.namespace.as_deref());

        self.set_json(&key, &record, record.expiration).await?;
        debug!(store.key = %key, "Refresh record persisted");
        Ok(())
    }

    #[instrument(skip(self), fields(store.operation = "FETCH_REFRESH"))]
    async fn fetch_refresh(
        &self,
        uid: &str,
        namespace: Option<&str>,
        first_match: bool,
    ) -> Result<Option<RefreshRecord>, StoreError> {
        let key = if first_match {
            match self.scan(&self.keys.refresh_any_namespace(uid)).await?.into_iter().next() {
                Some(key) => key,
                None => return Ok(None),
            }
        } else {
            self.keys.refresh(uid, normalize_namespace(namespace))
        };

        let record = self.get_json(&key).await?;
        debug!(store.key = %key, store.hit = record.is_some(), "Refresh record fetched");
        Ok(record)
    }

    #[instrument(skip(self, update), fields(store.operation = "UPDATE_REFRESH"))]
    async fn update_refresh(
        &self,
        uid: &str,
        update: &RefreshUpdate,
        namespace: Option<&str>,
    ) -> Result<UpdateOutcome, StoreError> {
        let key = self.keys.refresh(uid, normalize_namespace(namespace));
        let Some(mut record) = self.get_json::<RefreshRecord>(&key).await? else {
            return Ok(UpdateOutcome::Missing);
        };
        if !record.matches_expected(update) {
            return Ok(UpdateOutcome::Conflict);
        }

        record.apply(update);
        let json = serde_json::to_string(&record)?;

        // The script re-checks the pointer, so a rotation that landed since
        // the GET above is not overwritten.
        let mut conn = self.conn.clone();
        let status: i64 = UPDATE_REFRESH
            .key(&key)
            .arg(&update.expected_access_uid)
            .arg(update.expected_access_expiration)
            .arg(json)
            .arg(self.ttl_until(record.expiration))
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        let outcome = match status {
            1 => UpdateOutcome::Updated,
            0 => UpdateOutcome::Missing,
            _ => UpdateOutcome::Conflict,
        };
        debug!(store.key = %key, store.outcome = ?outcome, "Refresh record updated");
        Ok(outcome)
    }

    #[instrument(skip(self), fields(store.operation = "DESTROY_REFRESH"))]
    async fn destroy_refresh(&self, uid: &str, namespace: Option<&str>) -> Result<bool, StoreError> {
        self.delete(&self.keys.refresh(uid, normalize_namespace(namespace)))
            .await
    }

    #[instrument(skip(self), fields(store.operation = "ALL_REFRESH"))]
    async fn all_refresh_tokens(
        &self,
        namespace: Option<&str>,
    ) -> Result<BTreeMap<String, RefreshRecord>, StoreError> {
        let namespace = normalize_namespace(namespace);
        let keys = self.scan(&self.keys.refresh_namespace(namespace)).await?;

        Ok(self
            .load_refresh(keys)
            .await?
            .into_iter()
            .filter(|(_, record)| record.namespace.as_deref() == namespace)
            .collect())
    }

    #[instrument(skip(self), fields(store.operation = "ALL_REFRESH_ANY"))]
    async fn all_refresh_tokens_any_namespace(
        &self,
    ) -> Result<Vec<(String, RefreshRecord)>, StoreError> {
        let keys = self.scan(&self.keys.refresh_all()).await?;
        self.load_refresh(keys).await
    }

    #[instrument(skip(self, csrf), fields(store.operation = "PERSIST_ACCESS"))]
    async fn persist_access(&self, uid: &str, csrf: &str, expiration: i64) -> Result<(), StoreError> {
        let record = AccessRecord {
            uid: uid.to_owned(),
            csrf: csrf.to_owned(),
            expiration,
        };
        self.set_json(&self.keys.access(uid), &record, expiration)
            .await
    }

    #[instrument(skip(self), fields(store.operation = "FETCH_ACCESS"))]
    async fn fetch_access(&self, uid: &str) -> Result<Option<AccessRecord>, StoreError> {
        self.get_json(&self.keys.access(uid)).await
    }

    #[instrument(skip(self), fields(store.operation = "DESTROY_ACCESS"))]
    async fn destroy_access(&self, uid: &str) -> Result<bool, StoreError> {
        self.delete(&self.keys.access(uid)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests require a running Redis instance

    async fn connect() -> RedisStore {
        let config = StoreConfig {
            key_prefix: format!("tessera-test-{}", tessera_core::new_uid()),
            ..StoreConfig::default()
        };
        RedisStore::new(&config).await.unwrap()
    }

    fn record(namespace: Option<&str>) -> RefreshRecord {
        RefreshRecord {
            csrf: "csrf".to_string(),
            access_uid: "access".to_string(),
            access_expiration: clock::now() + 60,
            expiration: clock::now() + 600,
            namespace: namespace.map(str::to_owned),
        }
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_persist_fetch_destroy() {
        let store = connect().await;
        let persisted = record(Some("ns"));
        store.persist_refresh("r1", &persisted).await.unwrap();

        let found = store.fetch_refresh("r1", Some("ns"), false).await.unwrap();
        assert_eq!(found, Some(persisted));
        assert!(store.fetch_refresh("r1", None, true).await.unwrap().is_some());

        assert!(store.destroy_refresh("r1", Some("ns")).await.unwrap());
        assert!(store.fetch_refresh("r1", Some("ns"), false).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_namespace_enumeration() {
        let store = connect().await;
        store.persist_refresh("a", &record(Some("ns"))).await.unwrap();
        store.persist_refresh("b", &record(Some("ns:inner"))).await.unwrap();
        store.persist_refresh("c", &record(None)).await.unwrap();

        let namespaced = store.all_refresh_tokens(Some("ns")).await.unwrap();
        assert_eq!(namespaced.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(store.all_refresh_tokens(None).await.unwrap().len(), 1);
        assert_eq!(store.all_refresh_tokens_any_namespace().await.unwrap().len(), 3);
    }

    fn rotation(expected: &RefreshRecord) -> RefreshUpdate {
        RefreshUpdate {
            access_uid: "next".to_string(),
            access_expiration: clock::now() + 120,
            csrf: "c".to_string(),
            expiration: clock::now() + 600,
            expected_access_uid: expected.access_uid.clone(),
            expected_access_expiration: expected.access_expiration,
        }
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_update_missing_record() {
        let store = connect().await;
        let outcome = store
            .update_refresh("missing", &rotation(&record(None)), None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Missing);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_update_rejects_moved_pointer() {
        let store = connect().await;
        let persisted = record(None);
        store.persist_refresh("r1", &persisted).await.unwrap();

        let update = rotation(&persisted);
        assert_eq!(
            store.update_refresh("r1", &update, None).await.unwrap(),
            UpdateOutcome::Updated
        );
        assert_eq!(
            store.update_refresh("r1", &update, None).await.unwrap(),
            UpdateOutcome::Conflict
        );
    }
}
