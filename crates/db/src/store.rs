//! [`KeyValueStore`] backed by the `coordination_keys` table.
//!
//! Every sqlx failure surfaces as [`StoreError::Unavailable`] so callers fail
//! closed: a lost connection never reads as "lock acquired".

use std::time::Duration;

use arena_core::error::{StoreError, StoreResult};
use arena_core::store::KeyValueStore;
use async_trait::async_trait;

use crate::repositories::CoordinationKeyRepo;
use crate::DbPool;

/// Shared store for all replicas, one row per key.
#[derive(Clone)]
pub struct PgKeyValueStore {
    pool: DbPool,
}

impl PgKeyValueStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for repository calls outside the store contract.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn unavailable<'a>(op: &'static str, key: &'a str) -> impl FnOnce(sqlx::Error) -> StoreError + 'a {
    move |err| {
        tracing::error!(error = %err, op, key, "Coordination store query failed");
        StoreError::Unavailable(format!("{op} {key}: {err}"))
    }
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        CoordinationKeyRepo::insert_if_absent(&self.pool, key, value, ttl)
            .await
            .map_err(unavailable("set_if_absent", key))
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        CoordinationKeyRepo::get_value(&self.pool, key)
            .await
            .map_err(unavailable("get", key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        CoordinationKeyRepo::upsert(&self.pool, key, value, ttl)
            .await
            .map_err(unavailable("set", key))
    }

    async fn renew_if_equal(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        CoordinationKeyRepo::renew_if_equal(&self.pool, key, expected, ttl)
            .await
            .map_err(unavailable("renew_if_equal", key))
    }

    async fn replace_if_equal(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        CoordinationKeyRepo::replace_if_equal(&self.pool, key, expected, new, ttl)
            .await
            .map_err(unavailable("replace_if_equal", key))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        CoordinationKeyRepo::delete(&self.pool, key)
            .await
            .map_err(unavailable("delete", key))
    }

    async fn delete_if_equal(&self, key: &str, expected: &str) -> StoreResult<bool> {
        CoordinationKeyRepo::delete_if_equal(&self.pool, key, expected)
            .await
            .map_err(unavailable("delete_if_equal", key))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        CoordinationKeyRepo::expire(&self.pool, key, ttl)
            .await
            .map_err(unavailable("expire", key))
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let millis = CoordinationKeyRepo::ttl_millis(&self.pool, key)
            .await
            .map_err(unavailable("ttl", key))?;
        Ok(millis.map(|ms| Duration::from_millis(ms.max(0) as u64)))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        CoordinationKeyRepo::list_keys(&self.pool, prefix)
            .await
            .map_err(unavailable("keys_with_prefix", prefix))
    }

    async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64> {
        CoordinationKeyRepo::delete_prefix(&self.pool, prefix)
            .await
            .map_err(unavailable("delete_prefix", prefix))
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        CoordinationKeyRepo::purge_expired(&self.pool)
            .await
            .map_err(unavailable("purge_expired", "*"))
    }
}
