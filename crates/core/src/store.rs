//! Contract for the shared low-latency key-value store.
//!
//! Every replica talks to the same store; it is the single source of truth
//! for locks, player states, votes, and session bindings. Each method is one
//! atomic round-trip. Expired keys must behave exactly like absent keys for
//! every read and conditional write, whether or not the backend has
//! physically removed them yet.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend label for logs (e.g. `"memory"`, `"postgres"`).
    fn backend(&self) -> &'static str;

    /// Set `key` to `value` with expiry `ttl` only if the key is absent.
    ///
    /// Returns `true` when this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Read the live value of `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Unconditionally write `key`. `ttl = None` stores without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Reset the expiry of `key` to `ttl` only if its value equals `expected`.
    async fn renew_if_equal(&self, key: &str, expected: &str, ttl: Duration)
        -> StoreResult<bool>;

    /// Replace the value of `key` with `new` (and expiry `ttl`) only if its
    /// current value equals `expected`.
    async fn replace_if_equal(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> StoreResult<bool>;

    /// Delete `key`. Returns `true` if a live key was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Delete `key` only if its value equals `expected`.
    async fn delete_if_equal(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Reset the expiry of an existing live key.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Remaining time-to-live. `None` if the key is absent or never expires.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// List live keys starting with `prefix`, sorted ascending.
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Delete every key starting with `prefix`, expired ones included.
    /// Returns the number of live keys removed, matching [`delete`](Self::delete).
    async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64>;

    /// Physically remove expired entries. Returns the number removed.
    async fn purge_expired(&self) -> StoreResult<u64>;
}
