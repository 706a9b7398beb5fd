//! Named try-lock with TTL over the shared store.
//!
//! Every higher-level coordination primitive is a specialisation of
//! [`DistributedLock`]. There is no waiting: a failed acquisition returns
//! `false` immediately and the caller treats it as "another replica is
//! handling this". A holder that crashes is recovered by TTL expiry, or by an
//! operator through [`DistributedLock::force_release`].

use std::sync::Arc;
use std::time::Duration;

use arena_core::error::CoordResult;
use arena_core::store::KeyValueStore;
use arena_events::bus::{CoordinationEvent, EventBus, LOCK_FORCE_RELEASED};

/// Tracing target for operator escape hatches.
pub const AUDIT_TARGET: &str = "arena::audit";

/// Generate a unique owner value for one unit of work.
pub fn new_owner_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Try-lock primitive shared by every coordination service.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
    events: Option<Arc<EventBus>>,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            events: None,
        }
    }

    /// Publish operator actions on `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub(crate) fn publish(&self, event: CoordinationEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Take `key` for `owner` if nobody holds it.
    pub async fn acquire(&self, key: &str, owner: &str, ttl: Duration) -> CoordResult<bool> {
        let acquired = self.store.set_if_absent(key, owner, ttl).await?;
        if acquired {
            tracing::debug!(key, owner, ttl_ms = ttl.as_millis() as u64, "Lock acquired");
        } else {
            tracing::debug!(key, owner, "Lock held elsewhere");
        }
        Ok(acquired)
    }

    /// Like [`acquire`](Self::acquire), but if `owner` already holds `key`
    /// its TTL is renewed and the call succeeds.
    pub async fn acquire_or_renew(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> CoordResult<bool> {
        if self.store.set_if_absent(key, owner, ttl).await? {
            tracing::debug!(key, owner, "Lock acquired");
            return Ok(true);
        }
        let renewed = self.store.renew_if_equal(key, owner, ttl).await?;
        if renewed {
            tracing::debug!(key, owner, "Lock renewed by current owner");
        } else {
            // The holder may have released between the two round-trips.
            if self.store.set_if_absent(key, owner, ttl).await? {
                tracing::debug!(key, owner, "Lock acquired on retry");
                return Ok(true);
            }
            tracing::debug!(key, owner, "Lock held by another owner");
        }
        Ok(renewed)
    }

    /// Delete `key` regardless of owner. Safe after expiry.
    pub async fn release(&self, key: &str) -> CoordResult<()> {
        let removed = self.store.delete(key).await?;
        tracing::debug!(key, removed, "Lock released");
        Ok(())
    }

    /// Delete `key` only while `owner` still holds it.
    ///
    /// Returns `false` if the lock expired and was taken by someone else.
    pub async fn release_if_owner(&self, key: &str, owner: &str) -> CoordResult<bool> {
        let removed = self.store.delete_if_equal(key, owner).await?;
        if !removed {
            tracing::debug!(key, owner, "Release skipped, lock no longer held by owner");
        }
        Ok(removed)
    }

    /// Operator escape hatch: delete `key` and record who did it.
    ///
    /// Only for manual incident recovery; never called from request paths.
    pub async fn force_release(&self, key: &str, actor: &str) -> CoordResult<bool> {
        let holder = self.store.get(key).await?;
        let removed = self.store.delete(key).await?;
        tracing::warn!(
            target: AUDIT_TARGET,
            key,
            actor,
            previous_holder = holder.as_deref().unwrap_or("<none>"),
            removed,
            "Lock force-released by operator"
        );
        self.publish(
            CoordinationEvent::new(LOCK_FORCE_RELEASED)
                .with_key(key)
                .with_actor(actor)
                .with_payload(serde_json::json!({
                    "previous_holder": holder,
                    "removed": removed,
                })),
        );
        Ok(removed)
    }

    pub async fn ttl_remaining(&self, key: &str) -> CoordResult<Option<Duration>> {
        Ok(self.store.ttl(key).await?)
    }

    /// Owner value currently holding `key`.
    pub async fn holder(&self, key: &str) -> CoordResult<Option<String>> {
        Ok(self.store.get(key).await?)
    }

    pub async fn is_held(&self, key: &str) -> CoordResult<bool> {
        Ok(self.store.get(key).await?.is_some())
    }
}
