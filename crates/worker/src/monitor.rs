//! Periodic visibility into live coordination keys.
//!
//! Orphaned locks are recovered by TTL, so the monitor never intervenes. It
//! logs live key counts per namespace and flags keys about to expire, which
//! usually means a holder stalled mid-operation. Stuck keys are released by
//! operators with `arena-admin force-release`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arena_core::error::StoreResult;
use arena_core::keys;
use arena_core::store::KeyValueStore;
use tokio_util::sync::CancellationToken;

/// Keys closer than this to expiry are reported.
const DEFAULT_NEAR_EXPIRY: Duration = Duration::from_secs(2);

/// One observation of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSnapshot {
    /// Live key count per namespace, e.g. `match:draft:turn`.
    pub namespaces: BTreeMap<String, usize>,
    /// Keys with less than the threshold left, and their remaining TTL.
    pub near_expiry: Vec<(String, Duration)>,
}

impl MonitorSnapshot {
    pub fn total(&self) -> usize {
        self.namespaces.values().sum()
    }
}

pub struct LockMonitor {
    store: Arc<dyn KeyValueStore>,
    interval: Duration,
    near_expiry: Duration,
}

impl LockMonitor {
    pub fn new(store: Arc<dyn KeyValueStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            near_expiry: DEFAULT_NEAR_EXPIRY,
        }
    }

    pub fn with_near_expiry(mut self, threshold: Duration) -> Self {
        self.near_expiry = threshold;
        self
    }

    /// Run the monitor loop until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Lock monitor started"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Lock monitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.snapshot().await {
                        Ok(snapshot) => report(&snapshot),
                        Err(e) => tracing::error!(error = %e, "Lock monitor snapshot failed"),
                    }
                }
            }
        }
    }

    /// Scan every live key once.
    pub async fn snapshot(&self) -> StoreResult<MonitorSnapshot> {
        let mut snapshot = MonitorSnapshot::default();

        for key in self.store.keys_with_prefix("").await? {
            *snapshot
                .namespaces
                .entry(keys::namespace_of(&key))
                .or_insert(0) += 1;

            // Keys may expire between listing and the TTL lookup.
            if let Some(remaining) = self.store.ttl(&key).await? {
                if remaining < self.near_expiry {
                    snapshot.near_expiry.push((key, remaining));
                }
            }
        }

        Ok(snapshot)
    }
}

fn report(snapshot: &MonitorSnapshot) {
    tracing::debug!(total = snapshot.total(), "Lock monitor snapshot");
    for (namespace, count) in &snapshot.namespaces {
        tracing::info!(namespace = %namespace, count, "Live coordination keys");
    }
    for (key, remaining) in &snapshot.near_expiry {
        tracing::warn!(
            key = %key,
            remaining_ms = remaining.as_millis() as u64,
            "Coordination key close to expiry"
        );
    }
}

#[cfg(test)]
mod tests {
    use arena_coord::{DistributedLock, MatchLocks, MemoryStore};
    use arena_core::draft::DraftTurn;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn snapshot_groups_by_namespace() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let matches = MatchLocks::new(DistributedLock::new(Arc::clone(&store)));

        matches.acquire_acceptance(1, 10, "o").await.unwrap();
        matches.acquire_acceptance(2, 20, "o").await.unwrap();
        matches.acquire_draft_turn(1, DraftTurn::new(1, 10)).await.unwrap();
        matches.try_queue_processing("replica-a").await.unwrap();

        let snapshot = LockMonitor::new(store, Duration::from_secs(30))
            .snapshot()
            .await
            .unwrap();

        assert_eq!(snapshot.total(), 4);
        assert_eq!(snapshot.namespaces.get("match:accept"), Some(&2));
        assert_eq!(snapshot.namespaces.get("match:draft:turn"), Some(&1));
        assert_eq!(snapshot.namespaces.get("queue:processing"), Some(&1));
        assert!(snapshot.near_expiry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keys_about_to_expire_are_flagged() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set("match:1:game:end", "stalled", Some(Duration::from_secs(10))).await.unwrap();
        store.set("player:1:state", "{}", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;

        let snapshot = LockMonitor::new(store, Duration::from_secs(30))
            .snapshot()
            .await
            .unwrap();
        assert_eq!(
            snapshot.near_expiry,
            vec![("match:1:game:end".to_string(), Duration::from_secs(1))]
        );
    }
}
