//! Periodic physical removal of expired coordination keys.
//!
//! Expired keys already read as absent; this only reclaims storage for
//! backends that do not evict on their own (the Postgres store).

use std::sync::Arc;
use std::time::Duration;

use arena_core::error::StoreResult;
use arena_core::store::KeyValueStore;
use tokio_util::sync::CancellationToken;

pub struct ExpiredKeyReaper {
    store: Arc<dyn KeyValueStore>,
    interval: Duration,
}

impl ExpiredKeyReaper {
    pub fn new(store: Arc<dyn KeyValueStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run the reaper loop until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            backend = self.store.backend(),
            interval_secs = self.interval.as_secs(),
            "Expired key reaper started"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Expired key reaper stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep().await {
                        Ok(purged) => {
                            if purged > 0 {
                                tracing::info!(purged, "Reaper: purged expired keys");
                            } else {
                                tracing::debug!("Reaper: no expired keys");
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Reaper: purge failed");
                        }
                    }
                }
            }
        }
    }

    pub async fn sweep(&self) -> StoreResult<u64> {
        self.store.purge_expired().await
    }
}
