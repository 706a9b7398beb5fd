//! Queue-processing election loop.
//!
//! Every replica runs a [`QueueTicker`]. On each tick it tries the global
//! queue-processing lock and, only if it wins, hands control to the
//! [`QueueTickHandler`]. Losing the election is the normal case for all but
//! one replica and is logged at DEBUG.

use std::sync::Arc;
use std::time::Duration;

use arena_coord::MatchLocks;
use arena_core::error::CoordResult;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Work performed by the replica that won the queue election for a tick.
#[async_trait]
pub trait QueueTickHandler: Send + Sync {
    async fn on_tick(&self, replica_id: &str) -> CoordResult<()>;
}

/// Handler that only records the election. Used until a matchmaker is
/// plugged in.
pub struct LoggingTickHandler;

#[async_trait]
impl QueueTickHandler for LoggingTickHandler {
    async fn on_tick(&self, replica_id: &str) -> CoordResult<()> {
        tracing::debug!(replica_id, "Queue tick won, no matchmaker attached");
        Ok(())
    }
}

pub struct QueueTicker {
    matches: MatchLocks,
    replica_id: String,
    interval: Duration,
    handler: Arc<dyn QueueTickHandler>,
}

impl QueueTicker {
    pub fn new(
        matches: MatchLocks,
        replica_id: impl Into<String>,
        interval: Duration,
        handler: Arc<dyn QueueTickHandler>,
    ) -> Self {
        Self {
            matches,
            replica_id: replica_id.into(),
            interval,
            handler,
        }
    }

    /// Run the election loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        tracing::info!(
            replica_id = %self.replica_id,
            tick_ms = self.interval.as_millis() as u64,
            "Queue ticker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Queue ticker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick_once().await {
                        tracing::error!(error = %e, "Queue tick failed");
                    }
                }
            }
        }
    }

    /// One election. Returns whether this replica won and ran the handler.
    pub async fn tick_once(&self) -> CoordResult<bool> {
        if !self.matches.try_queue_processing(&self.replica_id).await? {
            tracing::debug!(replica_id = %self.replica_id, "Queue processing held by another replica");
            return Ok(false);
        }

        let outcome = self.handler.on_tick(&self.replica_id).await;

        // A handler that overran the TTL may already be superseded.
        if let Err(e) = self.matches.release_queue_processing(&self.replica_id).await {
            // The lock expires on its own.
            tracing::warn!(error = %e, replica_id = %self.replica_id, "Failed to release queue processing");
        }
        outcome.map(|()| true)
    }
}
