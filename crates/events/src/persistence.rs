//! Durable audit persistence.
//!
//! [`AuditPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every audited [`CoordinationEvent`] to the
//! `coordination_audit_log` table. Non-audited events are skipped. The loop
//! ends when the bus sender is dropped.

use arena_core::types::DbId;
use arena_db::models::audit::CreateCoordinationAuditEntry;
use arena_db::repositories::CoordinationAuditRepo;
use arena_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::CoordinationEvent;

/// Background service that persists audited coordination events.
pub struct AuditPersistence;

impl AuditPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<CoordinationEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) if event.is_audited() => {
                    if let Err(e) = Self::record(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist audit event"
                        );
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Audit persistence lagged, events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, audit persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Write one event to the audit log, for callers without a running loop.
    pub async fn record(pool: &DbPool, event: &CoordinationEvent) -> Result<DbId, sqlx::Error> {
        CoordinationAuditRepo::insert(pool, &to_audit_entry(event)).await
    }
}

/// Map an event onto the audit table's create DTO.
fn to_audit_entry(event: &CoordinationEvent) -> CreateCoordinationAuditEntry {
    CreateCoordinationAuditEntry {
        event_type: event.event_type.clone(),
        key: event.key.clone(),
        match_id: event.match_id,
        player_id: event.player_id,
        actor: event.actor.clone(),
        payload: event.payload.clone(),
        occurred_at: event.timestamp,
    }
}
