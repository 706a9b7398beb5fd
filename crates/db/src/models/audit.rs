//! Coordination audit trail models. Entries are immutable once written.

use arena_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `coordination_audit_log` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CoordinationAuditEntry {
    pub id: DbId,
    pub event_type: String,
    pub key: Option<String>,
    pub match_id: Option<DbId>,
    pub player_id: Option<DbId>,
    pub actor: Option<String>,
    pub payload: serde_json::Value,
    pub occurred_at: Timestamp,
    pub created_at: Timestamp,
}

/// DTO for appending an audit entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCoordinationAuditEntry {
    pub event_type: String,
    pub key: Option<String>,
    pub match_id: Option<DbId>,
    pub player_id: Option<DbId>,
    pub actor: Option<String>,
    pub payload: serde_json::Value,
    pub occurred_at: Timestamp,
}
