//! Repository for the `coordination_audit_log` table.

use arena_core::types::{DbId, MatchId};
use sqlx::PgPool;

use crate::models::audit::{CoordinationAuditEntry, CreateCoordinationAuditEntry};

/// Column list for `coordination_audit_log` queries.
const COLUMNS: &str =
    "id, event_type, key, match_id, player_id, actor, payload, occurred_at, created_at";

/// Append-only access to the coordination audit trail.
pub struct CoordinationAuditRepo;

impl CoordinationAuditRepo {
    /// Append an entry, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        input: &CreateCoordinationAuditEntry,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO coordination_audit_log \
                (event_type, key, match_id, player_id, actor, payload, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id",
        )
        .bind(&input.event_type)
        .bind(&input.key)
        .bind(input.match_id)
        .bind(input.player_id)
        .bind(&input.actor)
        .bind(&input.payload)
        .bind(input.occurred_at)
        .fetch_one(pool)
        .await
    }

    /// Most recent entries, newest first.
    pub async fn list_recent(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<CoordinationAuditEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM coordination_audit_log \
             ORDER BY occurred_at DESC, id DESC LIMIT $1"
        );
        sqlx::query_as::<_, CoordinationAuditEntry>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// The latest `limit` entries recorded for one match, oldest first.
    pub async fn list_for_match(
        pool: &PgPool,
        match_id: MatchId,
        limit: i64,
    ) -> Result<Vec<CoordinationAuditEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ( \
                 SELECT {COLUMNS} FROM coordination_audit_log \
                 WHERE match_id = $1 ORDER BY occurred_at DESC, id DESC LIMIT $2 \
             ) latest ORDER BY occurred_at, id"
        );
        sqlx::query_as::<_, CoordinationAuditEntry>(&query)
            .bind(match_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
