//! Rows of the `coordination_keys` table.

use arena_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A live entry of the shared store, as seen by operators.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CoordinationKey {
    pub key: String,
    pub value: String,
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CoordinationKey {
    /// Time left before expiry, or `None` for keys without expiry.
    pub fn remaining(&self, now: Timestamp) -> Option<chrono::Duration> {
        self.expires_at.map(|at| at - now)
    }
}
