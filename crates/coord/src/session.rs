//! At most one live connection session per player.
//!
//! The binding is a lock keyed by player whose owner value is the session id.
//! A session that dies without unbinding is reaped by the binding TTL.

use std::time::Duration;

use arena_core::error::CoordResult;
use arena_core::keys::{self, ttl};
use arena_core::types::PlayerId;
use arena_events::bus::{CoordinationEvent, SESSION_REJECTED};

use crate::lock::DistributedLock;

#[derive(Clone)]
pub struct SessionBinder {
    lock: DistributedLock,
    ttl: Duration,
}

impl SessionBinder {
    pub fn new(lock: DistributedLock) -> Self {
        Self {
            lock,
            ttl: ttl::SESSION_BINDING,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Bind `session_id` to `player_id`.
    ///
    /// Returns the bound session, or `None` if another live session owns the
    /// player. Binding the already-bound session renews it.
    pub async fn bind(&self, player_id: PlayerId, session_id: &str) -> CoordResult<Option<String>> {
        let key = keys::session_binding(player_id);
        if self.lock.acquire_or_renew(&key, session_id, self.ttl).await? {
            tracing::debug!(player_id, session_id, "Session bound");
            return Ok(Some(session_id.to_string()));
        }

        tracing::info!(player_id, session_id, "Session rejected, player bound elsewhere");
        self.lock.publish(
            CoordinationEvent::new(SESSION_REJECTED)
                .with_key(key)
                .with_player(player_id)
                .with_payload(serde_json::json!({ "rejected_session": session_id })),
        );
        Ok(None)
    }

    /// Drop the binding regardless of which session holds it.
    pub async fn unbind(&self, player_id: PlayerId) -> CoordResult<()> {
        self.lock.release(&keys::session_binding(player_id)).await
    }

    /// Drop the binding only if `session_id` still holds it, so a stale
    /// disconnect cannot evict a newer session.
    pub async fn unbind_if_owner(&self, player_id: PlayerId, session_id: &str) -> CoordResult<bool> {
        self.lock
            .release_if_owner(&keys::session_binding(player_id), session_id)
            .await
    }

    /// Move the binding from `old_session` to `new_session` atomically.
    pub async fn transfer(
        &self,
        player_id: PlayerId,
        old_session: &str,
        new_session: &str,
    ) -> CoordResult<bool> {
        let moved = self
            .lock
            .store()
            .replace_if_equal(
                &keys::session_binding(player_id),
                old_session,
                new_session,
                self.ttl,
            )
            .await?;
        if moved {
            tracing::info!(player_id, old_session, new_session, "Session transferred");
        }
        Ok(moved)
    }

    /// Extend the binding while `session_id` holds it.
    pub async fn renew(&self, player_id: PlayerId, session_id: &str) -> CoordResult<bool> {
        Ok(self
            .lock
            .store()
            .renew_if_equal(&keys::session_binding(player_id), session_id, self.ttl)
            .await?)
    }

    pub async fn has_active_session(&self, player_id: PlayerId) -> CoordResult<bool> {
        self.lock.is_held(&keys::session_binding(player_id)).await
    }

    pub async fn session_of(&self, player_id: PlayerId) -> CoordResult<Option<String>> {
        self.lock.holder(&keys::session_binding(player_id)).await
    }

    pub async fn ttl_remaining(&self, player_id: PlayerId) -> CoordResult<Option<Duration>> {
        self.lock
            .ttl_remaining(&keys::session_binding(player_id))
            .await
    }
}
