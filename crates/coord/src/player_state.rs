//! Per-player matchmaking state, validated against the transition table and
//! mutated only under the player's state-change lock.

use std::time::Duration;

use arena_core::codec::{read_record, write_record};
use arena_core::error::{CoordError, CoordResult};
use arena_core::keys::{self, ttl};
use arena_core::player_state::{state_machine, PlayerState, PlayerStateRecord};
use arena_core::types::PlayerId;
use arena_events::bus::{CoordinationEvent, PLAYER_STATE_FORCED};

use crate::lock::{new_owner_token, DistributedLock, AUDIT_TARGET};

/// Outcome of [`PlayerStateMachine::set_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// The record moved from `from` to `to`.
    Applied { from: PlayerState, to: PlayerState },
    /// Self-transition; nothing to do.
    Unchanged(PlayerState),
    /// Another change for this player is in flight. Safe to retry.
    Contended { key: String },
    /// The move is not in the transition table. A caller ordering bug.
    Rejected { from: PlayerState, to: PlayerState },
}

impl StateChange {
    /// Whether the player now holds the requested state.
    pub fn applied(&self) -> bool {
        matches!(self, StateChange::Applied { .. } | StateChange::Unchanged(_))
    }

    /// Convert failures into the coordination error taxonomy.
    pub fn into_result(self) -> CoordResult<PlayerState> {
        match self {
            StateChange::Applied { to, .. } => Ok(to),
            StateChange::Unchanged(state) => Ok(state),
            StateChange::Contended { key } => Err(CoordError::Contention { key }),
            StateChange::Rejected { from, to } => Err(CoordError::InvalidTransition { from, to }),
        }
    }
}

/// Reads and writes `player:{id}:state` records.
#[derive(Clone)]
pub struct PlayerStateMachine {
    lock: DistributedLock,
    idle_ttl: Duration,
}

impl PlayerStateMachine {
    pub fn new(lock: DistributedLock) -> Self {
        Self {
            lock,
            idle_ttl: ttl::PLAYER_STATE_IDLE,
        }
    }

    /// Override the idle expiry of state records.
    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    /// Move `player_id` to `to` if the transition table allows it.
    pub async fn set_state(&self, player_id: PlayerId, to: PlayerState) -> CoordResult<StateChange> {
        let lock_key = keys::player_state_lock(player_id);
        let owner = new_owner_token();

        if !self
            .lock
            .acquire(&lock_key, &owner, ttl::PLAYER_STATE_CHANGE)
            .await?
        {
            tracing::debug!(player_id, to = %to, "State change already in flight");
            return Ok(StateChange::Contended { key: lock_key });
        }

        let outcome = self.apply_locked(player_id, to).await;

        if let Err(e) = self.lock.release_if_owner(&lock_key, &owner).await {
            // The lock expires on its own.
            tracing::warn!(error = %e, player_id, "Failed to release state-change lock");
        }

        outcome
    }

    async fn apply_locked(&self, player_id: PlayerId, to: PlayerState) -> CoordResult<StateChange> {
        let key = keys::player_state(player_id);
        let from = self.get_state(player_id).await?;

        if from == to {
            self.lock.store().expire(&key, self.idle_ttl).await?;
            return Ok(StateChange::Unchanged(to));
        }

        if let Err(e) = state_machine::validate_transition(from, to) {
            tracing::warn!(player_id, from = %from, to = %to, error = %e, "Rejected player state change");
            return Ok(StateChange::Rejected { from, to });
        }

        let record = PlayerStateRecord::new(player_id, to);
        write_record(self.lock.store().as_ref(), &key, &record, Some(self.idle_ttl)).await?;
        tracing::info!(player_id, from = %from, to = %to, "Player state changed");
        Ok(StateChange::Applied { from, to })
    }

    /// Current state; `AVAILABLE` when no record exists or it expired.
    pub async fn get_state(&self, player_id: PlayerId) -> CoordResult<PlayerState> {
        let key = keys::player_state(player_id);
        let record: Option<PlayerStateRecord> =
            read_record(self.lock.store().as_ref(), &key).await?;
        Ok(record.map(|r| r.state).unwrap_or_default())
    }

    pub async fn can_join_queue(&self, player_id: PlayerId) -> CoordResult<bool> {
        Ok(self.get_state(player_id).await? == PlayerState::Available)
    }

    pub async fn is_in_match(&self, player_id: PlayerId) -> CoordResult<bool> {
        Ok(self.get_state(player_id).await?.is_in_match())
    }

    /// Operator escape hatch: write `state` without lock or validation.
    pub async fn force_set_state(
        &self,
        player_id: PlayerId,
        state: PlayerState,
        actor: &str,
    ) -> CoordResult<PlayerState> {
        let key = keys::player_state(player_id);
        let previous = self.get_state(player_id).await?;
        let record = PlayerStateRecord::new(player_id, state);
        write_record(self.lock.store().as_ref(), &key, &record, Some(self.idle_ttl)).await?;

        tracing::warn!(
            target: AUDIT_TARGET,
            player_id,
            actor,
            from = %previous,
            to = %state,
            "Player state forced by operator"
        );
        self.lock.publish(
            CoordinationEvent::new(PLAYER_STATE_FORCED)
                .with_key(key)
                .with_player(player_id)
                .with_actor(actor)
                .with_payload(serde_json::json!({
                    "from": previous.as_str(),
                    "to": state.as_str(),
                })),
        );
        Ok(previous)
    }

    /// Push back the idle expiry. Returns `false` if no record exists.
    pub async fn renew(&self, player_id: PlayerId) -> CoordResult<bool> {
        let key = keys::player_state(player_id);
        Ok(self.lock.store().expire(&key, self.idle_ttl).await?)
    }

    /// Remove the record; the player reads as `AVAILABLE` afterwards.
    pub async fn clear(&self, player_id: PlayerId) -> CoordResult<bool> {
        let key = keys::player_state(player_id);
        Ok(self.lock.store().delete(&key).await?)
    }

    /// Remaining idle lifetime of the record.
    pub async fn ttl_remaining(&self, player_id: PlayerId) -> CoordResult<Option<Duration>> {
        self.lock.ttl_remaining(&keys::player_state(player_id)).await
    }
}
