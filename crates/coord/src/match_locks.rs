//! Phase locks that serialise each step of a match's lifecycle across
//! replicas, plus the per-match derived state cleared with them.
//!
//! Orchestrators wrap every mutating action in an acquire/release pair of
//! the matching namespace and call [`MatchLocks::clear_match`] exactly once
//! when the match completes or is cancelled.

use std::time::Duration;

use arena_core::codec::{read_record, write_record};
use arena_core::draft::{DraftTurn, ProvisionalPick};
use arena_core::error::CoordResult;
use arena_core::keys::{self, ttl, MatchPhase};
use arena_core::types::{MatchId, PlayerId};
use arena_core::voting::MatchResult;
use arena_events::bus::{CoordinationEvent, MATCH_CLEARED};

use crate::lock::DistributedLock;

/// Generates an `acquire_*` / `release_*` pair for a per-match phase lock.
macro_rules! phase_lock_pair {
    ($( $(#[$meta:meta])* $acquire:ident, $release:ident => $phase:expr; )+) => {
        $(
            $(#[$meta])*
            pub async fn $acquire(&self, match_id: MatchId, owner: &str) -> CoordResult<bool> {
                self.acquire(match_id, $phase, owner).await
            }

            pub async fn $release(&self, match_id: MatchId) -> CoordResult<()> {
                self.release(match_id, $phase).await
            }
        )+
    };
}

/// The catalogue of match-scoped locks.
#[derive(Clone)]
pub struct MatchLocks {
    lock: DistributedLock,
}

impl MatchLocks {
    pub fn new(lock: DistributedLock) -> Self {
        Self { lock }
    }

    // ── Queue election ───────────────────────────────────────────────────

    /// Elect `replica_id` to advance the matchmaking queue for one tick.
    pub async fn try_queue_processing(&self, replica_id: &str) -> CoordResult<bool> {
        self.lock
            .acquire(keys::QUEUE_PROCESSING, replica_id, ttl::QUEUE_PROCESSING)
            .await
    }

    /// Give up the queue election if `replica_id` still holds it.
    pub async fn release_queue_processing(&self, replica_id: &str) -> CoordResult<bool> {
        self.lock
            .release_if_owner(keys::QUEUE_PROCESSING, replica_id)
            .await
    }

    // ── Acceptance (match, player) ───────────────────────────────────────

    /// Guard one player's accept/decline against double clicks and the
    /// acceptance timeout racing the manual action.
    pub async fn acquire_acceptance(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        owner: &str,
    ) -> CoordResult<bool> {
        self.lock
            .acquire(&keys::acceptance(match_id, player_id), owner, ttl::ACCEPTANCE)
            .await
    }

    pub async fn release_acceptance(&self, match_id: MatchId, player_id: PlayerId) -> CoordResult<()> {
        self.lock.release(&keys::acceptance(match_id, player_id)).await
    }

    // ── Generic per-match phase locks ────────────────────────────────────

    pub async fn acquire(&self, match_id: MatchId, phase: MatchPhase, owner: &str) -> CoordResult<bool> {
        let acquired = self
            .lock
            .acquire(&keys::match_lock(match_id, phase), owner, phase.ttl())
            .await?;
        if !acquired {
            tracing::debug!(match_id, phase = %phase, "Phase lock held by another replica");
        }
        Ok(acquired)
    }

    /// Acquire, or renew if `owner` already holds the phase lock.
    pub async fn acquire_or_renew(
        &self,
        match_id: MatchId,
        phase: MatchPhase,
        owner: &str,
    ) -> CoordResult<bool> {
        self.lock
            .acquire_or_renew(&keys::match_lock(match_id, phase), owner, phase.ttl())
            .await
    }

    pub async fn release(&self, match_id: MatchId, phase: MatchPhase) -> CoordResult<()> {
        self.lock.release(&keys::match_lock(match_id, phase)).await
    }

    pub async fn release_if_owner(
        &self,
        match_id: MatchId,
        phase: MatchPhase,
        owner: &str,
    ) -> CoordResult<bool> {
        self.lock
            .release_if_owner(&keys::match_lock(match_id, phase), owner)
            .await
    }

    pub async fn holder(&self, match_id: MatchId, phase: MatchPhase) -> CoordResult<Option<String>> {
        self.lock.holder(&keys::match_lock(match_id, phase)).await
    }

    pub async fn ttl_remaining(
        &self,
        match_id: MatchId,
        phase: MatchPhase,
    ) -> CoordResult<Option<Duration>> {
        self.lock.ttl_remaining(&keys::match_lock(match_id, phase)).await
    }

    phase_lock_pair! {
        /// Only one replica tears down a match.
        acquire_match_cancel, release_match_cancel => MatchPhase::Cancel;
        /// Prevents a duplicate transition into the draft.
        acquire_draft_start, release_draft_start => MatchPhase::DraftStart;
        /// Prevents a duplicate transition into the game.
        acquire_game_start, release_game_start => MatchPhase::GameStart;
        /// Serialises persistence of the final outcome.
        acquire_result_save, release_result_save => MatchPhase::ResultSave;
        /// Prevents duplicate handling of an expired timer.
        acquire_timeout_processing, release_timeout_processing => MatchPhase::TimeoutProcessing;
        /// Guards the one-time step once every participant accepted.
        acquire_all_accepted, release_all_accepted => MatchPhase::AllAcceptedProcessing;
        /// Serialises one pick or ban.
        acquire_draft_action, release_draft_action => MatchPhase::DraftAction;
        /// Serialises a pick edit.
        acquire_draft_edit_pick, release_draft_edit_pick => MatchPhase::DraftEditPick;
        /// Coordinates the post-draft confirmation.
        acquire_draft_confirm, release_draft_confirm => MatchPhase::DraftConfirm;
        /// Starts the winner-vote session.
        acquire_game_vote, release_game_vote => MatchPhase::GameWinnerVote;
        /// Serialises result confirmation.
        acquire_game_confirm, release_game_confirm => MatchPhase::GameConfirm;
        /// Serialises game teardown.
        acquire_game_end, release_game_end => MatchPhase::GameEnd;
    }

    // ── Draft turn ───────────────────────────────────────────────────────

    /// Claim the draft turn. The same turn value re-acquiring renews.
    pub async fn acquire_draft_turn(&self, match_id: MatchId, turn: DraftTurn) -> CoordResult<bool> {
        self.acquire_or_renew(match_id, MatchPhase::DraftTurn, &turn.owner_value())
            .await
    }

    /// Hand the turn from `current` to `next` in one compare-and-swap.
    pub async fn advance_draft_turn(
        &self,
        match_id: MatchId,
        current: DraftTurn,
        next: DraftTurn,
    ) -> CoordResult<bool> {
        let key = keys::match_lock(match_id, MatchPhase::DraftTurn);
        let advanced = self
            .lock
            .store()
            .replace_if_equal(&key, &current.owner_value(), &next.owner_value(), ttl::DRAFT_TURN)
            .await?;
        if advanced {
            tracing::info!(match_id, from = %current, to = %next, "Draft turn advanced");
        }
        Ok(advanced)
    }

    pub async fn release_draft_turn(&self, match_id: MatchId) -> CoordResult<()> {
        self.release(match_id, MatchPhase::DraftTurn).await
    }

    /// Whose turn it is, if anyone holds the draft-turn lock.
    pub async fn current_turn(&self, match_id: MatchId) -> CoordResult<Option<DraftTurn>> {
        let holder = self.holder(match_id, MatchPhase::DraftTurn).await?;
        Ok(holder.and_then(|raw| match raw.parse::<DraftTurn>() {
            Ok(turn) => Some(turn),
            Err(e) => {
                tracing::warn!(match_id, holder = %raw, error = %e, "Unreadable draft turn holder");
                None
            }
        }))
    }

    // ── Provisional picks ────────────────────────────────────────────────

    /// Record `player_id`'s pick before confirmation. Callers hold the
    /// draft-action or draft-edit-pick lock.
    pub async fn set_provisional_pick(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        champion: &str,
    ) -> CoordResult<ProvisionalPick> {
        let pick = ProvisionalPick::new(match_id, player_id, champion);
        write_record(
            self.lock.store().as_ref(),
            &keys::provisional_pick(match_id, player_id),
            &pick,
            Some(ttl::MATCH_RECORD),
        )
        .await?;
        Ok(pick)
    }

    pub async fn provisional_pick(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
    ) -> CoordResult<Option<ProvisionalPick>> {
        let key = keys::provisional_pick(match_id, player_id);
        Ok(read_record(self.lock.store().as_ref(), &key).await?)
    }

    /// Every provisional pick in the match, ordered by key.
    pub async fn provisional_picks(&self, match_id: MatchId) -> CoordResult<Vec<ProvisionalPick>> {
        let store = self.lock.store().as_ref();
        let mut picks = Vec::new();
        for key in store
            .keys_with_prefix(&keys::provisional_pick_prefix(match_id))
            .await?
        {
            // A pick may expire between listing and reading.
            if let Some(pick) = read_record::<ProvisionalPick>(store, &key).await? {
                picks.push(pick);
            }
        }
        Ok(picks)
    }

    // ── Result ───────────────────────────────────────────────────────────

    /// Write the agreed outcome. Only the current result-save holder may
    /// write; repeating the same winner is a successful no-op.
    pub async fn save_result(
        &self,
        match_id: MatchId,
        winner: &str,
        owner: &str,
    ) -> CoordResult<bool> {
        let holder = self.holder(match_id, MatchPhase::ResultSave).await?;
        if holder.as_deref() != Some(owner) {
            tracing::warn!(match_id, owner, "Result save attempted without the result-save lock");
            return Ok(false);
        }

        if let Some(existing) = self.result(match_id).await? {
            if existing.winner == winner {
                return Ok(true);
            }
            tracing::warn!(
                match_id,
                existing = %existing.winner,
                attempted = %winner,
                "Conflicting result for match"
            );
            return Ok(false);
        }

        let result = MatchResult {
            match_id,
            winner: winner.to_string(),
            decided_at: chrono::Utc::now(),
        };
        write_record(
            self.lock.store().as_ref(),
            &keys::match_result(match_id),
            &result,
            Some(ttl::MATCH_RECORD),
        )
        .await?;
        tracing::info!(match_id, winner, "Match result saved");
        Ok(true)
    }

    pub async fn result(&self, match_id: MatchId) -> CoordResult<Option<MatchResult>> {
        Ok(read_record(self.lock.store().as_ref(), &keys::match_result(match_id)).await?)
    }

    // ── Cleanup ──────────────────────────────────────────────────────────

    /// Remove every lock and derived record of a finished or cancelled
    /// match. Returns the number of keys removed.
    pub async fn clear_match(&self, match_id: MatchId, actor: &str) -> CoordResult<u64> {
        let prefix = keys::match_prefix(match_id);
        let removed = self.lock.store().delete_prefix(&prefix).await?;
        tracing::info!(match_id, removed, actor, "Cleared match coordination keys");
        self.lock.publish(
            CoordinationEvent::new(MATCH_CLEARED)
                .with_key(prefix)
                .with_match(match_id)
                .with_actor(actor)
                .with_payload(serde_json::json!({ "removed": removed })),
        );
        Ok(removed)
    }

    /// Live keys of one match, for monitoring and operators.
    pub async fn live_keys(&self, match_id: MatchId) -> CoordResult<Vec<String>> {
        Ok(self
            .lock
            .store()
            .keys_with_prefix(&keys::match_prefix(match_id))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::memory::MemoryStore;

    fn locks() -> MatchLocks {
        MatchLocks::new(DistributedLock::new(Arc::new(MemoryStore::new())))
    }

    #[tokio::test(start_paused = true)]
    async fn queue_processing_elects_one_replica() {
        let locks = locks();
        assert!(locks.try_queue_processing("replica-a").await.unwrap());
        assert!(!locks.try_queue_processing("replica-b").await.unwrap());

        assert!(!locks.release_queue_processing("replica-b").await.unwrap());
        assert!(locks.release_queue_processing("replica-a").await.unwrap());
        assert!(locks.try_queue_processing("replica-b").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn acceptance_is_per_player() {
        let locks = locks();
        assert!(locks.acquire_acceptance(1, 10, "click").await.unwrap());
        assert!(!locks.acquire_acceptance(1, 10, "timeout").await.unwrap());
        assert!(locks.acquire_acceptance(1, 11, "click").await.unwrap());

        locks.release_acceptance(1, 10).await.unwrap();
        assert!(locks.acquire_acceptance(1, 10, "timeout").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn acceptance_lock_expires_after_five_seconds() {
        let locks = locks();
        locks.acquire_acceptance(1, 10, "crashed").await.unwrap();
        tokio::time::advance(ttl::ACCEPTANCE).await;
        assert!(locks.acquire_acceptance(1, 10, "retry").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn phase_locks_use_their_own_ttl() {
        let locks = locks();
        locks.acquire_draft_confirm(5, "a").await.unwrap();
        locks.acquire_game_end(5, "a").await.unwrap();

        assert_eq!(
            locks.ttl_remaining(5, MatchPhase::DraftConfirm).await.unwrap(),
            Some(ttl::DRAFT_CONFIRM)
        );
        assert_eq!(
            locks.ttl_remaining(5, MatchPhase::GameEnd).await.unwrap(),
            Some(ttl::GAME_END)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn phase_locks_are_independent_per_match() {
        let locks = locks();
        assert!(locks.acquire_draft_start(1, "a").await.unwrap());
        assert!(!locks.acquire_draft_start(1, "b").await.unwrap());
        assert!(locks.acquire_draft_start(2, "b").await.unwrap());
        assert!(locks.acquire_game_start(1, "b").await.unwrap());

        locks.release_draft_start(1).await.unwrap();
        assert!(locks.acquire_draft_start(1, "b").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn draft_turn_renews_for_same_turn_only() {
        let locks = locks();
        let turn = DraftTurn::new(3, 41);

        assert!(locks.acquire_draft_turn(9, turn).await.unwrap());
        assert!(locks.acquire_draft_turn(9, turn).await.unwrap());
        assert!(!locks.acquire_draft_turn(9, DraftTurn::new(3, 42)).await.unwrap());
        assert!(!locks.acquire_draft_turn(9, DraftTurn::new(4, 41)).await.unwrap());
        assert_eq!(locks.current_turn(9).await.unwrap(), Some(turn));
    }

    #[tokio::test(start_paused = true)]
    async fn draft_turn_advances_only_from_current_holder() {
        let locks = locks();
        let first = DraftTurn::new(1, 10);
        let second = DraftTurn::new(2, 20);

        locks.acquire_draft_turn(9, first).await.unwrap();
        assert!(!locks.advance_draft_turn(9, second, first).await.unwrap());
        assert!(locks.advance_draft_turn(9, first, second).await.unwrap());
        assert_eq!(locks.current_turn(9).await.unwrap(), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn provisional_picks_are_listed_per_match() {
        let locks = locks();
        locks.set_provisional_pick(9, 1, "Ahri").await.unwrap();
        locks.set_provisional_pick(9, 2, "Garen").await.unwrap();
        locks.set_provisional_pick(9, 1, "Lux").await.unwrap();
        locks.set_provisional_pick(90, 1, "Zed").await.unwrap();

        let picks = locks.provisional_picks(9).await.unwrap();
        let champions: Vec<&str> = picks.iter().map(|p| p.champion.as_str()).collect();
        assert_eq!(champions, vec!["Lux", "Garen"]);
        assert_eq!(
            locks.provisional_pick(9, 2).await.unwrap().unwrap().champion,
            "Garen"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn result_requires_result_save_lock() {
        let locks = locks();
        assert!(!locks.save_result(4, "blue", "replica-a").await.unwrap());

        locks.acquire_result_save(4, "replica-a").await.unwrap();
        assert!(locks.save_result(4, "blue", "replica-a").await.unwrap());
        assert!(locks.save_result(4, "blue", "replica-a").await.unwrap());
        assert!(!locks.save_result(4, "red", "replica-a").await.unwrap());
        assert_eq!(locks.result(4).await.unwrap().unwrap().winner, "blue");
    }

    #[tokio::test(start_paused = true)]
    async fn clear_match_removes_every_match_key() {
        let locks = locks();
        locks.acquire_acceptance(7, 1, "o").await.unwrap();
        locks.acquire_match_cancel(7, "o").await.unwrap();
        locks.acquire_draft_turn(7, DraftTurn::new(1, 1)).await.unwrap();
        locks.set_provisional_pick(7, 1, "Ahri").await.unwrap();
        locks.acquire_result_save(7, "o").await.unwrap();
        locks.save_result(7, "blue", "o").await.unwrap();
        locks.acquire_game_end(77, "o").await.unwrap();

        assert_eq!(locks.live_keys(7).await.unwrap().len(), 6);
        assert_eq!(locks.clear_match(7, "replica-a").await.unwrap(), 6);
        assert!(locks.live_keys(7).await.unwrap().is_empty());
        assert_eq!(locks.live_keys(77).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_match_reports_only_live_keys() {
        let locks = locks();
        locks.acquire_acceptance(7, 1, "o").await.unwrap();
        locks.acquire_game_end(7, "o").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(locks.live_keys(7).await.unwrap().len(), 1);
        assert_eq!(locks.clear_match(7, "replica-a").await.unwrap(), 1);
        assert!(locks.live_keys(7).await.unwrap().is_empty());
    }
}
