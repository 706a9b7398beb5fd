//! Per-match vote aggregation.
//!
//! Every mutation of a match's [`VoteSheet`] runs under the match's vote
//! lock, taken with a bounded linear backoff. Reads are lock-free snapshots
//! of the sheet; counts are derived from ballots, so they never drift from
//! the set of voters.

use std::collections::BTreeMap;

use arena_core::codec::{read_record, write_record};
use arena_core::error::{CoordError, CoordResult};
use arena_core::keys::{self, ttl};
use arena_core::types::{MatchId, PlayerId};
use arena_core::voting::{VoteOutcome, VoteRecord, VoteSheet};
use arena_events::bus::{CoordinationEvent, VOTE_QUORUM_REACHED};

use crate::lock::{new_owner_token, DistributedLock};
use crate::retry::RetryPolicy;

/// Result of a registration that also evaluated quorum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumCheck {
    pub outcome: VoteOutcome,
    /// Winner after this vote, if any candidate is at quorum.
    pub winner: Option<String>,
    /// Whether this vote changed the winner.
    pub winner_changed: bool,
}

#[derive(Clone)]
pub struct VoteAggregator {
    lock: DistributedLock,
    retry: RetryPolicy,
}

impl VoteAggregator {
    pub fn new(lock: DistributedLock) -> Self {
        Self {
            lock,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Record `player_id`'s vote for `candidate`, replacing any previous vote.
    pub async fn register_vote(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        candidate: &str,
    ) -> CoordResult<VoteOutcome> {
        let candidate = candidate.to_string();
        let outcome = self
            .mutate(match_id, move |sheet| {
                sheet.cast(player_id, &candidate, chrono::Utc::now())
            })
            .await?;
        tracing::debug!(match_id, player_id, ?outcome, "Vote registered");
        Ok(outcome)
    }

    /// Register a vote and report the winner at `quorum`. Publishes
    /// `vote.quorum_reached` when this vote produced a new winner.
    pub async fn register_vote_with_quorum(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        candidate: &str,
        quorum: u32,
    ) -> CoordResult<QuorumCheck> {
        let candidate = candidate.to_string();
        let check = self
            .mutate(match_id, move |sheet| {
                let before = sheet.winner(quorum);
                let outcome = sheet.cast(player_id, &candidate, chrono::Utc::now());
                let winner = sheet.winner(quorum);
                QuorumCheck {
                    outcome,
                    winner_changed: winner != before,
                    winner,
                }
            })
            .await?;

        if let (true, Some(winner)) = (check.winner_changed, check.winner.as_deref()) {
            tracing::info!(match_id, winner, quorum, "Vote quorum reached");
            self.lock.publish(
                CoordinationEvent::new(VOTE_QUORUM_REACHED)
                    .with_key(keys::vote_sheet(match_id))
                    .with_match(match_id)
                    .with_player(player_id)
                    .with_payload(serde_json::json!({
                        "winner": winner,
                        "quorum": quorum,
                    })),
            );
        }
        Ok(check)
    }

    /// Withdraw `player_id`'s vote. Returns `false` if they had none.
    pub async fn remove_vote(&self, match_id: MatchId, player_id: PlayerId) -> CoordResult<bool> {
        let removed = self
            .mutate(match_id, move |sheet| sheet.remove(player_id))
            .await?;
        if let Some(vote) = &removed {
            tracing::debug!(match_id, player_id, candidate = %vote.candidate, "Vote withdrawn");
        }
        Ok(removed.is_some())
    }

    /// Vote count per candidate; empty when nobody voted.
    pub async fn count_votes(&self, match_id: MatchId) -> CoordResult<BTreeMap<String, u32>> {
        Ok(self.sheet(match_id).await?.counts())
    }

    /// Candidate at or above `quorum`, resolved by the sheet's tie-break.
    pub async fn winning_candidate(
        &self,
        match_id: MatchId,
        quorum: u32,
    ) -> CoordResult<Option<String>> {
        Ok(self.sheet(match_id).await?.winner(quorum))
    }

    pub async fn vote_of(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
    ) -> CoordResult<Option<VoteRecord>> {
        Ok(self.sheet(match_id).await?.vote_of(player_id).cloned())
    }

    pub async fn voter_count(&self, match_id: MatchId) -> CoordResult<usize> {
        Ok(self.sheet(match_id).await?.voter_count())
    }

    async fn sheet(&self, match_id: MatchId) -> CoordResult<VoteSheet> {
        let record = read_record(self.lock.store().as_ref(), &keys::vote_sheet(match_id)).await?;
        Ok(record.unwrap_or_else(|| VoteSheet::new(match_id)))
    }

    /// Run `apply` on the sheet while holding the vote lock.
    async fn mutate<T>(
        &self,
        match_id: MatchId,
        apply: impl FnOnce(&mut VoteSheet) -> T + Send,
    ) -> CoordResult<T> {
        let lock_key = keys::vote_lock(match_id);
        let owner = new_owner_token();
        let attempts = self.retry.attempts.max(1);

        let mut attempt = 1;
        while !self
            .lock
            .acquire(&lock_key, &owner, ttl::VOTE_MUTATION)
            .await?
        {
            if attempt >= attempts {
                tracing::warn!(match_id, attempts, "Vote lock contended, giving up");
                return Err(CoordError::Contention { key: lock_key });
            }
            tokio::time::sleep(self.retry.delay_after(attempt)).await;
            attempt += 1;
        }

        let result = self.apply_locked(match_id, apply).await;

        if let Err(e) = self.lock.release_if_owner(&lock_key, &owner).await {
            tracing::warn!(error = %e, match_id, "Failed to release vote lock");
        }
        result
    }

    async fn apply_locked<T>(
        &self,
        match_id: MatchId,
        apply: impl FnOnce(&mut VoteSheet) -> T,
    ) -> CoordResult<T> {
        let key = keys::vote_sheet(match_id);
        let mut sheet = self.sheet(match_id).await?;
        let value = apply(&mut sheet);
        if sheet.is_empty() {
            self.lock.store().delete(&key).await?;
        } else {
            write_record(self.lock.store().as_ref(), &key, &sheet, Some(ttl::MATCH_RECORD)).await?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use arena_core::store::KeyValueStore;
    use arena_events::bus::EventBus;
    use assert_matches::assert_matches;

    use super::*;
    use crate::memory::MemoryStore;

    fn aggregator() -> VoteAggregator {
        VoteAggregator::new(DistributedLock::new(Arc::new(MemoryStore::new())))
    }

    #[tokio::test(start_paused = true)]
    async fn changed_vote_moves_one_count() {
        let votes = aggregator();
        assert_eq!(votes.register_vote(1, 10, "blue").await.unwrap(), VoteOutcome::Recorded);
        votes.register_vote(1, 11, "blue").await.unwrap();
        assert_matches!(
            votes.register_vote(1, 10, "red").await.unwrap(),
            VoteOutcome::Changed { from } if from == "blue"
        );

        let counts = votes.count_votes(1).await.unwrap();
        assert_eq!(counts.get("blue"), Some(&1));
        assert_eq!(counts.get("red"), Some(&1));
        assert_eq!(votes.voter_count(1).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_vote_is_unchanged() {
        let votes = aggregator();
        votes.register_vote(1, 10, "blue").await.unwrap();
        assert_eq!(votes.register_vote(1, 10, "blue").await.unwrap(), VoteOutcome::Unchanged);
        assert_eq!(votes.count_votes(1).await.unwrap().get("blue"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn no_votes_means_no_winner() {
        let votes = aggregator();
        assert!(votes.count_votes(1).await.unwrap().is_empty());
        assert_eq!(votes.winning_candidate(1, 1).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_vote_withdraws_ballot() {
        let votes = aggregator();
        votes.register_vote(1, 10, "blue").await.unwrap();
        votes.register_vote(1, 11, "red").await.unwrap();

        assert!(votes.remove_vote(1, 10).await.unwrap());
        assert!(!votes.remove_vote(1, 10).await.unwrap());
        assert!(votes.vote_of(1, 10).await.unwrap().is_none());
        assert_eq!(votes.count_votes(1).await.unwrap().get("blue"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn last_withdrawal_deletes_sheet() {
        let store = Arc::new(MemoryStore::new());
        let votes = VoteAggregator::new(DistributedLock::new(store.clone()));
        votes.register_vote(1, 10, "blue").await.unwrap();
        votes.remove_vote(1, 10).await.unwrap();
        assert!(store.get(&keys::vote_sheet(1)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn held_vote_lock_exhausts_retries() {
        let store = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store);
        let votes = VoteAggregator::new(lock.clone())
            .with_retry(RetryPolicy::new(3, Duration::from_millis(10)));

        lock.acquire(&keys::vote_lock(1), "stuck", ttl::VOTE_MUTATION)
            .await
            .unwrap();

        let err = votes.register_vote(1, 10, "blue").await.unwrap_err();
        assert_matches!(err, CoordError::Contention { .. });
        assert!(err.is_retryable());
        assert!(votes.vote_of(1, 10).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn vote_proceeds_once_lock_expires() {
        let store = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store);
        let votes = VoteAggregator::new(lock.clone())
            .with_retry(RetryPolicy::new(10, Duration::from_millis(200)));

        lock.acquire(&keys::vote_lock(1), "crashed", Duration::from_millis(500))
            .await
            .unwrap();

        // 200ms + 400ms of backoff outlasts the stale lock.
        assert_eq!(votes.register_vote(1, 10, "blue").await.unwrap(), VoteOutcome::Recorded);
    }

    #[tokio::test(start_paused = true)]
    async fn quorum_event_published_once() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let votes = VoteAggregator::new(
            DistributedLock::new(Arc::new(MemoryStore::new())).with_events(Arc::clone(&bus)),
        );

        let first = votes.register_vote_with_quorum(1, 10, "blue", 2).await.unwrap();
        assert_eq!(first.winner, None);

        let second = votes.register_vote_with_quorum(1, 11, "blue", 2).await.unwrap();
        assert_eq!(second.winner.as_deref(), Some("blue"));
        assert!(second.winner_changed);

        let third = votes.register_vote_with_quorum(1, 12, "blue", 2).await.unwrap();
        assert!(!third.winner_changed);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, VOTE_QUORUM_REACHED);
        assert_eq!(event.payload["winner"], "blue");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn votes_are_isolated_per_match() {
        let votes = aggregator();
        votes.register_vote(1, 10, "blue").await.unwrap();
        votes.register_vote(2, 10, "red").await.unwrap();
        assert_eq!(votes.vote_of(1, 10).await.unwrap().unwrap().candidate, "blue");
        assert_eq!(votes.vote_of(2, 10).await.unwrap().unwrap().candidate, "red");
    }
}
