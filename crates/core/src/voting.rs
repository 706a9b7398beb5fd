//! Outcome voting: per-player ballots, derived counts, and quorum rules.
//!
//! A [`VoteSheet`] holds every active vote of one match. Counts are always
//! derived from the ballots, so `sum(counts) == distinct voters` holds by
//! construction and a changed vote moves exactly one count.
//!
//! # Quorum tie-break
//!
//! Among candidates at or above quorum the highest count wins. On equal
//! counts the candidate that reached quorum first wins, where a candidate
//! reaches quorum at the `cast_at` of its quorum-th current vote. Remaining
//! ties go to the lexicographically smaller candidate, so every replica
//! picks the same winner from the same sheet.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{MatchId, PlayerId, Timestamp};

/// One player's active vote in one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub candidate: String,
    pub cast_at: Timestamp,
}

/// Result of casting a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote of this player.
    Recorded,
    /// The player moved their vote away from `from`.
    Changed { from: String },
    /// The player repeated their current vote.
    Unchanged,
}

/// All active votes of one match, stored under `match:{id}:votes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSheet {
    pub match_id: MatchId,
    pub votes: BTreeMap<PlayerId, VoteRecord>,
}

impl VoteSheet {
    pub fn new(match_id: MatchId) -> Self {
        Self {
            match_id,
            votes: BTreeMap::new(),
        }
    }

    /// Record, move, or repeat `player_id`'s vote.
    pub fn cast(&mut self, player_id: PlayerId, candidate: &str, at: Timestamp) -> VoteOutcome {
        match self.votes.get_mut(&player_id) {
            Some(existing) if existing.candidate == candidate => VoteOutcome::Unchanged,
            Some(existing) => {
                let from = std::mem::replace(&mut existing.candidate, candidate.to_string());
                existing.cast_at = at;
                VoteOutcome::Changed { from }
            }
            None => {
                self.votes.insert(
                    player_id,
                    VoteRecord {
                        match_id: self.match_id,
                        player_id,
                        candidate: candidate.to_string(),
                        cast_at: at,
                    },
                );
                VoteOutcome::Recorded
            }
        }
    }

    /// Withdraw `player_id`'s vote, returning it if one existed.
    pub fn remove(&mut self, player_id: PlayerId) -> Option<VoteRecord> {
        self.votes.remove(&player_id)
    }

    pub fn vote_of(&self, player_id: PlayerId) -> Option<&VoteRecord> {
        self.votes.get(&player_id)
    }

    pub fn voter_count(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Vote count per candidate. Candidates without votes are absent.
    pub fn counts(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for vote in self.votes.values() {
            *counts.entry(vote.candidate.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// The candidate whose count is at least `quorum`, per the tie-break
    /// rules in the module docs. A quorum of zero is treated as one.
    pub fn winner(&self, quorum: u32) -> Option<String> {
        let quorum = quorum.max(1) as usize;

        let mut by_candidate: BTreeMap<&str, Vec<Timestamp>> = BTreeMap::new();
        for vote in self.votes.values() {
            by_candidate
                .entry(vote.candidate.as_str())
                .or_default()
                .push(vote.cast_at);
        }

        by_candidate
            .into_iter()
            .filter(|(_, times)| times.len() >= quorum)
            .map(|(candidate, mut times)| {
                times.sort_unstable();
                (candidate, times.len(), times[quorum - 1])
            })
            .max_by_key(|(candidate, count, reached_at)| {
                (*count, Reverse(*reached_at), Reverse(*candidate))
            })
            .map(|(candidate, _, _)| candidate.to_string())
    }
}

/// The agreed outcome of a match, written by the result-save holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: MatchId,
    pub winner: String,
    pub decided_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn first_vote_is_recorded() {
        let mut sheet = VoteSheet::new(77);
        assert_eq!(sheet.cast(1, "blue", at(0)), VoteOutcome::Recorded);
        assert_eq!(sheet.counts().get("blue"), Some(&1));
        assert_eq!(sheet.vote_of(1).unwrap().candidate, "blue");
    }

    #[test]
    fn repeated_vote_leaves_counts_unchanged() {
        let mut sheet = VoteSheet::new(77);
        sheet.cast(1, "blue", at(0));
        let before = sheet.counts();

        assert_eq!(sheet.cast(1, "blue", at(5)), VoteOutcome::Unchanged);
        assert_eq!(sheet.counts(), before);
        assert_eq!(sheet.vote_of(1).unwrap().cast_at, at(0));
    }

    #[test]
    fn changed_vote_moves_exactly_one_count() {
        let mut sheet = VoteSheet::new(77);
        sheet.cast(1, "blue", at(0));
        sheet.cast(2, "blue", at(1));

        let outcome = sheet.cast(1, "red", at(2));
        assert_eq!(outcome, VoteOutcome::Changed { from: "blue".into() });

        let counts = sheet.counts();
        assert_eq!(counts.get("blue"), Some(&1));
        assert_eq!(counts.get("red"), Some(&1));
        assert_eq!(counts.values().sum::<u32>() as usize, sheet.voter_count());
    }

    #[test]
    fn removed_vote_disappears_from_counts() {
        let mut sheet = VoteSheet::new(77);
        sheet.cast(1, "blue", at(0));
        assert!(sheet.remove(1).is_some());
        assert!(sheet.remove(1).is_none());
        assert!(sheet.counts().is_empty());
        assert!(sheet.is_empty());
    }

    #[test]
    fn winner_requires_quorum() {
        let mut sheet = VoteSheet::new(77);
        sheet.cast(1, "blue", at(0));
        sheet.cast(2, "red", at(1));
        assert_eq!(sheet.winner(2), None);

        sheet.cast(3, "blue", at(2));
        assert_eq!(sheet.winner(2).as_deref(), Some("blue"));
    }

    #[test]
    fn higher_count_beats_earlier_quorum() {
        let mut sheet = VoteSheet::new(77);
        sheet.cast(1, "red", at(0));
        sheet.cast(2, "red", at(1));
        sheet.cast(3, "blue", at(2));
        sheet.cast(4, "blue", at(3));
        sheet.cast(5, "blue", at(4));
        assert_eq!(sheet.winner(2).as_deref(), Some("blue"));
    }

    #[test]
    fn equal_counts_go_to_first_to_reach_quorum() {
        let mut sheet = VoteSheet::new(77);
        sheet.cast(1, "red", at(0));
        sheet.cast(2, "blue", at(1));
        sheet.cast(3, "blue", at(2));
        sheet.cast(4, "red", at(3));
        // blue reached 2 at t=2, red at t=3.
        assert_eq!(sheet.winner(2).as_deref(), Some("blue"));
    }

    #[test]
    fn identical_timing_falls_back_to_candidate_name() {
        let mut sheet = VoteSheet::new(77);
        sheet.cast(1, "red", at(0));
        sheet.cast(2, "blue", at(0));
        assert_eq!(sheet.winner(1).as_deref(), Some("blue"));
    }

    #[test]
    fn zero_quorum_behaves_like_one() {
        let mut sheet = VoteSheet::new(77);
        assert_eq!(sheet.winner(0), None);
        sheet.cast(1, "red", at(0));
        assert_eq!(sheet.winner(0).as_deref(), Some("red"));
    }

    #[test]
    fn sheet_survives_json_with_integer_keys() {
        let mut sheet = VoteSheet::new(77);
        sheet.cast(10, "red", at(0));
        let raw = serde_json::to_string(&sheet).unwrap();
        let back: VoteSheet = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, sheet);
    }
}
