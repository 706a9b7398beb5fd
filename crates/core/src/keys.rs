//! Key layout and TTL catalogue for everything the coordination layer keeps
//! in the shared store.
//!
//! Every per-match key starts with [`match_prefix`], so clearing a finished
//! match is a single prefix deletion. The trailing `:` in the prefix keeps
//! match 7 from matching match 77.

use std::fmt;
use std::time::Duration;

use crate::types::{MatchId, PlayerId};

// ---------------------------------------------------------------------------
// TTL constants
// ---------------------------------------------------------------------------

/// Time-to-live of every lock namespace and derived record.
///
/// Each value is the failure-recovery bound for its namespace: an orphaned
/// holder blocks the guarded operation for at most this long.
pub mod ttl {
    use std::time::Duration;

    /// Replica election for one matchmaking tick.
    pub const QUEUE_PROCESSING: Duration = Duration::from_secs(10);
    /// One player's accept/decline click.
    pub const ACCEPTANCE: Duration = Duration::from_secs(5);
    pub const MATCH_CANCEL: Duration = Duration::from_secs(10);
    pub const DRAFT_START: Duration = Duration::from_secs(10);
    pub const GAME_START: Duration = Duration::from_secs(10);
    pub const RESULT_SAVE: Duration = Duration::from_secs(10);
    pub const TIMEOUT_PROCESSING: Duration = Duration::from_secs(5);
    pub const ALL_ACCEPTED_PROCESSING: Duration = Duration::from_secs(10);
    /// Human-paced: one draft turn.
    pub const DRAFT_TURN: Duration = Duration::from_secs(60);
    pub const DRAFT_ACTION: Duration = Duration::from_secs(5);
    pub const DRAFT_EDIT_PICK: Duration = Duration::from_secs(5);
    pub const DRAFT_CONFIRM: Duration = Duration::from_secs(30);
    pub const GAME_WINNER_VOTE: Duration = Duration::from_secs(30);
    pub const GAME_CONFIRM: Duration = Duration::from_secs(30);
    pub const GAME_END: Duration = Duration::from_secs(10);

    /// Mutation lock around one match's vote sheet.
    pub const VOTE_MUTATION: Duration = Duration::from_secs(5);
    /// Per-player state-change lock.
    pub const PLAYER_STATE_CHANGE: Duration = Duration::from_secs(5);
    /// Idle expiry of a player state record. Longer than a full draft + game.
    pub const PLAYER_STATE_IDLE: Duration = Duration::from_secs(2 * 60 * 60);
    /// Dead-session reaper bound for session bindings.
    pub const SESSION_BINDING: Duration = Duration::from_secs(30 * 60);
    /// Backstop expiry for per-match derived records (picks, votes, result)
    /// in case the terminal clear never runs.
    pub const MATCH_RECORD: Duration = Duration::from_secs(2 * 60 * 60);
}

// ---------------------------------------------------------------------------
// Match lock catalogue
// ---------------------------------------------------------------------------

/// A per-match lock namespace (scope: one match).
///
/// The per-(match, player) acceptance lock and the global queue lock are
/// keyed separately by [`acceptance`] and [`QUEUE_PROCESSING`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchPhase {
    Cancel,
    DraftStart,
    GameStart,
    ResultSave,
    TimeoutProcessing,
    AllAcceptedProcessing,
    DraftTurn,
    DraftAction,
    DraftEditPick,
    DraftConfirm,
    GameWinnerVote,
    GameConfirm,
    GameEnd,
}

impl MatchPhase {
    pub const ALL: [MatchPhase; 13] = [
        MatchPhase::Cancel,
        MatchPhase::DraftStart,
        MatchPhase::GameStart,
        MatchPhase::ResultSave,
        MatchPhase::TimeoutProcessing,
        MatchPhase::AllAcceptedProcessing,
        MatchPhase::DraftTurn,
        MatchPhase::DraftAction,
        MatchPhase::DraftEditPick,
        MatchPhase::DraftConfirm,
        MatchPhase::GameWinnerVote,
        MatchPhase::GameConfirm,
        MatchPhase::GameEnd,
    ];

    /// Key segment after the match prefix.
    pub fn segment(self) -> &'static str {
        match self {
            MatchPhase::Cancel => "cancel",
            MatchPhase::DraftStart => "draft-start",
            MatchPhase::GameStart => "game-start",
            MatchPhase::ResultSave => "result-save",
            MatchPhase::TimeoutProcessing => "timeout",
            MatchPhase::AllAcceptedProcessing => "all-accepted",
            MatchPhase::DraftTurn => "draft:turn",
            MatchPhase::DraftAction => "draft:action",
            MatchPhase::DraftEditPick => "draft:edit-pick",
            MatchPhase::DraftConfirm => "draft:confirm",
            MatchPhase::GameWinnerVote => "game:vote",
            MatchPhase::GameConfirm => "game:confirm",
            MatchPhase::GameEnd => "game:end",
        }
    }

    /// Lock TTL tuned to the guarded operation.
    pub fn ttl(self) -> Duration {
        match self {
            MatchPhase::Cancel => ttl::MATCH_CANCEL,
            MatchPhase::DraftStart => ttl::DRAFT_START,
            MatchPhase::GameStart => ttl::GAME_START,
            MatchPhase::ResultSave => ttl::RESULT_SAVE,
            MatchPhase::TimeoutProcessing => ttl::TIMEOUT_PROCESSING,
            MatchPhase::AllAcceptedProcessing => ttl::ALL_ACCEPTED_PROCESSING,
            MatchPhase::DraftTurn => ttl::DRAFT_TURN,
            MatchPhase::DraftAction => ttl::DRAFT_ACTION,
            MatchPhase::DraftEditPick => ttl::DRAFT_EDIT_PICK,
            MatchPhase::DraftConfirm => ttl::DRAFT_CONFIRM,
            MatchPhase::GameWinnerVote => ttl::GAME_WINNER_VOTE,
            MatchPhase::GameConfirm => ttl::GAME_CONFIRM,
            MatchPhase::GameEnd => ttl::GAME_END,
        }
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

// ---------------------------------------------------------------------------
// Key builders
// ---------------------------------------------------------------------------

/// Global queue-processing election key.
pub const QUEUE_PROCESSING: &str = "queue:processing";

/// Prefix shared by every key belonging to one match.
pub fn match_prefix(match_id: MatchId) -> String {
    format!("match:{match_id}:")
}

pub fn match_lock(match_id: MatchId, phase: MatchPhase) -> String {
    format!("match:{match_id}:{}", phase.segment())
}

pub fn acceptance(match_id: MatchId, player_id: PlayerId) -> String {
    format!("match:{match_id}:accept:{player_id}")
}

pub fn vote_sheet(match_id: MatchId) -> String {
    format!("match:{match_id}:votes")
}

pub fn vote_lock(match_id: MatchId) -> String {
    format!("match:{match_id}:votes:lock")
}

pub fn provisional_pick(match_id: MatchId, player_id: PlayerId) -> String {
    format!("match:{match_id}:pick:{player_id}")
}

/// Prefix of every provisional pick in one match.
pub fn provisional_pick_prefix(match_id: MatchId) -> String {
    format!("match:{match_id}:pick:")
}

pub fn match_result(match_id: MatchId) -> String {
    format!("match:{match_id}:result")
}

pub fn player_state(player_id: PlayerId) -> String {
    format!("player:{player_id}:state")
}

pub fn player_state_lock(player_id: PlayerId) -> String {
    format!("player:{player_id}:state-lock")
}

pub fn session_binding(player_id: PlayerId) -> String {
    format!("session:player:{player_id}")
}

/// Collapse a concrete key into its namespace by dropping numeric id
/// segments, e.g. `match:7:accept:3` becomes `match:accept`.
///
/// Used to aggregate monitoring output per lock family.
pub fn namespace_of(key: &str) -> String {
    key.split(':')
        .filter(|segment| !segment.is_empty() && segment.parse::<i64>().is_err())
        .collect::<Vec<_>>()
        .join(":")
}
