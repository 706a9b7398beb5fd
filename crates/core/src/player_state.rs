//! Player matchmaking phases and their transition table.
//!
//! The table lives in `core` (zero internal deps) so the coordination
//! services, the worker, and the operator CLI all validate moves the same
//! way.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{PlayerId, Timestamp};

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

/// A player's current matchmaking phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    #[default]
    Available,
    InQueue,
    InMatchFound,
    InDraft,
    InGame,
}

impl PlayerState {
    /// Every state, in lifecycle order.
    pub const ALL: [PlayerState; 5] = [
        PlayerState::Available,
        PlayerState::InQueue,
        PlayerState::InMatchFound,
        PlayerState::InDraft,
        PlayerState::InGame,
    ];

    /// Wire name, e.g. `"IN_QUEUE"`.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerState::Available => "AVAILABLE",
            PlayerState::InQueue => "IN_QUEUE",
            PlayerState::InMatchFound => "IN_MATCH_FOUND",
            PlayerState::InDraft => "IN_DRAFT",
            PlayerState::InGame => "IN_GAME",
        }
    }

    /// Whether the player is attached to a match (found, drafting, playing).
    pub fn is_in_match(self) -> bool {
        matches!(
            self,
            PlayerState::InMatchFound | PlayerState::InDraft | PlayerState::InGame
        )
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        PlayerState::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid player state '{s}'. Must be one of: AVAILABLE, IN_QUEUE, \
                     IN_MATCH_FOUND, IN_DRAFT, IN_GAME"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Stored record
// ---------------------------------------------------------------------------

/// The value stored under `player:{id}:state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStateRecord {
    pub player_id: PlayerId,
    pub state: PlayerState,
    pub updated_at: Timestamp,
}

impl PlayerStateRecord {
    pub fn new(player_id: PlayerId, state: PlayerState) -> Self {
        Self {
            player_id,
            state,
            updated_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use super::PlayerState::{self, *};
    use crate::error::CoreError;

    /// Returns the states reachable from `from`, excluding the always-allowed
    /// self-transition.
    pub fn valid_transitions(from: PlayerState) -> &'static [PlayerState] {
        match from {
            // Available -> InQueue
            Available => &[InQueue],
            // InQueue -> InMatchFound, Available (leave queue)
            InQueue => &[InMatchFound, Available],
            // InMatchFound -> InDraft, Available (decline / timeout)
            InMatchFound => &[InDraft, Available],
            // InDraft -> InGame, Available (dodge / cancel)
            InDraft => &[InGame, Available],
            // InGame -> Available (game over)
            InGame => &[Available],
        }
    }

    /// Check whether moving from `from` to `to` is allowed.
    pub fn can_transition(from: PlayerState, to: PlayerState) -> bool {
        from == to || valid_transitions(from).contains(&to)
    }

    /// Validate a transition, returning a descriptive error for invalid ones.
    pub fn validate_transition(from: PlayerState, to: PlayerState) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Invalid transition: {from} -> {to}"
            )))
        }
    }
}
