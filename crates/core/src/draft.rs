//! Draft-phase values: the turn holder and provisional picks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{MatchId, PlayerId, Timestamp};

/// Owner value held under a match's draft-turn lock.
///
/// Encoded as `turn-{n}:player-{id}` so the same player re-acquiring the
/// same turn (a retried request) renews instead of contending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftTurn {
    pub turn: u32,
    pub player_id: PlayerId,
}

impl DraftTurn {
    pub fn new(turn: u32, player_id: PlayerId) -> Self {
        Self { turn, player_id }
    }

    /// The string stored as lock owner.
    pub fn owner_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DraftTurn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}:player-{}", self.turn, self.player_id)
    }
}

impl FromStr for DraftTurn {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("Invalid draft turn owner '{s}'"));

        let (turn, player) = s.split_once(':').ok_or_else(invalid)?;
        let turn = turn
            .strip_prefix("turn-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)?;
        let player_id = player
            .strip_prefix("player-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)?;

        Ok(Self { turn, player_id })
    }
}

/// A player's pick before the draft is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionalPick {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub champion: String,
    pub updated_at: Timestamp,
}

impl ProvisionalPick {
    pub fn new(match_id: MatchId, player_id: PlayerId, champion: impl Into<String>) -> Self {
        Self {
            match_id,
            player_id,
            champion: champion.into(),
            updated_at: chrono::Utc::now(),
        }
    }
}
