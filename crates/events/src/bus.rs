//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`CoordinationEvent`]s.
//! It is shared via `Arc<EventBus>` between the coordination services and
//! the replica's background tasks.

use arena_core::types::{MatchId, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// An operator force-released a lock.
pub const LOCK_FORCE_RELEASED: &str = "lock.force_released";

/// An operator forced a player state, bypassing the transition table.
pub const PLAYER_STATE_FORCED: &str = "player_state.forced";

/// Every key of a finished or cancelled match was removed.
pub const MATCH_CLEARED: &str = "match.cleared";

/// A vote registration brought a candidate to quorum.
pub const VOTE_QUORUM_REACHED: &str = "vote.quorum_reached";

/// A connection attempt was refused because the player is bound elsewhere.
pub const SESSION_REJECTED: &str = "session.rejected";

/// Event types written to the durable audit trail.
const AUDITED: &[&str] = &[
    LOCK_FORCE_RELEASED,
    PLAYER_STATE_FORCED,
    MATCH_CLEARED,
    VOTE_QUORUM_REACHED,
];

// ---------------------------------------------------------------------------
// CoordinationEvent
// ---------------------------------------------------------------------------

/// Something notable that happened in the coordination layer.
///
/// Constructed via [`CoordinationEvent::new`] and enriched with the builder
/// methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationEvent {
    /// Dot-separated event name, e.g. `"match.cleared"`.
    pub event_type: String,

    /// Store key the event concerns, if any.
    pub key: Option<String>,

    pub match_id: Option<MatchId>,

    pub player_id: Option<PlayerId>,

    /// Who caused the event (replica id or operator name).
    pub actor: Option<String>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl CoordinationEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            key: None,
            match_id: None,
            player_id: None,
            actor: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_match(mut self, match_id: MatchId) -> Self {
        self.match_id = Some(match_id);
        self
    }

    pub fn with_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether this event belongs in the durable audit trail.
    pub fn is_audited(&self) -> bool {
        AUDITED.contains(&self.event_type.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<CoordinationEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: CoordinationEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
