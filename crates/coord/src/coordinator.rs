use std::sync::Arc;

use arena_core::store::KeyValueStore;
use arena_events::EventBus;

use crate::lock::DistributedLock;
use crate::match_locks::MatchLocks;
use crate::player_state::PlayerStateMachine;
use crate::session::SessionBinder;
use crate::votes::VoteAggregator;

/// Every coordination service of one replica, built over one shared store.
///
/// Cheaply cloneable; each service holds the same `Arc`ed store and bus.
#[derive(Clone)]
pub struct Coordinator {
    /// Raw try-lock access, used by operator tooling.
    pub lock: DistributedLock,
    pub players: PlayerStateMachine,
    pub matches: MatchLocks,
    pub votes: VoteAggregator,
    pub sessions: SessionBinder,
}

impl Coordinator {
    pub fn new(store: Arc<dyn KeyValueStore>, events: Arc<EventBus>) -> Self {
        let lock = DistributedLock::new(store).with_events(events);
        Self {
            players: PlayerStateMachine::new(lock.clone()),
            matches: MatchLocks::new(lock.clone()),
            votes: VoteAggregator::new(lock.clone()),
            sessions: SessionBinder::new(lock.clone()),
            lock,
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        self.lock.store()
    }
}
