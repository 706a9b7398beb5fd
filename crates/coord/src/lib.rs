//! Cross-replica coordination for the arena matchmaking service.
//!
//! - [`DistributedLock`]: named try-lock with TTL, the primitive under
//!   every other service.
//! - [`PlayerStateMachine`]: validated per-player state transitions.
//! - [`MatchLocks`]: the catalogue of per-match phase locks and the
//!   derived match state they guard.
//! - [`VoteAggregator`]: per-match vote registration and quorum.
//! - [`SessionBinder`]: one live connection session per player.
//! - [`MemoryStore`]: in-process store for tests and single-replica runs.
//!
//! All services share one `Arc<dyn KeyValueStore>`; [`Coordinator`] wires
//! them together.

pub mod coordinator;
pub mod lock;
pub mod match_locks;
pub mod memory;
pub mod player_state;
pub mod retry;
pub mod session;
pub mod votes;

pub use coordinator::Coordinator;
pub use lock::DistributedLock;
pub use match_locks::MatchLocks;
pub use memory::MemoryStore;
pub use player_state::{PlayerStateMachine, StateChange};
pub use retry::RetryPolicy;
pub use session::SessionBinder;
pub use votes::{QuorumCheck, VoteAggregator};
