//! Arena coordination event bus and audit trail.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`CoordinationEvent`]: the event envelope published by the
//!   coordination services (force releases, forced states, match clears,
//!   quorum, rejected sessions).
//! - [`AuditPersistence`]: background service writing audited events to
//!   the `coordination_audit_log` table.

pub mod bus;
pub mod persistence;

pub use bus::{CoordinationEvent, EventBus};
pub use persistence::AuditPersistence;
