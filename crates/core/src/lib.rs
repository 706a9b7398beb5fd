//! Arena coordination domain: types, errors, the store contract, the record
//! codec, the key/TTL catalogue, and the pure rules (player transitions,
//! vote tallies) shared by every replica.
//!
//! This crate has no internal dependencies so the services, the Postgres
//! store, the worker, and the operator CLI can all build on it.

pub mod codec;
pub mod draft;
pub mod error;
pub mod keys;
pub mod player_state;
pub mod store;
pub mod types;
pub mod voting;
