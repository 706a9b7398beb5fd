//! `arena-worker` library crate.
//!
//! Background tasks run by every replica next to the coordination services.
//! The binary entrypoints live in `main.rs` and `bin/arena_admin.rs`.

pub mod config;
pub mod monitor;
pub mod reaper;
pub mod ticker;
