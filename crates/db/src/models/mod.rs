//! Row structs and create DTOs for the coordination tables.

pub mod audit;
pub mod coordination_key;
