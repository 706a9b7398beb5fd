//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod coordination_audit_repo;
pub mod coordination_key_repo;

pub use coordination_audit_repo::CoordinationAuditRepo;
pub use coordination_key_repo::CoordinationKeyRepo;
