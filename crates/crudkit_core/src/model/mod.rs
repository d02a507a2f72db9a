//! Resource type definitions and the dynamic record shape.
//!
//! # Responsibility
//! - Describe model-backed resources independently of any storage engine.
//! - Provide the record type every repository operation returns.
//!
//! # Invariants
//! - Deletion of soft-delete capable resources is a tombstone, not a row removal,
//!   until a force delete is requested.

pub mod definition;
pub mod record;
