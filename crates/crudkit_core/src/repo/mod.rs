//! Repository layer: contract, dispatch, access hooks and pagination.
//!
//! # Responsibility
//! - Define the generic CRUD contract every model-backed resource shares.
//! - Keep soft-delete branching and authorization out of the store.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `AccessDenied`,
//!   `InvalidField`, `InvalidArgument`) in addition to DB transport errors.

pub mod crud_repo;
pub mod error;
pub mod pagination;
pub mod policy;
