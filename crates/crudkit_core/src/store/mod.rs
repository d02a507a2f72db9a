//! Persistence collaborator contract and its SQLite implementation.
//!
//! # Responsibility
//! - Define the per-model data access surface repositories delegate to.
//! - Keep SQL details out of repository dispatch logic.
//!
//! # Invariants
//! - Trash scopes only narrow queries for soft-delete capable models.
//! - Store methods never run access policy checks.

pub mod query;
mod sqlite;

pub use sqlite::SqliteModelStore;

use crate::model::definition::ModelDef;
use crate::model::record::{Fields, Record, RecordId};
use crate::repo::error::RepoResult;
use query::{Query, TrashScope};

/// Data access surface for one bound resource type.
pub trait ModelStore {
    fn definition(&self) -> &ModelDef;

    /// Whether the bound table carries `column`.
    fn has_column(&self, column: &str) -> bool;

    /// Runs `query` and eagerly loads its relations.
    fn get(&self, query: &Query) -> RepoResult<Vec<Record>>;

    /// First row of `query`, if any.
    fn first(&self, query: &Query) -> RepoResult<Option<Record>>;

    /// Number of rows matched by `query`, ignoring skip/take.
    fn count(&self, query: &Query) -> RepoResult<u64>;

    /// Inserts a row and returns its new id.
    fn insert(&self, fields: &Fields) -> RepoResult<RecordId>;

    /// Writes `fields` to row `id`. Returns whether a row changed.
    fn update(&self, id: RecordId, fields: &Fields) -> RepoResult<bool>;

    /// Sets the tombstone on row `id`.
    fn soft_delete(&self, id: RecordId) -> RepoResult<bool>;

    /// Removes row `id` permanently.
    fn hard_delete(&self, id: RecordId) -> RepoResult<bool>;

    /// Clears the tombstone on row `id`.
    fn restore(&self, id: RecordId) -> RepoResult<bool>;

    fn has_soft_deletes(&self) -> bool {
        self.definition().has_soft_deletes()
    }

    /// Loads one row by primary key within `scope`.
    fn by_id(
        &self,
        id: RecordId,
        scope: TrashScope,
        relations: &[&str],
    ) -> RepoResult<Option<Record>> {
        let query = Query::new()
            .scope(scope)
            .where_id(id)
            .with(relations.iter().copied());
        self.first(&query)
    }
}
