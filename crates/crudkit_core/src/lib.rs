//! Generic CRUD repositories over SQLite-backed models.
//! Soft-delete aware reads and writes, access hooks and pagination.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::definition::{ModelDef, Relation, RelationKind};
pub use model::record::{Fields, Record, RecordId, Related};
pub use repo::crud_repo::{CrudRepository, FindBy, ModelRepository};
pub use repo::error::{AccessDenied, Operation, RepoError, RepoResult};
pub use repo::pagination::{
    page_bounds, paginate_collection, Page, PageBounds, PageRequest, DEFAULT_PAGE_LIMIT,
};
pub use repo::policy::{AccessPolicy, AllowAll};
pub use store::query::{Comparator, Direction, Query, TrashScope};
pub use store::{ModelStore, SqliteModelStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
