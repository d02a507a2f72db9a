//! Generic CRUD repository contract and its model-store backed implementation.
//!
//! # Responsibility
//! - Offer one interface for reading, writing, soft deleting, restoring and
//!   paginating any model-backed resource.
//! - Dispatch on the soft-delete capability and run access policy hooks.
//!
//! # Invariants
//! - The soft-delete capability is resolved once when the repository is bound.
//! - A hook denial raises `AccessDenied` before any write reaches the store.
//! - `force_delete` is terminal: the row is gone from every trash scope.

use crate::model::definition::ModelDef;
use crate::model::record::{Fields, Record, RecordId};
use crate::repo::error::{AccessDenied, Operation, RepoError, RepoResult};
use crate::repo::pagination::{self, page_bounds, Page, PageRequest};
use crate::repo::policy::{AccessPolicy, AllowAll};
use crate::store::query::{Comparator, Query, TrashScope};
use crate::store::ModelStore;
use log::{info, warn};
use serde_json::Value;

/// Lookup by an arbitrary field.
///
/// Defaults to `=` comparison and strict mode (a miss is `NotFound`).
#[derive(Debug, Clone, PartialEq)]
pub struct FindBy {
    pub field: String,
    pub value: Value,
    pub comparator: Comparator,
    pub strict: bool,
    pub relations: Vec<String>,
}

impl FindBy {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            comparator: Comparator::Eq,
            strict: true,
            relations: Vec::new(),
        }
    }

    pub fn comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Returns `Ok(None)` on a miss instead of failing.
    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    pub fn with<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.extend(relations.into_iter().map(Into::into));
        self
    }
}

/// Repository interface shared by every model-backed resource.
pub trait CrudRepository {
    /// Definition of the bound resource type.
    fn definition(&self) -> &ModelDef;

    /// Starts a query against the bound resource for custom filters.
    fn query(&self) -> Query {
        Query::new()
    }

    /// Active records. Soft-delete capable types exclude tombstoned rows.
    fn all(&self, relations: &[&str]) -> RepoResult<Vec<Record>>;
    /// Active and tombstoned records; same as `all` without soft deletes.
    fn all_with_trashed(&self, relations: &[&str]) -> RepoResult<Vec<Record>>;
    /// Tombstoned records only; empty without soft deletes.
    fn all_trashed(&self, relations: &[&str]) -> RepoResult<Vec<Record>>;

    fn find(&self, id: RecordId, relations: &[&str]) -> RepoResult<Record>;
    fn find_with_trashed(&self, id: RecordId, relations: &[&str]) -> RepoResult<Record>;
    /// Always `NotFound` for types without soft deletes.
    fn find_trashed(&self, id: RecordId, relations: &[&str]) -> RepoResult<Record>;

    fn find_by(&self, lookup: &FindBy) -> RepoResult<Option<Record>>;
    fn find_by_with_trashed(&self, lookup: &FindBy) -> RepoResult<Option<Record>>;
    fn find_by_trashed(&self, lookup: &FindBy) -> RepoResult<Option<Record>>;

    /// Builds an unsaved record prefilled with mass-assignable fields.
    fn new_model(&self, fields: Fields) -> RepoResult<Record>;
    /// Renders a record as a plain map, narrowed to the selected fields if declared.
    fn format_model(&self, record: &Record) -> Fields;

    fn create(&self, params: &Fields) -> RepoResult<Record>;
    fn update(&self, id: RecordId, params: &Fields) -> RepoResult<Record>;
    fn delete(&self, id: RecordId) -> RepoResult<bool>;
    fn force_delete(&self, id: RecordId) -> RepoResult<bool>;
    /// Returns `Ok(false)` for types without soft deletes.
    fn restore(&self, id: RecordId) -> RepoResult<bool>;

    /// Paginates any query over the bound resource.
    fn paginate(&self, query: &Query, request: PageRequest) -> RepoResult<Page<Record>>;

    /// Paginates an already loaded sequence in memory.
    fn paginate_collection<T>(&self, items: Vec<T>, request: PageRequest) -> RepoResult<Page<T>>
    where
        Self: Sized,
    {
        pagination::paginate_collection(items, request)
    }

    fn pagination(&self, request: PageRequest) -> RepoResult<Page<Record>> {
        self.paginate(&self.query(), request)
    }

    fn pagination_with_trashed(&self, request: PageRequest) -> RepoResult<Page<Record>> {
        self.paginate(&self.query().with_trashed(), request)
    }

    fn pagination_only_trashed(&self, request: PageRequest) -> RepoResult<Page<Record>> {
        let query = if self.definition().has_soft_deletes() {
            self.query().only_trashed()
        } else {
            Query::none()
        };
        self.paginate(&query, request)
    }
}

/// `CrudRepository` implementation over a `ModelStore` and an `AccessPolicy`.
pub struct ModelRepository<S, P = AllowAll> {
    store: S,
    policy: P,
    soft_deletes: bool,
}

impl<S: ModelStore> ModelRepository<S, AllowAll> {
    /// Binds a store with the allow-everything policy.
    pub fn new(store: S) -> Self {
        Self::with_policy(store, AllowAll)
    }
}

impl<S: ModelStore, P: AccessPolicy> ModelRepository<S, P> {
    /// Binds a store with a custom policy.
    pub fn with_policy(store: S, policy: P) -> Self {
        let soft_deletes = store.has_soft_deletes();
        Self {
            store,
            policy,
            soft_deletes,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    fn model_name(&self) -> &str {
        self.store.definition().name()
    }

    fn list(&self, scope: TrashScope, relations: &[&str]) -> RepoResult<Vec<Record>> {
        let query = Query::new().scope(scope).with(relations.iter().copied());
        self.store.get(&query)
    }

    fn load(&self, id: RecordId, scope: TrashScope, relations: &[&str]) -> RepoResult<Record> {
        self.store
            .by_id(id, scope, relations)?
            .ok_or_else(|| RepoError::not_found(self.model_name(), Some(id)))
    }

    fn show(&self, id: RecordId, scope: TrashScope, relations: &[&str]) -> RepoResult<Record> {
        let record = self.load(id, scope, relations)?;
        self.check_can_show(&record)?;
        Ok(record)
    }

    fn show_by(&self, lookup: &FindBy, scope: TrashScope) -> RepoResult<Option<Record>> {
        let query = Query::new()
            .scope(scope)
            .filter(lookup.field.clone(), lookup.comparator, lookup.value.clone())
            .with(lookup.relations.iter().cloned());

        match self.store.first(&query)? {
            Some(record) => {
                self.check_can_show(&record)?;
                Ok(Some(record))
            }
            None if lookup.strict => Err(RepoError::not_found(self.model_name(), None)),
            None => Ok(None),
        }
    }

    /// Reloads a written row regardless of its tombstone.
    fn fresh(&self, id: RecordId) -> RepoResult<Record> {
        self.load(id, TrashScope::WithTrashed, &[])
    }

    fn ensure_fillable(&self, fields: &Fields) -> RepoResult<()> {
        match self.store.definition().first_guarded(fields.keys()) {
            Some(field) => Err(RepoError::invalid_field(self.model_name(), field)),
            None => Ok(()),
        }
    }

    fn check_can_show(&self, record: &Record) -> RepoResult<()> {
        if self.policy.can_show(record) {
            return Ok(());
        }
        Err(self.deny(Operation::Show, vec![record_value(record)]))
    }

    fn check_can_delete(&self, record: &Record) -> RepoResult<()> {
        if self.policy.can_delete(record) {
            return Ok(());
        }
        Err(self.deny(Operation::Delete, vec![record_value(record)]))
    }

    fn deny(&self, operation: Operation, arguments: Vec<Value>) -> RepoError {
        warn!(
            "event=access_denied module=repo status=denied model={} operation={} arguments={}",
            self.model_name(),
            operation,
            arguments.len()
        );
        AccessDenied::new(self.model_name(), operation, arguments).into()
    }

    fn log_write(&self, operation: &str, id: RecordId, changed: bool) {
        info!(
            "event=repo_write module=repo status=ok op={operation} model={} id={id} changed={changed}",
            self.model_name()
        );
    }
}

impl<S: ModelStore, P: AccessPolicy> CrudRepository for ModelRepository<S, P> {
    fn definition(&self) -> &ModelDef {
        self.store.definition()
    }

    fn all(&self, relations: &[&str]) -> RepoResult<Vec<Record>> {
        self.list(TrashScope::WithoutTrashed, relations)
    }

    fn all_with_trashed(&self, relations: &[&str]) -> RepoResult<Vec<Record>> {
        if self.soft_deletes {
            return self.list(TrashScope::WithTrashed, relations);
        }
        self.all(relations)
    }

    fn all_trashed(&self, relations: &[&str]) -> RepoResult<Vec<Record>> {
        if self.soft_deletes {
            return self.list(TrashScope::OnlyTrashed, relations);
        }
        Ok(Vec::new())
    }

    fn find(&self, id: RecordId, relations: &[&str]) -> RepoResult<Record> {
        self.show(id, TrashScope::WithoutTrashed, relations)
    }

    fn find_with_trashed(&self, id: RecordId, relations: &[&str]) -> RepoResult<Record> {
        if self.soft_deletes {
            return self.show(id, TrashScope::WithTrashed, relations);
        }
        self.find(id, relations)
    }

    fn find_trashed(&self, id: RecordId, relations: &[&str]) -> RepoResult<Record> {
        if self.soft_deletes {
            return self.show(id, TrashScope::OnlyTrashed, relations);
        }
        Err(RepoError::not_found(self.model_name(), Some(id)))
    }

    fn find_by(&self, lookup: &FindBy) -> RepoResult<Option<Record>> {
        self.show_by(lookup, TrashScope::WithoutTrashed)
    }

    fn find_by_with_trashed(&self, lookup: &FindBy) -> RepoResult<Option<Record>> {
        if self.soft_deletes {
            return self.show_by(lookup, TrashScope::WithTrashed);
        }
        self.find_by(lookup)
    }

    fn find_by_trashed(&self, lookup: &FindBy) -> RepoResult<Option<Record>> {
        if self.soft_deletes {
            return self.show_by(lookup, TrashScope::OnlyTrashed);
        }
        if lookup.strict {
            return Err(RepoError::not_found(self.model_name(), None));
        }
        Ok(None)
    }

    fn new_model(&self, fields: Fields) -> RepoResult<Record> {
        self.ensure_fillable(&fields)?;
        Ok(Record::unsaved(fields))
    }

    fn format_model(&self, record: &Record) -> Fields {
        let map = record.to_map();
        match self.store.definition().selected_fields() {
            Some(selected) => map
                .into_iter()
                .filter(|(key, _)| selected.iter().any(|field| field == key))
                .collect(),
            None => map,
        }
    }

    fn create(&self, params: &Fields) -> RepoResult<Record> {
        if !self.policy.can_create(params) {
            return Err(self.deny(Operation::Create, vec![Value::Object(params.clone())]));
        }
        self.ensure_fillable(params)?;

        let id = self.store.insert(params)?;
        self.log_write("create", id, true);
        self.fresh(id)
    }

    fn update(&self, id: RecordId, params: &Fields) -> RepoResult<Record> {
        let record = self.load(id, TrashScope::WithoutTrashed, &[])?;
        if !self.policy.can_update(&record, params) {
            return Err(self.deny(
                Operation::Update,
                vec![record_value(&record), Value::Object(params.clone())],
            ));
        }
        self.ensure_fillable(params)?;

        let changed = self.store.update(id, params)?;
        if !changed {
            return Err(RepoError::not_found(self.model_name(), Some(id)));
        }
        self.log_write("update", id, changed);
        self.fresh(id)
    }

    fn delete(&self, id: RecordId) -> RepoResult<bool> {
        let record = self.load(id, TrashScope::WithoutTrashed, &[])?;
        self.check_can_delete(&record)?;

        let deleted = if self.soft_deletes {
            self.store.soft_delete(id)?
        } else {
            self.store.hard_delete(id)?
        };
        self.log_write("delete", id, deleted);
        Ok(deleted)
    }

    fn force_delete(&self, id: RecordId) -> RepoResult<bool> {
        let scope = if self.soft_deletes {
            TrashScope::WithTrashed
        } else {
            TrashScope::WithoutTrashed
        };
        let record = self.load(id, scope, &[])?;
        self.check_can_delete(&record)?;

        let deleted = self.store.hard_delete(id)?;
        self.log_write("force_delete", id, deleted);
        Ok(deleted)
    }

    fn restore(&self, id: RecordId) -> RepoResult<bool> {
        if !self.soft_deletes {
            return Ok(false);
        }

        let record = self.load(id, TrashScope::OnlyTrashed, &[])?;
        if !self.policy.can_restore(&record) {
            return Err(self.deny(Operation::Restore, vec![record_value(&record)]));
        }

        let restored = self.store.restore(id)?;
        self.log_write("restore", id, restored);
        Ok(restored)
    }

    fn paginate(&self, query: &Query, request: PageRequest) -> RepoResult<Page<Record>> {
        let total = self.store.count(query)?;
        let bounds = page_bounds(total, request)?;
        let window = query.clone().skip(bounds.offset).take(bounds.limit);
        let result = self.store.get(&window)?;

        Ok(Page {
            result,
            total,
            page: request.page,
            pages: bounds.pages,
        })
    }
}

fn record_value(record: &Record) -> Value {
    Value::Object(record.to_map())
}
