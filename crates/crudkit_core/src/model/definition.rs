//! Resource type descriptors.
//!
//! # Responsibility
//! - Describe one model-backed resource: table, mass-assignment allow-list,
//!   serialization allow-list, soft-delete capability and relations.
//!
//! # Invariants
//! - The soft-delete capability is a static property of the definition and is
//!   never inferred from stored rows.
//! - `id`, timestamp and tombstone columns are managed by the store and are
//!   never mass-assignable.

use std::sync::Arc;

/// Primary key column shared by every model table.
pub const ID_COLUMN: &str = "id";
/// Creation timestamp column (epoch milliseconds).
pub const CREATED_AT_COLUMN: &str = "created_at";
/// Update timestamp column (epoch milliseconds).
pub const UPDATED_AT_COLUMN: &str = "updated_at";
/// Soft-delete tombstone column (epoch milliseconds, `NULL` while active).
pub const DELETED_AT_COLUMN: &str = "deleted_at";

const MANAGED_COLUMNS: &[&str] = &[
    ID_COLUMN,
    CREATED_AT_COLUMN,
    UPDATED_AT_COLUMN,
    DELETED_AT_COLUMN,
];

/// How a related model is joined to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Related rows carry `foreign_key` pointing at the parent id.
    HasMany,
    /// The parent row carries `foreign_key` pointing at the related id.
    BelongsTo,
}

/// Named relation available to eager loading.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub related: Arc<ModelDef>,
    pub foreign_key: String,
}

/// Static description of a model-backed resource type.
#[derive(Debug, Clone)]
pub struct ModelDef {
    name: String,
    table: String,
    fillable: Vec<String>,
    select: Option<Vec<String>>,
    soft_deletes: bool,
    timestamps: bool,
    relations: Vec<Relation>,
}

impl ModelDef {
    /// Starts a definition with timestamps enabled and no soft deletes.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fillable: Vec::new(),
            select: None,
            soft_deletes: false,
            timestamps: true,
            relations: Vec::new(),
        }
    }

    /// Sets the mass-assignment allow-list.
    pub fn fillable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillable = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Narrows `format_model` output to the given fields.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Marks the resource as soft-delete capable.
    pub fn soft_deletes(mut self) -> Self {
        self.soft_deletes = true;
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Declares a one-to-many relation loaded through `related.foreign_key`.
    pub fn has_many(
        self,
        name: impl Into<String>,
        related: impl Into<Arc<ModelDef>>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relation(RelationKind::HasMany, name, related, foreign_key)
    }

    /// Declares an inverse relation loaded through `self.foreign_key`.
    pub fn belongs_to(
        self,
        name: impl Into<String>,
        related: impl Into<Arc<ModelDef>>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relation(RelationKind::BelongsTo, name, related, foreign_key)
    }

    fn relation(
        mut self,
        kind: RelationKind,
        name: impl Into<String>,
        related: impl Into<Arc<ModelDef>>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relations.push(Relation {
            name: name.into(),
            kind,
            related: related.into(),
            foreign_key: foreign_key.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fillable_fields(&self) -> &[String] {
        &self.fillable
    }

    pub fn selected_fields(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    pub fn has_soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Looks up a declared relation by name.
    pub fn relation_named(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Returns whether `field` may be mass-assigned.
    pub fn is_fillable(&self, field: &str) -> bool {
        self.fillable.iter().any(|candidate| candidate == field)
    }

    /// Returns the first field of `fields` that is not mass-assignable.
    pub fn first_guarded<'a>(&self, fields: impl IntoIterator<Item = &'a String>) -> Option<&'a str> {
        fields
            .into_iter()
            .find(|field| !self.is_fillable(field))
            .map(String::as_str)
    }

    /// Data columns the table must carry, excluding store-managed columns.
    ///
    /// Includes fillable and selected fields plus `belongs_to` foreign keys,
    /// deduplicated in declaration order. Selected relation names are output
    /// keys only and never required as columns.
    pub fn data_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        let selected = self
            .select
            .iter()
            .flatten()
            .filter(|field| self.relation_named(field).is_none());
        let foreign_keys = self
            .relations
            .iter()
            .filter(|relation| relation.kind == RelationKind::BelongsTo)
            .map(|relation| &relation.foreign_key);

        for column in self.fillable.iter().chain(selected).chain(foreign_keys) {
            let column = column.as_str();
            if MANAGED_COLUMNS.contains(&column) || columns.contains(&column) {
                continue;
            }
            columns.push(column);
        }
        columns
    }

    /// Store-managed columns present on this table.
    pub fn managed_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![ID_COLUMN];
        if self.timestamps {
            columns.push(CREATED_AT_COLUMN);
            columns.push(UPDATED_AT_COLUMN);
        }
        if self.soft_deletes {
            columns.push(DELETED_AT_COLUMN);
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelDef, RelationKind};

    #[test]
    fn data_columns_skip_managed_and_duplicate_fields() {
        let author = ModelDef::new("Author", "authors").fillable(["name"]);
        let def = ModelDef::new("Post", "posts")
            .fillable(["title", "author_id", "id"])
            .select(["id", "title", "summary"])
            .belongs_to("author", author, "author_id");

        assert_eq!(def.data_columns(), vec!["title", "author_id", "summary"]);
    }

    #[test]
    fn data_columns_skip_selected_relations() {
        let comment = ModelDef::new("Comment", "comments").fillable(["post_id"]);
        let author = ModelDef::new("Author", "authors");
        let def = ModelDef::new("Post", "posts")
            .fillable(["title"])
            .select(["id", "title", "comments", "author"])
            .has_many("comments", comment, "post_id")
            .belongs_to("author", author, "author_id");

        assert_eq!(def.data_columns(), vec!["title", "author_id"]);
    }

    #[test]
    fn managed_columns_follow_capabilities() {
        let plain = ModelDef::new("Plain", "plain").without_timestamps();
        assert_eq!(plain.managed_columns(), vec!["id"]);

        let soft = ModelDef::new("Soft", "soft").soft_deletes();
        assert_eq!(
            soft.managed_columns(),
            vec!["id", "created_at", "updated_at", "deleted_at"]
        );
    }

    #[test]
    fn relations_are_found_by_name() {
        let comment = ModelDef::new("Comment", "comments").fillable(["post_id"]);
        let def = ModelDef::new("Post", "posts").has_many("comments", comment, "post_id");

        let relation = def.relation_named("comments").unwrap();
        assert_eq!(relation.kind, RelationKind::HasMany);
        assert_eq!(relation.related.table(), "comments");
        assert!(def.relation_named("author").is_none());
    }

    #[test]
    fn first_guarded_reports_unknown_field() {
        let def = ModelDef::new("Post", "posts").fillable(["title"]);
        let fields = vec!["title".to_string(), "secret".to_string()];

        assert_eq!(def.first_guarded(&fields), Some("secret"));
        assert_eq!(def.first_guarded(&fields[..1]), None);
    }
}
