//! Dynamic record shape shared by every resource type.
//!
//! # Responsibility
//! - Hold one row's attributes plus eagerly loaded relations.
//! - Render records as plain JSON-compatible maps.
//!
//! # Invariants
//! - `exists == false` only for records built in memory and never persisted.
//! - `id` mirrors the `id` attribute for persisted records.

use crate::model::definition::{DELETED_AT_COLUMN, ID_COLUMN};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Primary key type for every model table.
pub type RecordId = i64;

/// Attribute map used for records, create/update params and formatted output.
pub type Fields = serde_json::Map<String, Value>;

/// Eagerly loaded relation payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    Many(Vec<Record>),
    One(Option<Box<Record>>),
}

impl Related {
    fn to_value(&self) -> Value {
        match self {
            Self::Many(records) => {
                Value::Array(records.iter().map(|record| Value::Object(record.to_map())).collect())
            }
            Self::One(Some(record)) => Value::Object(record.to_map()),
            Self::One(None) => Value::Null,
        }
    }
}

/// One model instance, persisted or not.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: Option<RecordId>,
    attributes: Fields,
    relations: BTreeMap<String, Related>,
    exists: bool,
}

impl Record {
    /// Builds an unsaved record from attributes.
    pub fn unsaved(attributes: Fields) -> Self {
        Self {
            id: None,
            attributes,
            relations: BTreeMap::new(),
            exists: false,
        }
    }

    /// Builds a persisted record from a loaded row.
    pub fn persisted(id: RecordId, attributes: Fields) -> Self {
        Self {
            id: Some(id),
            attributes,
            relations: BTreeMap::new(),
            exists: true,
        }
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    /// Whether this record was loaded from (or written to) storage.
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn attributes(&self) -> &Fields {
        &self.attributes
    }

    /// Returns one attribute, `None` when the attribute is not present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Returns one attribute as text when it holds a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Returns one attribute as integer when it holds one.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    /// Whether the tombstone column is set.
    pub fn is_trashed(&self) -> bool {
        matches!(self.get(DELETED_AT_COLUMN), Some(value) if !value.is_null())
    }

    pub fn related(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub(crate) fn set_related(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }

    /// Renders attributes and loaded relations as a plain map.
    pub fn to_map(&self) -> Fields {
        let mut map = self.attributes.clone();
        if let Some(id) = self.id {
            map.entry(ID_COLUMN.to_string())
                .or_insert_with(|| Value::from(id));
        }
        for (name, related) in &self.relations {
            map.insert(name.clone(), related.to_value());
        }
        map
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::{Fields, Record, Related};
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn unsaved_record_does_not_exist() {
        let record = Record::unsaved(fields(json!({"msg": "draft"})));
        assert!(!record.exists());
        assert_eq!(record.id(), None);
        assert_eq!(record.get_str("msg"), Some("draft"));
    }

    #[test]
    fn trashed_follows_deleted_at() {
        let active = Record::persisted(1, fields(json!({"id": 1, "deleted_at": null})));
        let trashed = Record::persisted(2, fields(json!({"id": 2, "deleted_at": 1700})));
        assert!(!active.is_trashed());
        assert!(trashed.is_trashed());
    }

    #[test]
    fn to_map_includes_loaded_relations() {
        let comment = Record::persisted(7, fields(json!({"id": 7, "body": "hi"})));
        let mut post = Record::persisted(1, fields(json!({"id": 1})));
        post.set_related("comments", Related::Many(vec![comment]));
        post.set_related("author", Related::One(None));

        let map = post.to_map();
        assert_eq!(map["comments"], json!([{"id": 7, "body": "hi"}]));
        assert_eq!(map["author"], Value::Null);
        assert_eq!(serde_json::to_value(&post).unwrap()["id"], json!(1));
    }
}
