//! Storage-agnostic query description.
//!
//! A `Query` is built by repositories and callers and executed by a
//! `ModelStore`. It never carries SQL text.

use crate::model::definition::ID_COLUMN;
use crate::model::record::RecordId;
use crate::repo::error::RepoError;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Visibility of tombstoned rows. Ignored for types without soft deletes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrashScope {
    #[default]
    WithoutTrashed,
    WithTrashed,
    OnlyTrashed,
}

/// Field comparison operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Comparator {
    #[default]
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
}

impl Comparator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

impl FromStr for Comparator {
    type Err = RepoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "like" => Ok(Self::Like),
            "not like" => Ok(Self::NotLike),
            _ => Err(RepoError::InvalidArgument(format!(
                "unsupported comparator `{}`",
                value.trim()
            ))),
        }
    }
}

impl Display for Comparator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One `field comparator value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub comparator: Comparator,
    pub value: Value,
}

/// Filtered, ordered and optionally windowed query over one model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    scope: TrashScope,
    filters: Vec<Filter>,
    relations: Vec<String>,
    order: Vec<(String, Direction)>,
    offset: u64,
    limit: Option<u64>,
    matches_nothing: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// A query that never returns rows.
    pub fn none() -> Self {
        Self {
            matches_nothing: true,
            ..Self::default()
        }
    }

    pub fn scope(mut self, scope: TrashScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_trashed(self) -> Self {
        self.scope(TrashScope::WithTrashed)
    }

    pub fn only_trashed(self) -> Self {
        self.scope(TrashScope::OnlyTrashed)
    }

    pub fn filter(
        mut self,
        field: impl Into<String>,
        comparator: Comparator,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            comparator,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, Comparator::Eq, value)
    }

    pub fn where_id(self, id: RecordId) -> Self {
        self.where_eq(ID_COLUMN, id)
    }

    /// Adds relations to eager load.
    pub fn with<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.extend(relations.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.push((field.into(), direction));
        self
    }

    pub fn skip(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn take(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn trash_scope(&self) -> TrashScope {
        self.scope
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    pub fn ordering(&self) -> &[(String, Direction)] {
        &self.order
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn matches_nothing(&self) -> bool {
        self.matches_nothing
    }

    /// Same conditions without ordering or windowing, used for counting.
    pub fn unwindowed(&self) -> Self {
        Self {
            order: Vec::new(),
            offset: 0,
            limit: None,
            relations: Vec::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Comparator, Query, TrashScope};
    use crate::repo::error::RepoError;
    use serde_json::json;

    #[test]
    fn parses_supported_comparators() {
        assert_eq!("=".parse::<Comparator>().unwrap(), Comparator::Eq);
        assert_eq!("<>".parse::<Comparator>().unwrap(), Comparator::NotEq);
        assert_eq!(">=".parse::<Comparator>().unwrap(), Comparator::Gte);
        assert_eq!(" NOT LIKE ".parse::<Comparator>().unwrap(), Comparator::NotLike);
    }

    #[test]
    fn rejects_unknown_comparator() {
        let err = "~=".parse::<Comparator>().unwrap_err();
        assert!(matches!(err, RepoError::InvalidArgument(message) if message.contains("~=")));
    }

    #[test]
    fn builder_accumulates_conditions() {
        let query = Query::new()
            .only_trashed()
            .where_eq("msg", "hello")
            .with(["comments"])
            .skip(3)
            .take(3);

        assert_eq!(query.trash_scope(), TrashScope::OnlyTrashed);
        assert_eq!(query.filters()[0].value, json!("hello"));
        assert_eq!(query.relations(), ["comments".to_string()]);
        assert_eq!(query.offset(), 3);
        assert_eq!(query.limit(), Some(3));

        let counted = query.unwindowed();
        assert_eq!(counted.offset(), 0);
        assert_eq!(counted.limit(), None);
        assert_eq!(counted.trash_scope(), TrashScope::OnlyTrashed);
        assert_eq!(counted.filters().len(), 1);
    }

    #[test]
    fn none_matches_nothing() {
        assert!(Query::none().matches_nothing());
        assert!(!Query::new().matches_nothing());
    }
}
