//! Repository error taxonomy.
//!
//! # Invariants
//! - Errors surface to the immediate caller unmodified; nothing is retried.
//! - `AccessDenied` keeps the checked arguments so callers can log or re-raise
//!   with detail.

use crate::db::DbError;
use crate::model::record::RecordId;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Operation guarded by an access policy hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Show,
    Create,
    Update,
    Delete,
    Restore,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Restore => "restore",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when an access policy hook returns `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessDenied {
    model: String,
    operation: Operation,
    arguments: Vec<Value>,
}

impl AccessDenied {
    /// Status code reported to transport layers.
    pub const CODE: u16 = 403;

    pub fn new(model: impl Into<String>, operation: Operation, arguments: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            operation,
            arguments,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Arguments of the denied call: the record and/or params that were checked.
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn count_arguments(&self) -> usize {
        self.arguments.len()
    }

    pub fn code(&self) -> u16 {
        Self::CODE
    }
}

impl Display for AccessDenied {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Access denied: {} on model [{}]",
            self.operation, self.model
        )
    }
}

impl Error for AccessDenied {}

/// Generic repository error for model persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    NotFound {
        model: String,
        id: Option<RecordId>,
    },
    AccessDenied(AccessDenied),
    InvalidField {
        model: String,
        field: String,
    },
    InvalidArgument(String),
    UnknownRelation {
        model: String,
        relation: String,
    },
    MissingRequiredTable(String),
    MissingRequiredColumn {
        table: String,
        column: String,
    },
    InvalidData(String),
    Db(DbError),
}

impl RepoError {
    pub(crate) fn not_found(model: &str, id: Option<RecordId>) -> Self {
        Self::NotFound {
            model: model.to_string(),
            id,
        }
    }

    pub(crate) fn invalid_field(model: &str, field: &str) -> Self {
        Self::InvalidField {
            model: model.to_string(),
            field: field.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { model, id: Some(id) } => {
                write!(f, "No query results for model [{model}] {id}")
            }
            Self::NotFound { model, id: None } => {
                write!(f, "No query results for model [{model}]")
            }
            Self::AccessDenied(err) => write!(f, "{err}"),
            Self::InvalidField { model, field } => {
                write!(f, "field `{field}` is not assignable on model [{model}]")
            }
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::UnknownRelation { model, relation } => {
                write!(f, "call to undefined relationship [{relation}] on model [{model}]")
            }
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` does not exist")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` does not exist")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AccessDenied(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccessDenied> for RepoError {
    fn from(value: AccessDenied) -> Self {
        Self::AccessDenied(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessDenied, Operation, RepoError};
    use serde_json::json;

    #[test]
    fn not_found_message_names_the_model() {
        let err = RepoError::not_found("TestModel", Some(3));
        assert!(err
            .to_string()
            .contains("No query results for model [TestModel]"));
        assert!(err.is_not_found());
    }

    #[test]
    fn access_denied_exposes_arguments_and_code() {
        let denied = AccessDenied::new(
            "TestModel",
            Operation::Update,
            vec![json!({"id": 1}), json!({"msg": "x"})],
        );
        assert_eq!(denied.count_arguments(), 2);
        assert_eq!(denied.arguments()[1], json!({"msg": "x"}));
        assert_eq!(denied.code(), 403);
        assert_eq!(denied.to_string(), "Access denied: update on model [TestModel]");

        let err = RepoError::from(denied);
        assert!(err.is_access_denied());
    }
}
