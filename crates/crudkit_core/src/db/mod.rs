//! SQLite connection bootstrap and schema helpers.
//!
//! # Responsibility
//! - Open and configure SQLite connections used by model stores.
//! - Create tables for model definitions in test and demo harnesses.
//!
//! # Invariants
//! - Every identifier interpolated into SQL passes `validate_identifier`.
//! - Schema helpers never drop or alter existing tables.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod schema;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    InvalidIdentifier(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidIdentifier(name) => {
                write!(f, "`{name}` is not a valid SQL identifier")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidIdentifier(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
