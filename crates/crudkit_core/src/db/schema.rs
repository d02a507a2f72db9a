//! Table creation and introspection for model definitions.
//!
//! # Responsibility
//! - Create one table per `ModelDef` for fixtures and demo databases.
//! - Report existing table columns for store readiness checks.
//!
//! # Invariants
//! - Table and column names are validated before SQL interpolation.
//! - `create_tables` is atomic: either every table exists afterwards or none
//!   of the new ones do.

use super::{DbError, DbResult};
use crate::model::definition::{
    ModelDef, CREATED_AT_COLUMN, DELETED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN,
};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Rejects names that cannot be safely quoted as SQL identifiers.
pub fn validate_identifier(name: &str) -> DbResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Quotes a validated identifier.
pub fn quote_identifier(name: &str) -> DbResult<String> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Creates the table backing `def` when it does not exist yet.
pub fn create_table(conn: &mut Connection, def: &ModelDef) -> DbResult<()> {
    create_tables(conn, &[def])
}

/// Creates every table in one transaction.
pub fn create_tables(conn: &mut Connection, defs: &[&ModelDef]) -> DbResult<()> {
    let statements = defs
        .iter()
        .map(|def| create_table_sql(def))
        .collect::<DbResult<Vec<_>>>()?;

    let tx = conn.transaction()?;
    for sql in &statements {
        tx.execute_batch(sql)?;
    }
    tx.commit()?;

    for def in defs {
        info!(
            "event=schema_create module=db status=ok table={} soft_deletes={}",
            def.table(),
            def.has_soft_deletes()
        );
    }
    Ok(())
}

/// Lists the columns of `table`; empty when the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> DbResult<Vec<String>> {
    let sql = format!("PRAGMA table_info({});", quote_identifier(table)?);
    let mut stmt = conn.prepare(&sql)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Returns whether `table` exists in the main schema.
pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn create_table_sql(def: &ModelDef) -> DbResult<String> {
    let mut columns = vec![format!("{ID_COLUMN} INTEGER PRIMARY KEY AUTOINCREMENT")];
    for column in def.data_columns() {
        // Untyped columns keep whatever affinity the bound value carries.
        columns.push(quote_identifier(column)?);
    }
    if def.has_timestamps() {
        columns.push(format!("{CREATED_AT_COLUMN} INTEGER"));
        columns.push(format!("{UPDATED_AT_COLUMN} INTEGER"));
    }
    if def.has_soft_deletes() {
        columns.push(format!("{DELETED_AT_COLUMN} INTEGER NULL"));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        quote_identifier(def.table())?,
        columns.join(",\n    ")
    ))
}
