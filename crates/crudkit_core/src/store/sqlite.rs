//! SQLite-backed model store.
//!
//! # Responsibility
//! - Translate `Query` descriptions into parameterized SQL for one table.
//! - Map SQLite rows to dynamic `Record`s and eagerly load relations.
//!
//! # Invariants
//! - Values are always bound as parameters; only validated identifiers are
//!   interpolated.
//! - Filters and writes may only touch columns the table actually has.
//! - Related rows of soft-delete capable relations exclude tombstones.

use super::query::{Comparator, Query, TrashScope};
use super::ModelStore;
use crate::db::schema::{quote_identifier, table_columns, table_exists, validate_identifier};
use crate::model::definition::{
    ModelDef, Relation, RelationKind, CREATED_AT_COLUMN, DELETED_AT_COLUMN, ID_COLUMN,
    UPDATED_AT_COLUMN,
};
use crate::model::record::{Fields, Record, RecordId, Related};
use crate::repo::error::{RepoError, RepoResult};
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Row};
use serde_json::{Number, Value};
use std::collections::HashMap;

const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

/// Model store over one SQLite table.
#[derive(Debug)]
pub struct SqliteModelStore<'conn> {
    conn: &'conn Connection,
    def: ModelDef,
    columns: Vec<String>,
}

impl<'conn> SqliteModelStore<'conn> {
    /// Binds `def` to a connection whose table is ready.
    ///
    /// # Errors
    /// - `MissingRequiredTable` when the model or a related table is absent.
    /// - `MissingRequiredColumn` when a declared or managed column is absent.
    /// - `Db(InvalidIdentifier)` when a table or column name is not a plain identifier.
    pub fn try_new(conn: &'conn Connection, def: ModelDef) -> RepoResult<Self> {
        let columns = ensure_table_ready(conn, &def)?;

        for relation in def.relations() {
            let related_table = relation.related.table();
            validate_identifier(&relation.foreign_key)?;
            let related_columns = ensure_table_ready(conn, &relation.related)?;
            if relation.kind == RelationKind::HasMany
                && !related_columns.iter().any(|column| *column == relation.foreign_key)
            {
                return Err(RepoError::MissingRequiredColumn {
                    table: related_table.to_string(),
                    column: relation.foreign_key.clone(),
                });
            }
        }

        Ok(Self { conn, def, columns })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    fn table(&self) -> RepoResult<String> {
        Ok(quote_identifier(self.def.table())?)
    }

    fn column(&self, name: &str) -> RepoResult<String> {
        if !self.has_column(name) {
            return Err(RepoError::invalid_field(self.def.name(), name));
        }
        Ok(quote_identifier(name)?)
    }

    fn where_clause(&self, query: &Query) -> RepoResult<(String, Vec<SqlValue>)> {
        let mut sql = String::from(" WHERE 1 = 1");
        let mut binds = Vec::new();

        if query.matches_nothing() {
            sql.push_str(" AND 0 = 1");
        }

        if self.def.has_soft_deletes() {
            match query.trash_scope() {
                TrashScope::WithoutTrashed => {
                    sql.push_str(&format!(" AND {DELETED_AT_COLUMN} IS NULL"))
                }
                TrashScope::OnlyTrashed => {
                    sql.push_str(&format!(" AND {DELETED_AT_COLUMN} IS NOT NULL"))
                }
                TrashScope::WithTrashed => {}
            }
        }

        for filter in query.filters() {
            let column = self.column(&filter.field)?;
            match (filter.comparator, &filter.value) {
                (Comparator::Eq, Value::Null) => sql.push_str(&format!(" AND {column} IS NULL")),
                (Comparator::NotEq, Value::Null) => {
                    sql.push_str(&format!(" AND {column} IS NOT NULL"))
                }
                (comparator, value) => {
                    sql.push_str(&format!(" AND {column} {} ?", comparator.as_sql()));
                    binds.push(json_to_sql(value));
                }
            }
        }

        Ok((sql, binds))
    }

    fn order_clause(&self, query: &Query) -> RepoResult<String> {
        if query.ordering().is_empty() {
            return Ok(format!(" ORDER BY {ID_COLUMN} ASC"));
        }

        let parts = query
            .ordering()
            .iter()
            .map(|(field, direction)| -> RepoResult<String> {
                Ok(format!("{} {}", self.column(field)?, direction.as_sql()))
            })
            .collect::<RepoResult<Vec<_>>>()?;
        Ok(format!(" ORDER BY {}", parts.join(", ")))
    }

    fn resolve_relations<'a>(&'a self, names: &[String]) -> RepoResult<Vec<&'a Relation>> {
        names
            .iter()
            .map(|name| {
                self.def
                    .relation_named(name)
                    .ok_or_else(|| RepoError::UnknownRelation {
                        model: self.def.name().to_string(),
                        relation: name.clone(),
                    })
            })
            .collect()
    }

    fn eager_load(&self, records: &mut [Record], relations: &[&Relation]) -> RepoResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        for relation in relations {
            match relation.kind {
                RelationKind::HasMany => self.load_has_many(records, relation)?,
                RelationKind::BelongsTo => self.load_belongs_to(records, relation)?,
            }
        }
        Ok(())
    }

    fn load_has_many(&self, records: &mut [Record], relation: &Relation) -> RepoResult<()> {
        let parent_ids: Vec<RecordId> = records.iter().filter_map(Record::id).collect();
        let children = self.load_related(relation, &relation.foreign_key, &parent_ids)?;

        let mut grouped: HashMap<RecordId, Vec<Record>> = HashMap::new();
        for child in children {
            if let Some(parent_id) = child.get_i64(&relation.foreign_key) {
                grouped.entry(parent_id).or_default().push(child);
            }
        }

        for record in records.iter_mut() {
            let children = record
                .id()
                .and_then(|id| grouped.get(&id))
                .cloned()
                .unwrap_or_default();
            record.set_related(&relation.name, Related::Many(children));
        }
        Ok(())
    }

    fn load_belongs_to(&self, records: &mut [Record], relation: &Relation) -> RepoResult<()> {
        let mut keys: Vec<RecordId> = records
            .iter()
            .filter_map(|record| record.get_i64(&relation.foreign_key))
            .collect();
        keys.sort_unstable();
        keys.dedup();

        let owners: HashMap<RecordId, Record> = self
            .load_related(relation, ID_COLUMN, &keys)?
            .into_iter()
            .filter_map(|owner| owner.id().map(|id| (id, owner)))
            .collect();

        for record in records.iter_mut() {
            let owner = record
                .get_i64(&relation.foreign_key)
                .and_then(|key| owners.get(&key))
                .cloned()
                .map(Box::new);
            record.set_related(&relation.name, Related::One(owner));
        }
        Ok(())
    }

    fn load_related(
        &self,
        relation: &Relation,
        column: &str,
        keys: &[RecordId],
    ) -> RepoResult<Vec<Record>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let related = &relation.related;
        let placeholders = vec!["?"; keys.len()].join(", ");
        let mut sql = format!(
            "SELECT * FROM {} WHERE {} IN ({placeholders})",
            quote_identifier(related.table())?,
            quote_identifier(column)?
        );
        if related.has_soft_deletes() {
            sql.push_str(&format!(" AND {DELETED_AT_COLUMN} IS NULL"));
        }
        sql.push_str(&format!(" ORDER BY {ID_COLUMN} ASC"));

        let binds = keys.iter().map(|key| SqlValue::Integer(*key)).collect();
        load_rows(self.conn, &sql, binds)
    }
}

impl ModelStore for SqliteModelStore<'_> {
    fn definition(&self) -> &ModelDef {
        &self.def
    }

    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|candidate| candidate == column)
    }

    fn get(&self, query: &Query) -> RepoResult<Vec<Record>> {
        let relations = self.resolve_relations(query.relations())?;
        let (where_sql, mut binds) = self.where_clause(query)?;
        let mut sql = format!(
            "SELECT * FROM {}{where_sql}{}",
            self.table()?,
            self.order_clause(query)?
        );

        match query.limit() {
            Some(limit) => {
                sql.push_str(" LIMIT ?");
                binds.push(SqlValue::Integer(to_sql_int(limit)));
                if query.offset() > 0 {
                    sql.push_str(" OFFSET ?");
                    binds.push(SqlValue::Integer(to_sql_int(query.offset())));
                }
            }
            None if query.offset() > 0 => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                binds.push(SqlValue::Integer(to_sql_int(query.offset())));
            }
            None => {}
        }

        let mut records = load_rows(self.conn, &sql, binds)?;
        debug!(
            "event=store_query module=store status=ok table={} rows={} relations={}",
            self.def.table(),
            records.len(),
            relations.len()
        );

        self.eager_load(&mut records, &relations)?;
        Ok(records)
    }

    fn first(&self, query: &Query) -> RepoResult<Option<Record>> {
        let records = self.get(&query.clone().take(1))?;
        Ok(records.into_iter().next())
    }

    fn count(&self, query: &Query) -> RepoResult<u64> {
        let (where_sql, binds) = self.where_clause(&query.unwindowed())?;
        let sql = format!("SELECT COUNT(*) FROM {}{where_sql}", self.table()?);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }

    fn insert(&self, fields: &Fields) -> RepoResult<RecordId> {
        let mut columns = Vec::with_capacity(fields.len() + 2);
        let mut values = Vec::with_capacity(fields.len() + 2);
        let mut binds = Vec::with_capacity(fields.len());

        for (field, value) in fields {
            columns.push(self.column(field)?);
            values.push("?".to_string());
            binds.push(json_to_sql(value));
        }
        if self.def.has_timestamps() {
            for managed in [CREATED_AT_COLUMN, UPDATED_AT_COLUMN] {
                columns.push(managed.to_string());
                values.push(NOW_MS_SQL.to_string());
            }
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES;", self.table()?)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({});",
                self.table()?,
                columns.join(", "),
                values.join(", ")
            )
        };

        self.conn.execute(&sql, params_from_iter(binds))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, id: RecordId, fields: &Fields) -> RepoResult<bool> {
        let mut assignments = Vec::with_capacity(fields.len() + 1);
        let mut binds = Vec::with_capacity(fields.len() + 1);

        for (field, value) in fields {
            assignments.push(format!("{} = ?", self.column(field)?));
            binds.push(json_to_sql(value));
        }
        if self.def.has_timestamps() {
            assignments.push(format!("{UPDATED_AT_COLUMN} = {NOW_MS_SQL}"));
        }
        if assignments.is_empty() {
            assignments.push(format!("{ID_COLUMN} = {ID_COLUMN}"));
        }
        binds.push(SqlValue::Integer(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {ID_COLUMN} = ?;",
            self.table()?,
            assignments.join(", ")
        );
        let changed = self.conn.execute(&sql, params_from_iter(binds))?;
        Ok(changed > 0)
    }

    fn soft_delete(&self, id: RecordId) -> RepoResult<bool> {
        self.set_tombstone(id, true)
    }

    fn hard_delete(&self, id: RecordId) -> RepoResult<bool> {
        let sql = format!("DELETE FROM {} WHERE {ID_COLUMN} = ?1;", self.table()?);
        let changed = self.conn.execute(&sql, [id])?;
        Ok(changed > 0)
    }

    fn restore(&self, id: RecordId) -> RepoResult<bool> {
        self.set_tombstone(id, false)
    }
}

impl SqliteModelStore<'_> {
    fn set_tombstone(&self, id: RecordId, deleted: bool) -> RepoResult<bool> {
        if !self.def.has_soft_deletes() {
            return Err(RepoError::InvalidArgument(format!(
                "model [{}] does not support soft deletes",
                self.def.name()
            )));
        }

        let (value, guard) = if deleted {
            (NOW_MS_SQL, "IS NULL")
        } else {
            ("NULL", "IS NOT NULL")
        };
        let touch = if self.def.has_timestamps() {
            format!(", {UPDATED_AT_COLUMN} = {NOW_MS_SQL}")
        } else {
            String::new()
        };

        let sql = format!(
            "UPDATE {} SET {DELETED_AT_COLUMN} = {value}{touch}
             WHERE {ID_COLUMN} = ?1 AND {DELETED_AT_COLUMN} {guard};",
            self.table()?
        );
        let changed = self.conn.execute(&sql, [id])?;
        Ok(changed > 0)
    }
}

fn ensure_table_ready(conn: &Connection, def: &ModelDef) -> RepoResult<Vec<String>> {
    validate_identifier(def.table())?;
    if !table_exists(conn, def.table())? {
        return Err(RepoError::MissingRequiredTable(def.table().to_string()));
    }

    let columns = table_columns(conn, def.table())?;
    let mut required: Vec<&str> = def.managed_columns();
    required.extend(def.data_columns());

    for column in required {
        if !columns.iter().any(|existing| existing == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: def.table().to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(columns)
}

fn load_rows(conn: &Connection, sql: &str, binds: Vec<SqlValue>) -> RepoResult<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let column_names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_row(row, &column_names)?);
    }
    Ok(records)
}

fn parse_row(row: &Row<'_>, column_names: &[String]) -> RepoResult<Record> {
    let mut attributes = Fields::new();
    for (index, name) in column_names.iter().enumerate() {
        let value: SqlValue = row.get(index)?;
        attributes.insert(name.clone(), sql_to_json(value));
    }

    let id = attributes
        .get(ID_COLUMN)
        .and_then(Value::as_i64)
        .ok_or_else(|| RepoError::InvalidData(format!("row without integer `{ID_COLUMN}`")))?;
    Ok(Record::persisted(id, attributes))
}

fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(number) => Value::from(number),
        SqlValue::Real(number) => Number::from_f64(number).map_or(Value::Null, Value::Number),
        SqlValue::Text(text) => Value::String(text),
        SqlValue::Blob(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
    }
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                SqlValue::Integer(integer)
            } else {
                SqlValue::Real(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
