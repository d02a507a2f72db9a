//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise the repository layer end to end against a real SQLite file.
//! - Print page envelopes as JSON so output can be diffed between runs.
//!
//! Usage: `crudkit_cli [DB_PATH]`. Without a path an in-memory database is used.
//! `CRUDKIT_LOG_DIR` enables file logging, `CRUDKIT_LOG_LEVEL` overrides the level.

use crudkit_core::db::schema::create_table;
use crudkit_core::db::{open_db, open_db_in_memory};
use crudkit_core::{
    core_version, default_log_level, init_logging, CrudRepository, Fields, LoggingConfig,
    ModelDef, ModelRepository, PageRequest, RepoError, SqliteModelStore,
};
use log::{error, info};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "CRUDKIT_LOG_DIR";
const LOG_LEVEL_ENV: &str = "CRUDKIT_LOG_LEVEL";

fn main() -> ExitCode {
    if let Err(message) = setup_logging() {
        eprintln!("logging disabled: {message}");
    }

    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("crudkit_cli failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() -> Result<(), String> {
    let Some(log_dir) = std::env::var_os(LOG_DIR_ENV) else {
        return Ok(());
    };
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
    init_logging(&LoggingConfig::new(level, log_dir))
}

fn run(db_path: Option<String>) -> Result<(), RepoError> {
    println!("crudkit_core version={}", core_version());

    let mut conn = match db_path.as_deref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    info!(
        "event=cli_run module=cli status=start storage={}",
        if db_path.is_some() { "file" } else { "memory" }
    );

    let def = task_model();
    create_table(&mut conn, &def)?;
    demo(&conn, def)
}

fn task_model() -> ModelDef {
    ModelDef::new("Task", "demo_tasks")
        .fillable(["title", "done"])
        .soft_deletes()
}

fn demo(conn: &Connection, def: ModelDef) -> Result<(), RepoError> {
    let repo = ModelRepository::new(SqliteModelStore::try_new(conn, def)?);

    let mut created = Vec::new();
    for title in ["write docs", "review patch", "ship release"] {
        let record = repo.create(&task(title))?;
        if let Some(id) = record.id() {
            created.push(id);
        }
    }

    if let Some(&first) = created.first() {
        repo.delete(first)?;
        print_json("after_delete", &repo.pagination(PageRequest::default())?)?;
        print_json(
            "trashed",
            &repo.pagination_only_trashed(PageRequest::default())?,
        )?;

        repo.restore(first)?;
        print_json(
            "after_restore",
            &repo.pagination_with_trashed(PageRequest::new(0, 2))?,
        )?;
    }

    Ok(())
}

fn task(title: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("title".to_string(), json!(title));
    fields.insert("done".to_string(), json!(false));
    fields
}

fn print_json(label: &str, value: &impl serde::Serialize) -> Result<(), RepoError> {
    let rendered: Value = serde_json::to_value(value).map_err(|err| {
        RepoError::InvalidData(format!("failed to render {label} as JSON: {err}"))
    })?;
    println!("{label}={rendered}");
    Ok(())
}
