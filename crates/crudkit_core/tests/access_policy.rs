use crudkit_core::db::open_db_in_memory;
use crudkit_core::db::schema::create_tables;
use crudkit_core::{
    AccessPolicy, CrudRepository, Fields, FindBy, ModelDef, ModelRepository, ModelStore,
    Operation, Query, Record, RepoError, SqliteModelStore,
};
use rusqlite::Connection;
use serde_json::{json, Value};

fn notes() -> ModelDef {
    ModelDef::new("Note", "notes").fillable(["msg"])
}

fn soft_notes() -> ModelDef {
    ModelDef::new("SoftNote", "soft_notes")
        .fillable(["msg"])
        .soft_deletes()
}

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object fixture, got {other}"),
    }
}

/// `notes`: ids 1 ("public"), 2 ("secret"); `soft_notes`: id 1 active, id 2 trashed.
fn seeded_connection() -> Connection {
    let mut conn = open_db_in_memory().unwrap();
    create_tables(&mut conn, &[&notes(), &soft_notes()]).unwrap();
    {
        let store = SqliteModelStore::try_new(&conn, notes()).unwrap();
        store.insert(&fields(json!({"msg": "public"}))).unwrap();
        store.insert(&fields(json!({"msg": "secret"}))).unwrap();

        let soft = SqliteModelStore::try_new(&conn, soft_notes()).unwrap();
        soft.insert(&fields(json!({"msg": "kept"}))).unwrap();
        let trashed = soft.insert(&fields(json!({"msg": "binned"}))).unwrap();
        soft.soft_delete(trashed).unwrap();
    }
    conn
}

struct DenyAll;

impl AccessPolicy for DenyAll {
    fn can_show(&self, _record: &Record) -> bool {
        false
    }

    fn can_create(&self, _params: &Fields) -> bool {
        false
    }

    fn can_update(&self, _record: &Record, _params: &Fields) -> bool {
        false
    }

    fn can_delete(&self, _record: &Record) -> bool {
        false
    }

    fn can_restore(&self, _record: &Record) -> bool {
        false
    }
}

/// Hides records whose `msg` is "secret"; everything else keeps the defaults.
struct HideSecrets;

impl AccessPolicy for HideSecrets {
    fn can_show(&self, record: &Record) -> bool {
        record.get_str("msg") != Some("secret")
    }
}

fn denied(err: RepoError, operation: Operation) -> crudkit_core::AccessDenied {
    match err {
        RepoError::AccessDenied(denied) => {
            assert_eq!(denied.operation(), operation);
            assert_eq!(denied.code(), 403);
            denied
        }
        other => panic!("expected access denied, got {other}"),
    }
}

#[test]
fn denied_create_carries_params_and_writes_nothing() {
    let conn = seeded_connection();
    let repo =
        ModelRepository::with_policy(SqliteModelStore::try_new(&conn, notes()).unwrap(), DenyAll);

    let params = fields(json!({"msg": "blocked"}));
    let err = repo.create(&params).unwrap_err();

    let denied = denied(err, Operation::Create);
    assert_eq!(denied.count_arguments(), 1);
    assert_eq!(denied.arguments()[0], json!({"msg": "blocked"}));
    assert_eq!(repo.store().count(&Query::new()).unwrap(), 2);
}

#[test]
fn denied_create_wins_over_invalid_fields() {
    let conn = seeded_connection();
    let repo =
        ModelRepository::with_policy(SqliteModelStore::try_new(&conn, notes()).unwrap(), DenyAll);

    let err = repo.create(&fields(json!({"dontExist": 1}))).unwrap_err();
    assert!(err.is_access_denied());
}

#[test]
fn denied_show_carries_record() {
    let conn = seeded_connection();
    let repo =
        ModelRepository::with_policy(SqliteModelStore::try_new(&conn, notes()).unwrap(), DenyAll);

    let denied = denied(repo.find(1, &[]).unwrap_err(), Operation::Show);
    assert_eq!(denied.count_arguments(), 1);
    assert_eq!(denied.arguments()[0]["id"], json!(1));
    assert_eq!(denied.arguments()[0]["msg"], json!("public"));

    let err = repo.find_by(&FindBy::new("msg", "public")).unwrap_err();
    assert!(err.is_access_denied());
}

#[test]
fn lenient_miss_does_not_consult_show_hook() {
    let conn = seeded_connection();
    let repo =
        ModelRepository::with_policy(SqliteModelStore::try_new(&conn, notes()).unwrap(), DenyAll);

    let missing = repo
        .find_by(&FindBy::new("msg", "nobody").lenient())
        .unwrap();
    assert!(missing.is_none());
    assert!(repo.find(99, &[]).unwrap_err().is_not_found());
}

#[test]
fn denied_update_carries_record_and_params_and_keeps_row() {
    let conn = seeded_connection();
    let repo =
        ModelRepository::with_policy(SqliteModelStore::try_new(&conn, notes()).unwrap(), DenyAll);

    let err = repo.update(1, &fields(json!({"msg": "changed"}))).unwrap_err();
    let denied = denied(err, Operation::Update);
    assert_eq!(denied.count_arguments(), 2);
    assert_eq!(denied.arguments()[0]["msg"], json!("public"));
    assert_eq!(denied.arguments()[1], json!({"msg": "changed"}));

    let stored = repo.store().by_id(1, Default::default(), &[]).unwrap().unwrap();
    assert_eq!(stored.get_str("msg"), Some("public"));
}

#[test]
fn denied_delete_and_force_delete_keep_rows() {
    let conn = seeded_connection();
    let repo = ModelRepository::with_policy(
        SqliteModelStore::try_new(&conn, soft_notes()).unwrap(),
        DenyAll,
    );

    denied(repo.delete(1).unwrap_err(), Operation::Delete);
    denied(repo.force_delete(2).unwrap_err(), Operation::Delete);

    assert_eq!(repo.store().count(&Query::new()).unwrap(), 1);
    assert_eq!(repo.store().count(&Query::new().only_trashed()).unwrap(), 1);
}

#[test]
fn denied_restore_keeps_tombstone() {
    let conn = seeded_connection();
    let repo = ModelRepository::with_policy(
        SqliteModelStore::try_new(&conn, soft_notes()).unwrap(),
        DenyAll,
    );

    let denied = denied(repo.restore(2).unwrap_err(), Operation::Restore);
    assert_eq!(denied.arguments()[0]["msg"], json!("binned"));
    assert_eq!(repo.store().count(&Query::new().only_trashed()).unwrap(), 1);
}

#[test]
fn restore_without_soft_deletes_skips_hook() {
    let conn = seeded_connection();
    let repo =
        ModelRepository::with_policy(SqliteModelStore::try_new(&conn, notes()).unwrap(), DenyAll);

    assert!(!repo.restore(1).unwrap());
}

#[test]
fn selective_policy_only_blocks_matching_records() {
    let conn = seeded_connection();
    let policy = HideSecrets;
    let repo =
        ModelRepository::with_policy(SqliteModelStore::try_new(&conn, notes()).unwrap(), &policy);

    assert_eq!(repo.find(1, &[]).unwrap().get_str("msg"), Some("public"));
    assert!(repo.find(2, &[]).unwrap_err().is_access_denied());
    assert!(repo
        .find_by(&FindBy::new("msg", "secret").lenient())
        .unwrap_err()
        .is_access_denied());

    let created = repo.create(&fields(json!({"msg": "fresh"}))).unwrap();
    assert_eq!(created.id(), Some(3));
    assert!(repo.delete(2).unwrap());
}
