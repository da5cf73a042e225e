use super::*;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use tm_core::{Catalog, CoreError, Migration, ParsedMigration, Target};
use tokio_util::sync::CancellationToken;

/// Runs for far longer than any test waits; only an interrupt stops it.
const SLOW_QUERY: &str = "CREATE TABLE big AS SELECT sum(range) AS total FROM range(4000000000)";

fn memory_driver() -> DuckDbDriver {
    DuckDbDriver::open(":memory:", DEFAULT_VERSION_TABLE).unwrap()
}

fn open_file(path: &Path) -> DriverResult<DuckDbDriver> {
    DuckDbDriver::open(path.to_str().unwrap(), DEFAULT_VERSION_TABLE)
}

/// Check if a table exists, reading through the driver's own connection.
fn relation_exists(driver: &DuckDbDriver, name: &str) -> bool {
    let guard = driver.conn.lock().unwrap();
    let conn = guard.as_ref().unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            params![name],
            |row| row.get(0),
        )
        .unwrap();
    count > 0
}

fn query_count(driver: &DuckDbDriver, sql: &str) -> i64 {
    let guard = driver.conn.lock().unwrap();
    guard
        .as_ref()
        .unwrap()
        .query_row(&format!("SELECT COUNT(*) FROM ({sql})"), [], |row| row.get(0))
        .unwrap()
}

fn migration(id: &str, up: ParsedMigration, down: Option<ParsedMigration>) -> Migration {
    Migration::new(MigrationId::new(id), up, down)
}

fn three_statements(use_transaction: bool) -> ParsedMigration {
    ParsedMigration {
        statements: vec![
            "CREATE TABLE s1 (id INTEGER)".to_string(),
            "CREATE TABLE s2 (id INTEGER".to_string(),
            "CREATE TABLE s3 (id INTEGER)".to_string(),
        ],
        use_transaction,
    }
}

#[tokio::test]
async fn test_in_memory_creates_version_table() {
    let driver = memory_driver();
    assert_eq!(driver.name(), "duckdb");
    assert_eq!(driver.version_table(), "schema_migration");
    assert!(relation_exists(&driver, "schema_migration"));
    assert!(driver.versions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_open_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.duckdb");
    {
        let driver = open_file(&path).unwrap();
        let m = migration(
            "001_init",
            ParsedMigration::transactional(["CREATE TABLE t (id INTEGER)"]),
            None,
        );
        driver.migrate(&PlannedMigration::up(&m)).await.unwrap();
        driver.close().await.unwrap();
    }
    let driver = open_file(&path).unwrap();
    assert_eq!(driver.versions().await.unwrap(), vec!["001_init"]);
}

#[tokio::test]
async fn test_connection_error_for_unreachable_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("app.duckdb");
    let result = open_file(&path);
    assert!(matches!(result, Err(DriverError::ConnectionError(_))));
}

#[tokio::test]
async fn test_invalid_table_name_rejected() {
    let conn = Connection::open_in_memory().unwrap();
    let result = DuckDbDriver::from_connection(conn, "versions; DROP TABLE x");
    assert!(matches!(result, Err(DriverError::InvalidTableName(_))));
}

#[tokio::test]
async fn test_schema_qualified_version_table() {
    let config = DatabaseConfig::default();
    let driver = DuckDbDriver::from_config(&config, "meta.versions").unwrap();
    let m = migration("001_init", ParsedMigration::transactional(["SELECT 1"]), None);
    driver.migrate(&PlannedMigration::up(&m)).await.unwrap();
    assert_eq!(query_count(&driver, "SELECT * FROM meta.versions"), 1);
}

#[tokio::test]
async fn test_migrate_up_and_down() {
    let driver = memory_driver();

    let init = migration(
        "201610041422_init",
        ParsedMigration::non_transactional([
            "CREATE TABLE test_table1 (id integer not null primary key);\n\
             CREATE TABLE test_table2 (id integer not null primary key)",
        ]),
        None,
    );
    let drop_unused = migration(
        "201610041425_drop_unused_table",
        ParsedMigration::non_transactional(["DROP TABLE test_table2"]),
        Some(ParsedMigration::non_transactional([
            "CREATE TABLE test_table2 (id integer not null primary key)",
        ])),
    );
    let invalid = migration(
        "201610041426_invalid_sql",
        ParsedMigration::non_transactional(["CREATE TABLE test_table3 (some error"]),
        None,
    );

    driver.migrate(&PlannedMigration::up(&init)).await.unwrap();
    assert!(relation_exists(&driver, "test_table1"));
    assert!(relation_exists(&driver, "test_table2"));

    driver.migrate(&PlannedMigration::up(&drop_unused)).await.unwrap();
    assert!(!relation_exists(&driver, "test_table2"));

    let err = driver
        .migrate(&PlannedMigration::up(&invalid))
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::StatementExecutionError { .. }));
    assert_eq!(driver.versions().await.unwrap().len(), 2);

    driver.migrate(&PlannedMigration::down(&drop_unused)).await.unwrap();
    assert!(relation_exists(&driver, "test_table2"));
    assert_eq!(driver.versions().await.unwrap(), vec!["201610041422_init"]);
}

#[tokio::test]
async fn test_versions_are_descending() {
    let driver = memory_driver();
    for id in ["002_b", "003_c", "001_a"] {
        let m = migration(id, ParsedMigration::transactional(["SELECT 1"]), None);
        driver.migrate(&PlannedMigration::up(&m)).await.unwrap();
    }
    assert_eq!(
        driver.versions().await.unwrap(),
        vec!["003_c", "002_b", "001_a"]
    );
}

#[tokio::test]
async fn test_non_transactional_failure_keeps_earlier_statements() {
    let driver = memory_driver();
    let m = migration("001_partial", three_statements(false), None);

    let err = driver.migrate(&PlannedMigration::up(&m)).await.unwrap_err();

    match err {
        DriverError::StatementExecutionError { statement, .. } => {
            assert_eq!(statement, "CREATE TABLE s2 (id INTEGER")
        }
        other => panic!("expected StatementExecutionError, got {other:?}"),
    }
    assert!(relation_exists(&driver, "s1"));
    assert!(!relation_exists(&driver, "s3"));
    assert!(driver.versions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transactional_failure_rolls_back_everything() {
    let driver = memory_driver();
    let m = migration("001_atomic", three_statements(true), None);

    assert!(driver.migrate(&PlannedMigration::up(&m)).await.is_err());

    assert!(!relation_exists(&driver, "s1"));
    assert!(!relation_exists(&driver, "s2"));
    assert!(!relation_exists(&driver, "s3"));
    assert!(driver.versions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_version_record_failure_rolls_back_transaction() {
    let driver = memory_driver();
    let setup = migration(
        "000_setup",
        ParsedMigration::transactional(["CREATE TABLE log (n INTEGER)"]),
        None,
    );
    driver.migrate(&PlannedMigration::up(&setup)).await.unwrap();

    let insert = migration(
        "001_insert",
        ParsedMigration::transactional(["INSERT INTO log VALUES (1)"]),
        None,
    );
    driver.migrate(&PlannedMigration::up(&insert)).await.unwrap();

    // Recording the same version twice violates the primary key
    let err = driver.migrate(&PlannedMigration::up(&insert)).await.unwrap_err();
    assert!(matches!(err, DriverError::VersionRecordError { ref id, .. } if *id == "001_insert"));
    assert_eq!(query_count(&driver, "SELECT * FROM log"), 1);
}

#[tokio::test]
async fn test_version_record_failure_without_transaction_diverges() {
    let driver = memory_driver();
    let setup = migration(
        "000_setup",
        ParsedMigration::transactional(["CREATE TABLE log (n INTEGER)"]),
        None,
    );
    driver.migrate(&PlannedMigration::up(&setup)).await.unwrap();

    let insert = migration(
        "001_insert",
        ParsedMigration::non_transactional(["INSERT INTO log VALUES (1)"]),
        None,
    );
    driver.migrate(&PlannedMigration::up(&insert)).await.unwrap();
    let err = driver.migrate(&PlannedMigration::up(&insert)).await.unwrap_err();

    assert!(matches!(err, DriverError::VersionRecordError { .. }));
    assert_eq!(query_count(&driver, "SELECT * FROM log"), 2);
}

#[tokio::test]
async fn test_full_pipeline_round_trip() {
    let driver = memory_driver();
    let catalog = Catalog::new([
        migration(
            "001_users",
            ParsedMigration::transactional(["CREATE TABLE users (id INTEGER)"]),
            Some(ParsedMigration::transactional(["DROP TABLE users"])),
        ),
        migration(
            "002_posts",
            ParsedMigration::transactional(["CREATE TABLE posts (id INTEGER)"]),
            Some(ParsedMigration::transactional(["DROP TABLE posts"])),
        ),
    ])
    .unwrap();
    let cancel = CancellationToken::new();

    let applied = tm_core::migrate(&driver, &catalog, Target::ApplyPending, &cancel)
        .await
        .unwrap();
    assert_eq!(applied, 2);
    assert!(relation_exists(&driver, "posts"));

    let reverted = tm_core::migrate(&driver, &catalog, Target::Rollback(2), &cancel)
        .await
        .unwrap();
    assert_eq!(reverted, 2);
    assert!(!relation_exists(&driver, "users"));
    assert!(driver.versions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_drift_detected_against_real_store() {
    let driver = memory_driver();
    let stray = migration("009_stray", ParsedMigration::transactional(["SELECT 1"]), None);
    driver.migrate(&PlannedMigration::up(&stray)).await.unwrap();

    let catalog = Catalog::new([migration(
        "001_users",
        ParsedMigration::transactional(["CREATE TABLE users (id INTEGER)"]),
        None,
    )])
    .unwrap();

    let err = tm_core::migrate(&driver, &catalog, Target::ApplyPending, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownMigration { id } if id == "009_stray"));
    assert!(!relation_exists(&driver, "users"));
}

#[tokio::test]
async fn test_close_once() {
    let driver = memory_driver();
    driver.close().await.unwrap();
    assert!(matches!(driver.close().await, Err(DriverError::Closed("duckdb"))));

    let m = migration("001", ParsedMigration::transactional(["SELECT 1"]), None);
    assert!(matches!(
        driver.migrate(&PlannedMigration::up(&m)).await,
        Err(DriverError::Closed(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_interrupts_transactional_statement() {
    let driver = memory_driver();
    let catalog = Catalog::new([migration(
        "001_slow",
        ParsedMigration::transactional(["CREATE TABLE early (id INTEGER)", SLOW_QUERY]),
        None,
    )])
    .unwrap();
    let planned = tm_core::plan(&catalog, &[], Target::ApplyPending).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(30),
        tm_core::execute(&driver, &planned, &cancel),
    )
    .await
    .expect("cancellation did not stop the running statement");

    assert!(matches!(result, Err(CoreError::Cancelled { completed: 0 })));
    assert!(driver.versions().await.unwrap().is_empty());
    assert!(!relation_exists(&driver, "early"));
    assert!(!relation_exists(&driver, "big"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_call_keeps_committed_statements_without_transaction() {
    let driver = memory_driver();
    let m = migration(
        "001_slow",
        ParsedMigration::non_transactional(["CREATE TABLE early (id INTEGER)", SLOW_QUERY]),
        None,
    );

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        driver.migrate(&PlannedMigration::up(&m)),
    )
    .await;
    assert!(outcome.is_err(), "slow statement finished unexpectedly");

    assert!(driver.versions().await.unwrap().is_empty());
    assert!(relation_exists(&driver, "early"));
    assert!(!relation_exists(&driver, "big"));

    // The connection stays usable after an interrupt
    let next = migration("002_next", ParsedMigration::transactional(["SELECT 1"]), None);
    driver.migrate(&PlannedMigration::up(&next)).await.unwrap();
    assert_eq!(driver.versions().await.unwrap(), vec!["002_next"]);
}
