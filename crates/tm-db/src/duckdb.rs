//! DuckDB migration driver implementation

use async_trait::async_trait;
use duckdb::{params, Connection, InterruptHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tm_core::driver::is_valid_table_name;
use tm_core::{
    DatabaseConfig, DbType, Direction, Driver, DriverError, DriverResult, MigrationId,
    PlannedMigration,
};

/// Default name of the version-tracking table
pub const DEFAULT_VERSION_TABLE: &str = "schema_migration";

type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// DuckDB driver
///
/// Every call runs on the blocking thread pool. Dropping a pending future
/// interrupts the statement in flight; an open transaction then rolls back.
pub struct DuckDbDriver {
    conn: SharedConnection,
    table: String,
}

impl DuckDbDriver {
    /// Open the database described by `config`, tracking versions in `table`.
    pub fn from_config(config: &DatabaseConfig, table: &str) -> DriverResult<Self> {
        match config.db_type {
            DbType::DuckDb => Self::open(&config.path, table),
        }
    }

    /// Open a database file, or an in-memory database for `:memory:`
    pub fn open(path: &str, table: &str) -> DriverResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| DriverError::ConnectionError(format!("{}: {}", e, path)))?;
        Self::from_connection(conn, table)
    }

    /// Wrap an existing connection: ping it and create the version table.
    pub fn from_connection(conn: Connection, table: &str) -> DriverResult<Self> {
        if !is_valid_table_name(table) {
            return Err(DriverError::InvalidTableName(table.to_string()));
        }
        conn.execute_batch("SELECT 1")
            .map_err(|e| DriverError::ConnectionError(format!("ping failed: {e}")))?;
        ensure_version_table(&conn, table)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            table: table.to_string(),
        })
    }

    /// Name of the version-tracking table
    pub fn version_table(&self) -> &str {
        &self.table
    }

    /// Run `work` against the connection slot on the blocking pool.
    ///
    /// If the returned future is dropped before `work` finishes, the running
    /// statement is interrupted and `work` sees the cancelled flag set.
    async fn run_blocking<T, F>(&self, work: F) -> DriverResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Option<Connection>, &AtomicBool) -> DriverResult<T> + Send + 'static,
    {
        let handle = {
            let guard = self.conn.lock()?;
            guard
                .as_ref()
                .ok_or(DriverError::Closed("duckdb"))?
                .interrupt_handle()
        };
        let mut interrupt = InterruptOnDrop::new(handle);
        let cancelled = Arc::clone(&interrupt.cancelled);
        let conn = Arc::clone(&self.conn);

        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock()?;
            work(&mut guard, &cancelled)
        })
        .await;
        interrupt.disarm();
        joined.map_err(|e| DriverError::Interrupted(format!("driver task failed: {e}")))?
    }
}

/// Interrupts the connection when dropped while armed.
struct InterruptOnDrop {
    handle: Arc<InterruptHandle>,
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl InterruptOnDrop {
    fn new(handle: Arc<InterruptHandle>) -> Self {
        Self {
            handle,
            cancelled: Arc::new(AtomicBool::new(false)),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.store(true, Ordering::SeqCst);
            self.handle.interrupt();
        }
    }
}

/// Owned copy of one planned migration, movable onto the blocking pool.
struct MigrationJob {
    label: String,
    id: MigrationId,
    statements: Vec<String>,
    use_transaction: bool,
    record_sql: String,
}

impl MigrationJob {
    fn new(planned: &PlannedMigration<'_>, table: &str) -> DriverResult<Self> {
        let group = planned.statements()?;
        let record_sql = match planned.direction {
            Direction::Up => format!("INSERT INTO {table} (version) VALUES (?)"),
            Direction::Down => format!("DELETE FROM {table} WHERE version = ?"),
        };
        Ok(Self {
            label: planned.to_string(),
            id: planned.id().clone(),
            statements: group.statements.clone(),
            use_transaction: group.use_transaction,
            record_sql,
        })
    }

    fn run(self, conn: &mut Connection, cancelled: &AtomicBool) -> DriverResult<()> {
        if self.use_transaction {
            let tx = conn
                .transaction()
                .map_err(|e| DriverError::TransactionError(format!("BEGIN failed: {e}")))?;
            // Any early return drops `tx`, which rolls back
            self.run_statements(&tx, cancelled)?;
            self.record_version(&tx, cancelled)?;
            check_cancelled(cancelled, "before COMMIT")?;
            tx.commit()
                .map_err(|e| DriverError::TransactionError(format!("COMMIT failed: {e}")))?;
        } else {
            self.run_statements(conn, cancelled)?;
            self.record_version(conn, cancelled)?;
        }
        Ok(())
    }

    fn run_statements(&self, conn: &Connection, cancelled: &AtomicBool) -> DriverResult<()> {
        for statement in &self.statements {
            check_cancelled(cancelled, &self.label)?;
            log::debug!("[duckdb] {}: {}", self.label, statement);
            conn.execute_batch(statement)
                .map_err(|e| DriverError::StatementExecutionError {
                    statement: statement.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    fn record_version(&self, conn: &Connection, cancelled: &AtomicBool) -> DriverResult<()> {
        check_cancelled(cancelled, &self.label)?;
        conn.execute(&self.record_sql, params![self.id.as_str()])
            .map(|_| ())
            .map_err(|e| DriverError::VersionRecordError {
                id: self.id.clone(),
                source: Box::new(e),
            })
    }
}

fn check_cancelled(cancelled: &AtomicBool, at: &str) -> DriverResult<()> {
    if cancelled.load(Ordering::SeqCst) {
        return Err(DriverError::Interrupted(at.to_string()));
    }
    Ok(())
}

fn open_slot(slot: &mut Option<Connection>) -> DriverResult<&mut Connection> {
    slot.as_mut().ok_or(DriverError::Closed("duckdb"))
}

/// Create the version table (and its schema, if qualified). Idempotent.
fn ensure_version_table(conn: &Connection, table: &str) -> DriverResult<()> {
    let mut sql = String::new();
    if let Some((schema, _)) = table.rsplit_once('.') {
        sql.push_str(&format!("CREATE SCHEMA IF NOT EXISTS {schema};\n"));
    }
    sql.push_str(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (version VARCHAR(255) NOT NULL PRIMARY KEY);"
    ));
    conn.execute_batch(&sql).map_err(|e| {
        DriverError::ConnectionError(format!("failed to create version table {table}: {e}"))
    })
}

fn read_versions(conn: &Connection, table: &str) -> DriverResult<Vec<MigrationId>> {
    let query_err = |e: duckdb::Error| DriverError::VersionQueryError(e.to_string());

    let mut stmt = conn
        .prepare(&format!("SELECT version FROM {table} ORDER BY version DESC"))
        .map_err(query_err)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(query_err)?;

    let mut versions = Vec::new();
    for row in rows {
        let raw = row.map_err(query_err)?;
        let id = MigrationId::try_new(raw).ok_or_else(|| {
            DriverError::VersionQueryError(format!("blank version in {table}"))
        })?;
        versions.push(id);
    }
    Ok(versions)
}

#[async_trait]
impl Driver for DuckDbDriver {
    async fn migrate(&self, planned: &PlannedMigration<'_>) -> DriverResult<()> {
        let job = MigrationJob::new(planned, &self.table)?;
        self.run_blocking(move |slot, cancelled| job.run(open_slot(slot)?, cancelled))
            .await
    }

    async fn versions(&self) -> DriverResult<Vec<MigrationId>> {
        let table = self.table.clone();
        self.run_blocking(move |slot, _| read_versions(open_slot(slot)?, &table))
            .await
    }

    async fn close(&self) -> DriverResult<()> {
        self.run_blocking(|slot, _| {
            let conn = slot.take().ok_or(DriverError::Closed("duckdb"))?;
            conn.close()
                .map_err(|(_, e)| DriverError::ConnectionError(format!("close failed: {e}")))
        })
        .await
    }

    fn name(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
