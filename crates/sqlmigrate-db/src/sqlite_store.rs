use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Batch, Connection, params_from_iter};
use sqlmigrate_common::{Error, Result};
use tracing::{debug, info};

use crate::store::{ResultSet, Row, Statement, StatementOutcome, Store, StoreError, Value};

/// [`Store`] backed by a single SQLite connection.
///
/// Atomic batches run inside one transaction, so statements in them must
/// not issue `BEGIN`, `COMMIT` or `ROLLBACK` themselves. A nested `BEGIN`
/// fails and rolls the batch back; a statement that ends the transaction
/// early is reported as failed and nothing after it runs.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening migration store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection the caller already configured.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn connection(&self) -> std::result::Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::new("migration store lock poisoned"))
    }
}

impl Store for SqliteStore {
    fn execute(
        &self,
        statements: &[Statement],
        atomic: bool,
    ) -> std::result::Result<Vec<StatementOutcome>, StoreError> {
        let conn = self.connection()?;

        if !atomic {
            return Ok(statements
                .iter()
                .map(|statement| match run_statement(&conn, statement) {
                    Ok(rs) => StatementOutcome::Rows(rs),
                    Err(e) => StatementOutcome::Failed(e.into()),
                })
                .collect());
        }

        let tx = conn.unchecked_transaction()?;
        let mut outcomes = Vec::with_capacity(statements.len());
        for statement in statements {
            match run_statement(&tx, statement) {
                Ok(_) if tx.is_autocommit() => {
                    debug!("statement ended the atomic batch's transaction");
                    outcomes.push(StatementOutcome::Failed(StoreError::new(
                        "statement ended the enclosing transaction; \
                         transaction control is not allowed in an atomic batch",
                    )));
                    return Ok(outcomes);
                }
                Ok(rs) => outcomes.push(StatementOutcome::Rows(rs)),
                Err(e) => {
                    debug!("rolling back atomic batch: {e}");
                    outcomes.push(StatementOutcome::Failed(e.into()));
                    tx.rollback()?;
                    return Ok(outcomes);
                }
            }
        }
        tx.commit()?;
        Ok(outcomes)
    }

    fn supports_transactions(&self) -> bool {
        true
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::new(e.to_string())
    }
}

/// Run every statement in `statement.sql`, binding the same arguments to
/// each. The rows of the last row-producing statement are returned; blank
/// SQL runs nothing and yields an empty result set.
fn run_statement(conn: &Connection, statement: &Statement) -> rusqlite::Result<ResultSet> {
    let args: Vec<SqlValue> = statement.args.iter().map(to_sql_value).collect();
    let mut result = ResultSet::default();
    let mut batch = Batch::new(conn, &statement.sql);

    while let Some(mut stmt) = batch.next()? {
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut collected = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), from_value_ref(row.get_ref(idx)?));
            }
            collected.push(record);
        }
        if !columns.is_empty() {
            result.rows = collected;
        }
        result.rows_affected = conn.changes() as usize;
    }

    Ok(result)
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}
