use std::collections::HashSet;

use sqlmigrate_common::{Error, Result};
use sqlmigrate_config::{IdentifierValidator, ResolvedOptions};
use tracing::{debug, error};

use crate::store::{Statement, Store, Value};

/// Bookkeeping table of applied migration names.
///
/// Only ever touches its own table. Rows carry no uniqueness constraint;
/// the runner's pending filter is what keeps names from repeating.
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
    column: String,
}

impl Ledger {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn from_options(options: &ResolvedOptions) -> Self {
        Self::new(&options.table_name, &options.column_name)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Create the ledger table if it does not exist yet.
    pub fn ensure_schema(&self, store: &dyn Store) -> Result<()> {
        IdentifierValidator::validate_identifier("table name", &self.table)
            .and_then(|_| IdentifierValidator::validate_identifier("column name", &self.column))
            .map_err(|e| {
                error!("ledger identifiers rejected: {e}");
                Error::Schema(e.to_string())
            })?;

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} TEXT);",
            self.table, self.column
        );
        store.execute_one(Statement::new(sql)).map_err(|e| {
            error!("failed to create ledger table {}: {e}", self.table);
            Error::Schema(e.to_string())
        })?;
        Ok(())
    }

    /// All recorded names. NULL entries are skipped.
    pub fn list_applied(&self, store: &dyn Store) -> Result<HashSet<String>> {
        let sql = format!("SELECT {} FROM {};", self.column, self.table);
        let rs = store.execute_one(Statement::new(sql)).map_err(|e| {
            error!("failed to read ledger table {}: {e}", self.table);
            Error::Read(e.to_string())
        })?;

        let applied: HashSet<String> = rs
            .rows
            .iter()
            .filter_map(|row| row.get(&self.column).and_then(Value::as_text))
            .map(String::from)
            .collect();
        debug!("ledger {} lists {} applied migrations", self.table, applied.len());
        Ok(applied)
    }

    /// Insert statement for `name`, with the name bound as an argument.
    pub fn record_statement(&self, name: &str) -> Statement {
        Statement::with_args(
            format!("INSERT INTO {} ({}) VALUES (?1);", self.table, self.column),
            vec![Value::from(name)],
        )
    }

    pub fn record_applied(&self, store: &dyn Store, name: &str) -> Result<()> {
        store.execute_one(self.record_statement(name)).map_err(|e| {
            error!("failed to record migration {name}: {e}");
            Error::Record {
                name: name.to_string(),
                cause: e.to_string(),
            }
        })?;
        Ok(())
    }
}
