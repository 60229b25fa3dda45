//! The narrow store capability the runner depends on.
//!
//! A store executes one or more SQL statements and hands back, per
//! statement, either a result set or an error. The runner never looks
//! inside a [`StoreError`]; any failure is fatal for the run.

use std::collections::BTreeMap;

use thiserror::Error;

/// A single SQL value, either bound as an argument or read from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

/// Column name to value.
pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    pub rows_affected: usize,
}

/// SQL text plus positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Opaque failure reported by a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-statement result of a store call.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    Rows(ResultSet),
    Failed(StoreError),
}

impl StatementOutcome {
    pub fn into_result(self) -> Result<ResultSet, StoreError> {
        match self {
            Self::Rows(rs) => Ok(rs),
            Self::Failed(e) => Err(e),
        }
    }
}

pub trait Store: Send + Sync {
    /// Execute `statements` in order.
    ///
    /// An `Err` means the call as a whole failed (connection lost, lock
    /// poisoned). Otherwise there is one outcome per statement that was
    /// attempted. With `atomic` set, execution stops at the first failed
    /// statement and everything the call did is rolled back; the returned
    /// outcomes end with that failure.
    fn execute(
        &self,
        statements: &[Statement],
        atomic: bool,
    ) -> Result<Vec<StatementOutcome>, StoreError>;

    /// Whether `execute(.., true)` really is all-or-nothing.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Run a single statement and collapse both error layers.
    fn execute_one(&self, statement: Statement) -> Result<ResultSet, StoreError> {
        self.execute(std::slice::from_ref(&statement), false)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::new("store returned no result"))?
            .into_result()
    }
}
