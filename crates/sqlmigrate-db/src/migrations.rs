use sqlmigrate_common::{Error, Result};

/// A named unit of schema or data change.
///
/// Identity is the name alone: the runner never compares query text, so
/// editing the body of an already-applied migration has no effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    name: String,
    query: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::Config("migration name cannot be empty".into()));
        }
        Ok(Self {
            name,
            query: query.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// One or more SQL statements. May be blank.
    ///
    /// On a transactional store the body shares a transaction with its
    /// ledger row, so it must not contain `BEGIN`, `COMMIT` or `ROLLBACK`.
    pub fn query(&self) -> &str {
        &self.query
    }
}
