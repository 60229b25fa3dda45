use serde::{Deserialize, Serialize};
use sqlmigrate_common::Result;

use crate::validation::IdentifierValidator;

pub const DEFAULT_TABLE_NAME: &str = "migrations";
pub const DEFAULT_COLUMN_NAME: &str = "versions";

/// Caller-supplied runner options. Every field is optional; unset fields
/// fall back to the defaults when resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    /// Ledger table name.
    pub table_name: Option<String>,
    /// Column in the ledger table holding applied migration names.
    pub column_name: Option<String>,
    /// Whether the bootstrap hook starts a run on readiness. An explicit
    /// `false` is honoured; only an absent value means `true`.
    pub starts_bootstrap: Option<bool>,
}

/// Options with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub table_name: String,
    pub column_name: String,
    pub starts_bootstrap: bool,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        MigrationOptions::default().resolve()
    }
}

impl MigrationOptions {
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn with_column_name(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    pub fn with_starts_bootstrap(mut self, starts_bootstrap: bool) -> Self {
        self.starts_bootstrap = Some(starts_bootstrap);
        self
    }

    /// Apply defaults. Blank names count as unset.
    pub fn resolve(&self) -> ResolvedOptions {
        ResolvedOptions {
            table_name: non_blank(self.table_name.as_deref())
                .unwrap_or(DEFAULT_TABLE_NAME)
                .to_string(),
            column_name: non_blank(self.column_name.as_deref())
                .unwrap_or(DEFAULT_COLUMN_NAME)
                .to_string(),
            starts_bootstrap: self.starts_bootstrap.unwrap_or(true),
        }
    }

    /// Check that the resolved ledger identifiers are usable in SQL.
    pub fn validate(&self) -> Result<()> {
        let resolved = self.resolve();
        IdentifierValidator::validate_identifier("table name", &resolved.table_name)?;
        IdentifierValidator::validate_identifier("column name", &resolved.column_name)?;
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_resolve_to_defaults() {
        let resolved = MigrationOptions::default().resolve();
        assert_eq!(resolved.table_name, "migrations");
        assert_eq!(resolved.column_name, "versions");
        assert!(resolved.starts_bootstrap);
    }

    #[test]
    fn explicit_false_disables_bootstrap() {
        let resolved = MigrationOptions::default()
            .with_starts_bootstrap(false)
            .resolve();
        assert!(!resolved.starts_bootstrap);
    }

    #[test]
    fn blank_names_fall_back_to_defaults() {
        let resolved = MigrationOptions::default()
            .with_table_name("  ")
            .with_column_name("")
            .resolve();
        assert_eq!(resolved.table_name, DEFAULT_TABLE_NAME);
        assert_eq!(resolved.column_name, DEFAULT_COLUMN_NAME);
    }

    #[test]
    fn custom_names_are_kept() {
        let resolved = MigrationOptions::default()
            .with_table_name("schema_history")
            .with_column_name("name")
            .resolve();
        assert_eq!(resolved.table_name, "schema_history");
        assert_eq!(resolved.column_name, "name");
    }

    #[test]
    fn validate_rejects_injected_identifiers() {
        assert!(MigrationOptions::default().validate().is_ok());

        let options = MigrationOptions::default().with_table_name("migrations; DROP TABLE users");
        assert!(options.validate().is_err());
    }
}
