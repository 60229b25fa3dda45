use std::sync::LazyLock;

use regex::Regex;
use sqlmigrate_common::{Error, Result};

const MAX_IDENTIFIER_LEN: usize = 128;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Validation for identifiers that get spliced into ledger SQL.
pub struct IdentifierValidator;

impl IdentifierValidator {
    /// Accept plain SQL identifiers only: a letter or underscore followed by
    /// letters, digits or underscores. `kind` names the identifier in errors.
    pub fn validate_identifier(kind: &str, ident: &str) -> Result<()> {
        if ident.is_empty() {
            return Err(Error::Config(format!("{kind} cannot be empty")));
        }
        if ident.len() > MAX_IDENTIFIER_LEN {
            return Err(Error::Config(format!("{kind} too long: {ident}")));
        }
        if !IDENTIFIER_RE.is_match(ident) {
            return Err(Error::Config(format!("malformed {kind}: {ident:?}")));
        }
        Ok(())
    }
}
