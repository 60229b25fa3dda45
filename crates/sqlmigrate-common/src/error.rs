use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// The ledger table could not be created.
    #[error("ledger schema error: {0}")]
    Schema(String),

    /// Applied migrations could not be listed.
    #[error("ledger read error: {0}")]
    Read(String),

    #[error("migration `{name}` failed: {cause}")]
    MigrationExecution { name: String, cause: String },

    /// The migration body ran but its ledger row was not written.
    #[error("migration `{name}` ran but could not be recorded: {cause}")]
    Record { name: String, cause: String },

    #[error("migration run cancelled before `{next}`")]
    Cancelled { next: String },

    #[error("a migration run is already in progress")]
    RunInProgress,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Name of the migration this error is attributed to, if any.
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            Self::MigrationExecution { name, .. }
            | Self::Record { name, .. }
            | Self::Cancelled { next: name } => Some(name.as_str()),
            _ => None,
        }
    }
}
