pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{ConfigFormat, ConfigLoader};
pub use model::{DEFAULT_COLUMN_NAME, DEFAULT_TABLE_NAME, MigrationOptions, ResolvedOptions};
pub use validation::IdentifierValidator;
