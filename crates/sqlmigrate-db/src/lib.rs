pub mod bootstrap;
pub mod ledger;
pub mod migrations;
pub mod runner;
pub mod sqlite_store;
pub mod store;

pub use bootstrap::Bootstrap;
pub use ledger::Ledger;
pub use migrations::Migration;
pub use runner::{RunReport, RunState, Runner};
pub use sqlite_store::SqliteStore;
pub use store::{ResultSet, Row, Statement, StatementOutcome, Store, StoreError, Value};
