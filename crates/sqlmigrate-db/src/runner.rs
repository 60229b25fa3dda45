//! Sequential, forward-only migration runner.
//!
//! A run creates the ledger table if needed, filters the supplied list down
//! to names the ledger has not seen (keeping input order), then applies the
//! rest one at a time. Each body is executed strictly before its ledger row
//! is written, and the first failure ends the run.
//!
//! Nothing here coordinates across processes. Two processes running the
//! same list against one database at the same time can both apply a
//! migration; callers that need that guarded must hold an external lock
//! around [`Runner::execute`].

use std::collections::HashSet;

use sqlmigrate_common::{Error, Result};
use sqlmigrate_config::{MigrationOptions, ResolvedOptions};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ledger::Ledger;
use crate::migrations::Migration;
use crate::store::{Statement, StatementOutcome, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Finished,
    Failed,
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Names applied by this run, in the order they were applied.
    pub applied: Vec<String>,
    /// Input migrations skipped because the ledger already had them or the
    /// same name appeared earlier in the list.
    pub skipped: usize,
}

impl RunReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

pub struct Runner {
    options: ResolvedOptions,
    ledger: Ledger,
    state: watch::Sender<RunState>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(&MigrationOptions::default())
    }
}

impl Runner {
    pub fn new(options: &MigrationOptions) -> Self {
        let options = options.resolve();
        let ledger = Ledger::from_options(&options);
        let (state, _) = watch::channel(RunState::NotStarted);
        Self {
            options,
            ledger,
            state,
        }
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == RunState::Finished
    }

    /// Receiver that observes every state transition of this runner.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Apply every migration in `migrations` the ledger has not recorded.
    pub fn execute(&self, store: &dyn Store, migrations: &[Migration]) -> Result<RunReport> {
        self.run_guarded(store, migrations, None)
    }

    /// Like [`Runner::execute`], but checks `cancel` before each pending
    /// migration. A statement already issued is never interrupted.
    pub fn execute_with_cancel(
        &self,
        store: &dyn Store,
        migrations: &[Migration],
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        self.run_guarded(store, migrations, Some(cancel))
    }

    /// Apply `pending` in order without consulting the ledger first. Does
    /// not change the run state.
    pub fn apply_all<'a, I>(&self, store: &dyn Store, pending: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a Migration>,
    {
        self.apply_pending(store, pending, None)
    }

    fn run_guarded(
        &self,
        store: &dyn Store,
        migrations: &[Migration],
        cancel: Option<&CancellationToken>,
    ) -> Result<RunReport> {
        let started = self.state.send_if_modified(|state| {
            if *state == RunState::Running {
                return false;
            }
            *state = RunState::Running;
            true
        });
        if !started {
            warn!("migration run requested while another run is in progress");
            return Err(Error::RunInProgress);
        }

        match self.run(store, migrations, cancel) {
            Ok(report) => {
                self.state.send_replace(RunState::Finished);
                info!(
                    "migrations finished: {} applied, {} already applied",
                    report.applied.len(),
                    report.skipped
                );
                Ok(report)
            }
            Err(e) => {
                self.state.send_replace(RunState::Failed);
                error!("migration run failed: {e}");
                Err(e)
            }
        }
    }

    fn run(
        &self,
        store: &dyn Store,
        migrations: &[Migration],
        cancel: Option<&CancellationToken>,
    ) -> Result<RunReport> {
        self.ledger.ensure_schema(store)?;
        let applied = self.ledger.list_applied(store)?;

        let pending = pending_migrations(migrations, &applied);
        let skipped = migrations.len() - pending.len();
        info!(
            "{} pending migrations in ledger {}",
            pending.len(),
            self.ledger.table()
        );

        let applied = self.apply_pending(store, pending, cancel)?;
        Ok(RunReport { applied, skipped })
    }

    fn apply_pending<'a, I>(
        &self,
        store: &dyn Store,
        pending: I,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a Migration>,
    {
        let mut applied = Vec::new();
        let mut seen = HashSet::new();
        for migration in pending {
            if !seen.insert(migration.name()) {
                debug!("skipping repeated migration {}", migration.name());
                continue;
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                warn!("migration run cancelled before {}", migration.name());
                return Err(Error::Cancelled {
                    next: migration.name().to_string(),
                });
            }
            self.apply_one(store, migration)?;
            applied.push(migration.name().to_string());
        }
        Ok(applied)
    }

    fn apply_one(&self, store: &dyn Store, migration: &Migration) -> Result<()> {
        let name = migration.name();
        debug!("applying migration {name}");

        let body = Statement::new(migration.query());
        if store.supports_transactions() {
            let batch = [body, self.ledger.record_statement(name)];
            let mut outcomes = store
                .execute(&batch, true)
                .map_err(|e| execution_error(name, e))?
                .into_iter();

            match outcomes.next() {
                Some(StatementOutcome::Rows(_)) => {}
                Some(StatementOutcome::Failed(e)) => return Err(execution_error(name, e)),
                None => return Err(execution_error(name, "store returned no result")),
            }
            match outcomes.next() {
                Some(StatementOutcome::Rows(_)) => {}
                Some(StatementOutcome::Failed(e)) => return Err(record_error(name, e)),
                None => return Err(record_error(name, "store returned no result")),
            }
        } else {
            store
                .execute_one(body)
                .map_err(|e| execution_error(name, e))?;
            self.ledger.record_applied(store, name)?;
        }

        info!("applied migration {name}");
        Ok(())
    }
}

/// The subsequence of `migrations` whose names are not in `applied`. Only
/// the first occurrence of a repeated name is kept.
pub fn pending_migrations<'a>(
    migrations: &'a [Migration],
    applied: &HashSet<String>,
) -> Vec<&'a Migration> {
    let mut seen: HashSet<&str> = applied.iter().map(String::as_str).collect();
    migrations
        .iter()
        .filter(|m| seen.insert(m.name()))
        .collect()
}

fn execution_error(name: &str, cause: impl ToString) -> Error {
    Error::MigrationExecution {
        name: name.to_string(),
        cause: cause.to_string(),
    }
}

fn record_error(name: &str, cause: impl ToString) -> Error {
    Error::Record {
        name: name.to_string(),
        cause: cause.to_string(),
    }
}
