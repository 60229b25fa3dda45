use std::sync::{Arc, Mutex};

use sqlmigrate_common::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::migrations::Migration;
use crate::runner::{RunReport, RunState, Runner};
use crate::store::Store;

/// Starts a migration run when the host application signals readiness.
///
/// Holds everything a run needs so the host only has to call
/// [`Bootstrap::on_ready`]. Whether it does anything is governed by the
/// runner's resolved `starts_bootstrap` option.
pub struct Bootstrap {
    runner: Arc<Runner>,
    store: Arc<dyn Store>,
    migrations: Arc<[Migration]>,
    // Subscribed just before the latest spawn, so it only sees that run's
    // transitions.
    run_rx: Mutex<Option<watch::Receiver<RunState>>>,
}

impl Bootstrap {
    pub fn new(runner: Arc<Runner>, store: Arc<dyn Store>, migrations: Vec<Migration>) -> Self {
        Self {
            runner,
            store,
            migrations: migrations.into(),
            run_rx: Mutex::new(None),
        }
    }

    pub fn runner(&self) -> &Arc<Runner> {
        &self.runner
    }

    /// Spawn a run on the blocking pool unless bootstrapping is disabled or
    /// the runner already finished. Must be called from within a Tokio
    /// runtime.
    pub fn on_ready(&self) -> Option<JoinHandle<Result<RunReport>>> {
        if !self.runner.options().starts_bootstrap {
            debug!("bootstrap disabled, not starting migrations");
            return None;
        }
        if self.runner.is_finished() {
            debug!("migrations already finished, nothing to bootstrap");
            return None;
        }

        let rx = self.runner.subscribe();
        *self.run_rx.lock().unwrap_or_else(|e| e.into_inner()) = Some(rx);

        let runner = Arc::clone(&self.runner);
        let store = Arc::clone(&self.store);
        let migrations = Arc::clone(&self.migrations);
        Some(tokio::task::spawn_blocking(move || {
            runner.execute(store.as_ref(), &migrations)
        }))
    }

    /// Wait for the run started by the latest [`Bootstrap::on_ready`] to
    /// reach `Finished` or `Failed` and return which.
    ///
    /// Returns the current state straight away when bootstrapping is
    /// disabled. Without a spawned run it only waits if some other caller
    /// has a run in progress.
    pub async fn wait_settled(&self) -> RunState {
        if !self.runner.options().starts_bootstrap {
            return self.runner.state();
        }

        let spawned = self
            .run_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(mut rx) = spawned else {
            if self.runner.state() != RunState::Running {
                return self.runner.state();
            }
            let mut rx = self.runner.subscribe();
            return match rx.wait_for(|state| is_settled(*state)).await {
                Ok(state) => *state,
                Err(_) => self.runner.state(),
            };
        };

        loop {
            if rx.changed().await.is_err() {
                return self.runner.state();
            }
            let state = *rx.borrow_and_update();
            if is_settled(state) {
                return state;
            }
        }
    }
}

fn is_settled(state: RunState) -> bool {
    matches!(state, RunState::Finished | RunState::Failed)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlmigrate_config::MigrationOptions;

    use super::*;
    use crate::SqliteStore;

    fn bootstrap(options: MigrationOptions) -> Bootstrap {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let migrations = vec![Migration::new("init", "CREATE TABLE users(id INT)").unwrap()];
        Bootstrap::new(Arc::new(Runner::new(&options)), store, migrations)
    }

    #[tokio::test]
    async fn on_ready_runs_migrations_by_default() {
        let bootstrap = bootstrap(MigrationOptions::default());

        let handle = bootstrap.on_ready().expect("bootstrap should start");
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.applied, ["init"]);
        assert_eq!(bootstrap.wait_settled().await, RunState::Finished);
    }

    #[tokio::test]
    async fn on_ready_is_a_no_op_once_finished() {
        let bootstrap = bootstrap(MigrationOptions::default());
        bootstrap.on_ready().unwrap().await.unwrap().unwrap();

        assert!(bootstrap.on_ready().is_none());
    }

    #[tokio::test]
    async fn explicit_false_disables_bootstrap() {
        let bootstrap = bootstrap(MigrationOptions::default().with_starts_bootstrap(false));

        assert!(bootstrap.on_ready().is_none());
        assert_eq!(bootstrap.runner().state(), RunState::NotStarted);
    }

    #[tokio::test]
    async fn wait_settled_reports_failure() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let migrations = vec![Migration::new("broken", "CREATE TABLE (").unwrap()];
        let bootstrap = Bootstrap::new(Arc::new(Runner::default()), store, migrations);

        let handle = bootstrap.on_ready().unwrap();
        assert_eq!(bootstrap.wait_settled().await, RunState::Failed);
        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn wait_settled_ignores_an_earlier_failed_run() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let runner = Arc::new(Runner::default());
        let broken = [Migration::new("broken", "CREATE TABLE (").unwrap()];
        assert!(runner.execute(store.as_ref(), &broken).is_err());
        assert_eq!(runner.state(), RunState::Failed);

        let migrations = vec![Migration::new("init", "CREATE TABLE users(id INT)").unwrap()];
        let bootstrap = Bootstrap::new(runner, store, migrations);
        let handle = bootstrap.on_ready().unwrap();

        assert_eq!(bootstrap.wait_settled().await, RunState::Finished);
        assert_eq!(handle.await.unwrap().unwrap().applied, ["init"]);
    }

    #[tokio::test]
    async fn wait_settled_returns_at_once_when_disabled() {
        let bootstrap = bootstrap(MigrationOptions::default().with_starts_bootstrap(false));
        assert!(bootstrap.on_ready().is_none());

        let state = tokio::time::timeout(Duration::from_secs(5), bootstrap.wait_settled())
            .await
            .expect("wait_settled should not block when bootstrap is disabled");
        assert_eq!(state, RunState::NotStarted);
    }

    #[tokio::test]
    async fn wait_settled_without_a_run_returns_current_state() {
        let bootstrap = bootstrap(MigrationOptions::default());

        let state = tokio::time::timeout(Duration::from_secs(5), bootstrap.wait_settled())
            .await
            .expect("nothing is running");
        assert_eq!(state, RunState::NotStarted);
    }
}
