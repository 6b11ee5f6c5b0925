//! Scrub task discovery and execution
//!
//! The runner enumerates the databases on the workspace once, matches them
//! against the task registry by logical name, and runs each matching task in
//! its own connection and transaction. A failing task is rolled back and
//! reported; it never stops the other tasks.

pub mod postgres;
pub mod registry;

pub use postgres::{Connector, PgConnector, PgSession, Session, Statements};
pub use registry::{ScrubTask, ScrubTaskRegistry, SqlScript};

use crate::error::{Result, ScrubError};
use crate::workspace::{ConnectionInfo, ConnectionProvider};
use datascrubber_common::defaults::{BOOTSTRAP_DATABASE, RESERVED_DATABASES};
use datascrubber_common::logical_database_name;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

/// Result of one scrub task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub task: String,
    /// Actual database name, when the task was viable
    pub database: Option<String>,
    pub succeeded: bool,
    pub duration_secs: f64,
}

/// Runs registered scrub tasks against the databases of a workspace.
pub struct ScrubTaskRunner<'a, C> {
    connector: &'a C,
    connection: ConnectionInfo,
    registry: ScrubTaskRegistry,
    /// Logical name → actual database name
    databases: BTreeMap<String, String>,
    viable: OnceLock<Vec<String>>,
}

impl<'a, C: Connector> ScrubTaskRunner<'a, C> {
    /// Connect to the bootstrap database and discover the scrubbable databases.
    ///
    /// Connection details come from `provider`, which provisions the
    /// workspace if that has not happened yet.
    pub async fn new<P: ConnectionProvider>(
        connector: &'a C,
        provider: &mut P,
        registry: ScrubTaskRegistry,
        db_suffix: &str,
    ) -> Result<Self> {
        let connection = provider.connection_info().await?;
        info!(
            endpoint = %format!("{}:{}", connection.address, connection.port),
            user = %connection.username,
            database = BOOTSTRAP_DATABASE,
            "Connecting to Postgres"
        );
        let mut session = connector
            .connect(&connection, BOOTSTRAP_DATABASE)
            .await
            .map_err(|e| ScrubError::database(BOOTSTRAP_DATABASE, e))?;
        let names = session
            .list_databases()
            .await
            .map_err(|e| ScrubError::database(BOOTSTRAP_DATABASE, e))?;
        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close bootstrap connection");
        }

        let databases = map_logical_names(names, db_suffix);
        info!(
            databases = ?databases.values().collect::<Vec<_>>(),
            "Discovered databases"
        );

        Ok(Self {
            connector,
            connection,
            registry,
            databases,
            viable: OnceLock::new(),
        })
    }

    /// Logical database name → actual database name
    pub fn databases(&self) -> &BTreeMap<String, String> {
        &self.databases
    }

    /// Tasks that are both registered and have a matching database, sorted.
    pub fn get_viable_tasks(&self) -> &[String] {
        self.viable.get_or_init(|| {
            let viable: Vec<String> = self
                .registry
                .names()
                .filter(|name| self.databases.contains_key(*name))
                .map(str::to_string)
                .collect();
            info!(tasks = ?viable, "Viable scrub tasks");
            viable
        })
    }

    /// Run one task; returns whether it committed.
    #[instrument(skip_all, fields(task = %name))]
    pub async fn run_task(&self, name: &str) -> bool {
        let (Some(task), Some(database)) = (self.viable_task(name), self.databases.get(name))
        else {
            error!("Task is not viable: no matching registered task and database");
            return false;
        };

        info!(database = %database, "Running scrub task");
        match self.run_in_transaction(name, task, database).await {
            Ok(()) => {
                info!(database = %database, "Scrub task committed");
                true
            }
            Err(e) => {
                error!(database = %database, error = %e, "Scrub task failed");
                false
            }
        }
    }

    /// Run every viable task in order.
    pub async fn run_all(&self) -> Vec<TaskOutcome> {
        let names = self.get_viable_tasks().to_vec();
        self.run_tasks(&names).await
    }

    /// Run the named tasks in order; non-viable names are reported as failed.
    ///
    /// A name given more than once still runs once, at its first position.
    pub async fn run_tasks(&self, names: &[String]) -> Vec<TaskOutcome> {
        let mut seen = HashSet::new();
        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                warn!(task = %name, "Task named more than once, running it once");
                continue;
            }
            let start = Instant::now();
            let succeeded = self.run_task(name).await;
            outcomes.push(TaskOutcome {
                task: name.clone(),
                database: self
                    .viable_task(name)
                    .and_then(|_| self.databases.get(name).cloned()),
                succeeded,
                duration_secs: start.elapsed().as_secs_f64(),
            });
        }
        outcomes
    }

    fn viable_task(&self, name: &str) -> Option<&dyn ScrubTask> {
        if self.get_viable_tasks().iter().any(|t| t == name) {
            self.registry.get(name)
        } else {
            None
        }
    }

    async fn run_in_transaction(
        &self,
        name: &str,
        task: &dyn ScrubTask,
        database: &str,
    ) -> Result<()> {
        let mut session = self
            .connector
            .connect(&self.connection, database)
            .await
            .map_err(|e| ScrubError::database(database, e))?;

        session
            .begin()
            .await
            .map_err(|e| ScrubError::database(database, e))?;

        if let Err(source) = task.run(&mut session).await {
            if let Err(e) = session.rollback().await {
                warn!(database = %database, error = %e, "Rollback failed");
            }
            close_quietly(session, database).await;
            return Err(ScrubError::Task {
                task: name.to_string(),
                source,
            });
        }

        let committed = session
            .commit()
            .await
            .map_err(|e| ScrubError::database(database, e));
        close_quietly(session, database).await;
        committed
    }
}

async fn close_quietly<S: Session>(session: S, database: &str) {
    if let Err(e) = session.close().await {
        warn!(database = %database, error = %e, "Failed to close connection");
    }
}

/// Map discovered databases to logical names, skipping reserved ones.
///
/// When both `x` and `x{suffix}` exist, the suffixed database wins.
fn map_logical_names(names: Vec<String>, db_suffix: &str) -> BTreeMap<String, String> {
    let mut databases = BTreeMap::new();
    for name in names {
        if RESERVED_DATABASES.contains(&name.as_str()) {
            continue;
        }
        let logical = logical_database_name(&name, db_suffix).to_string();
        let suffixed = logical != name;
        let keep_existing = databases
            .get(&logical)
            .is_some_and(|existing| !suffixed || *existing != logical);
        if keep_existing {
            warn!(logical = %logical, skipped = %name, "Duplicate logical database name");
            continue;
        }
        databases.insert(logical, name);
    }
    databases
}
