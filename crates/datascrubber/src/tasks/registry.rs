//! Scrub routines and the registry that names them

use super::postgres::Statements;
use crate::error::{Result, ScrubError};
use anyhow::Context;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// A scrub routine, run inside a transaction on one database.
pub trait ScrubTask: Send + Sync {
    fn run<'a>(&'a self, db: &'a mut dyn Statements) -> BoxFuture<'a, anyhow::Result<()>>;
}

impl<F> ScrubTask for F
where
    F: for<'a> Fn(&'a mut dyn Statements) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync,
{
    fn run<'a>(&'a self, db: &'a mut dyn Statements) -> BoxFuture<'a, anyhow::Result<()>> {
        self(db)
    }
}

/// A SQL script executed as a single batch
#[derive(Debug, Clone)]
pub struct SqlScript {
    sql: String,
}

impl SqlScript {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }
}

impl ScrubTask for SqlScript {
    fn run<'a>(&'a self, db: &'a mut dyn Statements) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let rows = db
                .execute(&self.sql)
                .await
                .context("scrub script failed")?;
            debug!(rows, "Scrub script executed");
            Ok(())
        })
    }
}

/// Task name → scrub routine. The name is the logical database it scrubs.
#[derive(Default)]
pub struct ScrubTaskRegistry {
    tasks: BTreeMap<String, Box<dyn ScrubTask>>,
}

impl ScrubTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a routine, replacing any routine registered under the same name.
    pub fn register(mut self, name: impl Into<String>, task: impl ScrubTask + 'static) -> Self {
        self.tasks.insert(name.into(), Box::new(task));
        self
    }

    /// Load every `*.sql` file in `dir`; the file stem names the task.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            ScrubError::config(format!("cannot read task directory {}: {}", dir.display(), e))
        })?;

        let mut registry = Self::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ScrubError::config(format!("cannot list {}: {}", dir.display(), e)))?
                .path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "sql") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let sql = fs::read_to_string(&path).map_err(|e| {
                ScrubError::config(format!("cannot read {}: {}", path.display(), e))
            })?;
            debug!(task = %name, path = %path.display(), "Loaded scrub script");
            registry.tasks.insert(name.to_string(), Box::new(SqlScript::new(sql)));
        }

        info!(dir = %dir.display(), tasks = registry.len(), "Loaded scrub tasks");
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&dyn ScrubTask> {
        self.tasks.get(name).map(Box::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered task names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Debug for ScrubTaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.tasks.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_from_dir_loads_sql_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("billing.sql"), "UPDATE users SET email = 'x';").unwrap();
        fs::write(dir.path().join("accounts.sql"), "DELETE FROM sessions;").unwrap();
        fs::write(dir.path().join("README.md"), "not a task").unwrap();
        fs::create_dir(dir.path().join("nested.sql")).unwrap();

        let registry = ScrubTaskRegistry::from_dir(dir.path()).unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["accounts", "billing"]);
        assert!(registry.contains("billing"));
        assert!(registry.get("README").is_none());
    }

    #[test]
    fn test_from_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScrubTaskRegistry::from_dir(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ScrubError::Configuration(_)));
    }

    #[test]
    fn test_register_replaces() {
        let registry = ScrubTaskRegistry::new()
            .register("billing", SqlScript::new("SELECT 1"))
            .register("billing", SqlScript::new("SELECT 2"));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}
