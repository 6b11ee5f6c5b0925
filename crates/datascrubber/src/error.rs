//! Scrubber errors
//!
//! Resolution and provisioning failures propagate to the caller as
//! [`ScrubError`]; scrub task failures are contained by the task runner.

use crate::aws::AwsError;
use thiserror::Error;

/// Errors raised by resolution, workspace lifecycle and task discovery
#[derive(Debug, Error)]
pub enum ScrubError {
    /// Missing or contradictory inputs, or a hostname outside the RDS domain
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No matching snapshot, instance or database
    #[error("{resource_type} not found: {resource_id}")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    /// A bounded poll loop passed its deadline
    #[error("Timed out {action} {resource} after {minutes} minutes")]
    Timeout {
        action: &'static str,
        resource: String,
        minutes: u64,
    },

    /// The workspace is in a state the requested operation cannot start from
    #[error("Workspace {workspace} is {state}, cannot {operation}")]
    InvalidState {
        workspace: String,
        state: &'static str,
        operation: &'static str,
    },

    /// A classified RDS API failure
    #[error(transparent)]
    Aws(#[from] AwsError),

    /// Name resolution failed
    #[error("DNS lookup of {hostname} failed: {message}")]
    Dns { hostname: String, message: String },

    /// A SQL driver failure outside a scrub routine
    #[error("Database error on {database}: {source}")]
    Database {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    /// A scrub routine failed; its transaction was rolled back
    #[error("Scrub task {task} failed: {source:#}")]
    Task {
        task: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ScrubError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a not-found error
    pub fn not_found(resource_type: &'static str, resource_id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    /// Create a database error with the database it happened on
    pub fn database(database: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Database {
            database: database.into(),
            source,
        }
    }

    /// Whether this is a not-found condition, either ours or the provider's
    pub fn is_not_found(&self) -> bool {
        match self {
            ScrubError::NotFound { .. } => true,
            ScrubError::Aws(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Result alias for scrubber operations
pub type Result<T, E = ScrubError> = std::result::Result<T, E>;
