//! Configuration types for the scrubber

use datascrubber_common::defaults::{DEFAULT_DB_SUFFIX, DEFAULT_REGION, DEFAULT_TIMEOUT_MINUTES};
use std::path::PathBuf;

/// Where the data to scrub comes from. At least one field must be set.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// DNS hostname that CNAMEs to the source instance endpoint
    pub hostname: Option<String>,
    /// Identifier of the live source instance
    pub source_instance_identifier: Option<String>,
    /// Identifier of a specific snapshot to restore
    pub snapshot_identifier: Option<String>,
}

/// AWS connection configuration
#[derive(Debug, Clone)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            aws_profile: None,
        }
    }
}

/// Security groups to attach to the workspace instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SecurityGroups {
    /// A single group
    Explicit(String),
    /// A list of groups
    ExplicitList(Vec<String>),
    /// The source instance's active VPC security groups
    #[default]
    Inherited,
}

impl SecurityGroups {
    /// Build from repeated CLI values: none means inherit.
    pub fn from_ids(mut ids: Vec<String>) -> Self {
        match ids.len() {
            0 => Self::Inherited,
            1 => Self::Explicit(ids.remove(0)),
            _ => Self::ExplicitList(ids),
        }
    }
}

/// Workspace instance configuration
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Timeout for each provider-side wait
    pub timeout_minutes: u64,
    pub security_groups: SecurityGroups,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            security_groups: SecurityGroups::Inherited,
        }
    }
}

/// Scrub task configuration
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Suffix stripped from database names to get logical names
    pub db_suffix: String,
    /// Directory of `*.sql` scrub scripts
    pub tasks_dir: Option<PathBuf>,
    /// Run only these tasks (empty: all viable tasks)
    pub only: Vec<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            db_suffix: DEFAULT_DB_SUFFIX.to_string(),
            tasks_dir: None,
            only: Vec::new(),
        }
    }
}

/// Configuration for a scrub run
///
/// Composed of focused sub-configs, each handed to the component that needs it.
#[derive(Debug, Clone, Default)]
pub struct ScrubConfig {
    pub source: SourceConfig,
    pub aws: AwsConfig,
    pub workspace: WorkspaceConfig,
    pub tasks: TaskConfig,
}

impl ScrubConfig {
    pub fn region(&self) -> &str {
        &self.aws.region
    }
    pub fn aws_profile(&self) -> Option<&str> {
        self.aws.aws_profile.as_deref()
    }
    pub fn timeout_minutes(&self) -> u64 {
        self.workspace.timeout_minutes
    }
    pub fn db_suffix(&self) -> &str {
        &self.tasks.db_suffix
    }
}
