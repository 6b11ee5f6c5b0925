//! Default configuration values
//!
//! Shared between the CLI argument definitions and the library so both agree
//! on the same defaults.

use std::time::Duration;

/// Default timeout, in minutes, for each provider-side wait
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 90;

/// Fixed delay between two polls of the provider
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Environment suffix stripped from database names before matching tasks
pub const DEFAULT_DB_SUFFIX: &str = "_production";

/// Number of scrubbed snapshots kept per workspace
pub const DEFAULT_KEEP_SNAPSHOTS: usize = 3;

/// Default AWS region
pub const DEFAULT_REGION: &str = "eu-west-1";

/// DNS zone every RDS endpoint lives under
pub const RDS_DOMAIN: &str = "rds.amazonaws.com.";

/// Database used for the bootstrap connection
pub const BOOTSTRAP_DATABASE: &str = "postgres";

/// Databases that belong to the engine or to RDS and are never scrubbed
pub const RESERVED_DATABASES: &[&str] = &["template0", "template1", "rdsadmin", "postgres"];

