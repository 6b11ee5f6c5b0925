//! datascrubber - RDS snapshot restore, scrub and re-snapshot
//!
//! Restores the latest snapshot of a production RDS instance into a
//! temporary workspace instance, runs per-database scrub tasks against it,
//! and deletes it again, optionally leaving a scrubbed final snapshot behind.
//!
//! The caller drives the flow:
//! [`SnapshotResolver`] → [`WorkspaceLifecycle`] → [`ScrubTaskRunner`] →
//! [`WorkspaceLifecycle::cleanup`] → [`WorkspaceLifecycle::delete_old_snapshots`].

pub mod aws;
pub mod config;
pub mod dns;
pub mod error;
pub mod report;
pub mod resolver;
pub mod tasks;
pub mod wait;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use error::{Result, ScrubError};
pub use resolver::{SnapshotResolver, SnapshotSource};
pub use tasks::{ScrubTaskRegistry, ScrubTaskRunner, TaskOutcome};
pub use workspace::{ConnectionInfo, ConnectionProvider, WorkspaceLifecycle, WorkspaceState};
