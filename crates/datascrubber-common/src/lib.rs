//! datascrubber-common - Shared naming and tagging helpers
//!
//! This crate holds the pieces of datascrubber that do not talk to AWS or
//! Postgres, so they can be used (and tested) without either SDK.
//!
//! ## Modules
//!
//! - [`credential`]: Generated master password with redacted formatting
//! - [`defaults`]: Default configuration values
//! - [`naming`]: Workspace, final snapshot and logical database names
//! - [`tags`]: AWS resource tag constants for scrub workspaces

pub mod credential;
pub mod defaults;
pub mod naming;
pub mod tags;

pub use credential::Password;
pub use naming::{final_snapshot_identifier, logical_database_name, workspace_identifier};
