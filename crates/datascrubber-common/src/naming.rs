//! Deterministic names for scrub workspaces and their snapshots

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Number of hex characters of the source hash kept in a workspace name
const SOURCE_HASH_LEN: usize = 12;

/// Identifier of the workspace instance restored for `source_instance_id`.
///
/// Stable across runs: the same engine and source instance always map to the
/// same workspace, so retention cleanup can find earlier final snapshots.
pub fn workspace_identifier(engine: &str, source_instance_id: &str) -> String {
    let digest = hex::encode(Sha256::digest(source_instance_id.as_bytes()));
    format!("scrubber-{}-{}", engine, &digest[..SOURCE_HASH_LEN])
}

/// Identifier of the final snapshot taken when the workspace is deleted.
pub fn final_snapshot_identifier(source_instance_id: &str, taken_at: DateTime<Utc>) -> String {
    format!(
        "scrubbed-{}-{}",
        source_instance_id,
        taken_at.format("%Y-%m-%d-%H-%M")
    )
}

/// Strip `suffix` from the end of a database name.
///
/// Only a trailing occurrence is removed, and only once.
pub fn logical_database_name<'a>(database: &'a str, suffix: &str) -> &'a str {
    if suffix.is_empty() {
        return database;
    }
    database.strip_suffix(suffix).unwrap_or(database)
}
