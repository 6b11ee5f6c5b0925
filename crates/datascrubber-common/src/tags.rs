//! AWS resource tag constants for datascrubber
//!
//! Every restored workspace instance is tagged so it can be told apart from
//! the production instances living in the same account.
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `scrubber` | Static marker ("scrubber") |
//! | `scrubber:source-instance` | Identifier of the instance the snapshot came from |
//! | `scrubber:source-snapshot` | Identifier of the snapshot that was restored |
//! | `scrubber:created-at` | RFC 3339 creation timestamp |

/// Tag key marking a resource as created by the scrubber
pub const TAG_TOOL: &str = "scrubber";

/// Tag value for tool identification
pub const TAG_TOOL_VALUE: &str = "scrubber";

/// Tag key for the source instance identifier
pub const TAG_SOURCE_INSTANCE: &str = "scrubber:source-instance";

/// Tag key for the restored snapshot identifier
pub const TAG_SOURCE_SNAPSHOT: &str = "scrubber:source-snapshot";

/// Tag key for creation timestamp (RFC 3339 format)
pub const TAG_CREATED_AT: &str = "scrubber:created-at";

/// Helper to format creation timestamp for tags
pub fn format_created_at(time: chrono::DateTime<chrono::Utc>) -> String {
    time.to_rfc3339()
}

/// Standard tags for a workspace restored from `snapshot_id` of `source_id`.
pub fn workspace_tags(
    source_id: &str,
    snapshot_id: &str,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Vec<(&'static str, String)> {
    vec![
        (TAG_TOOL, TAG_TOOL_VALUE.to_string()),
        (TAG_SOURCE_INSTANCE, source_id.to_string()),
        (TAG_SOURCE_SNAPSHOT, snapshot_id.to_string()),
        (TAG_CREATED_AT, format_created_at(created_at)),
    ]
}
