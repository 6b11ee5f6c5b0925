//! AWS error classification and handling
//!
//! RDS operations are classified at the adapter boundary using the `.code()`
//! of the SDK error, so callers match on [`AwsError`] variants instead of
//! digging through the SDK's error internals.

use aws_sdk_rds::error::ProvideErrorMetadata;
use thiserror::Error;

/// AWS error categories for retry and cleanup logic
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found (may be transient while the provider creates it)
    #[error("Resource not found: {resource_type} '{resource_id}'")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    /// Resource already exists, e.g. a workspace left over from a previous run
    #[error("Resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Resource is not in a state that allows the operation
    #[error("Invalid resource state: {message}")]
    InvalidState { message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(self, AwsError::Throttled)
    }

    /// Classify any SDK error that carries error metadata.
    pub fn from_sdk<E: ProvideErrorMetadata>(err: &E) -> Self {
        classify_aws_error(err.code(), err.message())
    }

    /// Attach the resource a "not found" error refers to.
    pub fn for_resource(self, resource_type: &'static str, resource_id: &str) -> Self {
        match self {
            AwsError::NotFound { .. } => AwsError::NotFound {
                resource_type,
                resource_id: resource_id.to_string(),
            },
            other => other,
        }
    }
}

/// Known RDS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "DBInstanceNotFound",
    "DBInstanceNotFoundFault",
    "DBSnapshotNotFound",
    "DBSnapshotNotFoundFault",
    "DBSubnetGroupNotFoundFault",
];

/// Known RDS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &["DBInstanceAlreadyExists", "DBSnapshotAlreadyExists"];

/// Known RDS error codes for invalid state transitions
const INVALID_STATE_CODES: &[&str] = &[
    "InvalidDBInstanceState",
    "InvalidDBInstanceStateFault",
    "InvalidDBSnapshotState",
    "InvalidDBSnapshotStateFault",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            resource_type: "resource",
            resource_id: message,
        },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists { message },
        Some(c) if INVALID_STATE_CODES.contains(&c) => AwsError::InvalidState { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}
