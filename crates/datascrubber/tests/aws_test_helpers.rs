//! Shared utilities for AWS integration tests
//!
//! Provides region detection and the source instance to test against.

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to eu-west-1
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "eu-west-1".to_string())
}

/// Identifier of an existing RDS instance with at least one snapshot.
///
/// Read from `DATASCRUBBER_TEST_SOURCE_INSTANCE`; tests that need it are
/// skipped when it is unset.
pub fn test_source_instance() -> Option<String> {
    std::env::var("DATASCRUBBER_TEST_SOURCE_INSTANCE").ok()
}
