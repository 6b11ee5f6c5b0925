//! RDS operations trait for testing

use super::RdsClient;
use super::types::{DbInstance, FinalSnapshot, ModifyRequest, RestoreRequest, Snapshot, SnapshotFilter};
use crate::aws::error::AwsError;

/// Trait for the RDS capabilities the scrubber consumes.
///
/// Abstracts the client so resolution and workspace lifecycle logic can be
/// unit tested without hitting real AWS. Every failure is already classified
/// into an [`AwsError`].
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
pub trait RdsOperations: Send + Sync {
    /// Describe one instance; `NotFound` if it does not exist
    async fn describe_instance(&self, identifier: &str) -> Result<DbInstance, AwsError>;

    /// Enumerate all instances
    async fn describe_instances(&self) -> Result<Vec<DbInstance>, AwsError>;

    /// Describe snapshots by id, by owning instance, or all including shared
    async fn describe_snapshots(&self, filter: &SnapshotFilter)
    -> Result<Vec<Snapshot>, AwsError>;

    /// Restore a new instance from a snapshot
    async fn restore_instance(&self, request: &RestoreRequest) -> Result<(), AwsError>;

    /// Modify an instance with apply-immediately
    async fn modify_instance(&self, request: &ModifyRequest) -> Result<(), AwsError>;

    /// Delete an instance, optionally with a final snapshot
    async fn delete_instance(
        &self,
        identifier: &str,
        final_snapshot: &FinalSnapshot,
    ) -> Result<(), AwsError>;

    /// Delete a snapshot
    async fn delete_snapshot(&self, identifier: &str) -> Result<(), AwsError>;
}

impl RdsOperations for RdsClient {
    async fn describe_instance(&self, identifier: &str) -> Result<DbInstance, AwsError> {
        RdsClient::describe_instance(self, identifier).await
    }

    async fn describe_instances(&self) -> Result<Vec<DbInstance>, AwsError> {
        RdsClient::describe_instances(self).await
    }

    async fn describe_snapshots(
        &self,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>, AwsError> {
        RdsClient::describe_snapshots(self, filter).await
    }

    async fn restore_instance(&self, request: &RestoreRequest) -> Result<(), AwsError> {
        RdsClient::restore_instance(self, request).await
    }

    async fn modify_instance(&self, request: &ModifyRequest) -> Result<(), AwsError> {
        RdsClient::modify_instance(self, request).await
    }

    async fn delete_instance(
        &self,
        identifier: &str,
        final_snapshot: &FinalSnapshot,
    ) -> Result<(), AwsError> {
        RdsClient::delete_instance(self, identifier, final_snapshot).await
    }

    async fn delete_snapshot(&self, identifier: &str) -> Result<(), AwsError> {
        RdsClient::delete_snapshot(self, identifier).await
    }
}
