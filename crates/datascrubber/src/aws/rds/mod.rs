//! RDS instance and snapshot management

mod instance;
mod operations;
mod snapshot;
mod types;

pub use operations::RdsOperations;
pub use types::{
    DbInstance, Endpoint, FinalSnapshot, ModifyRequest, RestoreRequest, SecurityGroupMembership,
    Snapshot, SnapshotFilter, sort_newest_first,
};

use crate::aws::context::AwsContext;
use crate::aws::error::AwsError;
use aws_sdk_rds::Client;
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// RDS client for restoring and tearing down scrub workspaces
pub struct RdsClient {
    pub(crate) client: Client,
}

impl RdsClient {
    /// Create a new RDS client (loads AWS config from environment)
    pub async fn new(region: &str) -> Self {
        let ctx = AwsContext::new(region).await;
        Self::from_context(&ctx)
    }

    /// Create an RDS client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.rds_client(),
        }
    }

    /// Run an RDS call, retrying with backoff while AWS throttles us.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, AwsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AwsError>>,
    {
        call.retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(20))
                .with_max_times(6),
        )
        .when(AwsError::is_retryable)
        .notify(|e, dur| {
            warn!(operation, delay = ?dur, error = %e, "AWS rate limited, backing off...");
        })
        .await
    }
}
