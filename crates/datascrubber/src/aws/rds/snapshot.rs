//! RDS snapshot operations

use super::RdsClient;
use super::types::{Snapshot, SnapshotFilter};
use crate::aws::error::AwsError;
use tracing::info;

impl RdsClient {
    /// Describe the snapshots selected by `filter`
    ///
    /// Asking for a single snapshot that does not exist yields
    /// [`AwsError::NotFound`] naming that snapshot.
    pub async fn describe_snapshots(
        &self,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>, AwsError> {
        self.with_retry("DescribeDBSnapshots", || async {
            let request = self.client.describe_db_snapshots();
            let request = match filter {
                SnapshotFilter::Id(id) => request.db_snapshot_identifier(id),
                SnapshotFilter::Instance(id) => request.db_instance_identifier(id),
                SnapshotFilter::AllIncludingShared => request.include_shared(true),
            };

            let mut stream = request.into_paginator().items().send();
            let mut snapshots = Vec::new();
            while let Some(snapshot) = stream.try_next().await.map_err(|e| {
                let err = AwsError::from_sdk(&e);
                match filter {
                    SnapshotFilter::Id(id) => err.for_resource("DB snapshot", id),
                    _ => err,
                }
            })? {
                snapshots.push(Snapshot::from(&snapshot));
            }
            Ok(snapshots)
        })
        .await
    }

    /// Delete a snapshot
    pub async fn delete_snapshot(&self, identifier: &str) -> Result<(), AwsError> {
        self.with_retry("DeleteDBSnapshot", || async {
            self.client
                .delete_db_snapshot()
                .db_snapshot_identifier(identifier)
                .send()
                .await
                .map_err(|e| AwsError::from_sdk(&e).for_resource("DB snapshot", identifier))
        })
        .await?;

        info!(snapshot_id = %identifier, "Deleted snapshot");
        Ok(())
    }
}
