//! RDS instance lifecycle operations

use super::RdsClient;
use super::types::{DbInstance, FinalSnapshot, ModifyRequest, RestoreRequest};
use crate::aws::error::AwsError;
use aws_sdk_rds::types::Tag;
use tracing::{debug, info};

impl RdsClient {
    /// Describe a single instance by identifier
    pub async fn describe_instance(&self, identifier: &str) -> Result<DbInstance, AwsError> {
        let response = self
            .with_retry("DescribeDBInstances", || async {
                self.client
                    .describe_db_instances()
                    .db_instance_identifier(identifier)
                    .send()
                    .await
                    .map_err(|e| AwsError::from_sdk(&e).for_resource("DB instance", identifier))
            })
            .await?;

        response
            .db_instances()
            .first()
            .map(DbInstance::from)
            .ok_or_else(|| AwsError::NotFound {
                resource_type: "DB instance",
                resource_id: identifier.to_string(),
            })
    }

    /// Enumerate every instance in the region
    pub async fn describe_instances(&self) -> Result<Vec<DbInstance>, AwsError> {
        let instances = self
            .with_retry("DescribeDBInstances", || async {
                let mut stream = self
                    .client
                    .describe_db_instances()
                    .into_paginator()
                    .items()
                    .send();

                let mut instances = Vec::new();
                while let Some(instance) = stream
                    .try_next()
                    .await
                    .map_err(|e| AwsError::from_sdk(&e))?
                {
                    instances.push(DbInstance::from(&instance));
                }
                Ok(instances)
            })
            .await?;

        debug!(count = instances.len(), "Enumerated RDS instances");
        Ok(instances)
    }

    /// Submit a restore-from-snapshot request
    pub async fn restore_instance(&self, request: &RestoreRequest) -> Result<(), AwsError> {
        let tags: Vec<Tag> = request
            .tags
            .iter()
            .map(|(key, value)| Tag::builder().key(*key).value(value).build())
            .collect();

        self.with_retry("RestoreDBInstanceFromDBSnapshot", || async {
            self.client
                .restore_db_instance_from_db_snapshot()
                .db_instance_identifier(&request.instance_identifier)
                .db_snapshot_identifier(&request.snapshot_identifier)
                .set_db_subnet_group_name(request.subnet_group.clone())
                .set_tags(Some(tags.clone()))
                .send()
                .await
                .map_err(|e| {
                    AwsError::from_sdk(&e).for_resource("DB snapshot", &request.snapshot_identifier)
                })
        })
        .await?;

        info!(
            instance_id = %request.instance_identifier,
            snapshot_id = %request.snapshot_identifier,
            "Restore requested"
        );
        Ok(())
    }

    /// Apply security groups, password and backup retention immediately
    pub async fn modify_instance(&self, request: &ModifyRequest) -> Result<(), AwsError> {
        self.with_retry("ModifyDBInstance", || async {
            self.client
                .modify_db_instance()
                .db_instance_identifier(&request.instance_identifier)
                .set_vpc_security_group_ids(Some(request.security_groups.clone()))
                .master_user_password(request.master_password.expose())
                .backup_retention_period(request.backup_retention_days)
                .apply_immediately(true)
                .send()
                .await
                .map_err(|e| {
                    AwsError::from_sdk(&e).for_resource("DB instance", &request.instance_identifier)
                })
        })
        .await?;
        Ok(())
    }

    /// Delete an instance, optionally taking a final snapshot
    pub async fn delete_instance(
        &self,
        identifier: &str,
        final_snapshot: &FinalSnapshot,
    ) -> Result<(), AwsError> {
        self.with_retry("DeleteDBInstance", || async {
            let request = self
                .client
                .delete_db_instance()
                .db_instance_identifier(identifier);
            let request = match final_snapshot {
                FinalSnapshot::Take(snapshot_id) => request
                    .skip_final_snapshot(false)
                    .final_db_snapshot_identifier(snapshot_id),
                FinalSnapshot::Skip => request.skip_final_snapshot(true),
            };
            request
                .send()
                .await
                .map_err(|e| AwsError::from_sdk(&e).for_resource("DB instance", identifier))
        })
        .await?;
        Ok(())
    }
}
