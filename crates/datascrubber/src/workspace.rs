//! Scrub workspace lifecycle
//!
//! A workspace is a temporary RDS instance restored from the resolved
//! snapshot. It is provisioned lazily on the first request for connection
//! details, and torn down with or without a final snapshot once the scrub
//! tasks have run.

use crate::aws::rds::{
    DbInstance, FinalSnapshot, ModifyRequest, RdsOperations, RestoreRequest, Snapshot,
    SnapshotFilter, sort_newest_first,
};
use crate::config::{SecurityGroups, WorkspaceConfig};
use crate::error::{Result, ScrubError};
use crate::resolver::SnapshotSource;
use crate::wait::{WaitConfig, wait_for_resource};
use chrono::Utc;
use datascrubber_common::tags::workspace_tags;
use datascrubber_common::{Password, final_snapshot_identifier, workspace_identifier};
use tracing::{debug, info, instrument, warn};

/// Where and how to connect to a provisioned workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: Password,
}

/// The lifecycle side of the workspace, as seen by whoever needs to connect.
#[allow(async_fn_in_trait)]
pub trait ConnectionProvider {
    /// Connection details, provisioning the workspace if needed
    async fn connection_info(&mut self) -> Result<ConnectionInfo>;
}

/// Details that are already known, e.g. for a database the scrubber did not restore.
impl ConnectionProvider for ConnectionInfo {
    async fn connection_info(&mut self) -> Result<ConnectionInfo> {
        Ok(self.clone())
    }
}

/// Lifecycle state of a workspace. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    Uninitialized,
    Restoring,
    Reconfiguring,
    Available,
    AwaitingFinalSnapshot,
    Deleted,
    DeletedWithFinalSnapshot,
}

impl WorkspaceState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceState::Uninitialized => "uninitialized",
            WorkspaceState::Restoring => "restoring",
            WorkspaceState::Reconfiguring => "reconfiguring",
            WorkspaceState::Available => "available",
            WorkspaceState::AwaitingFinalSnapshot => "awaiting final snapshot",
            WorkspaceState::Deleted => "deleted",
            WorkspaceState::DeletedWithFinalSnapshot => "deleted with final snapshot",
        }
    }

    /// Whether the instance has already been deleted
    pub fn is_deleted(self) -> bool {
        matches!(
            self,
            WorkspaceState::AwaitingFinalSnapshot
                | WorkspaceState::Deleted
                | WorkspaceState::DeletedWithFinalSnapshot
        )
    }
}

impl std::fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security groups to apply to the workspace, normalized to a list.
fn normalize_security_groups(groups: &SecurityGroups, source: &DbInstance) -> Vec<String> {
    match groups {
        SecurityGroups::Explicit(id) => vec![id.clone()],
        SecurityGroups::ExplicitList(ids) => ids.clone(),
        SecurityGroups::Inherited => source.active_security_groups(),
    }
}

/// A temporary RDS instance restored from a snapshot of the source instance.
pub struct WorkspaceLifecycle<'a, R> {
    rds: &'a R,
    wait: WaitConfig,
    source_instance: DbInstance,
    snapshot: Snapshot,
    identifier: String,
    final_snapshot_identifier: String,
    password: Password,
    security_groups: Vec<String>,
    state: WorkspaceState,
    /// Set once the provider accepted our restore request
    created: bool,
    last_status: Option<String>,
    connection: Option<ConnectionInfo>,
}

impl<'a, R: RdsOperations> WorkspaceLifecycle<'a, R> {
    /// Resolve the snapshot and source instance and derive the workspace names.
    ///
    /// Nothing is created until [`get_connection_info`](Self::get_connection_info).
    pub async fn new<S: SnapshotSource>(
        source: &S,
        rds: &'a R,
        config: &WorkspaceConfig,
    ) -> Result<Self> {
        let snapshot = source.resolve_snapshot().await?;
        let source_instance = source.resolve_source_instance().await?;

        let engine = snapshot
            .engine
            .as_deref()
            .or(source_instance.engine.as_deref())
            .ok_or_else(|| {
                ScrubError::config(format!(
                    "cannot determine engine of RDS instance {}",
                    source_instance.identifier
                ))
            })?;

        let identifier = workspace_identifier(engine, &source_instance.identifier);
        let final_snapshot_identifier =
            final_snapshot_identifier(&source_instance.identifier, Utc::now());
        let security_groups = normalize_security_groups(&config.security_groups, &source_instance);

        info!(
            workspace = %identifier,
            source_instance_id = %source_instance.identifier,
            snapshot_id = %snapshot.identifier,
            final_snapshot_id = %final_snapshot_identifier,
            security_groups = ?security_groups,
            "Initialised scrub workspace"
        );

        Ok(Self {
            rds,
            wait: WaitConfig::minutes(config.timeout_minutes),
            source_instance,
            snapshot,
            identifier,
            final_snapshot_identifier,
            password: Password::generate(),
            security_groups,
            state: WorkspaceState::Uninitialized,
            created: false,
            last_status: None,
            connection: None,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn final_snapshot_identifier(&self) -> &str {
        &self.final_snapshot_identifier
    }

    pub fn state(&self) -> WorkspaceState {
        self.state
    }

    /// Last instance status reported by the provider
    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    pub fn source_instance(&self) -> &DbInstance {
        &self.source_instance
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn security_groups(&self) -> &[String] {
        &self.security_groups
    }

    /// Connection details for the workspace, provisioning it on first call.
    ///
    /// A failed provisioning leaves the workspace where it stopped; later
    /// calls fail with [`ScrubError::InvalidState`].
    pub async fn get_connection_info(&mut self) -> Result<ConnectionInfo> {
        match self.state {
            WorkspaceState::Available => {
                if let Some(connection) = &self.connection {
                    return Ok(connection.clone());
                }
            }
            WorkspaceState::Uninitialized => {
                self.provision().await?;
                if let Some(connection) = &self.connection {
                    return Ok(connection.clone());
                }
            }
            _ => {}
        }

        Err(self.invalid_state("connect"))
    }

    #[instrument(skip_all, fields(workspace = %self.identifier))]
    async fn provision(&mut self) -> Result<()> {
        self.restore().await?;
        let instance = self.reconfigure().await?;

        let endpoint = instance
            .endpoint
            .ok_or_else(|| ScrubError::not_found("endpoint of RDS instance", &self.identifier))?;
        let username = instance
            .master_username
            .or_else(|| self.source_instance.master_username.clone())
            .ok_or_else(|| {
                ScrubError::not_found("master username of RDS instance", &self.identifier)
            })?;

        self.connection = Some(ConnectionInfo {
            address: endpoint.address,
            port: endpoint.port,
            username,
            password: self.password.clone(),
        });
        self.state = WorkspaceState::Available;
        info!("Scrub workspace is available");
        Ok(())
    }

    async fn restore(&mut self) -> Result<()> {
        self.state = WorkspaceState::Restoring;
        info!(
            snapshot_id = %self.snapshot.identifier,
            subnet_group = ?self.source_instance.subnet_group,
            "Restoring RDS instance from snapshot"
        );

        self.rds
            .restore_instance(&RestoreRequest {
                instance_identifier: self.identifier.clone(),
                snapshot_identifier: self.snapshot.identifier.clone(),
                subnet_group: self.source_instance.subnet_group.clone(),
                tags: workspace_tags(
                    &self.source_instance.identifier,
                    &self.snapshot.identifier,
                    Utc::now(),
                ),
            })
            .await?;
        self.created = true;

        let instance = self
            .wait_for_instance("creating RDS instance", DbInstance::is_available)
            .await?;
        self.last_status = instance.status;
        info!("RDS instance restored");
        Ok(())
    }

    async fn reconfigure(&mut self) -> Result<DbInstance> {
        self.state = WorkspaceState::Reconfiguring;
        info!(
            security_groups = ?self.security_groups,
            master_password = "****",
            backup_retention_days = 0,
            "Modifying RDS instance"
        );

        self.rds
            .modify_instance(&ModifyRequest {
                instance_identifier: self.identifier.clone(),
                security_groups: self.security_groups.clone(),
                master_password: self.password.clone(),
                backup_retention_days: 0,
            })
            .await?;

        let instance = self
            .wait_for_instance("modifying RDS instance", |i| {
                i.pending_modifications.is_empty()
            })
            .await?;
        self.last_status = instance.status.clone();
        info!("RDS instance modifications applied");
        Ok(instance)
    }

    /// Poll the workspace instance until `ready` holds.
    async fn wait_for_instance(
        &self,
        action: &'static str,
        ready: impl Fn(&DbInstance) -> bool,
    ) -> Result<DbInstance> {
        let rds = self.rds;
        let id = self.identifier.as_str();
        let ready = &ready;

        wait_for_resource(&self.wait, action, id, || async move {
            let instance = rds.describe_instance(id).await?;
            debug!(
                workspace = %id,
                status = ?instance.status,
                pending = ?instance.pending_modifications,
                "Polled RDS instance"
            );
            Ok(ready(&instance).then_some(instance))
        })
        .await
    }

    /// Delete the workspace instance.
    ///
    /// Does nothing if the instance was never created by this workspace or
    /// is already deleted. Returns the final snapshot identifier when one
    /// was taken.
    #[instrument(skip(self), fields(workspace = %self.identifier))]
    pub async fn cleanup(&mut self, create_final_snapshot: bool) -> Result<Option<String>> {
        if !self.created {
            info!(state = %self.state, "Scrub workspace was never created, nothing to clean up");
            return Ok(None);
        }
        if self.state.is_deleted() {
            warn!(state = %self.state, "Scrub workspace already deleted");
            return Ok(None);
        }

        if !create_final_snapshot {
            info!("Deleting RDS instance without final snapshot");
            self.rds
                .delete_instance(&self.identifier, &FinalSnapshot::Skip)
                .await?;
            self.state = WorkspaceState::Deleted;
            return Ok(None);
        }

        info!(final_snapshot_id = %self.final_snapshot_identifier, "Deleting RDS instance with final snapshot");
        self.rds
            .delete_instance(
                &self.identifier,
                &FinalSnapshot::Take(self.final_snapshot_identifier.clone()),
            )
            .await?;
        self.state = WorkspaceState::AwaitingFinalSnapshot;

        let rds = self.rds;
        let snapshot_id = self.final_snapshot_identifier.as_str();
        let filter = SnapshotFilter::Id(snapshot_id.to_string());
        let filter = &filter;

        wait_for_resource(&self.wait, "creating RDS snapshot", snapshot_id, || async move {
            match rds.describe_snapshots(filter).await {
                Ok(snapshots) => {
                    let status = snapshots.first().and_then(|s| s.status.clone());
                    debug!(snapshot_id = %snapshot_id, status = ?status, "Polled final snapshot");
                    Ok(snapshots.iter().any(Snapshot::is_available).then_some(()))
                }
                Err(e) if e.is_not_found() => {
                    debug!(snapshot_id = %snapshot_id, "Final snapshot not visible yet");
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await?;

        self.state = WorkspaceState::DeletedWithFinalSnapshot;
        info!(final_snapshot_id = %self.final_snapshot_identifier, "Final snapshot available");
        Ok(Some(self.final_snapshot_identifier.clone()))
    }

    /// Delete all but the newest `keep` snapshots taken from this workspace.
    ///
    /// Returns the identifiers of the deleted snapshots, oldest last.
    #[instrument(skip(self), fields(workspace = %self.identifier))]
    pub async fn delete_old_snapshots(&self, keep: usize) -> Result<Vec<String>> {
        let mut snapshots: Vec<Snapshot> = self
            .rds
            .describe_snapshots(&SnapshotFilter::AllIncludingShared)
            .await?
            .into_iter()
            .filter(|s| s.instance_identifier == self.identifier)
            .collect();
        sort_newest_first(&mut snapshots);

        info!(found = snapshots.len(), keep, "Pruning scrubbed snapshots");

        let mut deleted = Vec::new();
        for snapshot in snapshots.into_iter().skip(keep) {
            info!(snapshot_id = %snapshot.identifier, created_at = ?snapshot.created_at, "Deleting old snapshot");
            self.rds.delete_snapshot(&snapshot.identifier).await?;
            deleted.push(snapshot.identifier);
        }
        Ok(deleted)
    }

    fn invalid_state(&self, operation: &'static str) -> ScrubError {
        ScrubError::InvalidState {
            workspace: self.identifier.clone(),
            state: self.state.as_str(),
            operation,
        }
    }
}

impl<R: RdsOperations> ConnectionProvider for WorkspaceLifecycle<'_, R> {
    async fn connection_info(&mut self) -> Result<ConnectionInfo> {
        self.get_connection_info().await
    }
}
