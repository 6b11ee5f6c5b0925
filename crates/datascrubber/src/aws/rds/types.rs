//! RDS types used by the scrubber
//!
//! These are owned, SDK-independent views of the RDS resources the scrubber
//! reads, so the resolver and lifecycle can be driven by in-memory fakes.

use aws_sdk_rds::types as sdk;
use chrono::{DateTime, Utc};
use datascrubber_common::Password;

/// Port used when the provider does not report one
const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Connection endpoint of an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

/// VPC security group attached to an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupMembership {
    pub id: String,
    pub status: String,
}

/// A database instance as reported by `DescribeDBInstances`
#[derive(Debug, Clone, Default)]
pub struct DbInstance {
    pub identifier: String,
    pub engine: Option<String>,
    pub status: Option<String>,
    pub subnet_group: Option<String>,
    pub security_groups: Vec<SecurityGroupMembership>,
    pub endpoint: Option<Endpoint>,
    pub master_username: Option<String>,
    /// Names of modifications the provider has not applied yet
    pub pending_modifications: Vec<String>,
}

impl DbInstance {
    /// Whether the provider reports the instance as `available`
    pub fn is_available(&self) -> bool {
        self.status.as_deref() == Some("available")
    }

    /// Identifiers of the security groups in `active` status
    pub fn active_security_groups(&self) -> Vec<String> {
        self.security_groups
            .iter()
            .filter(|sg| sg.status == "active")
            .map(|sg| sg.id.clone())
            .collect()
    }
}

impl From<&sdk::DbInstance> for DbInstance {
    fn from(instance: &sdk::DbInstance) -> Self {
        Self {
            identifier: instance
                .db_instance_identifier()
                .unwrap_or_default()
                .to_string(),
            engine: instance.engine().map(str::to_string),
            status: instance.db_instance_status().map(str::to_string),
            subnet_group: instance
                .db_subnet_group()
                .and_then(|g| g.db_subnet_group_name())
                .map(str::to_string),
            security_groups: instance
                .vpc_security_groups()
                .iter()
                .filter_map(|sg| {
                    Some(SecurityGroupMembership {
                        id: sg.vpc_security_group_id()?.to_string(),
                        status: sg.status().unwrap_or_default().to_string(),
                    })
                })
                .collect(),
            endpoint: instance.endpoint().and_then(|e| {
                Some(Endpoint {
                    address: e.address()?.to_string(),
                    port: e
                        .port()
                        .and_then(|p| u16::try_from(p).ok())
                        .unwrap_or(DEFAULT_POSTGRES_PORT),
                })
            }),
            master_username: instance.master_username().map(str::to_string),
            pending_modifications: instance
                .pending_modified_values()
                .map(pending_modifications)
                .unwrap_or_default(),
        }
    }
}

/// List the fields of `PendingModifiedValues` that are still set
fn pending_modifications(pending: &sdk::PendingModifiedValues) -> Vec<String> {
    let fields = [
        ("DBInstanceClass", pending.db_instance_class().is_some()),
        ("AllocatedStorage", pending.allocated_storage().is_some()),
        ("MasterUserPassword", pending.master_user_password().is_some()),
        ("Port", pending.port().is_some()),
        ("BackupRetentionPeriod", pending.backup_retention_period().is_some()),
        ("MultiAZ", pending.multi_az().is_some()),
        ("EngineVersion", pending.engine_version().is_some()),
        ("LicenseModel", pending.license_model().is_some()),
        ("Iops", pending.iops().is_some()),
        ("DBInstanceIdentifier", pending.db_instance_identifier().is_some()),
        ("StorageType", pending.storage_type().is_some()),
        ("CACertificateIdentifier", pending.ca_certificate_identifier().is_some()),
        ("DBSubnetGroupName", pending.db_subnet_group_name().is_some()),
    ];
    fields
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// A snapshot as reported by `DescribeDBSnapshots`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub identifier: String,
    /// Identifier of the instance the snapshot was taken from
    pub instance_identifier: String,
    /// Missing while the provider is still creating the snapshot
    pub created_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub engine: Option<String>,
}

impl Snapshot {
    /// Whether the provider reports the snapshot as `available`
    pub fn is_available(&self) -> bool {
        self.status.as_deref() == Some("available")
    }
}

impl From<&sdk::DbSnapshot> for Snapshot {
    fn from(snapshot: &sdk::DbSnapshot) -> Self {
        Self {
            identifier: snapshot
                .db_snapshot_identifier()
                .unwrap_or_default()
                .to_string(),
            instance_identifier: snapshot
                .db_instance_identifier()
                .unwrap_or_default()
                .to_string(),
            created_at: snapshot
                .snapshot_create_time()
                .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
            status: snapshot.status().map(str::to_string),
            engine: snapshot.engine().map(str::to_string),
        }
    }
}

/// Sort snapshots newest first; snapshots without a creation time go last.
///
/// The sort is stable, so snapshots with equal times keep provider order.
pub fn sort_newest_first(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Which snapshots `DescribeDBSnapshots` should return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotFilter {
    /// A single snapshot by identifier
    Id(String),
    /// All snapshots of one instance
    Instance(String),
    /// Every snapshot visible to the account, including shared ones
    AllIncludingShared,
}

/// Parameters of a restore-from-snapshot request
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub instance_identifier: String,
    pub snapshot_identifier: String,
    pub subnet_group: Option<String>,
    pub tags: Vec<(&'static str, String)>,
}

/// Parameters of the post-restore modify request
#[derive(Debug, Clone)]
pub struct ModifyRequest {
    pub instance_identifier: String,
    pub security_groups: Vec<String>,
    pub master_password: Password,
    pub backup_retention_days: i32,
}

/// Whether deleting an instance takes a final snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalSnapshot {
    Take(String),
    Skip,
}
