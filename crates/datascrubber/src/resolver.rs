//! Snapshot and source instance resolution
//!
//! Works out which snapshot to restore and which live instance it belongs to,
//! from whichever of hostname, source instance identifier or snapshot
//! identifier the caller supplied. Each step runs at most once; results are
//! kept in once-cells for the lifetime of the resolver.

use crate::aws::rds::{DbInstance, RdsOperations, Snapshot, SnapshotFilter, sort_newest_first};
use crate::config::SourceConfig;
use crate::dns::{NameResolver, is_subdomain};
use crate::error::{Result, ScrubError};
use datascrubber_common::defaults::RDS_DOMAIN;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// The resolver side of the workspace: the only calls a workspace makes on it.
#[allow(async_fn_in_trait)]
pub trait SnapshotSource {
    /// The snapshot to restore
    async fn resolve_snapshot(&self) -> Result<Snapshot>;

    /// The live instance the snapshot belongs to
    async fn resolve_source_instance(&self) -> Result<DbInstance>;
}

/// Resolves the snapshot and source instance to scrub.
pub struct SnapshotResolver<'a, R, N> {
    rds: &'a R,
    dns: &'a N,
    hostname: Option<String>,
    endpoint_address: OnceCell<String>,
    source_instance_identifier: OnceCell<String>,
    source_instance: OnceCell<DbInstance>,
    snapshot_identifier: OnceCell<String>,
    snapshot: OnceCell<Snapshot>,
}

impl<'a, R: RdsOperations, N: NameResolver> SnapshotResolver<'a, R, N> {
    /// Create a resolver; at least one of the three inputs must be given.
    pub fn new(rds: &'a R, dns: &'a N, source: &SourceConfig) -> Result<Self> {
        if source.hostname.is_none()
            && source.source_instance_identifier.is_none()
            && source.snapshot_identifier.is_none()
        {
            return Err(ScrubError::config(
                "one of hostname, source instance identifier or snapshot identifier must be provided",
            ));
        }

        info!(
            hostname = ?source.hostname,
            source_instance_id = ?source.source_instance_identifier,
            snapshot_id = ?source.snapshot_identifier,
            "Initialised RDS snapshot resolver"
        );

        Ok(Self {
            rds,
            dns,
            hostname: source.hostname.clone(),
            endpoint_address: OnceCell::new(),
            source_instance_identifier: OnceCell::new_with(
                source.source_instance_identifier.clone(),
            ),
            source_instance: OnceCell::new(),
            snapshot_identifier: OnceCell::new_with(source.snapshot_identifier.clone()),
            snapshot: OnceCell::new(),
        })
    }

    /// The snapshot to restore: the given one, or the newest of the source instance.
    pub async fn resolve_snapshot(&self) -> Result<&Snapshot> {
        if let Some(snapshot_id) = self.snapshot_identifier.get() {
            return self.snapshot_by_known_id(snapshot_id).await;
        }

        self.snapshot
            .get_or_try_init(|| async {
                info!("Discovering snapshot identifier...");
                let source_id = self.resolve_source_instance_identifier().await?;

                let mut snapshots = self
                    .rds
                    .describe_snapshots(&SnapshotFilter::Instance(source_id.to_string()))
                    .await?;
                debug!(count = snapshots.len(), source_instance_id = %source_id, "Found snapshots");

                sort_newest_first(&mut snapshots);
                let latest = snapshots
                    .into_iter()
                    .next()
                    .ok_or_else(|| ScrubError::not_found("DB snapshot for instance", source_id))?;

                info!(snapshot_id = %latest.identifier, "Using snapshot");
                let _ = self.snapshot_identifier.set(latest.identifier.clone());
                Ok(latest)
            })
            .await
    }

    /// Identifier of the snapshot to restore
    pub async fn resolve_snapshot_identifier(&self) -> Result<&str> {
        match self.snapshot_identifier.get() {
            Some(id) => Ok(id),
            None => Ok(&self.resolve_snapshot().await?.identifier),
        }
    }

    /// Identifier of the source instance.
    ///
    /// Taken from the snapshot when only a snapshot identifier was given, so
    /// no instance enumeration happens in that case.
    pub async fn resolve_source_instance_identifier(&self) -> Result<&str> {
        if let Some(id) = self.source_instance_identifier.get() {
            return Ok(id);
        }

        if let Some(snapshot_id) = self.snapshot_identifier.get() {
            let snapshot = self.snapshot_by_known_id(snapshot_id).await?;
            return Ok(&snapshot.instance_identifier);
        }

        info!("Discovering source RDS instance identifier...");
        let instance = self.resolve_source_instance().await?;
        info!(source_instance_id = %instance.identifier, "Using source RDS instance");
        Ok(&instance.identifier)
    }

    /// The live source instance
    pub async fn resolve_source_instance(&self) -> Result<&DbInstance> {
        self.source_instance
            .get_or_try_init(|| async {
                let known_id = match self.source_instance_identifier.get() {
                    Some(id) => Some(id.as_str()),
                    None => match self.snapshot_identifier.get() {
                        Some(snapshot_id) => Some(
                            self.snapshot_by_known_id(snapshot_id)
                                .await?
                                .instance_identifier
                                .as_str(),
                        ),
                        None => None,
                    },
                };

                match known_id {
                    Some(id) => {
                        info!(source_instance_id = %id, "Looking up RDS instance");
                        Ok(self.rds.describe_instance(id).await?)
                    }
                    None => self.discover_source_instance().await,
                }
            })
            .await
    }

    /// Canonical RDS endpoint address of the configured hostname
    pub async fn resolve_endpoint_address(&self) -> Result<&str> {
        self.endpoint_address
            .get_or_try_init(|| async {
                let hostname = self
                    .hostname
                    .as_deref()
                    .ok_or_else(|| ScrubError::config("no hostname provided"))?;

                info!(hostname = %hostname, "Discovering RDS endpoint address via DNS...");
                let canonical = self.dns.canonical_name(hostname).await?;
                let address = canonical.trim_end_matches('.').to_string();

                if !is_subdomain(&canonical, RDS_DOMAIN) {
                    return Err(ScrubError::config(format!(
                        "{} is not a subdomain of RDS domain ({})",
                        address, RDS_DOMAIN
                    )));
                }

                info!(hostname = %hostname, endpoint = %address, "Resolved RDS endpoint address");
                Ok(address)
            })
            .await
            .map(String::as_str)
    }

    /// Fetch the snapshot named by the caller and back-fill its owner.
    async fn snapshot_by_known_id(&self, snapshot_id: &str) -> Result<&Snapshot> {
        let snapshot = self
            .snapshot
            .get_or_try_init(|| async {
                let snapshots = self
                    .rds
                    .describe_snapshots(&SnapshotFilter::Id(snapshot_id.to_string()))
                    .await
                    .map_err(|e| match e {
                        e if e.is_not_found() => ScrubError::not_found("DB snapshot", snapshot_id),
                        e => ScrubError::Aws(e),
                    })?;

                snapshots
                    .into_iter()
                    .next()
                    .ok_or_else(|| ScrubError::not_found("DB snapshot", snapshot_id))
            })
            .await?;

        let _ = self
            .source_instance_identifier
            .set(snapshot.instance_identifier.clone());
        Ok(snapshot)
    }

    /// Enumerate instances and match the one behind the hostname.
    async fn discover_source_instance(&self) -> Result<DbInstance> {
        info!("Discovering source RDS instance...");
        let address = self.resolve_endpoint_address().await?;
        let instances = self.rds.describe_instances().await?;
        debug!(count = instances.len(), "Enumerated RDS instances");

        let instance = instances
            .into_iter()
            .find(|i| i.endpoint.as_ref().is_some_and(|e| e.address == address))
            .ok_or_else(|| ScrubError::not_found("RDS instance with endpoint address", address))?;

        if let Some(endpoint) = &instance.endpoint {
            info!(
                source_instance_id = %instance.identifier,
                endpoint = %format!("{}:{}", endpoint.address, endpoint.port),
                "RDS instance matches endpoint address"
            );
        }
        let _ = self
            .source_instance_identifier
            .set(instance.identifier.clone());
        Ok(instance)
    }
}

impl<R: RdsOperations, N: NameResolver> SnapshotSource for SnapshotResolver<'_, R, N> {
    async fn resolve_snapshot(&self) -> Result<Snapshot> {
        SnapshotResolver::resolve_snapshot(self).await.cloned()
    }

    async fn resolve_source_instance(&self) -> Result<DbInstance> {
        SnapshotResolver::resolve_source_instance(self).await.cloned()
    }
}
