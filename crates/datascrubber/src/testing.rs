//! In-memory fakes for RDS, DNS and SQL used by the unit tests.

use crate::aws::AwsError;
use crate::aws::rds::{
    DbInstance, Endpoint, FinalSnapshot, ModifyRequest, RdsOperations, RestoreRequest,
    SecurityGroupMembership, Snapshot, SnapshotFilter,
};
use crate::dns::NameResolver;
use crate::error::{Result, ScrubError};
use crate::resolver::SnapshotSource;
use crate::tasks::{Connector, Session, Statements};
use crate::workspace::ConnectionInfo;
use chrono::{TimeZone, Utc};
use datascrubber_common::Password;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// A live instance with an `available` status and one active security group.
pub fn instance(id: &str, address: &str) -> DbInstance {
    DbInstance {
        identifier: id.to_string(),
        engine: Some("postgres".to_string()),
        status: Some("available".to_string()),
        subnet_group: Some("prod-subnets".to_string()),
        security_groups: vec![
            SecurityGroupMembership {
                id: "sg-active".to_string(),
                status: "active".to_string(),
            },
            SecurityGroupMembership {
                id: "sg-old".to_string(),
                status: "removing".to_string(),
            },
        ],
        endpoint: Some(Endpoint {
            address: address.to_string(),
            port: 5432,
        }),
        master_username: Some("master".to_string()),
        pending_modifications: Vec::new(),
    }
}

/// An available snapshot taken `day` days into March 2024.
pub fn snapshot_at(id: &str, instance_id: &str, day: u32) -> Snapshot {
    Snapshot {
        identifier: id.to_string(),
        instance_identifier: instance_id.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, day.max(1), day, 0, 0).single(),
        status: Some("available".to_string()),
        engine: Some("postgres".to_string()),
    }
}

#[derive(Default)]
struct RdsState {
    instances: Vec<DbInstance>,
    snapshots: Vec<Snapshot>,
    /// Describes left before an instance finishes its current transition
    countdown: HashMap<String, u32>,
    transition_polls: u32,
    /// Final snapshot polls answered with NotFound, then with `creating`
    final_snapshot_polls: (u32, u32),
    fail_restore: bool,
    fail_describe_snapshots: bool,
    restores: Vec<RestoreRequest>,
    modifies: Vec<ModifyRequest>,
    deleted_instances: Vec<(String, FinalSnapshot)>,
    deleted_snapshots: Vec<String>,
    calls: HashMap<&'static str, u32>,
}

/// Scriptable in-memory RDS.
///
/// Restored and modified instances reach their target state on the
/// `transition_polls`-th describe (default 1).
pub struct FakeRds {
    state: Mutex<RdsState>,
}

impl Default for FakeRds {
    fn default() -> Self {
        Self {
            state: Mutex::new(RdsState {
                transition_polls: 1,
                ..Default::default()
            }),
        }
    }
}

impl FakeRds {
    fn with_state<T>(&self, call: &'static str, f: impl FnOnce(&mut RdsState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(call).or_default() += 1;
        f(&mut state)
    }

    pub fn add_instance(&self, instance: DbInstance) {
        self.state.lock().unwrap().instances.push(instance);
    }

    pub fn add_snapshot(&self, snapshot: Snapshot) {
        self.state.lock().unwrap().snapshots.push(snapshot);
    }

    pub fn set_transition_polls(&self, polls: u32) {
        self.state.lock().unwrap().transition_polls = polls;
    }

    pub fn set_final_snapshot_polls(&self, not_found: u32, creating: u32) {
        self.state.lock().unwrap().final_snapshot_polls = (not_found, creating);
    }

    pub fn fail_restore_with_already_exists(&self) {
        self.state.lock().unwrap().fail_restore = true;
    }

    pub fn fail_describe_snapshots(&self) {
        self.state.lock().unwrap().fail_describe_snapshots = true;
    }

    pub fn calls(&self, call: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(call)
            .copied()
            .unwrap_or(0)
    }

    pub fn restores(&self) -> Vec<RestoreRequest> {
        self.state.lock().unwrap().restores.clone()
    }

    pub fn modifies(&self) -> Vec<ModifyRequest> {
        self.state.lock().unwrap().modifies.clone()
    }

    pub fn deleted_instances(&self) -> Vec<(String, FinalSnapshot)> {
        self.state.lock().unwrap().deleted_instances.clone()
    }

    pub fn deleted_snapshots(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_snapshots.clone()
    }
}

fn instance_not_found(id: &str) -> AwsError {
    AwsError::NotFound {
        resource_type: "DB instance",
        resource_id: id.to_string(),
    }
}

impl RdsOperations for FakeRds {
    async fn describe_instance(&self, identifier: &str) -> Result<DbInstance, AwsError> {
        self.with_state("describe_instance", |state| {
            let remaining = state.countdown.get(identifier).copied();
            let instance = state
                .instances
                .iter_mut()
                .find(|i| i.identifier == identifier)
                .ok_or_else(|| instance_not_found(identifier))?;

            if let Some(remaining) = remaining {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    state.countdown.remove(identifier);
                    instance.status = Some("available".to_string());
                    instance.pending_modifications.clear();
                } else {
                    state.countdown.insert(identifier.to_string(), remaining);
                }
            }
            Ok(instance.clone())
        })
    }

    async fn describe_instances(&self) -> Result<Vec<DbInstance>, AwsError> {
        self.with_state("describe_instances", |state| Ok(state.instances.clone()))
    }

    async fn describe_snapshots(
        &self,
        filter: &SnapshotFilter,
    ) -> Result<Vec<Snapshot>, AwsError> {
        self.with_state("describe_snapshots", |state| {
            if state.fail_describe_snapshots {
                return Err(AwsError::Sdk {
                    code: Some("AccessDenied".to_string()),
                    message: "not authorized".to_string(),
                });
            }

            match filter {
                SnapshotFilter::Id(id) => {
                    let (not_found, creating) = &mut state.final_snapshot_polls;
                    let snapshot = state
                        .snapshots
                        .iter_mut()
                        .find(|s| &s.identifier == id)
                        .ok_or_else(|| AwsError::NotFound {
                            resource_type: "DB snapshot",
                            resource_id: id.clone(),
                        })?;

                    if snapshot.status.as_deref() == Some("creating") {
                        if *not_found > 0 {
                            *not_found -= 1;
                            return Err(AwsError::NotFound {
                                resource_type: "DB snapshot",
                                resource_id: id.clone(),
                            });
                        }
                        if *creating > 0 {
                            *creating -= 1;
                        } else {
                            snapshot.status = Some("available".to_string());
                            snapshot.created_at = Some(Utc::now());
                        }
                    }
                    Ok(vec![snapshot.clone()])
                }
                SnapshotFilter::Instance(instance_id) => Ok(state
                    .snapshots
                    .iter()
                    .filter(|s| &s.instance_identifier == instance_id)
                    .cloned()
                    .collect()),
                SnapshotFilter::AllIncludingShared => Ok(state.snapshots.clone()),
            }
        })
    }

    async fn restore_instance(&self, request: &RestoreRequest) -> Result<(), AwsError> {
        self.with_state("restore_instance", |state| {
            if state.fail_restore {
                return Err(AwsError::AlreadyExists {
                    message: format!("DB instance {} already exists", request.instance_identifier),
                });
            }
            let id = request.instance_identifier.clone();
            state.instances.push(DbInstance {
                identifier: id.clone(),
                engine: Some("postgres".to_string()),
                status: Some("creating".to_string()),
                subnet_group: request.subnet_group.clone(),
                security_groups: Vec::new(),
                endpoint: Some(Endpoint {
                    address: format!("{id}.fake.rds.amazonaws.com"),
                    port: 5432,
                }),
                master_username: Some("master".to_string()),
                pending_modifications: Vec::new(),
            });
            state.countdown.insert(id, state.transition_polls);
            state.restores.push(request.clone());
            Ok(())
        })
    }

    async fn modify_instance(&self, request: &ModifyRequest) -> Result<(), AwsError> {
        self.with_state("modify_instance", |state| {
            let id = &request.instance_identifier;
            let instance = state
                .instances
                .iter_mut()
                .find(|i| &i.identifier == id)
                .ok_or_else(|| instance_not_found(id))?;
            instance.pending_modifications =
                vec!["MasterUserPassword".to_string(), "VpcSecurityGroups".to_string()];
            instance.security_groups = request
                .security_groups
                .iter()
                .map(|sg| SecurityGroupMembership {
                    id: sg.clone(),
                    status: "adding".to_string(),
                })
                .collect();
            state.countdown.insert(id.clone(), state.transition_polls);
            state.modifies.push(request.clone());
            Ok(())
        })
    }

    async fn delete_instance(
        &self,
        identifier: &str,
        final_snapshot: &FinalSnapshot,
    ) -> Result<(), AwsError> {
        self.with_state("delete_instance", |state| {
            let position = state
                .instances
                .iter()
                .position(|i| i.identifier == identifier)
                .ok_or_else(|| instance_not_found(identifier))?;
            state.instances.remove(position);

            if let FinalSnapshot::Take(snapshot_id) = final_snapshot {
                state.snapshots.push(Snapshot {
                    identifier: snapshot_id.clone(),
                    instance_identifier: identifier.to_string(),
                    created_at: None,
                    status: Some("creating".to_string()),
                    engine: Some("postgres".to_string()),
                });
            }
            state
                .deleted_instances
                .push((identifier.to_string(), final_snapshot.clone()));
            Ok(())
        })
    }

    async fn delete_snapshot(&self, identifier: &str) -> Result<(), AwsError> {
        self.with_state("delete_snapshot", |state| {
            state.snapshots.retain(|s| s.identifier != identifier);
            state.deleted_snapshots.push(identifier.to_string());
            Ok(())
        })
    }
}

/// Static DNS records: hostname → canonical name.
#[derive(Default)]
pub struct FakeDns {
    records: HashMap<String, String>,
    lookups: AtomicU32,
}

impl FakeDns {
    pub fn with_record(hostname: &str, canonical: &str) -> Self {
        Self {
            records: HashMap::from([(hostname.to_string(), canonical.to_string())]),
            lookups: AtomicU32::new(0),
        }
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl NameResolver for FakeDns {
    async fn canonical_name(&self, hostname: &str) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.records
            .get(hostname)
            .cloned()
            .ok_or_else(|| ScrubError::Dns {
                hostname: hostname.to_string(),
                message: "NXDOMAIN".to_string(),
            })
    }
}

/// A resolver that already knows its answers.
pub struct FakeSource {
    instance: DbInstance,
    snapshot: Snapshot,
}

impl FakeSource {
    pub fn new(instance: DbInstance, snapshot: Snapshot) -> Self {
        Self { instance, snapshot }
    }
}

impl SnapshotSource for FakeSource {
    async fn resolve_snapshot(&self) -> Result<Snapshot> {
        Ok(self.snapshot.clone())
    }

    async fn resolve_source_instance(&self) -> Result<DbInstance> {
        Ok(self.instance.clone())
    }
}

pub fn connection_info() -> ConnectionInfo {
    ConnectionInfo {
        address: "scrubber.fake.rds.amazonaws.com".to_string(),
        port: 5432,
        username: "master".to_string(),
        password: Password::generate(),
    }
}

/// Everything the fake SQL server has seen.
#[derive(Debug, Clone, Default)]
pub struct SqlLog {
    pub connects: Vec<String>,
    pub executed: Vec<(String, String)>,
    pub commits: Vec<String>,
    pub rollbacks: Vec<String>,
}

#[derive(Default)]
struct SqlServer {
    databases: Vec<String>,
    fail_connect: Vec<String>,
    fail_commits: bool,
    log: SqlLog,
}

/// In-memory SQL server. Statements containing `FAIL` return an error.
#[derive(Clone, Default)]
pub struct FakeConnector {
    server: Arc<Mutex<SqlServer>>,
}

impl FakeConnector {
    pub fn with_databases(databases: &[&str]) -> Self {
        let connector = Self::default();
        connector.server.lock().unwrap().databases =
            databases.iter().map(|d| d.to_string()).collect();
        connector
    }

    pub fn fail_connect_to(&self, database: &str) {
        self.server.lock().unwrap().fail_connect.push(database.to_string());
    }

    pub fn fail_commits(&self) {
        self.server.lock().unwrap().fail_commits = true;
    }

    pub fn log(&self) -> SqlLog {
        self.server.lock().unwrap().log.clone()
    }
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(
        &self,
        _info: &ConnectionInfo,
        database: &str,
    ) -> Result<FakeSession, sqlx::Error> {
        let mut server = self.server.lock().unwrap();
        if server.fail_connect.iter().any(|d| d == database) {
            return Err(sqlx::Error::Protocol(format!("connection to {database} refused")));
        }
        server.log.connects.push(database.to_string());
        Ok(FakeSession {
            database: database.to_string(),
            server: Arc::clone(&self.server),
        })
    }
}

pub struct FakeSession {
    database: String,
    server: Arc<Mutex<SqlServer>>,
}

impl Statements for FakeSession {
    fn execute<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<u64, sqlx::Error>> {
        Box::pin(async move {
            if sql.contains("FAIL") {
                return Err(sqlx::Error::Protocol(format!("syntax error in {sql}")));
            }
            let mut server = self.server.lock().unwrap();
            server
                .log
                .executed
                .push((self.database.clone(), sql.to_string()));
            Ok(1)
        })
    }
}

impl Session for FakeSession {
    async fn list_databases(&mut self) -> Result<Vec<String>, sqlx::Error> {
        Ok(self.server.lock().unwrap().databases.clone())
    }

    async fn begin(&mut self) -> Result<(), sqlx::Error> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        let mut server = self.server.lock().unwrap();
        if server.fail_commits {
            return Err(sqlx::Error::Protocol("could not serialize access".to_string()));
        }
        server.log.commits.push(self.database.clone());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.server
            .lock()
            .unwrap()
            .log
            .rollbacks
            .push(self.database.clone());
        Ok(())
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

/// A routine that runs one statement.
pub fn statement_task(db: &mut dyn Statements) -> BoxFuture<'_, anyhow::Result<()>> {
    Box::pin(async move {
        db.execute("UPDATE users SET email = md5(email)").await?;
        Ok(())
    })
}

/// A routine that runs a statement, then fails.
pub fn failing_task(db: &mut dyn Statements) -> BoxFuture<'_, anyhow::Result<()>> {
    Box::pin(async move {
        db.execute("DELETE FROM sessions").await?;
        anyhow::bail!("customer table missing")
    })
}
