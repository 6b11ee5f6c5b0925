//! datascrubber: restore an RDS snapshot, scrub it, and snapshot it again
//!
//! Restores the latest snapshot of a source instance into a temporary
//! workspace instance, runs SQL scrub tasks against its databases, then
//! deletes the workspace, keeping a scrubbed final snapshot.
#![recursion_limit = "256"]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use datascrubber::aws::{AwsContext, RdsClient};
use datascrubber::config::{
    AwsConfig, ScrubConfig, SecurityGroups, SourceConfig, TaskConfig, WorkspaceConfig,
};
use datascrubber::dns::SystemResolver;
use datascrubber::report::RunReport;
use datascrubber::tasks::PgConnector;
use datascrubber::{ScrubTaskRegistry, ScrubTaskRunner, SnapshotResolver, WorkspaceLifecycle};
use datascrubber_common::defaults::{
    DEFAULT_DB_SUFFIX, DEFAULT_KEEP_SNAPSHOTS, DEFAULT_REGION, DEFAULT_TIMEOUT_MINUTES,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "datascrubber")]
#[command(about = "Restore, scrub and re-snapshot RDS databases")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Where the data comes from, and which AWS account to talk to
#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// DNS hostname that points at the source instance endpoint
    #[arg(long, env = "DATASCRUBBER_HOSTNAME")]
    hostname: Option<String>,

    /// Identifier of the source RDS instance
    #[arg(long, env = "DATASCRUBBER_SOURCE_INSTANCE")]
    source_instance: Option<String>,

    /// Identifier of a specific snapshot to restore
    #[arg(long, env = "DATASCRUBBER_SNAPSHOT")]
    snapshot: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,

    /// Minutes to wait for each RDS operation
    #[arg(long, env = "DATASCRUBBER_TIMEOUT_MINUTES", default_value_t = DEFAULT_TIMEOUT_MINUTES)]
    timeout_minutes: u64,

    /// Security group for the workspace (repeatable; default: the source's)
    #[arg(long = "security-group", env = "DATASCRUBBER_SECURITY_GROUPS", value_delimiter = ',')]
    security_groups: Vec<String>,
}

/// Arguments for the run command (extracted to reduce enum size)
#[derive(clap::Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Directory of `<database>.sql` scrub scripts
    #[arg(long, env = "DATASCRUBBER_TASKS_DIR")]
    tasks_dir: PathBuf,

    /// Suffix stripped from database names to find their scrub task
    #[arg(long, env = "DATASCRUBBER_DB_SUFFIX", default_value = DEFAULT_DB_SUFFIX)]
    db_suffix: String,

    /// Only run these tasks (repeatable)
    #[arg(long = "task")]
    tasks: Vec<String>,

    /// Delete the workspace without taking a final snapshot
    #[arg(long)]
    no_final_snapshot: bool,

    /// Scrubbed snapshots to keep
    #[arg(long, default_value_t = DEFAULT_KEEP_SNAPSHOTS)]
    keep_snapshots: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl SourceArgs {
    fn into_config(self) -> ScrubConfig {
        ScrubConfig {
            source: SourceConfig {
                hostname: self.hostname,
                source_instance_identifier: self.source_instance,
                snapshot_identifier: self.snapshot,
            },
            aws: AwsConfig {
                region: self.region,
                aws_profile: self.aws_profile,
            },
            workspace: WorkspaceConfig {
                timeout_minutes: self.timeout_minutes,
                security_groups: SecurityGroups::from_ids(self.security_groups),
            },
            tasks: TaskConfig::default(),
        }
    }
}

impl From<RunArgs> for ScrubConfig {
    fn from(args: RunArgs) -> Self {
        let mut config = args.source.into_config();
        config.tasks = TaskConfig {
            db_suffix: args.db_suffix,
            tasks_dir: Some(args.tasks_dir),
            only: args.tasks,
        };
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore the latest snapshot, run scrub tasks and take a scrubbed snapshot
    Run(Box<RunArgs>),

    /// Show what would be restored, without creating anything
    Resolve {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Delete old scrubbed snapshots
    PruneSnapshots {
        #[command(flatten)]
        source: SourceArgs,

        /// Scrubbed snapshots to keep
        #[arg(long, default_value_t = DEFAULT_KEEP_SNAPSHOTS)]
        keep: usize,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

fn init_tracing() -> Result<()> {
    let mut filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Reduce noise from the AWS SDK and the SQL driver
    for directive in [
        "aws_config=warn",
        "aws_sdk_rds=warn",
        "aws_smithy_runtime=warn",
        "sqlx=warn",
    ] {
        filter = filter.add_directive(directive.parse()?);
    }

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Returns `Ok(false)` when some scrub tasks failed.
async fn run() -> Result<bool> {
    let args = Args::parse();
    init_tracing()?;

    match args.command {
        Command::Run(run_args) => {
            let format = run_args.format;
            let keep = run_args.keep_snapshots;
            let final_snapshot = !run_args.no_final_snapshot;
            let config: ScrubConfig = (*run_args).into();
            handle_run(&config, final_snapshot, keep, format).await
        }
        Command::Resolve { source } => {
            handle_resolve(&source.into_config()).await?;
            Ok(true)
        }
        Command::PruneSnapshots { source, keep } => {
            handle_prune(&source.into_config(), keep).await?;
            Ok(true)
        }
    }
}

async fn rds_client(config: &ScrubConfig) -> RdsClient {
    if let Some(profile) = config.aws_profile() {
        info!(profile = %profile, "Using AWS profile");
    }
    let aws = AwsContext::with_profile(config.region(), config.aws_profile()).await;
    RdsClient::from_context(&aws)
}

/// Handle the run command
async fn handle_run(
    config: &ScrubConfig,
    final_snapshot: bool,
    keep: usize,
    format: OutputFormat,
) -> Result<bool> {
    let started_at = chrono::Utc::now();
    let registry = match &config.tasks.tasks_dir {
        Some(dir) => ScrubTaskRegistry::from_dir(dir)?,
        None => ScrubTaskRegistry::new(),
    };
    if registry.is_empty() {
        warn!("No scrub tasks registered");
    }

    let rds = rds_client(config).await;
    let dns = SystemResolver::from_system_conf()?;
    let resolver = SnapshotResolver::new(&rds, &dns, &config.source)?;
    let mut workspace = WorkspaceLifecycle::new(&resolver, &rds, &config.workspace)
        .await
        .context("Failed to resolve the snapshot to scrub")?;

    info!(
        workspace = %workspace.identifier(),
        snapshot_id = %workspace.snapshot().identifier,
        region = %config.region(),
        "Starting scrub run"
    );

    workspace
        .get_connection_info()
        .await
        .with_context(|| format!("Failed to provision workspace {}", workspace.identifier()))?;

    let connector = PgConnector;
    let bootstrap =
        ScrubTaskRunner::new(&connector, &mut workspace, registry, config.db_suffix()).await;
    let runner = match bootstrap {
        Ok(runner) => runner,
        Err(e) => {
            error!(error = %e, "Cannot enumerate databases, deleting workspace");
            workspace.cleanup(false).await?;
            return Err(e).context("Failed to connect to the workspace");
        }
    };

    let outcomes = if config.tasks.only.is_empty() {
        runner.run_all().await
    } else {
        runner.run_tasks(&config.tasks.only).await
    };

    let final_snapshot = workspace
        .cleanup(final_snapshot)
        .await
        .with_context(|| format!("Failed to clean up workspace {}", workspace.identifier()))?;
    let pruned_snapshots = workspace
        .delete_old_snapshots(keep)
        .await
        .context("Failed to delete old snapshots")?;

    let report = RunReport {
        source_instance: workspace.source_instance().identifier.clone(),
        snapshot: workspace.snapshot().identifier.clone(),
        workspace: workspace.identifier().to_string(),
        started_at,
        finished_at: chrono::Utc::now(),
        tasks: outcomes,
        final_snapshot,
        pruned_snapshots,
    };

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Table => report.print_summary(),
    }
    Ok(report.success())
}

/// Handle the resolve command
async fn handle_resolve(config: &ScrubConfig) -> Result<()> {
    let rds = rds_client(config).await;
    let dns = SystemResolver::from_system_conf()?;
    let resolver = SnapshotResolver::new(&rds, &dns, &config.source)?;
    let workspace = WorkspaceLifecycle::new(&resolver, &rds, &config.workspace).await?;

    let source = workspace.source_instance();
    let snapshot = workspace.snapshot();
    println!("Source instance:  {}", source.identifier);
    if let Some(endpoint) = &source.endpoint {
        println!("Endpoint:         {}:{}", endpoint.address, endpoint.port);
    }
    println!("Snapshot:         {}", snapshot.identifier);
    if let Some(created_at) = snapshot.created_at {
        println!("Snapshot created: {}", created_at.to_rfc3339());
    }
    println!("Workspace:        {}", workspace.identifier());
    println!("Final snapshot:   {}", workspace.final_snapshot_identifier());
    println!("Security groups:  {}", workspace.security_groups().join(", "));
    Ok(())
}

/// Handle the prune-snapshots command
async fn handle_prune(config: &ScrubConfig, keep: usize) -> Result<()> {
    let rds = rds_client(config).await;
    let dns = SystemResolver::from_system_conf()?;
    let resolver = SnapshotResolver::new(&rds, &dns, &config.source)?;
    let workspace = WorkspaceLifecycle::new(&resolver, &rds, &config.workspace).await?;

    let deleted = workspace.delete_old_snapshots(keep).await?;
    if deleted.is_empty() {
        println!("No snapshots to delete.");
    } else {
        for id in &deleted {
            println!("Deleted {id}");
        }
    }
    Ok(())
}
