//! cromulent - cost estimation and helpers for Cromwell workflows on Google Cloud
//!
//! ## Usage
//!
//! ```bash
//! # Estimate a finished workflow from the Cromwell server
//! cromulent estimate --workflow-id 0f3c2b8e-2d2a-4b7e-9d1e-8f5c1a2b3c4d
//!
//! # Estimate from saved metadata and a dumped price list
//! cromulent sku-list --output skus.json
//! cromulent estimate --metadata wf.json --sku-list skus.json --report raw > costs.json
//!
//! # Re-render saved costs in nano-dollars
//! cromulent estimate --import-raw-cost-data costs.json --nanos
//!
//! # Operation ids of two tasks, for fetching their details
//! cromulent ops list wf.json --names main.align,main.sort
//!
//! # With verbose logging
//! cromulent -vv status 0f3c2b8e-2d2a-4b7e-9d1e-8f5c1a2b3c4d
//! ```

mod ops;
mod report;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use cromulent_client::{CromwellServer, GoogleServices};
use cromulent_core::{Config, LogGuard, init_logging};
use cromulent_cost::{CostEstimator, PricingTables, SkuResolver, TierScheme, WorkflowMetadata};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::report::{RawCostReport, ReportKind};

/// Cost estimation and helpers for Cromwell workflows on Google Cloud.
#[derive(Parser, Debug)]
#[command(name = "cromulent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ~/.cromulent/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for log files (defaults to ~/.cromulent/logs/)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Cromwell server location, overriding config and environment.
#[derive(clap::Args, Debug, Default)]
struct ServerArgs {
    /// Cromwell web server host
    #[arg(long)]
    host: Option<String>,

    /// Cromwell web server port
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate the ideal cost of a workflow
    Estimate {
        /// Saved Cromwell workflow metadata JSON
        #[arg(long, conflicts_with = "workflow_id")]
        metadata: Option<PathBuf>,

        /// Workflow id to fetch from the Cromwell server
        #[arg(long)]
        workflow_id: Option<String>,

        /// Dumped SKU price list to use instead of the billing API
        #[arg(long)]
        sku_list: Option<PathBuf>,

        /// Render costs saved with `--report raw` instead of estimating
        #[arg(long)]
        import_raw_cost_data: Option<PathBuf>,

        /// Tiered pricing scheme (defaults to the configured one)
        #[arg(long, value_parser = ["all", "no-free", "top-tier", "max-price"])]
        tier_scheme: Option<String>,

        /// Output report
        #[arg(long, value_enum, default_value_t = ReportKind::Standard)]
        report: ReportKind,

        /// Display costs in nano-dollars
        #[arg(long)]
        nanos: bool,

        #[command(flatten)]
        server: ServerArgs,
    },

    /// Dump a workflow's metadata
    Metadata {
        workflow_id: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        server: ServerArgs,
    },

    /// Dump the Compute Engine SKU price list, keyed by description
    SkuList {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show a workflow's status
    Status {
        workflow_id: String,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Count a workflow's calls by execution status
    ExecutionStatus {
        workflow_id: String,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Show a workflow's inputs, outputs and execution status
    Outputs {
        workflow_id: String,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Abort a running workflow
    Abort {
        workflow_id: String,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Work with the pipelines operations of saved metadata
    Ops {
        #[command(subcommand)]
        command: OpsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum OpsCommand {
    /// Print the operation id of every call
    List {
        /// Saved Cromwell workflow metadata JSON
        metadata: PathBuf,

        /// Only these tasks, comma separated
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,
    },

    /// Show shard and attempt counts per task
    Tasks {
        /// Saved Cromwell workflow metadata JSON
        metadata: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("[err] {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn setup_logging(cli: &Cli) -> cromulent_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref()).map_err(|e| anyhow::anyhow!(e.friendly_message()))?;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Command::Estimate {
            metadata,
            workflow_id,
            sku_list,
            import_raw_cost_data,
            tier_scheme,
            report: kind,
            nanos,
            server,
        } => {
            if let Some(path) = import_raw_cost_data {
                let saved = RawCostReport::import(&path)?;
                report::standard_report(&mut stdout, &saved.id, &saved.tasks, nanos)?;
                return Ok(());
            }

            let mut config = with_server(config, &server);
            if let Some(path) = sku_list {
                config = config.with_sku_list(path);
            }
            let scheme: TierScheme = tier_scheme
                .as_deref()
                .unwrap_or(config.estimate.tier_scheme.as_str())
                .parse()?;

            let cromwell = CromwellServer::from_config(&config.cromwell)?;
            let (id, metadata) = match (metadata, workflow_id) {
                (Some(path), _) => {
                    if !cromwell.is_accessible().await {
                        warn!(url = cromwell.base_url(), "cromwell server not accessible, sub-workflows by id will fail");
                    }
                    load_metadata(&path)?
                }
                (None, Some(id)) => {
                    ensure_accessible(&cromwell).await?;
                    info!(workflow = %id, "fetching metadata from cromwell");
                    let metadata = cromwell.metadata(&id).await?;
                    (id, metadata)
                }
                (None, None) => bail!("please specify either a '--metadata' or '--workflow-id' option"),
            };

            let google = Arc::new(GoogleServices::from_config(&config.google)?);
            let tables = PricingTables::default()
                .with_regions(config.pricing.regions.clone())
                .with_compute_classes(config.pricing.compute_classes.clone());
            let mut estimator = CostEstimator::load(Arc::new(cromwell), google.clone(), google.clone(), google.as_ref())
                .await?
                .with_resolver(SkuResolver::new(tables));

            info!("starting cost calculations");
            let costs = estimator.calculate_cost(&metadata, scheme).await?;
            info!(tasks = costs.len(), "finished cost calculations");

            match kind {
                ReportKind::Raw => report::raw_report(&mut stdout, &id, &costs)?,
                ReportKind::Standard => report::standard_report(&mut stdout, &id, &costs, nanos)?,
            }
        }

        Command::Metadata {
            workflow_id,
            output,
            server,
        } => {
            let cromwell = connect(config, &server).await?;
            let metadata = cromwell.metadata_json(&workflow_id).await?;
            write_json(&mut stdout, output.as_deref(), &metadata)?;
        }

        Command::SkuList { output } => {
            let google = GoogleServices::from_config(&config.google)?;
            let skus = google.compute_engine_skus().await?;
            write_json(&mut stdout, output.as_deref(), &skus)?;
        }

        Command::Status { workflow_id, server } => {
            let cromwell = connect(config, &server).await?;
            let status = cromwell.status(&workflow_id).await?;
            report::workflow_status(&mut stdout, &workflow_id, &status.status)?;
        }

        Command::ExecutionStatus { workflow_id, server } => {
            let cromwell = connect(config, &server).await?;
            let summary = cromwell.execution_status_summary(&workflow_id).await?;
            report::execution_status(&mut stdout, &workflow_id, &summary)?;
        }

        Command::Outputs { workflow_id, server } => {
            let cromwell = connect(config, &server).await?;
            let body = cromwell.inputs_outputs(&workflow_id).await?;
            write_json(&mut stdout, None, &body)?;
        }

        Command::Abort { workflow_id, server } => {
            let cromwell = connect(config, &server).await?;
            let status = cromwell.abort(&workflow_id).await?;
            write_json(&mut stdout, None, &status)?;
        }

        Command::Ops { command } => match command {
            OpsCommand::List { metadata, names } => {
                let (_, metadata) = load_metadata(&metadata)?;
                let ids = ops::job_ids(&metadata, &names)?;
                report::ops_list(&mut stdout, &ids)?;
            }
            OpsCommand::Tasks { metadata } => {
                let (_, metadata) = load_metadata(&metadata)?;
                report::ops_tasks(&mut stdout, &ops::task_rows(&metadata))?;
            }
        },
    }

    Ok(())
}

fn with_server(mut config: Config, server: &ServerArgs) -> Config {
    if let Some(host) = &server.host {
        config = config.with_cromwell_host(host.clone());
    }
    if let Some(port) = server.port {
        config = config.with_cromwell_port(port);
    }
    config
}

async fn ensure_accessible(cromwell: &CromwellServer) -> anyhow::Result<()> {
    if !cromwell.is_accessible().await {
        bail!(
            "could not access the cromwell server at {}, please ensure it is up",
            cromwell.base_url()
        );
    }
    Ok(())
}

async fn connect(config: Config, server: &ServerArgs) -> anyhow::Result<CromwellServer> {
    let config = with_server(config, server);
    let cromwell = CromwellServer::from_config(&config.cromwell)?;
    ensure_accessible(&cromwell).await?;
    Ok(cromwell)
}

/// Read saved metadata. The workflow id comes from the document, or the file
/// name when the document has none.
fn load_metadata(path: &Path) -> anyhow::Result<(String, WorkflowMetadata)> {
    info!(path = %path.display(), "loading workflow metadata");
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading metadata from {}", path.display()))?;
    let metadata = WorkflowMetadata::from_json(&content)
        .with_context(|| format!("parsing metadata from {}", path.display()))?;
    let id = metadata.id.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    Ok((id, metadata))
}

fn write_json<W: Write, T: Serialize>(out: &mut W, path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let pretty = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            std::fs::write(path, format!("{}\n", pretty)).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => writeln!(out, "{}", pretty)?,
    }
    Ok(())
}
