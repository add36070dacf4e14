use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wayline_bus::MemoryBus;
use wayline_ledger::SqliteLedger;
use wayline_orchestrator::{EventDispatcher, Orchestrator, SubscriptionManager};
use wayline_registry::WorkflowRegistry;
use wayline_stages::{register_default_stages, MemoryDatasetService, MemoryJobService};

/// Wayline - a workflow orchestrator for transportation-data pipelines
#[derive(Parser)]
#[command(name = "wayline")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Validate a workflow configuration file and report graph problems
  Validate {
    /// Path to the workflow configuration (JSON)
    config_file: PathBuf,
  },

  /// Run the orchestrator against a workflow configuration
  Serve {
    /// Path to the workflow configuration (JSON)
    config_file: PathBuf,

    /// Ledger database URL
    #[arg(long, default_value = "sqlite::memory:")]
    ledger_url: String,
  },

  /// Trigger one workflow locally and print the run's ledger record
  Trigger {
    /// Path to the workflow configuration (JSON)
    config_file: PathBuf,

    /// Workflow identifier to trigger, e.g. UPLOAD_VALIDATE
    workflow: String,

    /// Reference id (job id); a fresh v4 uuid when omitted
    #[arg(long)]
    reference_id: Option<String>,

    /// JSON payload for the message data
    #[arg(long, default_value = "{}")]
    data: String,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();
  let rt = tokio::runtime::Runtime::new()?;

  match cli.command {
    Some(Commands::Validate { config_file }) => rt.block_on(validate(config_file)),
    Some(Commands::Serve {
      config_file,
      ledger_url,
    }) => rt.block_on(serve(config_file, ledger_url)),
    Some(Commands::Trigger {
      config_file,
      workflow,
      reference_id,
      data,
    }) => rt.block_on(trigger(config_file, workflow, reference_id, data)),
    None => {
      println!("wayline - use --help to see available commands");
      Ok(())
    }
  }
}

async fn load_registry(config_file: &PathBuf) -> Result<Arc<WorkflowRegistry>> {
  let raw = tokio::fs::read_to_string(config_file)
    .await
    .with_context(|| format!("failed to read configuration file: {}", config_file.display()))?;

  let registry = WorkflowRegistry::from_json(&raw)
    .with_context(|| format!("failed to parse configuration file: {}", config_file.display()))?;

  Ok(Arc::new(registry))
}

async fn open_ledger(ledger_url: &str) -> Result<SqliteLedger> {
  // An in-memory ledger needs its pool pinned to one connection; any other
  // URL goes through the normal connect path.
  let ledger = if ledger_url == "sqlite::memory:" {
    SqliteLedger::in_memory().await?
  } else {
    SqliteLedger::connect(ledger_url).await?
  };
  Ok(ledger)
}

/// Assemble the full engine around a registry, with the default stages and
/// in-memory collaborators registered.
async fn assemble(
  registry: Arc<WorkflowRegistry>,
  ledger_url: &str,
) -> Result<(Arc<Orchestrator>, Arc<EventDispatcher>, SubscriptionManager)> {
  let ledger = Arc::new(open_ledger(ledger_url).await?);
  let bus = Arc::new(MemoryBus::new());
  let dispatcher = Arc::new(EventDispatcher::new());

  let orchestrator = Arc::new(Orchestrator::new(
    registry.clone(),
    ledger.clone(),
    bus.clone(),
    dispatcher.clone(),
  ));

  let jobs = Arc::new(MemoryJobService::new());
  let datasets = Arc::new(MemoryDatasetService::new());
  register_default_stages(&orchestrator, jobs, datasets);

  let manager = SubscriptionManager::new(registry, bus, ledger, dispatcher.clone());
  Ok((orchestrator, dispatcher, manager))
}

async fn validate(config_file: PathBuf) -> Result<()> {
  let registry = load_registry(&config_file).await?;

  // Register the default stages so the declared-vs-registered check runs
  // against the same wiring `serve` would use.
  let (_orchestrator, dispatcher, _manager) = assemble(registry.clone(), "sqlite::memory:").await?;

  let problems = wayline_registry::validate(&registry, &dispatcher.registered_identifiers());
  if !problems.is_empty() {
    for problem in &problems {
      eprintln!("problem: {problem}");
    }
    bail!("workflow graph has {} problem(s)", problems.len());
  }

  println!(
    "workflow graph OK: {} workflow(s), {} subscription(s)",
    registry.workflows().len(),
    registry.subscriptions().len()
  );
  Ok(())
}

async fn trigger(
  config_file: PathBuf,
  workflow: String,
  reference_id: Option<String>,
  data: String,
) -> Result<()> {
  let registry = load_registry(&config_file).await?;
  let (orchestrator, dispatcher, manager) = assemble(registry.clone(), "sqlite::memory:").await?;
  registry.ensure_valid(&dispatcher.registered_identifiers())?;

  let cancel = CancellationToken::new();
  manager.start(cancel.clone()).await?;

  let reference_id = reference_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
  let data: serde_json::Value =
    serde_json::from_str(&data).context("payload is not valid JSON")?;

  orchestrator
    .trigger_workflow(&workflow, wayline_message::QueueMessage::new(&reference_id, "", data))
    .await?;

  // Without external workers the run parks at its requested stage; show
  // where it stands.
  let def = registry
    .lookup(&workflow)
    .context("triggered workflow vanished from the registry")?;
  if let Some(record) = orchestrator.ledger().latest(&reference_id, &def.group).await? {
    println!("{}", serde_json::to_string_pretty(&record)?);
  }

  cancel.cancel();
  Ok(())
}

async fn serve(config_file: PathBuf, ledger_url: String) -> Result<()> {
  let registry = load_registry(&config_file).await?;
  let (_orchestrator, dispatcher, manager) = assemble(registry.clone(), &ledger_url).await?;

  // Fatal on a broken graph: better an outage than silent mis-routing.
  registry.ensure_valid(&dispatcher.registered_identifiers())?;

  let cancel = CancellationToken::new();
  let handles = manager.start(cancel.clone()).await?;

  info!(
    workflows = registry.workflows().len(),
    subscriptions = registry.subscriptions().len(),
    "wayline_started"
  );

  tokio::signal::ctrl_c()
    .await
    .context("failed to listen for shutdown signal")?;
  info!("shutdown_requested");

  cancel.cancel();
  for handle in handles {
    let _ = handle.await;
  }

  Ok(())
}
