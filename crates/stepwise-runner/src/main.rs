use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use stepwise_core::{Run, RunStatus};
use stepwise_db::{SqliteStore, Store};
use stepwise_runner::config::{Cli, Command};
use stepwise_runner::ports::claude_cli::ClaudeCliReasoning;
use stepwise_runner::ports::console::ConsoleConfirmation;
use stepwise_runner::ports::workspace_tools::WorkspaceTools;
use stepwise_runner::{Orchestrator, Ports};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store: Arc<dyn Store> = Arc::new(match &cli.db_path {
        Some(path) => SqliteStore::open_path(path)?,
        None => SqliteStore::open_default()?,
    });

    match &cli.command {
        Command::Show { run_id } => return show(store.as_ref(), run_id).await,
        Command::List => return list(store.as_ref()).await,
        _ => {}
    }

    let orchestrator = build_orchestrator(&cli, store.clone())?;
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    match &cli.command {
        Command::Run { requirement } => {
            orchestrator.preflight().await?;
            let run = orchestrator.run(requirement).await?;
            report(&run)
        }
        Command::Review { requirement } => {
            let run = orchestrator.plan(requirement).await?;
            println!("{}", run.id);
            Ok(())
        }
        Command::Execute { run_id } => {
            let run = store
                .get_run(run_id)
                .await
                .with_context(|| format!("load run {run_id}"))?;
            if run.status() != RunStatus::Pending {
                bail!("run {} is {}, only pending runs can be executed", run.id, run.status());
            }
            orchestrator.preflight().await?;
            let run = orchestrator.execute(run).await?;
            report(&run)
        }
        Command::Show { .. } | Command::List => Ok(()),
    }
}

fn build_orchestrator(cli: &Cli, store: Arc<dyn Store>) -> Result<Orchestrator> {
    let workspace = cli
        .workspace
        .canonicalize()
        .with_context(|| format!("workspace {}", cli.workspace.display()))?;
    info!("workspace: {}", workspace.display());

    let mut reasoning = ClaudeCliReasoning::new(&workspace);
    reasoning.binary = cli.claude_bin.clone();
    reasoning.model = cli.model.clone();
    reasoning.anthropic_base_url = cli.anthropic_base_url.clone();
    reasoning.anthropic_auth_token = cli.anthropic_auth_token.clone();
    reasoning.timeout = cli.reasoning_timeout();
    reasoning.kill_grace = cli.kill_grace();

    let mut config = cli.orchestrator_config();
    if matches!(cli.command, Command::Review { .. }) {
        config.review_plan = true;
    }

    let ports = Ports {
        reasoning: Arc::new(reasoning),
        tools: Arc::new(WorkspaceTools::new(workspace)),
        confirmation: Arc::new(ConsoleConfirmation::new()),
        store,
    };
    Ok(Orchestrator::new(ports, config))
}

/// Print the deliverable to stdout; a failed run is an error exit.
fn report(run: &Run) -> Result<()> {
    for subtask in run.failed_subtasks() {
        if let Some(failure) = subtask.failure() {
            warn!(
                "subtask {} ({}) failed: {}",
                subtask.position + 1,
                subtask.description,
                failure
            );
        }
    }
    if let Some(deliverable) = run.deliverable() {
        if deliverable.is_partial() {
            warn!("integration failed, printing partial results");
        }
        println!("{}", deliverable.render());
    }
    if run.status() == RunStatus::Failed {
        bail!(
            "run {} failed: {}",
            run.id,
            run.error_message().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn show(store: &dyn Store, run_id: &str) -> Result<()> {
    let run = store
        .get_run(run_id)
        .await
        .with_context(|| format!("load run {run_id}"))?;
    println!("run {} [{}]", run.id, run.status());
    println!("requirement: {}", run.requirement);
    if let Some(message) = run.error_message() {
        println!("error: {message}");
    }
    for subtask in run.subtasks() {
        println!(
            "\n{}. {} [{}]",
            subtask.position + 1,
            subtask.description,
            subtask.state()
        );
        if let Some(mode) = subtask.mode() {
            println!("   mode: {mode}, attempts: {}", subtask.attempts());
        }
        println!("   context entries: {}", subtask.context().len());
        if let Some(failure) = subtask.failure() {
            println!("   failure: {failure}");
        }
        for error in subtask.errors() {
            println!("   error ({}): {}", error.kind.as_str(), error.message);
        }
        for exchange in store.list_info_exchanges(&subtask.id).await? {
            let answer = if exchange.response.declined {
                "declined".to_string()
            } else {
                format!("{} chars", exchange.response.value.as_deref().unwrap_or("").len())
            };
            println!(
                "   info round {} ({}): {} -> {}",
                exchange.request.round, exchange.request.kind, exchange.request.question, answer
            );
        }
        for report in store.list_validation_reports(&subtask.id).await? {
            println!(
                "   validation attempt {} ({}): valid={} score={:.2}",
                report.attempt,
                report.source.as_str(),
                report.is_valid,
                report.score
            );
        }
    }
    if let Some(deliverable) = run.deliverable() {
        println!("\n{}", deliverable.render());
    }
    Ok(())
}

async fn list(store: &dyn Store) -> Result<()> {
    let runs = store.list_runs().await?;
    if runs.is_empty() {
        println!("no runs");
    }
    for run in runs {
        println!(
            "{}  {:<9}  {}  {}",
            run.id,
            run.status().as_str(),
            run.created_at.format("%Y-%m-%d %H:%M"),
            run.requirement
        );
    }
    Ok(())
}
