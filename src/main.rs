mod dry_run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use marionette_core::action::Workflow;
use marionette_core::config::AppConfig;
use marionette_core::graph::WorkflowGraph;
use marionette_engine::{validate_references, GraphWorkflowRunner, LinearWorkflowExecutor};
use marionette_vision::TemplateLocator;

use dry_run::DryRunPort;

#[derive(Parser)]
#[command(
    name = "marionette",
    version,
    about = "Script and replay desktop interaction workflows"
)]
struct Cli {
    /// Path to config file (mapping points, templates, engine tuning)
    #[arg(short, long, default_value = "marionette.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a linear workflow from a JSON file
    Run {
        /// Path to the workflow definition
        workflow: PathBuf,
    },
    /// Run a workflow graph from a JSON file
    RunGraph {
        /// Path to the graph definition
        graph: PathBuf,
    },
    /// Check a linear workflow's point/template references without running it
    Validate {
        /// Path to the workflow definition
        workflow: PathBuf,
    },
    /// Show the effective configuration
    Config,
}

fn load_config(path: &Path) -> AppConfig {
    match AppConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "using default config");
            AppConfig::default()
        }
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn build_locator(config: &AppConfig, port: Arc<DryRunPort>) -> anyhow::Result<TemplateLocator> {
    Ok(TemplateLocator::new(port)
        .with_points(config.point_map())
        .with_templates(config.load_templates()?))
}

/// Stop the run on Ctrl-C; execution halts at the next safe point.
fn wire_ctrl_c(control: Arc<marionette_engine::RunControl>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at next safe point");
            control.stop();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config);

    match cli.command {
        Commands::Run { workflow } => {
            let workflow: Workflow = load_json(&workflow)?;
            let port = Arc::new(DryRunPort::default());
            let locator = Arc::new(build_locator(&config, port.clone())?);
            let executor = LinearWorkflowExecutor::new(port, locator)
                .with_config(config.engine.clone());

            wire_ctrl_c(executor.control().clone());
            let report = executor.run(&workflow).await?;
            info!(
                run_id = %report.run_id,
                state = %report.state,
                steps = report.steps_executed,
                elapsed_ms = report.elapsed_ms,
                "run finished"
            );
        }

        Commands::RunGraph { graph } => {
            let graph: WorkflowGraph = load_json(&graph)?;
            let port = Arc::new(DryRunPort::default());
            let locator = Arc::new(build_locator(&config, port.clone())?);
            let runner = GraphWorkflowRunner::new(port, locator);

            wire_ctrl_c(runner.control().clone());
            let report = runner.run(&graph).await?;
            info!(
                run_id = %report.run_id,
                state = %report.state,
                steps = report.steps_executed,
                elapsed_ms = report.elapsed_ms,
                "graph run finished"
            );
        }

        Commands::Validate { workflow } => {
            let workflow: Workflow = load_json(&workflow)?;
            let port = Arc::new(DryRunPort::default());
            let locator = build_locator(&config, port)?;
            validate_references(&locator, &workflow)?;
            println!(
                "workflow '{}' ok: {} steps, all references resolve",
                workflow.name,
                workflow.steps.len()
            );
        }

        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
