use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use terraflow_activities::TerraformActivities;
use terraflow_config::{calculate_depths, load_config, normalize_config, validate_config};
use terraflow_engine::{Engine, EngineError};

/// Terraflow - dependency-aware Terraform workspace orchestration
#[derive(Parser)]
#[command(name = "terraflow")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Orchestrate every workspace in a configuration
  Run {
    /// Path to the infrastructure config (YAML or JSON)
    #[arg(long, default_value = "infra.yaml")]
    config: PathBuf,
  },

  /// Validate a configuration without executing anything
  Validate {
    /// Path to the infrastructure config (YAML or JSON)
    #[arg(long, default_value = "infra.yaml")]
    config: PathBuf,
  },

  /// Show the dependency graph and computed depths
  Graph {
    /// Path to the infrastructure config (YAML or JSON)
    #[arg(long, default_value = "infra.yaml")]
    config: PathBuf,
  },
}

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let result = match cli.command {
    Commands::Run { config } => run_orchestration(config).await,
    Commands::Validate { config } => validate_only(&config),
    Commands::Graph { config } => show_graph(&config),
  };

  match result {
    Ok(code) => code,
    Err(e) => {
      eprintln!("error: {e:#}");
      ExitCode::from(2)
    }
  }
}

async fn run_orchestration(config_path: PathBuf) -> anyhow::Result<ExitCode> {
  let cfg = match load_config(&config_path) {
    Ok(cfg) => cfg,
    Err(e) => {
      eprintln!("invalid configuration: {e}");
      return Ok(ExitCode::from(2));
    }
  };

  let engine = Engine::new(Arc::new(TerraformActivities::new()));

  match engine.run(cfg).await {
    Ok(outcome) => {
      let rendered =
        serde_json::to_string_pretty(&outcome.outputs).context("failed to render outputs")?;
      println!("{rendered}");
      eprintln!("orchestration {} completed", outcome.run_id);
      Ok(ExitCode::SUCCESS)
    }
    Err(EngineError::Config(e)) => {
      eprintln!("invalid configuration: {e}");
      Ok(ExitCode::from(2))
    }
    Err(e) => {
      eprintln!("orchestration failed: {e}");
      Ok(ExitCode::from(1))
    }
  }
}

fn validate_only(config_path: &PathBuf) -> anyhow::Result<ExitCode> {
  match load_config(config_path).and_then(|cfg| validate_config(&cfg).map(|()| cfg)) {
    Ok(cfg) => {
      println!("configuration valid: {} workspaces", cfg.workspaces.len());
      Ok(ExitCode::SUCCESS)
    }
    Err(e) => {
      eprintln!("invalid configuration: {e}");
      Ok(ExitCode::from(2))
    }
  }
}

fn show_graph(config_path: &PathBuf) -> anyhow::Result<ExitCode> {
  let cfg = match load_config(config_path).and_then(|cfg| validate_config(&cfg).map(|()| cfg)) {
    Ok(cfg) => normalize_config(cfg),
    Err(e) => {
      eprintln!("invalid configuration: {e}");
      return Ok(ExitCode::from(2));
    }
  };

  let depths = calculate_depths(&cfg.workspaces);
  let mut rows: Vec<_> = cfg
    .workspaces
    .iter()
    .map(|ws| (depths.get(&ws.name).copied().unwrap_or(0), ws))
    .collect();
  rows.sort_by_key(|(depth, _)| *depth);

  for (depth, ws) in rows {
    if ws.depends_on.is_empty() {
      println!("{depth}  {}", ws.name);
    } else {
      println!("{depth}  {}  <- {}", ws.name, ws.depends_on.join(", "));
    }
  }
  Ok(ExitCode::SUCCESS)
}
