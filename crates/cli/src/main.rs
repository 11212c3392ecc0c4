//! Holdwatch CLI - portfolio news triage

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use holdwatch_core::{Config, MAX_LOOKBACK_DAYS, RunMode};
use std::path::PathBuf;

mod commands;
mod logging;
mod portfolio;

use commands::{RunArgs, cmd_config_init, cmd_config_show, cmd_history, cmd_run};
use logging::init_logging;

#[derive(Parser)]
#[command(name = "holdwatch")]
#[command(about = "Collect, deduplicate, filter and rank news about portfolio holdings")]
#[command(after_help = "\
QUICK START:
  holdwatch config init                                   # Write ./holdwatch.toml
  holdwatch run --portfolio p.json --articles news.json   # Daily run
  holdwatch run --mode weekly --portfolio p.json --articles a.jsonl b.json

RECOVERY:
  holdwatch run --mode daily --portfolio p.json --articles news.json --resume")]
struct Cli {
  /// Config file (default: ./holdwatch.toml, then the user config)
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Also write logs to a rolling file
  #[arg(long, global = true, value_name = "FILE")]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

/// Subcommands for `holdwatch config`
#[derive(Subcommand)]
enum ConfigCommand {
  /// Show the effective configuration as TOML
  Show,
  /// Write a commented template to ./holdwatch.toml
  Init {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Run the pipeline once
  #[command(long_about = "Run the pipeline once.\n\n\
    Ingests the article files, clusters duplicate coverage, filters it, ranks every \
    holding and writes the digest. A failed or interrupted run can be continued \
    with --resume from its last completed stage.")]
  Run {
    /// daily, weekly or monthly
    #[arg(short, long, default_value = "daily")]
    mode: RunMode,
    /// Portfolio file (JSON list or TOML [[holdings]])
    #[arg(short, long, value_name = "FILE")]
    portfolio: PathBuf,
    /// Article files (JSON array or JSON Lines), one source each
    #[arg(short, long, value_name = "FILE", num_args = 1..)]
    articles: Vec<PathBuf>,
    /// Analyze but skip delivery and the history log; writes a local preview
    #[arg(long)]
    dry_run: bool,
    /// Override the mode's lookback window in days
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(i64).range(1..=MAX_LOOKBACK_DAYS))]
    days_back: Option<i64>,
    /// Continue the last unfinished run of this mode
    #[arg(long)]
    resume: bool,
  },
  /// Show recorded runs
  History {
    /// Only runs of this mode
    #[arg(short, long)]
    mode: Option<RunMode>,
    /// Lookback in days
    #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(i64).range(1..=MAX_LOOKBACK_DAYS))]
    days: i64,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Manage configuration
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let cwd = std::env::current_dir()?;

  let config = match &cli.config {
    Some(path) => Config::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))?,
    None => Config::load_for_dir(&cwd),
  };
  let _guard = init_logging(&config.logging, cli.log_file.as_deref());

  match cli.command {
    Commands::Run {
      mode,
      portfolio,
      articles,
      dry_run,
      days_back,
      resume,
    } => {
      let args = RunArgs {
        mode,
        portfolio,
        articles,
        dry_run,
        days_back,
        resume,
      };
      cmd_run(config, args).await
    }
    Commands::History { mode, days, json } => cmd_history(&config, mode, days, json).await,
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(&cwd, &config),
      ConfigCommand::Init { force } => cmd_config_init(&cwd, force),
    },
  }
}
