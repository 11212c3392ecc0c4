//! `holdwatch run`

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use holdwatch_core::{Config, RunMode};
use pipeline::{JsonFileSink, JsonFileSource, JsonlHistoryLog, MarkdownFileSink, Orchestrator, PipelineError, RunReport};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::portfolio::load_portfolio;

/// File the dry-run digest preview is written to, under the output directory
const PREVIEW_FILE: &str = "digest_preview.md";

pub struct RunArgs {
  pub mode: RunMode,
  pub portfolio: PathBuf,
  pub articles: Vec<PathBuf>,
  pub dry_run: bool,
  pub days_back: Option<i64>,
  pub resume: bool,
}

pub async fn cmd_run(config: Config, args: RunArgs) -> Result<()> {
  let holdings = load_portfolio(&args.portfolio)?;
  let state_dir = config.pipeline.resolved_state_dir();
  let output_dir = config.pipeline.output_dir.clone();
  let history = JsonlHistoryLog::new(config.pipeline.resolved_history_file());
  let provider = llm::create_provider(&config.analysis);

  info!(
    holdings = holdings.len(),
    sources = args.articles.len(),
    provider = %provider.name(),
    state_dir = %state_dir.display(),
    "Preparing run"
  );

  let cancel = CancellationToken::new();
  let mut orchestrator = Orchestrator::new(config, &holdings, provider, Box::new(history))
    .with_state_dir(&state_dir)
    .with_cancellation(cancel.clone())
    .with_sink(Box::new(JsonFileSink::new(&output_dir)))
    .with_sink(Box::new(MarkdownFileSink::new(&output_dir)));
  for path in &args.articles {
    orchestrator = orchestrator.with_source(Box::new(JsonFileSource::new(path)));
  }

  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("Interrupt received, stopping after the current stage");
      cancel.cancel();
    }
  });

  let checkpoint = if args.resume {
    orchestrator.load_checkpoint(args.mode)?
  } else {
    None
  };
  let result = match checkpoint {
    Some(checkpoint) => orchestrator.resume(checkpoint).await,
    None => {
      if args.resume {
        info!(mode = %args.mode, "No checkpoint to resume, starting a new run");
      }
      let ctx = orchestrator.context(args.mode, Utc::now(), args.days_back);
      orchestrator.run(ctx, args.dry_run).await
    }
  };

  let report = match result {
    Ok(report) => report,
    Err(e @ (PipelineError::Stage(_) | PipelineError::Cancelled { .. })) => {
      eprintln!("Run stopped: {}", e);
      eprintln!("Resume with: holdwatch run --mode {} --resume ...", args.mode);
      return Err(e.into());
    }
    Err(e) => return Err(e).context("Run failed"),
  };

  if report.dry_run {
    let preview = output_dir.join(PREVIEW_FILE);
    std::fs::create_dir_all(&output_dir)
      .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    std::fs::write(&preview, report.digest.render_markdown())
      .with_context(|| format!("Failed to write preview {}", preview.display()))?;
    println!("Dry run: digest preview saved to {}", preview.display());
  }

  print_report(&report);
  Ok(())
}

fn print_report(report: &RunReport) {
  let stats = &report.stats;
  println!();
  println!("{} run {} complete", report.mode, report.run_id);
  println!(
    "  Sources:   {} ok, {} failed",
    stats.sources_ok,
    stats.source_failures.len()
  );
  for failure in &stats.source_failures {
    println!("    - {}: {}", failure.source, failure.error);
  }
  println!(
    "  Articles:  {} fetched, {} matched holdings, {} clusters",
    stats.articles_fetched, stats.articles_matched, stats.clusters
  );
  println!("  Filter:    {}", stats.filter_summary());
  if let Some(warning) = &stats.filter_warning {
    println!("  Warning:   {}", warning);
  }
  println!(
    "  Analysis:  {} summarized, {} failed",
    stats.analyses_ok, stats.analyses_failed
  );

  let attention: Vec<String> = report
    .digest
    .ranked
    .iter()
    .filter(|r| r.has_news())
    .take(5)
    .map(|r| format!("{} [{}] {:.2}", r.ticker, r.priority.label(), r.score))
    .collect();
  if !attention.is_empty() {
    println!("  Top:       {}", attention.join(", "));
  }
  for delivery in &report.deliveries {
    println!("  Delivered: {} -> {}", delivery.sink, delivery.location);
  }
}
