//! `holdwatch history`

use anyhow::{Context, Result};
use chrono::Utc;
use extract::prior_urgency;
use holdwatch_core::{Config, HistoryRecord, RunMode, TimeWindow};
use pipeline::{HistoryLog, JsonlHistoryLog};

/// Holdings listed per run
const TOP_PER_RUN: usize = 3;

/// List recorded runs from the last `days` days, then average urgency per ticker
pub async fn cmd_history(config: &Config, mode: Option<RunMode>, days: i64, json: bool) -> Result<()> {
  let log = JsonlHistoryLog::new(config.pipeline.resolved_history_file());
  let since = TimeWindow::ending_at(Utc::now(), days).start;
  let records: Vec<HistoryRecord> = log
    .read_since(since)
    .await
    .with_context(|| format!("Failed to read history {}", log.path().display()))?
    .into_iter()
    .filter(|r| mode.is_none_or(|m| r.mode == m))
    .collect();

  if json {
    println!("{}", serde_json::to_string_pretty(&records)?);
    return Ok(());
  }

  if records.is_empty() {
    println!("No runs recorded in the last {} day(s)", days);
    return Ok(());
  }

  println!("{} run(s) since {}", records.len(), since.format("%Y-%m-%d %H:%M UTC"));
  println!();
  for record in &records {
    let top: Vec<String> = record
      .ranked
      .iter()
      .filter(|r| r.has_news())
      .take(TOP_PER_RUN)
      .map(|r| format!("{} {:.2}", r.ticker, r.score))
      .collect();
    println!(
      "{}  {:<7}  {}  {}",
      record.timestamp.format("%Y-%m-%d %H:%M"),
      record.mode,
      record.run_id,
      if top.is_empty() { "-".to_string() } else { top.join(", ") }
    );
  }

  let mut averages: Vec<(String, f64)> = prior_urgency(&records)
    .into_iter()
    .filter(|(_, avg)| *avg > 0.0)
    .collect();
  averages.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
  if !averages.is_empty() {
    println!();
    println!("Average urgency:");
    for (ticker, avg) in averages {
      println!("  {:<12} {:.2}", ticker, avg);
    }
  }
  Ok(())
}
