//! Digest payload and delivery sinks

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dyn_clone::DynClone;
use holdwatch_core::{Priority, RankedHolding, RunId, RunMode, TimeWindow};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analyze::AnalysisOutcome;
use crate::checkpoint::RunStats;
use crate::error::{PipelineError, Result};

/// Everything a run hands to delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
  pub run_id: RunId,
  pub mode: RunMode,
  pub generated_at: DateTime<Utc>,
  pub window: TimeWindow,
  pub ranked: Vec<RankedHolding>,
  pub analyses: Vec<AnalysisOutcome>,
  pub stats: RunStats,
}

impl Digest {
  /// `<mode>_<YYYYmmdd_HHMM>`, stable for a run
  pub fn file_stem(&self) -> String {
    format!("{}_{}", self.mode, self.generated_at.format("%Y%m%d_%H%M"))
  }

  fn analyses_for<'a>(&'a self, ticker: &'a str) -> impl Iterator<Item = &'a AnalysisOutcome> + 'a {
    self.analyses.iter().filter(move |a| a.ticker() == ticker)
  }

  /// Human-readable digest grouped by priority
  pub fn render_markdown(&self) -> String {
    let mut out = String::new();
    let _ = writeln!(
      out,
      "# Holdwatch {} digest ({})\n",
      self.mode,
      self.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(
      out,
      "Window {} to {}. {}.\n",
      self.window.start.format("%Y-%m-%d %H:%M"),
      self.window.end.format("%Y-%m-%d %H:%M"),
      self.stats.filter_summary()
    );

    for priority in [Priority::High, Priority::Medium, Priority::Low] {
      let group: Vec<&RankedHolding> = self.ranked.iter().filter(|r| r.priority == priority).collect();
      if group.is_empty() {
        continue;
      }
      let _ = writeln!(out, "## {}\n", priority.label());
      for entry in group {
        let _ = writeln!(
          out,
          "### {}. {} ({}) score {:.2}\n",
          entry.rank, entry.ticker, entry.holding.name, entry.score
        );
        let _ = writeln!(out, "{}\n", entry.justification);
        for analysis in self.analyses_for(&entry.ticker) {
          match analysis {
            AnalysisOutcome::Summarized { summary, .. } => {
              let _ = writeln!(out, "- [{}] {}", summary.severity, summary.summary);
            }
            AnalysisOutcome::Failed { error, .. } => {
              let _ = writeln!(out, "- analysis unavailable: {}", error);
            }
          }
        }
        for cluster in &entry.clusters {
          let rep = &cluster.cluster.representative;
          if rep.raw.url.is_empty() {
            let _ = writeln!(out, "- {} ({})", cluster.cluster.headline(), rep.source());
          } else {
            let _ = writeln!(out, "- [{}]({}) ({})", cluster.cluster.headline(), rep.raw.url, rep.source());
          }
        }
        out.push('\n');
      }
    }

    let quiet: Vec<&str> = self
      .ranked
      .iter()
      .filter(|r| r.priority == Priority::None)
      .map(|r| r.ticker.as_str())
      .collect();
    if !quiet.is_empty() {
      let _ = writeln!(out, "## No news\n\n{}", quiet.join(", "));
    }
    out
  }
}

/// A digest handed to one sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
  pub sink: String,
  pub location: String,
}

/// A destination for the digest (file, email, chat, ...)
///
/// Delivery is two-phase across all sinks of a run. Every sink `prepare`s
/// first; only when all of them succeed does each `publish`. Anything that can
/// fail belongs in `prepare`, and `publish` only makes the staged digest visible.
#[async_trait]
pub trait DigestSink: Send + Sync + DynClone {
  fn name(&self) -> &str;

  /// Stage the digest without making it visible
  async fn prepare(&self, digest: &Digest) -> Result<()>;

  /// Make a prepared digest visible, returning where it went
  async fn publish(&self, digest: &Digest) -> Result<String>;

  /// Discard whatever `prepare` staged
  async fn abort(&self, _digest: &Digest) {}
}

dyn_clone::clone_trait_object!(DigestSink);

/// Writes `<dir>/<mode>/<mode>_<timestamp>.json`
#[derive(Debug, Clone)]
pub struct JsonFileSink {
  dir: PathBuf,
}

impl JsonFileSink {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn path_for(&self, digest: &Digest) -> PathBuf {
    self
      .dir
      .join(digest.mode.as_str())
      .join(format!("{}.json", digest.file_stem()))
  }
}

#[async_trait]
impl DigestSink for JsonFileSink {
  fn name(&self) -> &str {
    "json"
  }

  async fn prepare(&self, digest: &Digest) -> Result<()> {
    let path = self.path_for(digest);
    let json = serde_json::to_vec_pretty(digest)?;
    stage_file(&path, &json).await.map_err(|e| sink_error(self.name(), &path, e))
  }

  async fn publish(&self, digest: &Digest) -> Result<String> {
    let path = self.path_for(digest);
    commit_file(&path).await.map_err(|e| sink_error(self.name(), &path, e))?;
    info!(path = %path.display(), "Digest written");
    Ok(path.display().to_string())
  }

  async fn abort(&self, digest: &Digest) {
    discard_file(&self.path_for(digest)).await;
  }
}

/// Writes `<dir>/<mode>/<mode>_<timestamp>.md`
#[derive(Debug, Clone)]
pub struct MarkdownFileSink {
  dir: PathBuf,
}

impl MarkdownFileSink {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn path_for(&self, digest: &Digest) -> PathBuf {
    self
      .dir
      .join(digest.mode.as_str())
      .join(format!("{}.md", digest.file_stem()))
  }
}

#[async_trait]
impl DigestSink for MarkdownFileSink {
  fn name(&self) -> &str {
    "markdown"
  }

  async fn prepare(&self, digest: &Digest) -> Result<()> {
    let path = self.path_for(digest);
    stage_file(&path, digest.render_markdown().as_bytes())
      .await
      .map_err(|e| sink_error(self.name(), &path, e))
  }

  async fn publish(&self, digest: &Digest) -> Result<String> {
    let path = self.path_for(digest);
    commit_file(&path).await.map_err(|e| sink_error(self.name(), &path, e))?;
    info!(path = %path.display(), "Digest written");
    Ok(path.display().to_string())
  }

  async fn abort(&self, digest: &Digest) {
    discard_file(&self.path_for(digest)).await;
  }
}

/// `<name>.tmp` beside the final file; readers never see a partial digest
fn staged_path(path: &Path) -> PathBuf {
  let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".tmp");
  path.with_file_name(name)
}

async fn stage_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }
  tokio::fs::write(staged_path(path), bytes).await
}

async fn commit_file(path: &Path) -> std::io::Result<()> {
  tokio::fs::rename(staged_path(path), path).await
}

async fn discard_file(path: &Path) {
  let staged = staged_path(path);
  if let Err(e) = tokio::fs::remove_file(&staged).await
    && e.kind() != std::io::ErrorKind::NotFound
  {
    warn!(err = %e, path = %staged.display(), "Failed to discard staged digest");
  }
}

fn sink_error(sink: &str, path: &Path, e: std::io::Error) -> PipelineError {
  PipelineError::Sink {
    sink: sink.to_string(),
    message: format!("{}: {}", path.display(), e),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fixtures::{cluster, now, ranked};
  use holdwatch_core::Severity;
  use llm::Summary;
  use tempfile::TempDir;

  fn digest() -> Digest {
    let probe = cluster("AAPL", "Apple faces probe", Severity::High, 3);
    let chip = cluster("NVDA", "Nvidia unveils chip", Severity::Low, 1);
    let mut nvda = ranked("NVDA", 2, vec![chip.clone()]);
    nvda.priority = Priority::Low;

    Digest {
      run_id: RunId::new(),
      mode: RunMode::Daily,
      generated_at: now(),
      window: TimeWindow::ending_at(now(), 1),
      ranked: vec![
        ranked("AAPL", 1, vec![probe.clone()]),
        nvda,
        ranked("MSFT", 3, vec![]),
        ranked("TSLA", 4, vec![]),
      ],
      analyses: vec![
        AnalysisOutcome::Summarized {
          cluster_id: probe.id().clone(),
          ticker: "AAPL".into(),
          provider: "keyword".into(),
          summary: Summary {
            summary: "Regulators opened a probe.".into(),
            severity: Severity::High,
            key_points: vec![],
          },
        },
        AnalysisOutcome::Failed {
          cluster_id: chip.id().clone(),
          ticker: "NVDA".into(),
          error: "Analysis timed out after 60s".into(),
        },
      ],
      stats: RunStats {
        articles_matched: 4,
        articles_admitted: 2,
        ..Default::default()
      },
    }
  }

  #[test]
  fn test_render_markdown_groups_by_priority() {
    let markdown = digest().render_markdown();

    assert!(markdown.starts_with("# Holdwatch daily digest (2025-03-10 12:00 UTC)"));
    assert!(markdown.contains("4 articles → 2 kept (50% reduction)"));

    let high = markdown.find("## HIGH").unwrap();
    let low = markdown.find("## LOW").unwrap();
    let quiet = markdown.find("## No news").unwrap();
    assert!(high < low && low < quiet);
    assert!(!markdown.contains("## MEDIUM"));

    assert!(markdown.contains("### 1. AAPL (AAPL Corp) score 10.00"));
    assert!(markdown.contains("- [high] Regulators opened a probe."));
    assert!(markdown.contains("- [Apple faces probe](https://wire.example/apple-faces-probe) (Wire)"));
    assert!(markdown.contains("- analysis unavailable: Analysis timed out after 60s"));
    assert!(markdown.trim_end().ends_with("MSFT, TSLA"));
  }

  #[tokio::test]
  async fn test_file_sinks_write_under_mode_dir() {
    let dir = TempDir::new().unwrap();
    let digest = digest();

    let json = JsonFileSink::new(dir.path());
    let expected = dir.path().join("daily").join("daily_20250310_1200.json");
    json.prepare(&digest).await.unwrap();
    // Staged, not yet visible
    assert!(!expected.exists());
    let location = json.publish(&digest).await.unwrap();
    assert_eq!(location, expected.display().to_string());

    let loaded: Digest = serde_json::from_str(&std::fs::read_to_string(&expected).unwrap()).unwrap();
    assert_eq!(loaded, digest);

    let markdown = MarkdownFileSink::new(dir.path());
    markdown.prepare(&digest).await.unwrap();
    let md = markdown.publish(&digest).await.unwrap();
    assert!(md.ends_with("daily_20250310_1200.md"));
    assert!(std::fs::read_to_string(&md).unwrap().contains("## HIGH"));

    let names: std::collections::BTreeSet<_> = std::fs::read_dir(dir.path().join("daily"))
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
      .collect();
    assert_eq!(
      names,
      ["daily_20250310_1200.json", "daily_20250310_1200.md"]
        .into_iter()
        .map(String::from)
        .collect()
    );
  }

  #[tokio::test]
  async fn test_abort_discards_staged_digest() {
    let dir = TempDir::new().unwrap();
    let digest = digest();
    let json = JsonFileSink::new(dir.path());

    json.prepare(&digest).await.unwrap();
    json.abort(&digest).await;

    let leftovers = std::fs::read_dir(dir.path().join("daily")).unwrap().count();
    assert_eq!(leftovers, 0);
    assert!(json.publish(&digest).await.is_err());
  }
}
