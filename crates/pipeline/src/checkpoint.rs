//! Committed stage outputs of one run.
//!
//! Each stage's output is stored behind `Arc` once the stage completes and is
//! never modified afterwards. A checkpoint serializes to JSON so an
//! interrupted or failed run can resume after its last completed stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use extract::FilterStats;
use holdwatch_core::{DuplicateCluster, FilteredCluster, NormalizedArticle, RankedHolding, RawArticle, RunContext, RunMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyze::AnalysisOutcome;
use crate::delivery::{Delivery, Digest};
use crate::error::{Result, StageFailure};
use crate::ingest::SourceFailure;
use crate::stage::Stage;

/// Counters collected as stages complete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
  pub sources_ok: usize,
  pub source_failures: Vec<SourceFailure>,
  pub articles_fetched: usize,
  pub articles_matched: usize,
  /// Articles that matched no holding
  pub articles_dropped: usize,
  pub articles_out_of_window: usize,
  pub clusters: usize,
  pub similarity_errors: usize,
  pub clusters_admitted: usize,
  pub articles_admitted: usize,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub filter_warning: Option<String>,
  pub holdings_ranked: usize,
  pub analyses_ok: usize,
  pub analyses_failed: usize,
}

impl RunStats {
  /// "N articles → M kept (X% reduction)" over clustered articles
  pub fn filter_summary(&self) -> String {
    FilterStats {
      clusters_in: self.clusters,
      articles_in: self.articles_matched,
      clusters_kept: self.clusters_admitted,
      articles_kept: self.articles_admitted,
    }
    .to_string()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
  pub context: RunContext,
  /// Analysis runs; delivery and the history log are skipped
  pub dry_run: bool,
  pub completed: Option<Stage>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failure: Option<StageFailure>,
  pub stats: RunStats,

  pub raw: Option<Arc<Vec<RawArticle>>>,
  pub normalized: Option<Arc<Vec<Arc<NormalizedArticle>>>>,
  pub clusters: Option<Arc<Vec<Arc<DuplicateCluster>>>>,
  pub filtered: Option<Arc<Vec<FilteredCluster>>>,
  pub ranked: Option<Arc<Vec<RankedHolding>>>,
  pub analyses: Option<Arc<Vec<AnalysisOutcome>>>,
  pub digest: Option<Arc<Digest>>,
  #[serde(default)]
  pub delivered_to: Vec<Delivery>,
}

impl Checkpoint {
  pub fn new(context: RunContext, dry_run: bool) -> Self {
    Self {
      context,
      dry_run,
      completed: None,
      failure: None,
      stats: RunStats::default(),
      raw: None,
      normalized: None,
      clusters: None,
      filtered: None,
      ranked: None,
      analyses: None,
      digest: None,
      delivered_to: Vec::new(),
    }
  }

  pub fn mode(&self) -> RunMode {
    self.context.mode
  }

  /// The stage a resumed run starts from
  pub fn next_stage(&self) -> Stage {
    match self.completed {
      None => Stage::Init,
      Some(stage) => stage.next().unwrap_or(Stage::Done),
    }
  }

  pub fn is_done(&self) -> bool {
    self.completed == Some(Stage::Done)
  }

  pub(crate) fn commit(&mut self, stage: Stage) {
    debug!(run_id = %self.context.run_id, stage = %stage, "Stage committed");
    self.completed = Some(stage);
    self.failure = None;
  }

  /// `<state_dir>/checkpoints/<mode>.json`
  pub fn path_for(state_dir: &Path, mode: RunMode) -> PathBuf {
    state_dir.join("checkpoints").join(format!("{}.json", mode))
  }

  pub fn save(&self, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec(self)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
  }

  pub fn load(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
  }

  pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
    if !path.exists() {
      return Ok(None);
    }
    Self::load(path).map(Some)
  }
}
