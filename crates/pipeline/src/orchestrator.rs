//! Run state machine.
//!
//! ```text
//! INIT → INGEST → NORMALIZE → DEDUPE → FILTER → RANK → ANALYZE → DELIVER → LOG → DONE
//! ```
//!
//! Every stage reads the committed output of earlier stages from the
//! [`Checkpoint`] and commits its own. A failed stage leaves earlier outputs
//! untouched, so resuming re-runs only the stages after the last completed one.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use extract::{Deduplicator, Normalizer, Ranker, RelevanceFilter, merge_holdings};
use holdwatch_core::{Config, HistoryRecord, Holding, RunContext, RunId, RunMode};
use llm::AnalysisProvider;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::analyze;
use crate::checkpoint::{Checkpoint, RunStats};
use crate::delivery::{Delivery, Digest, DigestSink};
use crate::error::{PipelineError, Result, StageFailure};
use crate::history::HistoryLog;
use crate::ingest::{ArticleSource, fetch_all};
use crate::lock::RunLock;
use crate::stage::Stage;

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
  pub run_id: RunId,
  pub mode: RunMode,
  pub dry_run: bool,
  pub digest: Arc<Digest>,
  pub deliveries: Vec<Delivery>,
  pub stats: RunStats,
}

pub struct Orchestrator {
  config: Config,
  holdings: Vec<Holding>,
  sources: Vec<Box<dyn ArticleSource>>,
  provider: Box<dyn AnalysisProvider>,
  sinks: Vec<Box<dyn DigestSink>>,
  history: Box<dyn HistoryLog>,
  /// Run locks and checkpoints; unset keeps everything in memory
  state_dir: Option<PathBuf>,
  cancel: CancellationToken,
}

impl Orchestrator {
  pub fn new(
    config: Config,
    holdings: &[Holding],
    provider: Box<dyn AnalysisProvider>,
    history: Box<dyn HistoryLog>,
  ) -> Self {
    Self {
      config,
      holdings: merge_holdings(holdings),
      sources: Vec::new(),
      provider,
      sinks: Vec::new(),
      history,
      state_dir: None,
      cancel: CancellationToken::new(),
    }
  }

  pub fn with_source(mut self, source: Box<dyn ArticleSource>) -> Self {
    self.sources.push(source);
    self
  }

  pub fn with_sink(mut self, sink: Box<dyn DigestSink>) -> Self {
    self.sinks.push(sink);
    self
  }

  pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.state_dir = Some(dir.into());
    self
  }

  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.cancel = token;
    self
  }

  /// Context for a new run; `days_back` overrides the mode's window
  pub fn context(&self, mode: RunMode, now: DateTime<Utc>, days_back: Option<i64>) -> RunContext {
    let days = days_back.unwrap_or_else(|| self.config.pipeline.days_for(mode));
    RunContext::with_days(mode, now, days)
  }

  /// Checkpoint left by an earlier unfinished run of `mode`
  pub fn load_checkpoint(&self, mode: RunMode) -> Result<Option<Checkpoint>> {
    let Some(dir) = &self.state_dir else {
      return Ok(None);
    };
    let Some(checkpoint) = Checkpoint::load_if_exists(&Checkpoint::path_for(dir, mode))? else {
      return Ok(None);
    };
    if checkpoint.mode() != mode {
      return Err(PipelineError::CheckpointMismatch {
        expected: mode,
        found: checkpoint.mode(),
      });
    }
    Ok(Some(checkpoint))
  }

  /// Start a fresh run
  pub async fn run(&self, ctx: RunContext, dry_run: bool) -> Result<RunReport> {
    self.drive(Checkpoint::new(ctx, dry_run)).await
  }

  /// Continue a run after its last completed stage
  pub async fn resume(&self, checkpoint: Checkpoint) -> Result<RunReport> {
    info!(
      run_id = %checkpoint.context.run_id,
      mode = %checkpoint.mode(),
      from = %checkpoint.next_stage(),
      "Resuming run"
    );
    self.drive(checkpoint).await
  }

  async fn drive(&self, mut checkpoint: Checkpoint) -> Result<RunReport> {
    let mode = checkpoint.mode();
    let _lock = match &self.state_dir {
      Some(dir) => Some(RunLock::acquire(dir, mode)?),
      None => None,
    };

    info!(
      run_id = %checkpoint.context.run_id,
      mode = %mode,
      window_start = %checkpoint.context.window.start,
      window_end = %checkpoint.context.window.end,
      dry_run = checkpoint.dry_run,
      "Run started"
    );

    while !checkpoint.is_done() {
      let stage = checkpoint.next_stage();
      if self.cancel.is_cancelled() {
        warn!(stage = %stage, "Run cancelled at stage boundary");
        self.persist(&checkpoint);
        return Err(PipelineError::Cancelled {
          last_completed: checkpoint.completed,
        });
      }

      info!(stage = %stage, external = stage.is_external(), "Stage started");
      if let Err(e) = self.execute(stage, &mut checkpoint).await {
        let message = match e {
          PipelineError::Stage(inner) => inner.message,
          other => other.to_string(),
        };
        error!(
          stage = %stage,
          last_completed = ?checkpoint.completed,
          err = %message,
          "Stage failed"
        );
        let failure = StageFailure::new(stage, message, checkpoint.completed);
        checkpoint.failure = Some(failure.clone());
        self.persist(&checkpoint);
        return Err(failure.into());
      }
      checkpoint.commit(stage);
      self.persist(&checkpoint);
    }

    self.clear_checkpoint(mode);
    let digest = checkpoint
      .digest
      .clone()
      .ok_or_else(|| StageFailure::new(Stage::Done, "no digest was produced", checkpoint.completed))?;

    info!(
      run_id = %checkpoint.context.run_id,
      holdings = checkpoint.stats.holdings_ranked,
      analyses = checkpoint.stats.analyses_ok,
      filter = %checkpoint.stats.filter_summary(),
      "Run complete"
    );

    Ok(RunReport {
      run_id: checkpoint.context.run_id,
      mode,
      dry_run: checkpoint.dry_run,
      digest,
      deliveries: checkpoint.delivered_to,
      stats: checkpoint.stats,
    })
  }

  async fn execute(&self, stage: Stage, cp: &mut Checkpoint) -> Result<()> {
    match stage {
      Stage::Init => self.init(cp).await,
      Stage::Ingest => self.ingest(cp).await,
      Stage::Normalize => self.normalize(cp),
      Stage::Dedupe => self.dedupe(cp),
      Stage::Filter => self.filter(cp),
      Stage::Rank => self.rank(cp),
      Stage::Analyze => self.analyze(cp).await,
      Stage::Deliver => self.deliver(cp).await,
      Stage::Log => self.log(cp).await,
      Stage::Done => Ok(()),
    }
  }

  /// Validate inputs and load prior history for aggregate modes
  async fn init(&self, cp: &mut Checkpoint) -> Result<()> {
    if self.holdings.is_empty() {
      return Err(StageFailure::new(Stage::Init, "portfolio has no holdings", None).into());
    }

    if cp.context.mode.uses_history() {
      let run_id = cp.context.run_id;
      let records: Vec<HistoryRecord> = self
        .history
        .read_since(cp.context.window.start)
        .await?
        .into_iter()
        .filter(|r| r.run_id != run_id && r.timestamp <= cp.context.now)
        .collect();
      info!(records = records.len(), "Loaded run history");
      cp.context.history = Arc::new(records);
    }
    Ok(())
  }

  async fn ingest(&self, cp: &mut Checkpoint) -> Result<()> {
    let outcome = fetch_all(
      &self.sources,
      &cp.context.window,
      self.config.pipeline.max_concurrent_sources,
    )
    .await;

    if outcome.sources_ok == 0 && !outcome.failures.is_empty() {
      return Err(StageFailure::new(Stage::Ingest, "every news source failed", cp.completed).into());
    }

    cp.stats.sources_ok = outcome.sources_ok;
    cp.stats.source_failures = outcome.failures;
    cp.stats.articles_fetched = outcome.articles.len();
    cp.raw = Some(Arc::new(outcome.articles));
    Ok(())
  }

  fn normalize(&self, cp: &mut Checkpoint) -> Result<()> {
    let raw = committed(&cp.raw, Stage::Ingest)?;
    let normalizer = Normalizer::new(&self.holdings, &self.config.normalize, &self.config.dedup);

    let mut normalized = normalizer.normalize_all(raw.iter().cloned(), &cp.context);
    let articles: Vec<_> = normalized.by_ref().map(Arc::new).collect();
    let stats = normalized.stats();
    info!(
      seen = stats.seen,
      kept = stats.kept,
      dropped = stats.dropped,
      out_of_window = stats.out_of_window,
      "Articles normalized"
    );

    cp.stats.articles_matched = stats.kept;
    cp.stats.articles_dropped = stats.dropped;
    cp.stats.articles_out_of_window = stats.out_of_window;
    cp.normalized = Some(Arc::new(articles));
    Ok(())
  }

  fn dedupe(&self, cp: &mut Checkpoint) -> Result<()> {
    let articles = committed(&cp.normalized, Stage::Normalize)?;
    let outcome = Deduplicator::new(&self.config.dedup).cluster(&articles);
    info!(
      articles = articles.len(),
      clusters = outcome.clusters.len(),
      pairs = outcome.pairs_compared,
      similarity_errors = outcome.similarity_errors,
      "Articles deduplicated"
    );

    cp.stats.clusters = outcome.clusters.len();
    cp.stats.similarity_errors = outcome.similarity_errors;
    cp.clusters = Some(Arc::new(outcome.clusters));
    Ok(())
  }

  fn filter(&self, cp: &mut Checkpoint) -> Result<()> {
    let clusters = committed(&cp.clusters, Stage::Dedupe)?;
    let outcome = RelevanceFilter::new(&self.config.filter).apply(&clusters, &cp.context);
    info!(
      suppressed = outcome.suppressed.len(),
      "{}", outcome.stats
    );

    cp.stats.clusters_admitted = outcome.stats.clusters_kept;
    cp.stats.articles_admitted = outcome.stats.articles_kept;
    cp.stats.filter_warning = outcome.warning.map(|w| w.to_string());
    cp.filtered = Some(Arc::new(outcome.admitted));
    Ok(())
  }

  fn rank(&self, cp: &mut Checkpoint) -> Result<()> {
    let filtered = committed(&cp.filtered, Stage::Filter)?;
    let ranked = Ranker::new(&self.config.rank).rank(&self.holdings, &filtered, &cp.context);
    if let Some(top) = ranked.first() {
      info!(holdings = ranked.len(), top = %top.ticker, score = top.score, "Holdings ranked");
    }

    cp.stats.holdings_ranked = ranked.len();
    cp.ranked = Some(Arc::new(ranked));
    Ok(())
  }

  async fn analyze(&self, cp: &mut Checkpoint) -> Result<()> {
    let ranked = committed(&cp.ranked, Stage::Rank)?;
    let requests = analyze::plan(&ranked, &self.config.analysis);
    let outcomes = analyze::dispatch(self.provider.as_ref(), requests, self.config.analysis.max_concurrent).await;

    cp.stats.analyses_failed = outcomes.iter().filter(|o| o.is_failed()).count();
    cp.stats.analyses_ok = outcomes.len() - cp.stats.analyses_failed;
    cp.analyses = Some(Arc::new(outcomes));
    Ok(())
  }

  async fn deliver(&self, cp: &mut Checkpoint) -> Result<()> {
    let ranked = committed(&cp.ranked, Stage::Rank)?;
    let analyses = committed(&cp.analyses, Stage::Analyze)?;
    let digest = Arc::new(Digest {
      run_id: cp.context.run_id,
      mode: cp.context.mode,
      generated_at: cp.context.now,
      window: cp.context.window,
      ranked: ranked.as_ref().clone(),
      analyses: analyses.as_ref().clone(),
      stats: cp.stats.clone(),
    });
    cp.digest = Some(digest.clone());

    if cp.dry_run {
      info!("Dry run: delivery skipped");
      return Ok(());
    }

    // A resumed run does not deliver twice to the same sink
    let pending: Vec<&dyn DigestSink> = self
      .sinks
      .iter()
      .map(|s| &**s)
      .filter(|s| !cp.delivered_to.iter().any(|d| d.sink == s.name()))
      .collect();

    // Nothing becomes visible unless every sink staged successfully
    for (i, sink) in pending.iter().enumerate() {
      if let Err(e) = sink.prepare(&digest).await {
        warn!(sink = sink.name(), err = %e, "Digest staging failed, nothing published");
        for staged in &pending[..i] {
          staged.abort(&digest).await;
        }
        return Err(e);
      }
    }

    for sink in pending {
      let location = sink.publish(&digest).await?;
      cp.delivered_to.push(Delivery {
        sink: sink.name().to_string(),
        location,
      });
    }
    Ok(())
  }

  async fn log(&self, cp: &mut Checkpoint) -> Result<()> {
    if cp.dry_run {
      info!("Dry run: history log skipped");
      return Ok(());
    }
    let ranked = committed(&cp.ranked, Stage::Rank)?;
    let record = HistoryRecord {
      run_id: cp.context.run_id,
      mode: cp.context.mode,
      timestamp: cp.context.now,
      ranked: ranked.as_ref().clone(),
    };
    self.history.append(&record).await
  }

  fn persist(&self, checkpoint: &Checkpoint) {
    let Some(dir) = &self.state_dir else {
      return;
    };
    let path = Checkpoint::path_for(dir, checkpoint.mode());
    if let Err(e) = checkpoint.save(&path) {
      warn!(err = %e, path = %path.display(), "Failed to save checkpoint");
    }
  }

  fn clear_checkpoint(&self, mode: RunMode) {
    let Some(dir) = &self.state_dir else {
      return;
    };
    let path = Checkpoint::path_for(dir, mode);
    if path.exists()
      && let Err(e) = std::fs::remove_file(&path)
    {
      warn!(err = %e, path = %path.display(), "Failed to remove checkpoint");
    }
  }
}

/// Output a stage depends on; missing output means the checkpoint is inconsistent
fn committed<T: ?Sized>(output: &Option<Arc<T>>, producer: Stage) -> Result<Arc<T>> {
  output
    .clone()
    .ok_or_else(|| StageFailure::new(producer, format!("{} output missing from checkpoint", producer), None).into())
}
