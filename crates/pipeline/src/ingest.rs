//! News ingestion: independent sources fetched concurrently, merged in a
//! deterministic order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dyn_clone::DynClone;
use futures::{StreamExt, stream};
use holdwatch_core::{RawArticle, TimeWindow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// A news feed that yields raw articles for a window
#[async_trait]
pub trait ArticleSource: Send + Sync + DynClone {
  fn name(&self) -> &str;

  async fn fetch(&self, window: &TimeWindow) -> Result<Vec<RawArticle>>;
}

dyn_clone::clone_trait_object!(ArticleSource);

/// Reads articles from a JSON array or JSON Lines file.
///
/// The window is not applied here; out-of-window articles are tagged later by
/// the normalizer.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
  name: String,
  path: PathBuf,
}

impl JsonFileSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let name = path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    Self { name, path }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[async_trait]
impl ArticleSource for JsonFileSource {
  fn name(&self) -> &str {
    &self.name
  }

  async fn fetch(&self, _window: &TimeWindow) -> Result<Vec<RawArticle>> {
    let content = tokio::fs::read_to_string(&self.path)
      .await
      .map_err(|e| self.error(format!("read {}: {}", self.path.display(), e)))?;

    let is_jsonl = self.path.extension().is_some_and(|ext| ext == "jsonl");
    if !is_jsonl {
      return serde_json::from_str(&content).map_err(|e| self.error(e.to_string()));
    }

    let mut articles = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      match serde_json::from_str::<RawArticle>(line) {
        Ok(article) => articles.push(article),
        Err(e) => warn!(source = %self.name, line = line_no + 1, err = %e, "Skipping malformed article"),
      }
    }
    Ok(articles)
  }
}

impl JsonFileSource {
  fn error(&self, message: String) -> PipelineError {
    PipelineError::Source {
      source_name: self.name.clone(),
      message,
    }
  }
}

/// A source that failed during ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
  pub source: String,
  pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
  /// Sources ordered by name, then input order; articles keep feed order
  pub articles: Vec<RawArticle>,
  pub sources_ok: usize,
  pub failures: Vec<SourceFailure>,
}

/// Fetch every source with at most `max_concurrent` in flight.
///
/// A failing source is recorded and skipped. The merged order does not depend
/// on which fetch finishes first.
pub async fn fetch_all(
  sources: &[Box<dyn ArticleSource>],
  window: &TimeWindow,
  max_concurrent: usize,
) -> IngestOutcome {
  let fetches = sources.iter().enumerate().map(|(i, source)| async move {
    debug!(source = %source.name(), "Fetching source");
    (i, source.fetch(window).await)
  });
  let results: Vec<(usize, Result<Vec<RawArticle>>)> = stream::iter(fetches)
    .buffer_unordered(max_concurrent.max(1))
    .collect()
    .await;

  let mut ordered: Vec<(&str, usize, Result<Vec<RawArticle>>)> =
    results.into_iter().map(|(i, r)| (sources[i].name(), i, r)).collect();
  ordered.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)));

  let mut outcome = IngestOutcome::default();
  for (name, _, result) in ordered {
    match result {
      Ok(articles) => {
        debug!(source = %name, count = articles.len(), "Source fetched");
        outcome.sources_ok += 1;
        outcome.articles.extend(articles);
      }
      Err(e) => {
        warn!(source = %name, err = %e, "Source failed, continuing");
        outcome.failures.push(SourceFailure {
          source: name.to_string(),
          error: e.to_string(),
        });
      }
    }
  }

  info!(
    sources = sources.len(),
    failed = outcome.failures.len(),
    articles = outcome.articles.len(),
    "Ingestion complete"
  );
  outcome
}
