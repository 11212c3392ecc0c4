//! Analysis capability boundary: `summarize(cluster) -> Summary`
//!
//! The pipeline builds one [`AnalysisRequest`] per surviving cluster and hands
//! it to an [`AnalysisProvider`]. Providers are wrapped for rate limiting and
//! retry by [`create_provider`].

use chrono::{DateTime, Utc};
use holdwatch_core::{AnalysisConfig, ClusterId, FilteredCluster, Holding, Severity};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod command;
mod offline;
pub mod prompts;
mod provider;
mod rate_limit;
mod resilient;

pub use command::CommandProvider;
pub use offline::KeywordProvider;
pub use provider::{AnalysisProvider, Result};
pub use rate_limit::{RateLimitConfig, RateLimitedProvider, SlidingWindowLimiter};
pub use resilient::{RetryConfig, RetryingProvider};

#[derive(Error, Debug)]
pub enum AnalysisError {
  #[error("Failed to spawn analysis command: {0}")]
  SpawnFailed(#[from] std::io::Error),

  #[error("Analysis timed out after {0}s")]
  Timeout(u64),

  #[error("Analysis command exited with code {code}: {stderr}")]
  ProcessFailed { code: i32, stderr: String },

  #[error("Rate limited by analysis service")]
  RateLimited { retry_after: Option<Duration> },

  #[error("Rate limit wait of {0:?} exceeds the allowed maximum")]
  RateLimitWait(Duration),

  #[error("Failed to parse analysis response: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("Analysis returned no response")]
  NoResponse,

  #[error("Analysis provider unavailable: {0}")]
  Unavailable(String),
}

impl AnalysisError {
  /// Failures worth another attempt after a back-off
  pub fn is_retryable(&self) -> bool {
    match self {
      AnalysisError::Timeout(_) | AnalysisError::RateLimited { .. } | AnalysisError::NoResponse => true,
      AnalysisError::ProcessFailed { stderr, .. } => is_transient_message(stderr),
      _ => false,
    }
  }
}

fn is_transient_message(msg: &str) -> bool {
  let msg = msg.to_lowercase();
  ["429", "502", "503", "504", "overloaded", "timed out", "timeout", "connection reset"]
    .iter()
    .any(|needle| msg.contains(needle))
}

/// One analysis request per surviving cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
  pub cluster_id: ClusterId,
  pub ticker: String,
  pub name: String,
  pub market: String,
  pub sector: Option<String>,
  pub headline: String,
  /// Representative body, truncated to the configured word budget
  pub body: String,
  pub member_count: usize,
  pub sources: Vec<String>,
  pub published: Option<DateTime<Utc>>,
  /// Keywords the relevance filter matched, most severe first
  pub keywords: Vec<String>,
  pub severity: Severity,
}

impl AnalysisRequest {
  pub fn from_cluster(holding: &Holding, cluster: &FilteredCluster, max_words: usize) -> Self {
    let representative = &cluster.cluster.representative;
    Self {
      cluster_id: cluster.id().clone(),
      ticker: holding.canonical_ticker(),
      name: holding.name.clone(),
      market: holding.market.as_str().to_string(),
      sector: holding.sector.clone(),
      headline: representative.raw.headline.clone(),
      body: truncate_words(&representative.body, max_words),
      member_count: cluster.cluster.size(),
      sources: cluster.cluster.sources.iter().cloned().collect(),
      published: cluster.cluster.latest,
      keywords: cluster.keywords.clone(),
      severity: cluster.severity,
    }
  }
}

/// Structured result of analyzing one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
  pub summary: String,
  pub severity: Severity,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub key_points: Vec<String>,
}

/// Keep the first `max_words` whitespace-separated words
pub fn truncate_words(text: &str, max_words: usize) -> String {
  let mut words = text.split_whitespace();
  let kept: Vec<&str> = words.by_ref().take(max_words).collect();
  let mut out = kept.join(" ");
  if words.next().is_some() {
    out.push_str(" ...");
  }
  out
}

/// Extract JSON from a response that may be wrapped in a markdown code block
pub fn extract_code_block(text: &str) -> &str {
  let trimmed = text.trim();
  let Some(start) = trimmed.find("```") else {
    return trimmed;
  };
  let after = &trimmed[start + 3..];
  // Skip a language tag like ```json
  let body = match after.find('\n') {
    Some(newline) => &after[newline + 1..],
    None => after,
  };
  match body.rfind("```") {
    Some(end) => body[..end].trim(),
    None => body.trim(),
  }
}

/// Parse a JSON payload out of model output
pub fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
  let json = extract_code_block(text);
  if json.is_empty() {
    return Err(AnalysisError::NoResponse);
  }
  Ok(serde_json::from_str(json)?)
}

/// Build the configured provider, wrapped with rate limiting and retry.
///
/// Without a configured command the offline keyword provider is used, so a run
/// never depends on an external service being installed.
pub fn create_provider(config: &AnalysisConfig) -> Box<dyn AnalysisProvider> {
  let base: Box<dyn AnalysisProvider> = match &config.command {
    Some(command) => {
      let provider = CommandProvider::new(command.clone(), config.args.clone(), config.timeout_secs);
      if provider.is_available() {
        Box::new(provider)
      } else {
        tracing::warn!(command = %command, "analysis command not found, using keyword summaries");
        Box::new(KeywordProvider::default())
      }
    }
    None => Box::new(KeywordProvider::default()),
  };

  let limited = RateLimitedProvider::new(base, RateLimitConfig::from_analysis(config));
  Box::new(RetryingProvider::new(Box::new(limited), RetryConfig::from_analysis(config)))
}
