//! Analysis planning and dispatch.
//!
//! Requests are planned per cluster, walking holdings in rank order so the
//! most urgent holdings are analyzed first. Failures are recorded per cluster
//! and never fail the run.

use std::collections::HashSet;

use futures::{StreamExt, stream};
use holdwatch_core::{AnalysisConfig, ClusterId, FilteredCluster, RankedHolding};
use llm::{AnalysisProvider, AnalysisRequest, Summary, prompts};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Result of analyzing one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisOutcome {
  Summarized {
    cluster_id: ClusterId,
    ticker: String,
    provider: String,
    summary: Summary,
  },
  Failed {
    cluster_id: ClusterId,
    ticker: String,
    error: String,
  },
}

impl AnalysisOutcome {
  pub fn cluster_id(&self) -> &ClusterId {
    match self {
      AnalysisOutcome::Summarized { cluster_id, .. } | AnalysisOutcome::Failed { cluster_id, .. } => cluster_id,
    }
  }

  pub fn ticker(&self) -> &str {
    match self {
      AnalysisOutcome::Summarized { ticker, .. } | AnalysisOutcome::Failed { ticker, .. } => ticker,
    }
  }

  pub fn summary(&self) -> Option<&Summary> {
    match self {
      AnalysisOutcome::Summarized { summary, .. } => Some(summary),
      AnalysisOutcome::Failed { .. } => None,
    }
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, AnalysisOutcome::Failed { .. })
  }
}

/// Order in which a holding's clusters are sent: most severe, then freshest
fn analysis_order(a: &FilteredCluster, b: &FilteredCluster) -> std::cmp::Ordering {
  b.severity
    .cmp(&a.severity)
    .then_with(|| b.cluster.latest.cmp(&a.cluster.latest))
    .then_with(|| a.id().cmp(b.id()))
}

/// One request per cluster, at most `max_clusters_per_holding` per holding.
///
/// A cluster that concerns several holdings is analyzed once, for the
/// highest-ranked of them.
pub fn plan(ranked: &[RankedHolding], config: &AnalysisConfig) -> Vec<AnalysisRequest> {
  let mut by_rank: Vec<&RankedHolding> = ranked.iter().collect();
  by_rank.sort_by_key(|r| r.rank);

  let mut seen: HashSet<&ClusterId> = HashSet::new();
  let mut requests = Vec::new();
  for entry in by_rank {
    let mut clusters: Vec<&FilteredCluster> = entry.clusters.iter().collect();
    clusters.sort_by(|a, b| analysis_order(a, b));

    let planned = clusters
      .into_iter()
      .filter(|c| seen.insert(c.id()))
      .take(config.max_clusters_per_holding);
    for cluster in planned {
      requests.push(AnalysisRequest::from_cluster(&entry.holding, cluster, config.max_words));
    }
  }

  debug!(requests = requests.len(), holdings = ranked.len(), "Analysis planned");
  requests
}

/// Send every request with at most `max_concurrent` in flight.
///
/// Outcomes are sorted by cluster id, then ticker.
pub async fn dispatch(
  provider: &dyn AnalysisProvider,
  requests: Vec<AnalysisRequest>,
  max_concurrent: usize,
) -> Vec<AnalysisOutcome> {
  let total = requests.len();
  let calls = requests.into_iter().map(|request| async move {
    debug!(
      cluster = %request.cluster_id,
      ticker = %request.ticker,
      est_tokens = prompts::estimate_tokens(&prompts::build_context(&request)),
      "Analyzing cluster"
    );
    match provider.summarize(&request).await {
      Ok(summary) => AnalysisOutcome::Summarized {
        cluster_id: request.cluster_id,
        ticker: request.ticker,
        provider: provider.name().to_string(),
        summary,
      },
      Err(e) => {
        warn!(cluster = %request.cluster_id, ticker = %request.ticker, err = %e, "Analysis failed");
        AnalysisOutcome::Failed {
          cluster_id: request.cluster_id,
          ticker: request.ticker,
          error: e.to_string(),
        }
      }
    }
  });

  let mut outcomes: Vec<AnalysisOutcome> = stream::iter(calls)
    .buffer_unordered(max_concurrent.max(1))
    .collect()
    .await;
  outcomes.sort_by(|a, b| {
    a.cluster_id()
      .cmp(b.cluster_id())
      .then_with(|| a.ticker().cmp(b.ticker()))
  });

  let failed = outcomes.iter().filter(|o| o.is_failed()).count();
  info!(total, failed, provider = %provider.name(), "Analysis complete");
  outcomes
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fixtures::{cluster, ranked};
  use async_trait::async_trait;
  use holdwatch_core::Severity;
  use llm::{AnalysisError, KeywordProvider};
  use pretty_assertions::assert_eq;

  #[derive(Clone)]
  struct RejectingProvider;

  #[async_trait]
  impl AnalysisProvider for RejectingProvider {
    fn name(&self) -> &str {
      "rejecting"
    }

    fn is_available(&self) -> bool {
      true
    }

    async fn summarize(&self, request: &AnalysisRequest) -> llm::Result<Summary> {
      if request.headline.contains("probe") {
        return Err(AnalysisError::Unavailable("quota exhausted".into()));
      }
      Ok(Summary {
        summary: request.headline.clone(),
        severity: request.severity,
        key_points: vec![],
      })
    }
  }

  fn config(max_clusters_per_holding: usize) -> AnalysisConfig {
    AnalysisConfig {
      max_clusters_per_holding,
      ..Default::default()
    }
  }

  #[test]
  fn test_plan_orders_caps_and_shares_clusters() {
    let shared = cluster("AAPL", "Apple faces probe", Severity::High, 5);
    let entries = vec![
      ranked(
        "NVDA",
        2,
        vec![
          shared.clone(),
          cluster("NVDA", "Nvidia unveils chip", Severity::Low, 1),
        ],
      ),
      ranked(
        "AAPL",
        1,
        vec![
          cluster("AAPL", "Apple shares drift", Severity::Low, 1),
          shared.clone(),
          cluster("AAPL", "Apple cuts guidance", Severity::Medium, 2),
        ],
      ),
      ranked("MSFT", 3, vec![]),
    ];

    let requests = plan(&entries, &config(2));
    let planned: Vec<(&str, &str)> = requests
      .iter()
      .map(|r| (r.ticker.as_str(), r.headline.as_str()))
      .collect();
    assert_eq!(
      planned,
      vec![
        ("AAPL", "Apple faces probe"),
        ("AAPL", "Apple cuts guidance"),
        ("NVDA", "Nvidia unveils chip"),
      ]
    );
  }

  #[test]
  fn test_plan_with_zero_cap_is_empty() {
    let entries = vec![ranked("AAPL", 1, vec![cluster("AAPL", "Apple faces probe", Severity::High, 5)])];
    assert!(plan(&entries, &config(0)).is_empty());
  }

  #[tokio::test]
  async fn test_dispatch_records_failures_per_cluster() {
    let entries = vec![ranked(
      "AAPL",
      1,
      vec![
        cluster("AAPL", "Apple faces probe", Severity::High, 5),
        cluster("AAPL", "Apple cuts guidance", Severity::Medium, 2),
      ],
    )];
    let requests = plan(&entries, &config(5));
    let outcomes = dispatch(&RejectingProvider, requests, 2).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.windows(2).all(|w| w[0].cluster_id() <= w[1].cluster_id()));

    let failed: Vec<&AnalysisOutcome> = outcomes.iter().filter(|o| o.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    match failed[0] {
      AnalysisOutcome::Failed { ticker, error, .. } => {
        assert_eq!(ticker, "AAPL");
        assert!(error.contains("quota exhausted"), "{}", error);
      }
      other => panic!("unexpected outcome {:?}", other),
    }

    let ok = outcomes.iter().find_map(|o| o.summary()).unwrap();
    assert_eq!(ok.summary, "Apple cuts guidance");
  }

  #[tokio::test]
  async fn test_dispatch_with_offline_provider() {
    let entries = vec![ranked("NVDA", 1, vec![cluster("NVDA", "Nvidia unveils chip", Severity::Low, 1)])];
    let outcomes = dispatch(&KeywordProvider::default(), plan(&entries, &config(5)), 4).await;
    match &outcomes[..] {
      [AnalysisOutcome::Summarized { provider, summary, .. }] => {
        assert_eq!(provider, "keyword");
        assert!(summary.summary.starts_with("Nvidia unveils chip."), "{}", summary.summary);
      }
      other => panic!("unexpected outcomes {:?}", other),
    }
  }
}
