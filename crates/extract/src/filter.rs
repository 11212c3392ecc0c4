use holdwatch_core::{AdmitReason, ClusterId, DuplicateCluster, FilterConfig, FilteredCluster, RunContext, Severity};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::FilterPolicyError;
use crate::severity::KeywordClassifier;

/// Why a cluster did not proceed to analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
  /// References no portfolio holding
  NoHoldings,
  /// Every member was published outside the run window
  OutOfWindow,
  /// No enabled admission criterion held
  BelowPolicy,
}

/// A dropped cluster, kept for observability
#[derive(Debug, Clone, PartialEq)]
pub struct Suppression {
  pub cluster: ClusterId,
  pub size: usize,
  pub reason: SuppressReason,
  pub severity: Severity,
}

/// Article and cluster counts before and after filtering
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterStats {
  pub clusters_in: usize,
  pub articles_in: usize,
  pub clusters_kept: usize,
  pub articles_kept: usize,
}

impl FilterStats {
  /// Share of articles removed, 0-100
  pub fn reduction_percent(&self) -> f64 {
    if self.articles_in == 0 {
      return 0.0;
    }
    (1.0 - self.articles_kept as f64 / self.articles_in as f64) * 100.0
  }
}

impl std::fmt::Display for FilterStats {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{} articles → {} kept ({:.0}% reduction)",
      self.articles_in,
      self.articles_kept,
      self.reduction_percent()
    )
  }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
  /// Admitted clusters, in input (cluster id) order
  pub admitted: Vec<FilteredCluster>,
  pub suppressed: Vec<Suppression>,
  pub stats: FilterStats,
  /// Set when a non-empty input produced no survivors
  pub warning: Option<FilterPolicyError>,
}

/// Decides which clusters are worth an analysis call.
///
/// A cluster is admitted when any enabled criterion holds: corroboration by
/// enough articles, a severe enough keyword, or recency. Loosening any
/// threshold only ever admits more.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
  config: FilterConfig,
  classifier: KeywordClassifier,
}

impl RelevanceFilter {
  pub fn new(config: &FilterConfig) -> Self {
    Self {
      classifier: KeywordClassifier::new(&config.keywords),
      config: config.clone(),
    }
  }

  /// Evaluate one cluster
  pub fn evaluate(&self, cluster: &Arc<DuplicateCluster>, ctx: &RunContext) -> Result<FilteredCluster, Suppression> {
    let assessment = self.classifier.assess(cluster);
    let suppress = |reason| Suppression {
      cluster: cluster.id.clone(),
      size: cluster.size(),
      reason,
      severity: assessment.severity,
    };

    if cluster.tickers.is_empty() {
      return Err(suppress(SuppressReason::NoHoldings));
    }
    if self.config.exclude_out_of_window && !cluster.in_window {
      return Err(suppress(SuppressReason::OutOfWindow));
    }

    let mut reasons = Vec::new();

    if let Some(min) = self.config.min_cluster_size
      && cluster.size() >= min
    {
      reasons.push(AdmitReason::Corroborated { size: cluster.size() });
    }

    if let Some(min) = self.config.min_keyword_severity
      && let Some(hit) = assessment.strongest_at_least(min)
    {
      reasons.push(AdmitReason::Keyword {
        keyword: hit.keyword.clone(),
        severity: hit.severity,
      });
    }

    if let Some(hours) = self.config.recency_hours
      && let Some(latest) = cluster.latest
    {
      let age = ctx.age_hours(latest);
      if age <= hours as f64 {
        reasons.push(AdmitReason::Recent {
          age_hours: age.floor() as i64,
        });
      }
    }

    if reasons.is_empty() {
      return Err(suppress(SuppressReason::BelowPolicy));
    }

    Ok(FilteredCluster {
      cluster: Arc::clone(cluster),
      severity: assessment.severity,
      keywords: assessment.keywords(),
      reasons,
    })
  }

  pub fn apply(&self, clusters: &[Arc<DuplicateCluster>], ctx: &RunContext) -> FilterOutcome {
    let mut outcome = FilterOutcome {
      stats: FilterStats {
        clusters_in: clusters.len(),
        articles_in: clusters.iter().map(|c| c.size()).sum(),
        ..Default::default()
      },
      ..Default::default()
    };

    for cluster in clusters {
      match self.evaluate(cluster, ctx) {
        Ok(admitted) => {
          debug!(cluster = %admitted.id(), reasons = ?admitted.reasons, "cluster admitted");
          outcome.stats.clusters_kept += 1;
          outcome.stats.articles_kept += cluster.size();
          outcome.admitted.push(admitted);
        }
        Err(suppression) => {
          debug!(cluster = %suppression.cluster, reason = ?suppression.reason, "cluster suppressed");
          outcome.suppressed.push(suppression);
        }
      }
    }

    if outcome.admitted.is_empty() && !clusters.is_empty() {
      let error = FilterPolicyError::NoSurvivors {
        clusters: outcome.stats.clusters_in,
        articles: outcome.stats.articles_in,
      };
      warn!("{}", error);
      outcome.warning = Some(error);
    }

    outcome
  }
}

impl Default for RelevanceFilter {
  fn default() -> Self {
    Self::new(&FilterConfig::default())
  }
}
