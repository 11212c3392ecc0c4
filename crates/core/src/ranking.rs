use serde::{Deserialize, Serialize};

use crate::cluster::FilteredCluster;
use crate::holding::Holding;

/// Attention bucket shown in the digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  High,
  Medium,
  Low,
  #[default]
  None,
}

impl Priority {
  pub fn as_str(&self) -> &'static str {
    match self {
      Priority::High => "high",
      Priority::Medium => "medium",
      Priority::Low => "low",
      Priority::None => "none",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Priority::High => "HIGH",
      Priority::Medium => "MEDIUM",
      Priority::Low => "LOW",
      Priority::None => "-",
    }
  }
}

impl std::fmt::Display for Priority {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A holding with its position in this run's attention ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHolding {
  pub holding: Holding,
  /// Canonical ticker the ranking was computed for
  pub ticker: String,
  pub clusters: Vec<FilteredCluster>,
  pub score: f64,
  /// 1-based position; unique within a run
  pub rank: usize,
  pub priority: Priority,
  /// Short explanation of the score; empty when there was no news
  pub justification: String,
}

impl RankedHolding {
  pub fn has_news(&self) -> bool {
    !self.clusters.is_empty()
  }
}
