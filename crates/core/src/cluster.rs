use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::article::{ArticleId, NormalizedArticle};

/// How serious a news event is for the holding it concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  #[default]
  None,
  Low,
  Medium,
  High,
  Critical,
}

impl Severity {
  /// Contribution to the urgency score (0.0 to 1.0)
  pub fn weight(&self) -> f64 {
    match self {
      Severity::None => 0.0,
      Severity::Low => 0.25,
      Severity::Medium => 0.5,
      Severity::High => 0.75,
      Severity::Critical => 1.0,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Severity::None => "none",
      Severity::Low => "low",
      Severity::Medium => "medium",
      Severity::High => "high",
      Severity::Critical => "critical",
    }
  }
}

impl std::fmt::Display for Severity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for Severity {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "none" => Ok(Severity::None),
      "low" => Ok(Severity::Low),
      "medium" | "med" => Ok(Severity::Medium),
      "high" => Ok(Severity::High),
      "critical" => Ok(Severity::Critical),
      _ => Err(format!("Unknown severity: {}", s)),
    }
  }
}

/// Cluster identifier: the id of the cluster's representative article
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(ArticleId);

impl ClusterId {
  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }
}

impl From<ArticleId> for ClusterId {
  fn from(id: ArticleId) -> Self {
    Self(id)
  }
}

impl std::fmt::Display for ClusterId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Articles judged to report the same underlying event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCluster {
  pub id: ClusterId,
  pub representative: Arc<NormalizedArticle>,
  /// Members ordered by article id; includes the representative
  pub members: Vec<Arc<NormalizedArticle>>,
  pub tickers: BTreeSet<String>,
  pub sources: BTreeSet<String>,
  /// Most recent member publish time
  pub latest: Option<DateTime<Utc>>,
  /// True when at least one member is inside the active window
  pub in_window: bool,
}

impl DuplicateCluster {
  pub fn size(&self) -> usize {
    self.members.len()
  }

  pub fn headline(&self) -> &str {
    &self.representative.raw.headline
  }

  pub fn contains(&self, id: &ArticleId) -> bool {
    self.members.iter().any(|m| &m.id == id)
  }
}

/// Why the relevance filter let a cluster through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdmitReason {
  /// Reported by enough articles
  Corroborated { size: usize },
  /// Mentions a configured high-priority keyword
  Keyword { keyword: String, severity: Severity },
  /// Published within the tight recency window
  Recent { age_hours: i64 },
}

impl std::fmt::Display for AdmitReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      AdmitReason::Corroborated { size } => write!(f, "{} reports", size),
      AdmitReason::Keyword { keyword, severity } => write!(f, "{} ({})", keyword, severity),
      AdmitReason::Recent { age_hours } => write!(f, "{}h old", age_hours),
    }
  }
}

/// A cluster that passed the relevance filter, with its assessed severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredCluster {
  pub cluster: Arc<DuplicateCluster>,
  pub severity: Severity,
  /// Keywords that matched, most severe first
  pub keywords: Vec<String>,
  pub reasons: Vec<AdmitReason>,
}

impl FilteredCluster {
  pub fn id(&self) -> &ClusterId {
    &self.cluster.id
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_severity_ordering() {
    assert!(Severity::Critical > Severity::High);
    assert!(Severity::High > Severity::Medium);
    assert!(Severity::Low > Severity::None);
    assert_eq!(Severity::default(), Severity::None);
  }

  #[test]
  fn test_severity_weights_are_monotonic() {
    let all = [
      Severity::None,
      Severity::Low,
      Severity::Medium,
      Severity::High,
      Severity::Critical,
    ];
    for pair in all.windows(2) {
      assert!(pair[0].weight() < pair[1].weight());
    }
  }

  #[test]
  fn test_severity_parse() {
    assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
    assert_eq!("med".parse::<Severity>().unwrap(), Severity::Medium);
    assert!("urgent".parse::<Severity>().is_err());
  }

  #[test]
  fn test_admit_reason_serde_tag() {
    let reason = AdmitReason::Keyword {
      keyword: "lawsuit".into(),
      severity: Severity::High,
    };
    let json = serde_json::to_value(&reason).unwrap();
    assert_eq!(json["kind"], "keyword");
    assert_eq!(json["severity"], "high");
  }
}
