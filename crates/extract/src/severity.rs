use holdwatch_core::{DuplicateCluster, KeywordRule, Severity};
use regex::Regex;

use crate::text::phrase_pattern;

/// A keyword found in a cluster's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHit {
  pub keyword: String,
  pub severity: Severity,
}

/// Result of scanning a cluster against the keyword table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assessment {
  /// Highest severity among hits, `None` when nothing matched
  pub severity: Severity,
  /// Most severe first, then alphabetical
  pub hits: Vec<KeywordHit>,
}

impl Assessment {
  /// Most severe hit at or above `min`
  pub fn strongest_at_least(&self, min: Severity) -> Option<&KeywordHit> {
    self.hits.first().filter(|hit| hit.severity >= min)
  }

  pub fn keywords(&self) -> Vec<String> {
    self.hits.iter().map(|h| h.keyword.clone()).collect()
  }
}

#[derive(Debug, Clone)]
struct Pattern {
  keyword: String,
  severity: Severity,
  regex: Regex,
}

/// Scores news text against a weighted keyword table
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
  patterns: Vec<Pattern>,
}

impl KeywordClassifier {
  pub fn new(rules: &[KeywordRule]) -> Self {
    let patterns = rules
      .iter()
      .filter_map(|rule| {
        phrase_pattern(&rule.keyword, true).map(|regex| Pattern {
          keyword: rule.keyword.trim().to_lowercase(),
          severity: rule.severity,
          regex,
        })
      })
      .collect();
    Self { patterns }
  }

  pub fn assess_text(&self, text: &str) -> Assessment {
    let mut hits: Vec<KeywordHit> = self
      .patterns
      .iter()
      .filter(|p| p.regex.is_match(text))
      .map(|p| KeywordHit {
        keyword: p.keyword.clone(),
        severity: p.severity,
      })
      .collect();

    hits.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.keyword.cmp(&b.keyword)));
    hits.dedup_by(|a, b| a.keyword == b.keyword);

    Assessment {
      severity: hits.first().map(|h| h.severity).unwrap_or_default(),
      hits,
    }
  }

  /// Scan every member headline plus the representative body
  pub fn assess(&self, cluster: &DuplicateCluster) -> Assessment {
    let mut text = String::new();
    for member in &cluster.members {
      text.push_str(&member.raw.headline);
      text.push('\n');
    }
    text.push_str(&cluster.representative.body);
    self.assess_text(&text)
  }
}

impl Default for KeywordClassifier {
  fn default() -> Self {
    Self::new(&holdwatch_core::FilterConfig::default().keywords)
  }
}
