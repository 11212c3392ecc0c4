use holdwatch_core::{FilteredCluster, Holding, Priority, RankConfig, RankedHolding, RunContext, Severity};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::decay::recency_weight;
use crate::history::prior_urgency;

/// Merge portfolio rows that share a canonical ticker.
///
/// The first row's name, market and sector are kept; weights are summed and
/// aliases unioned. Order of first appearance is preserved.
pub fn merge_holdings(holdings: &[Holding]) -> Vec<Holding> {
  let mut merged: Vec<Holding> = Vec::with_capacity(holdings.len());
  let mut index: HashMap<String, usize> = HashMap::new();

  for holding in holdings {
    let ticker = holding.canonical_ticker();
    match index.get(&ticker) {
      Some(&i) => {
        warn!(ticker = %ticker, "duplicate holding merged");
        let existing = &mut merged[i];
        existing.weight += holding.weight;
        for alias in &holding.aliases {
          if !existing.aliases.contains(alias) {
            existing.aliases.push(alias.clone());
          }
        }
      }
      None => {
        index.insert(ticker, merged.len());
        merged.push(holding.clone());
      }
    }
  }
  merged
}

/// Signals behind one holding's urgency score
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
  pub count: f64,
  pub severity: f64,
  pub recency: f64,
  /// Prior runs' average urgency, when blended in
  pub history: Option<f64>,
}

/// Orders holdings by how much attention they need this run
#[derive(Debug, Clone, Default)]
pub struct Ranker {
  config: RankConfig,
}

impl Ranker {
  pub fn new(config: &RankConfig) -> Self {
    Self { config: config.clone() }
  }

  pub fn priority(&self, score: f64) -> Priority {
    if score >= self.config.high_threshold {
      Priority::High
    } else if score >= self.config.medium_threshold {
      Priority::Medium
    } else if score > 0.0 {
      Priority::Low
    } else {
      Priority::None
    }
  }

  /// Score signals for a holding's clusters (empty clusters score zero)
  pub fn breakdown(&self, clusters: &[FilteredCluster], prior: Option<f64>, ctx: &RunContext) -> ScoreBreakdown {
    if clusters.is_empty() {
      return ScoreBreakdown::default();
    }

    let n = clusters.len() as f64;
    let decay = self.config.decay_for(ctx.mode);
    let severity = clusters.iter().map(|c| c.severity).max().unwrap_or_default();
    let recency = clusters
      .iter()
      .filter_map(|c| c.cluster.latest)
      .map(|t| recency_weight(decay, ctx.age_hours(t)))
      .fold(0.0, f64::max);

    ScoreBreakdown {
      count: n / (n + self.config.count_half_saturation),
      severity: severity.weight(),
      recency,
      history: if ctx.mode.uses_history() { prior } else { None },
    }
  }

  pub fn score(&self, breakdown: &ScoreBreakdown) -> f64 {
    self.config.count_weight * breakdown.count
      + self.config.severity_weight * breakdown.severity
      + self.config.recency_weight * breakdown.recency
      + breakdown.history.map_or(0.0, |h| self.config.history_weight * h)
  }

  /// Rank every holding exactly once.
  ///
  /// Sort order: score desc, portfolio weight desc, ticker asc.
  pub fn rank(&self, holdings: &[Holding], clusters: &[FilteredCluster], ctx: &RunContext) -> Vec<RankedHolding> {
    let prior = if ctx.mode.uses_history() {
      prior_urgency(&ctx.history)
    } else {
      BTreeMap::new()
    };

    let mut ranked: Vec<RankedHolding> = merge_holdings(holdings)
      .into_iter()
      .map(|holding| {
        let ticker = holding.canonical_ticker();
        let mut own: Vec<FilteredCluster> = clusters
          .iter()
          .filter(|c| c.cluster.tickers.contains(&ticker))
          .cloned()
          .collect();
        own.sort_by(|a, b| a.id().cmp(b.id()));

        let breakdown = self.breakdown(&own, prior.get(&ticker).copied(), ctx);
        let score = self.score(&breakdown);
        let justification = justify(&own, &breakdown, ctx);
        debug!(ticker = %ticker, clusters = own.len(), score, "holding scored");

        RankedHolding {
          priority: self.priority(score),
          holding,
          ticker,
          clusters: own,
          score,
          rank: 0,
          justification,
        }
      })
      .collect();

    ranked.sort_by(compare_ranked);
    for (i, entry) in ranked.iter_mut().enumerate() {
      entry.rank = i + 1;
    }
    ranked
  }
}

fn compare_ranked(a: &RankedHolding, b: &RankedHolding) -> Ordering {
  b.score
    .total_cmp(&a.score)
    .then_with(|| b.holding.weight.total_cmp(&a.holding.weight))
    .then_with(|| a.ticker.cmp(&b.ticker))
}

/// Short human-readable digest of why a holding scored as it did
fn justify(clusters: &[FilteredCluster], breakdown: &ScoreBreakdown, ctx: &RunContext) -> String {
  if clusters.is_empty() {
    return String::new();
  }

  let mut parts = vec![if clusters.len() == 1 {
    "1 cluster".to_string()
  } else {
    format!("{} clusters", clusters.len())
  }];

  let strongest = clusters
    .iter()
    .max_by(|a, b| a.severity.cmp(&b.severity).then_with(|| b.id().cmp(a.id())));
  if let Some(top) = strongest
    && top.severity > Severity::None
  {
    match top.keywords.first() {
      Some(keyword) => parts.push(format!("max severity {} ({})", top.severity, keyword)),
      None => parts.push(format!("max severity {}", top.severity)),
    }
  }

  if let Some(latest) = clusters.iter().filter_map(|c| c.cluster.latest).max() {
    parts.push(format!("latest {:.0}h ago", ctx.age_hours(latest).floor()));
  }

  if let Some(prior) = breakdown.history {
    parts.push(format!("prior avg {:.2}", prior));
  }

  let lead = strongest.map(|c| c.cluster.headline()).unwrap_or_default();
  if !lead.is_empty() {
    parts.push(format!("top: {}", lead));
  }

  parts.join("; ")
}
