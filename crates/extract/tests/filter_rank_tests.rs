//! Relevance filter and ranker integration tests
//!
//! Tests: admission rules, monotonicity, ranking determinism, completeness, tie-breaks.

mod common;

use chrono::Utc;
use common::{ctx, hours_ago, news, normalize, portfolio};
use extract::{Deduplicator, Ranker, RelevanceFilter, SuppressReason};
use holdwatch_core::{
  AdmitReason, FilterConfig, FilteredCluster, HistoryRecord, Holding, Market, Priority, RankConfig, RankedHolding,
  RawArticle, RunId, RunMode, Severity,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn filtered(mode: RunMode, config: &FilterConfig) -> (Vec<FilteredCluster>, extract::FilterOutcome) {
  let ctx = ctx(mode);
  let articles = normalize(news(), &ctx);
  let clusters = Deduplicator::default().cluster(&articles).clusters;
  let outcome = RelevanceFilter::new(config).apply(&clusters, &ctx);
  (outcome.admitted.clone(), outcome)
}

fn admitted_ids(config: &FilterConfig) -> BTreeSet<String> {
  filtered(RunMode::Daily, config)
    .0
    .iter()
    .map(|c| c.id().to_string())
    .collect()
}

#[test]
fn test_severe_keyword_admits_singleton() {
  let ctx = ctx(RunMode::Daily);
  let articles = normalize(
    vec![
      RawArticle::new("Yahoo Finance", "Apple hit with lawsuit over batteries")
        .with_published(hours_ago(20))
        .with_body("Consumers sued the company."),
    ],
    &ctx,
  );
  let clusters = Deduplicator::default().cluster(&articles).clusters;
  assert_eq!(clusters[0].size(), 1);

  let outcome = RelevanceFilter::default().apply(&clusters, &ctx);
  assert_eq!(outcome.admitted.len(), 1);
  assert_eq!(outcome.admitted[0].severity, Severity::High);
  assert_eq!(
    outcome.admitted[0].reasons,
    vec![AdmitReason::Keyword {
      keyword: "lawsuit".into(),
      severity: Severity::High,
    }]
  );
}

#[test]
fn test_default_policy_on_mixed_day() {
  let (admitted, outcome) = filtered(RunMode::Daily, &FilterConfig::default());

  let headlines: BTreeSet<&str> = admitted.iter().map(|c| c.cluster.headline()).collect();
  assert_eq!(
    headlines,
    BTreeSet::from([
      "Infosys wins $2B deal",
      "Apple faces lawsuit over App Store fees",
      "Nvidia unveils new data center chip",
    ])
  );

  // TCS dividend is low severity, single and 15h old; TCS flat is outside the window
  let reasons: Vec<SuppressReason> = outcome.suppressed.iter().map(|s| s.reason).collect();
  assert!(reasons.contains(&SuppressReason::BelowPolicy));
  assert!(reasons.contains(&SuppressReason::OutOfWindow));
  assert_eq!(outcome.stats.articles_in, 8);
  assert_eq!(outcome.stats.articles_kept, 6);
  assert!(outcome.warning.is_none());
}

#[test]
fn test_loosening_thresholds_admits_a_superset() {
  let strict = FilterConfig {
    min_cluster_size: Some(3),
    recency_hours: Some(1),
    min_keyword_severity: Some(Severity::Critical),
    ..Default::default()
  };
  let loosenings = [
    FilterConfig {
      min_cluster_size: Some(1),
      ..strict.clone()
    },
    FilterConfig {
      recency_hours: Some(24),
      ..strict.clone()
    },
    FilterConfig {
      min_keyword_severity: Some(Severity::Low),
      ..strict.clone()
    },
    FilterConfig {
      exclude_out_of_window: false,
      ..strict.clone()
    },
    FilterConfig {
      min_cluster_size: Some(2),
      recency_hours: Some(6),
      min_keyword_severity: Some(Severity::Medium),
      exclude_out_of_window: false,
      ..strict.clone()
    },
  ];

  let base = admitted_ids(&strict);
  for loose in &loosenings {
    let wider = admitted_ids(loose);
    assert!(base.is_subset(&wider), "{:?} dropped clusters admitted by the strict policy", loose);
  }
}

#[test]
fn test_nothing_admitted_yields_policy_warning() {
  let config = FilterConfig {
    min_cluster_size: None,
    recency_hours: None,
    min_keyword_severity: None,
    ..Default::default()
  };
  let (admitted, outcome) = filtered(RunMode::Daily, &config);
  assert!(admitted.is_empty());
  assert!(outcome.warning.is_some());
  assert_eq!(outcome.stats.clusters_kept, 0);
}

#[test]
fn test_ranking_covers_every_holding_once() {
  let ctx = ctx(RunMode::Daily);
  let (admitted, _) = filtered(RunMode::Daily, &FilterConfig::default());

  let mut holdings = portfolio();
  holdings.push(Holding::new("INFY.NS", "Infosys", Market::India, 1.0));

  let ranked = Ranker::default().rank(&holdings, &admitted, &ctx);
  assert_eq!(ranked.len(), 5);

  let tickers: BTreeSet<&str> = ranked.iter().map(|r| r.ticker.as_str()).collect();
  assert_eq!(tickers.len(), 5);
  assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

  let infy = ranked.iter().find(|r| r.ticker == "INFY").unwrap();
  assert_eq!(infy.holding.weight, 13.0);
}

#[test]
fn test_ranking_order_and_justification() {
  let ctx = ctx(RunMode::Daily);
  let (admitted, _) = filtered(RunMode::Daily, &FilterConfig::default());
  let ranked = Ranker::default().rank(&portfolio(), &admitted, &ctx);

  let order: Vec<&str> = ranked.iter().map(|r| r.ticker.as_str()).collect();
  // One cluster each: severity beats freshness; quiet holdings follow by weight
  assert_eq!(order, vec!["AAPL", "NVDA", "INFY", "TCS", "MSFT"]);

  let aapl = &ranked[0];
  assert!(aapl.justification.contains("max severity high (lawsuit)"), "{}", aapl.justification);
  assert_eq!(aapl.priority, Priority::Medium);

  let quiet = &ranked[4];
  assert_eq!(quiet.score, 0.0);
  assert!(quiet.justification.is_empty());
  assert_eq!(quiet.priority, Priority::None);
}

#[test]
fn test_zero_score_ties_break_by_ticker() {
  let ctx = ctx(RunMode::Daily);
  let holdings = vec![
    Holding::new("MSFT", "Microsoft", Market::Us, 1.0),
    Holding::new("AAPL", "Apple", Market::Us, 1.0),
    Holding::new("NVDA", "Nvidia", Market::Us, 1.0),
  ];
  let articles = normalize(
    vec![RawArticle::new("Yahoo", "Nvidia faces probe").with_published(hours_ago(1))],
    &ctx,
  );
  let clusters = Deduplicator::default().cluster(&articles).clusters;
  let admitted = RelevanceFilter::default().apply(&clusters, &ctx).admitted;

  let ranked = Ranker::default().rank(&holdings, &admitted, &ctx);
  let order: Vec<&str> = ranked.iter().map(|r| r.ticker.as_str()).collect();
  assert_eq!(order, vec!["NVDA", "AAPL", "MSFT"]);
}

#[test]
fn test_ranking_is_deterministic() {
  let ctx = ctx(RunMode::Daily);
  let (admitted, _) = filtered(RunMode::Daily, &FilterConfig::default());
  let ranker = Ranker::default();

  let first = ranker.rank(&portfolio(), &admitted, &ctx);
  let mut reversed_holdings = portfolio();
  reversed_holdings.reverse();
  let mut reversed_clusters = admitted.clone();
  reversed_clusters.reverse();
  let second = ranker.rank(&reversed_holdings, &reversed_clusters, &ctx);

  assert_eq!(first, second);
}

#[test]
fn test_history_blends_only_in_aggregate_modes() {
  let (admitted, _) = filtered(RunMode::Daily, &FilterConfig::default());
  let ranker = Ranker::default();
  let prior = HistoryRecord {
    run_id: RunId::new(),
    mode: RunMode::Daily,
    timestamp: Utc::now(),
    ranked: ranker.rank(&portfolio(), &admitted, &ctx(RunMode::Daily)),
  };

  let score = |ranked: &[RankedHolding], t: &str| ranked.iter().find(|r| r.ticker == t).unwrap().score;

  let daily_plain = ranker.rank(&portfolio(), &admitted, &ctx(RunMode::Daily));
  let daily = ranker.rank(&portfolio(), &admitted, &ctx(RunMode::Daily).with_history(vec![prior.clone()]));
  assert_eq!(daily, daily_plain);

  let weekly_plain = ranker.rank(&portfolio(), &admitted, &ctx(RunMode::Weekly));
  let weekly = ranker.rank(&portfolio(), &admitted, &ctx(RunMode::Weekly).with_history(vec![prior.clone()]));
  let blended = RankConfig::default().history_weight * score(&prior.ranked, "NVDA");
  assert!((score(&weekly, "NVDA") - score(&weekly_plain, "NVDA") - blended).abs() < 1e-9);
  assert!(weekly.iter().any(|r| r.justification.contains("prior avg")));

  // Quiet holdings never pick up history
  assert_eq!(score(&weekly, "MSFT"), 0.0);
}
