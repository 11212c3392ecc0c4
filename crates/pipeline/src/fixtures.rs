use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use holdwatch_core::{
  DuplicateCluster, FilteredCluster, Fingerprint, Holding, Market, NormalizedArticle, Priority, RankedHolding,
  RawArticle, Severity,
};

pub fn now() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

pub fn cluster(ticker: &str, headline: &str, severity: Severity, hours_ago: i64) -> FilteredCluster {
  let published = now() - Duration::hours(hours_ago);
  let raw = RawArticle::new("Wire", headline)
    .with_url(format!("https://wire.example/{}", headline.to_lowercase().replace(' ', "-")))
    .with_published(published)
    .with_body(format!("{}. More detail follows.", headline));
  let article = Arc::new(NormalizedArticle {
    id: raw.id(),
    headline: headline.to_lowercase(),
    headline_tokens: BTreeSet::new(),
    body: raw.body.clone(),
    fingerprint: Fingerprint {
      exact: headline.to_lowercase(),
      simhash: 0,
    },
    tickers: BTreeSet::from([ticker.to_string()]),
    in_window: true,
    raw,
  });
  FilteredCluster {
    cluster: Arc::new(DuplicateCluster {
      id: article.id.clone().into(),
      representative: article.clone(),
      members: vec![article.clone()],
      tickers: article.tickers.clone(),
      sources: BTreeSet::from(["Wire".to_string()]),
      latest: Some(published),
      in_window: true,
    }),
    severity,
    keywords: vec![],
    reasons: vec![],
  }
}

pub fn ranked(ticker: &str, rank: usize, clusters: Vec<FilteredCluster>) -> RankedHolding {
  let priority = if clusters.is_empty() { Priority::None } else { Priority::High };
  RankedHolding {
    holding: Holding::new(ticker, format!("{} Corp", ticker), Market::Us, 1.0),
    ticker: ticker.to_string(),
    score: if clusters.is_empty() { 0.0 } else { 10.0 / rank as f64 },
    justification: if clusters.is_empty() {
      String::new()
    } else {
      format!("{} cluster(s)", clusters.len())
    },
    clusters,
    rank,
    priority,
  }
}
