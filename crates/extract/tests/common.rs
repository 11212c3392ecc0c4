//! Common test utilities for extract integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use extract::Normalizer;
use holdwatch_core::{Config, Holding, Market, NormalizedArticle, RawArticle, RunContext, RunMode};
use std::sync::Arc;

pub fn now() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

pub fn hours_ago(h: i64) -> DateTime<Utc> {
  now() - Duration::hours(h)
}

pub fn ctx(mode: RunMode) -> RunContext {
  RunContext::new(mode, now())
}

pub fn portfolio() -> Vec<Holding> {
  vec![
    Holding::new("NSE:INFY", "Infosys Limited", Market::India, 12.0),
    Holding::new("NSE:TCS", "Tata Consultancy Services", Market::India, 8.0),
    Holding::new("AAPL", "Apple Inc", Market::Us, 5.0),
    Holding::new("NVDA", "Nvidia Corporation", Market::Us, 5.0),
    Holding::new("MSFT", "Microsoft Corporation", Market::Us, 5.0),
  ]
}

/// A mixed news day: one cross-source event, a syndicated copy, a lawsuit, stale news
pub fn news() -> Vec<RawArticle> {
  vec![
    RawArticle::new("Economic Times", "Infosys wins $2B deal")
      .with_url("https://et.example/infy-deal")
      .with_published(hours_ago(5))
      .with_body("Infosys has won a five-year deal with a European bank worth about two billion dollars."),
    RawArticle::new("Reuters", "Infosys secures $2 billion contract")
      .with_url("https://reuters.example/infy")
      .with_published(hours_ago(2))
      .with_body("BENGALURU (Reuters) - Infosys said on Monday it had secured a contract valued at $2 billion."),
    RawArticle::new("Mint", "Infosys bags $2bn order from European lender")
      .with_url("https://mint.example/infy")
      .with_published(hours_ago(9))
      .with_body("The IT major bagged the order after a competitive bid."),
    RawArticle::new("Yahoo Finance", "Apple faces lawsuit over App Store fees")
      .with_url("https://yahoo.example/aapl-suit")
      .with_published(hours_ago(20))
      .with_body("A group of developers filed a lawsuit against Apple on Sunday."),
    RawArticle::new("MarketWatch", "Apple faces lawsuit over App Store fees")
      .with_url("https://mw.example/aapl-suit")
      .with_published(hours_ago(19))
      .with_body("A group of developers filed a lawsuit against Apple on Sunday."),
    RawArticle::new("Yahoo Finance", "Nvidia unveils new data center chip")
      .with_url("https://yahoo.example/nvda")
      .with_published(hours_ago(1))
      .with_body("Nvidia showed its next accelerator at a developer event."),
    RawArticle::new("Moneycontrol", "TCS declares interim dividend")
      .with_url("https://mc.example/tcs")
      .with_published(hours_ago(15))
      .with_body("Tata Consultancy Services declared an interim dividend of Rs 10 per share."),
    RawArticle::new("Moneycontrol", "TCS shares end flat")
      .with_url("https://mc.example/tcs-flat")
      .with_published(hours_ago(60))
      .with_body("Shares of TCS ended flat in a quiet session."),
    RawArticle::new("Blog", "Monsoon forecast revised")
      .with_url("https://blog.example/monsoon")
      .with_published(hours_ago(3)),
  ]
}

pub fn normalize(raw: Vec<RawArticle>, ctx: &RunContext) -> Vec<Arc<NormalizedArticle>> {
  let config = Config::default();
  let normalizer = Normalizer::new(&portfolio(), &config.normalize, &config.dedup);
  normalizer.normalize_all(raw, ctx).map(Arc::new).collect()
}
