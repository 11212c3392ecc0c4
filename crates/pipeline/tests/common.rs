//! Common test utilities for pipeline integration tests
//!
//! In-memory sources, sinks and a counting provider around the offline summarizer.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use holdwatch_core::{Config, Holding, Market, RawArticle, TimeWindow};
use llm::{AnalysisProvider, AnalysisRequest, KeywordProvider, Summary};
use pipeline::{ArticleSource, Digest, DigestSink, JsonlHistoryLog, Orchestrator, PipelineError};

pub fn now() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

pub fn hours_ago(h: i64) -> DateTime<Utc> {
  now() - Duration::hours(h)
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

/// In-memory feed that counts fetches and can fail on demand
#[derive(Clone)]
pub struct StaticSource {
  pub name: String,
  pub articles: Vec<RawArticle>,
  pub fetches: Arc<AtomicUsize>,
  pub fail: bool,
  /// Invoked during fetch, e.g. to cancel the run mid-stage
  pub on_fetch: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl StaticSource {
  pub fn new(name: &str, articles: Vec<RawArticle>) -> Self {
    Self {
      name: name.to_string(),
      articles,
      fetches: Arc::new(AtomicUsize::new(0)),
      fail: false,
      on_fetch: None,
    }
  }

  pub fn failing(name: &str) -> Self {
    Self {
      fail: true,
      ..Self::new(name, vec![])
    }
  }

  pub fn fetch_count(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ArticleSource for StaticSource {
  fn name(&self) -> &str {
    &self.name
  }

  async fn fetch(&self, _window: &TimeWindow) -> pipeline::Result<Vec<RawArticle>> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    if let Some(hook) = &self.on_fetch {
      hook();
    }
    if self.fail {
      return Err(PipelineError::Source {
        source_name: self.name.clone(),
        message: "connection refused".into(),
      });
    }
    Ok(self.articles.clone())
  }
}

/// Keeps every published digest; fails the first `fail_first` preparations
#[derive(Clone, Default)]
pub struct RecordingSink {
  pub delivered: Arc<Mutex<Vec<Digest>>>,
  pub attempts: Arc<AtomicUsize>,
  pub fail_first: usize,
}

impl RecordingSink {
  pub fn failing_once() -> Self {
    Self {
      fail_first: 1,
      ..Default::default()
    }
  }

  pub fn delivered(&self) -> Vec<Digest> {
    self.delivered.lock().unwrap().clone()
  }
}

#[async_trait]
impl DigestSink for RecordingSink {
  fn name(&self) -> &str {
    "recording"
  }

  async fn prepare(&self, _digest: &Digest) -> pipeline::Result<()> {
    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
    if attempt < self.fail_first {
      return Err(PipelineError::Sink {
        sink: "recording".into(),
        message: "smtp unavailable".into(),
      });
    }
    Ok(())
  }

  async fn publish(&self, digest: &Digest) -> pipeline::Result<String> {
    self.delivered.lock().unwrap().push(digest.clone());
    Ok(format!("memory://{}", digest.file_stem()))
  }
}

/// Offline provider that counts calls
#[derive(Clone, Default)]
pub struct CountingProvider {
  inner: KeywordProvider,
  pub calls: Arc<AtomicUsize>,
}

impl CountingProvider {
  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl AnalysisProvider for CountingProvider {
  fn name(&self) -> &str {
    "counting"
  }

  fn is_available(&self) -> bool {
    true
  }

  async fn summarize(&self, request: &AnalysisRequest) -> llm::Result<Summary> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.inner.summarize(request).await
  }
}

pub fn history_path(state_dir: &Path) -> std::path::PathBuf {
  state_dir.join("history.jsonl")
}

/// Orchestrator over the shared portfolio with state kept in `state_dir`
pub fn orchestrator(state_dir: &Path, provider: &CountingProvider) -> Orchestrator {
  Orchestrator::new(
    Config::default(),
    &portfolio(),
    Box::new(provider.clone()),
    Box::new(JsonlHistoryLog::new(history_path(state_dir))),
  )
  .with_state_dir(state_dir)
}
