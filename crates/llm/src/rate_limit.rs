// Sliding window rate limiting for analysis providers
//
// Tracks request start times over a configurable window and delays requests
// once the window is full. Clones of a provider share one window.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use holdwatch_core::AnalysisConfig;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{AnalysisError, AnalysisProvider, AnalysisRequest, Result, Summary};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
  /// Maximum requests allowed in the window
  pub max_requests: usize,
  pub window: Duration,
  /// Maximum time to wait for a slot before failing
  pub max_wait: Duration,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self::new(15, Duration::from_secs(60))
  }
}

impl RateLimitConfig {
  /// Custom limits; callers may wait up to two windows for a slot
  pub fn new(max_requests: usize, window: Duration) -> Self {
    Self {
      max_requests: max_requests.max(1),
      window,
      max_wait: window * 2,
    }
  }

  pub fn from_analysis(config: &AnalysisConfig) -> Self {
    Self::new(config.rate_limit_requests, Duration::from_secs(config.rate_limit_window_secs))
  }

  pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
    self.max_wait = max_wait;
    self
  }
}

#[derive(Debug)]
pub struct SlidingWindowLimiter {
  config: RateLimitConfig,
  /// Start times of requests still inside the window
  request_times: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
  pub fn new(config: RateLimitConfig) -> Self {
    let capacity = config.max_requests + 1;
    Self {
      config,
      request_times: VecDeque::with_capacity(capacity),
    }
  }

  fn prune_expired(&mut self) {
    let Some(cutoff) = Instant::now().checked_sub(self.config.window) else {
      return;
    };
    while let Some(&oldest) = self.request_times.front() {
      if oldest < cutoff {
        self.request_times.pop_front();
      } else {
        break;
      }
    }
  }

  /// `None` when a request may start now, else how long until the oldest expires
  fn wait_time(&mut self) -> Option<Duration> {
    self.prune_expired();
    if self.request_times.len() < self.config.max_requests {
      return None;
    }
    let expires_at = *self.request_times.front()? + self.config.window;
    let now = Instant::now();
    (expires_at > now).then(|| expires_at - now)
  }

  /// Take a slot if one is free; otherwise report the wait
  pub fn check_and_record(&mut self) -> Option<Duration> {
    let wait = self.wait_time();
    if wait.is_none() {
      self.request_times.push_back(Instant::now());
    }
    wait
  }

  pub fn current_count(&mut self) -> usize {
    self.prune_expired();
    self.request_times.len()
  }
}

/// Wraps another provider with a shared sliding window
#[derive(Clone)]
pub struct RateLimitedProvider {
  inner: Box<dyn AnalysisProvider>,
  limiter: Arc<Mutex<SlidingWindowLimiter>>,
  config: RateLimitConfig,
}

impl RateLimitedProvider {
  pub fn new(inner: Box<dyn AnalysisProvider>, config: RateLimitConfig) -> Self {
    Self {
      inner,
      limiter: Arc::new(Mutex::new(SlidingWindowLimiter::new(config.clone()))),
      config,
    }
  }

  async fn acquire_slot(&self) -> Result<()> {
    let start = Instant::now();

    loop {
      let (wait, in_window) = {
        let mut limiter = self.limiter.lock().await;
        let wait = limiter.check_and_record();
        (wait, limiter.current_count())
      };

      match wait {
        None => {
          debug!(in_window, max = self.config.max_requests, "Rate limiter: acquired slot");
          return Ok(());
        }
        Some(wait) => {
          if start.elapsed() + wait > self.config.max_wait {
            warn!(max_wait = ?self.config.max_wait, "Rate limiter: max wait time exceeded");
            return Err(AnalysisError::RateLimitWait(self.config.max_wait));
          }
          debug!(wait = ?wait, "Rate limiter: waiting for slot");
          sleep(wait).await;
        }
      }
    }
  }
}

#[async_trait]
impl AnalysisProvider for RateLimitedProvider {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn is_available(&self) -> bool {
    self.inner.is_available()
  }

  async fn summarize(&self, request: &AnalysisRequest) -> Result<Summary> {
    self.acquire_slot().await?;
    self.inner.summarize(request).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::KeywordProvider;
  use holdwatch_core::{ClusterId, RawArticle, Severity};

  fn request() -> AnalysisRequest {
    AnalysisRequest {
      cluster_id: ClusterId::from(RawArticle::new("Wire", "TCS declares dividend").id()),
      ticker: "TCS".into(),
      name: "Tata Consultancy Services".into(),
      market: "india".into(),
      sector: None,
      headline: "TCS declares dividend".into(),
      body: String::new(),
      member_count: 1,
      sources: vec![],
      published: None,
      keywords: vec![],
      severity: Severity::None,
    }
  }

  #[test]
  fn test_config_from_analysis() {
    let config = RateLimitConfig::from_analysis(&AnalysisConfig::default());
    assert_eq!(config.max_requests, 15);
    assert_eq!(config.window, Duration::from_secs(60));
    assert_eq!(config.max_wait, Duration::from_secs(120));
  }

  #[test]
  fn test_sliding_window_at_limit() {
    let mut limiter = SlidingWindowLimiter::new(RateLimitConfig::new(3, Duration::from_secs(10)));
    for _ in 0..3 {
      assert!(limiter.check_and_record().is_none());
    }
    let wait = limiter.check_and_record();
    assert!(wait.is_some_and(|w| w <= Duration::from_secs(10)));
    assert_eq!(limiter.current_count(), 3);
  }

  #[test]
  fn test_sliding_window_prune_expired() {
    let mut limiter = SlidingWindowLimiter::new(RateLimitConfig::new(2, Duration::from_millis(10)));
    limiter.check_and_record();
    limiter.check_and_record();
    assert_eq!(limiter.current_count(), 2);

    std::thread::sleep(Duration::from_millis(15));
    assert_eq!(limiter.current_count(), 0);
  }

  #[tokio::test]
  async fn test_waits_for_slot() {
    let config = RateLimitConfig::new(1, Duration::from_millis(50));
    let provider = RateLimitedProvider::new(Box::new(KeywordProvider::default()), config);

    let start = Instant::now();
    provider.summarize(&request()).await.unwrap();
    provider.summarize(&request()).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(40));
  }

  #[tokio::test]
  async fn test_gives_up_past_max_wait() {
    let config = RateLimitConfig::new(1, Duration::from_secs(30)).with_max_wait(Duration::from_millis(10));
    let provider = RateLimitedProvider::new(Box::new(KeywordProvider::default()), config);
    let shared = provider.clone();

    provider.summarize(&request()).await.unwrap();
    let err = shared.summarize(&request()).await.unwrap_err();
    assert!(matches!(err, AnalysisError::RateLimitWait(_)));
  }
}
