// Retry with exponential backoff for analysis providers
//
// Transient failures (timeouts, 5xx-style command errors, empty output) back
// off exponentially with jitter. Rate-limit failures wait for the delay the
// service suggested, or a fixed cool-down when it named none.

use std::time::Duration;

use async_trait::async_trait;
use holdwatch_core::AnalysisConfig;
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{AnalysisError, AnalysisProvider, AnalysisRequest, Result, Summary};

#[derive(Debug, Clone)]
pub struct RetryConfig {
  /// Total attempts per request, including the first
  pub max_attempts: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  pub backoff_multiplier: f64,
  /// Add up to 25% jitter to each backoff
  pub add_jitter: bool,
  /// Cool-down after a rate-limit failure that named no delay
  pub rate_limit_backoff: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      initial_backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(30),
      backoff_multiplier: 2.0,
      add_jitter: true,
      rate_limit_backoff: Duration::from_secs(60),
    }
  }
}

impl RetryConfig {
  pub fn from_analysis(config: &AnalysisConfig) -> Self {
    Self {
      max_attempts: config.max_retries.max(1),
      ..Default::default()
    }
  }

  /// Backoff before retry number `attempt` (0-based)
  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
    let mut backoff = base.min(self.max_backoff.as_secs_f64());
    if self.add_jitter {
      backoff *= 1.0 + rand::thread_rng().gen_range(0.0..0.25);
    }
    Duration::from_secs_f64(backoff).min(self.max_backoff)
  }

  fn delay_for(&self, error: &AnalysisError, attempt: u32) -> Duration {
    match error {
      AnalysisError::RateLimited { retry_after } => retry_after.unwrap_or(self.rate_limit_backoff),
      _ => self.backoff_for_attempt(attempt),
    }
  }
}

/// Wraps another provider with retry logic
#[derive(Clone)]
pub struct RetryingProvider {
  inner: Box<dyn AnalysisProvider>,
  config: RetryConfig,
}

impl RetryingProvider {
  pub fn new(inner: Box<dyn AnalysisProvider>, config: RetryConfig) -> Self {
    Self { inner, config }
  }
}

#[async_trait]
impl AnalysisProvider for RetryingProvider {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn is_available(&self) -> bool {
    self.inner.is_available()
  }

  async fn summarize(&self, request: &AnalysisRequest) -> Result<Summary> {
    let mut attempt = 0;
    loop {
      match self.inner.summarize(request).await {
        Ok(summary) => {
          if attempt > 0 {
            debug!(cluster = %request.cluster_id, attempt, "Analysis succeeded after retry");
          }
          return Ok(summary);
        }
        Err(e) if e.is_retryable() && attempt + 1 < self.config.max_attempts => {
          let delay = self.config.delay_for(&e, attempt);
          warn!(
            cluster = %request.cluster_id,
            err = %e,
            attempt = attempt + 1,
            max_attempts = self.config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Analysis failed, retrying"
          );
          sleep(delay).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}
