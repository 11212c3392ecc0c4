use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::ranking::RankedHolding;

/// Longest lookback a run window may span
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

/// Run mode: the only control parameter of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
  #[default]
  Daily,
  Weekly,
  Monthly,
}

impl RunMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      RunMode::Daily => "daily",
      RunMode::Weekly => "weekly",
      RunMode::Monthly => "monthly",
    }
  }

  /// Default lookback for the mode's window, in days
  pub fn default_days(&self) -> i64 {
    match self {
      RunMode::Daily => 1,
      RunMode::Weekly => 7,
      RunMode::Monthly => 30,
    }
  }

  /// Whether prior runs' urgency is blended into the ranking
  pub fn uses_history(&self) -> bool {
    !matches!(self, RunMode::Daily)
  }
}

impl std::fmt::Display for RunMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for RunMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "daily" => Ok(RunMode::Daily),
      "weekly" => Ok(RunMode::Weekly),
      "monthly" => Ok(RunMode::Monthly),
      _ => Err(format!("Unknown run mode: {} (expected daily, weekly or monthly)", s)),
    }
  }
}

/// Time window `[start, end]` of news a run considers current
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl TimeWindow {
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    Self { start, end }
  }

  /// Window ending at `end` spanning `days` days, clamped to `1..=MAX_LOOKBACK_DAYS`
  pub fn ending_at(end: DateTime<Utc>, days: i64) -> Self {
    let start = Duration::try_days(days.clamp(1, MAX_LOOKBACK_DAYS))
      .and_then(|span| end.checked_sub_signed(span))
      .unwrap_or(DateTime::<Utc>::MIN_UTC);
    Self { start, end }
  }

  /// Articles without a timestamp are assumed current
  pub fn contains(&self, at: Option<DateTime<Utc>>) -> bool {
    match at {
      Some(t) => t >= self.start && t <= self.end,
      None => true,
    }
  }

  pub fn duration(&self) -> Duration {
    self.end - self.start
  }
}

/// Unique identifier for a run (time-ordered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
  pub fn new() -> Self {
    Self(Uuid::now_v7())
  }

  pub fn as_uuid(&self) -> Uuid {
    self.0
  }
}

impl Default for RunId {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Display for RunId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// One appended history entry per completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
  pub run_id: RunId,
  pub mode: RunMode,
  pub timestamp: DateTime<Utc>,
  pub ranked: Vec<RankedHolding>,
}

/// Per-run context, passed by reference through every stage.
///
/// Stages read the clock only through `now`, which keeps a run replayable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
  pub run_id: RunId,
  pub mode: RunMode,
  pub window: TimeWindow,
  pub now: DateTime<Utc>,
  /// Prior history records inside the window (weekly/monthly only)
  pub history: Arc<Vec<HistoryRecord>>,
}

impl RunContext {
  pub fn new(mode: RunMode, now: DateTime<Utc>) -> Self {
    Self::with_days(mode, now, mode.default_days())
  }

  pub fn with_days(mode: RunMode, now: DateTime<Utc>, days: i64) -> Self {
    Self {
      run_id: RunId::new(),
      mode,
      window: TimeWindow::ending_at(now, days),
      now,
      history: Arc::new(Vec::new()),
    }
  }

  pub fn with_history(mut self, history: Vec<HistoryRecord>) -> Self {
    self.history = Arc::new(history);
    self
  }

  /// Hours between `at` and the end of the window (never negative)
  pub fn age_hours(&self, at: DateTime<Utc>) -> f64 {
    let minutes = (self.window.end - at).num_minutes().max(0);
    minutes as f64 / 60.0
  }
}
