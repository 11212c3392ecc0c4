//! Configuration system for Holdwatch.
//!
//! Config priority: working directory (holdwatch.toml) > user (~/.config/holdwatch/config.toml) > defaults.
//! Every threshold the triage engine uses lives here with a documented default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cluster::Severity;
use crate::error::{Error, Result};
use crate::run::{MAX_LOOKBACK_DAYS, RunMode};

/// File name looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "holdwatch.toml";

/// Largest accepted `dedup.proximity_hours` (ten years)
pub const MAX_PROXIMITY_HOURS: i64 = 24 * MAX_LOOKBACK_DAYS;

// ============================================================================
// Normalizer Configuration
// ============================================================================

/// Ticker resolution and cleanup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
  /// Minimum Jaro-Winkler similarity for a fuzzy company-name match (default: 0.90)
  pub fuzzy_threshold: f64,

  /// Company-name aliases keyed by canonical ticker
  pub aliases: BTreeMap<String, Vec<String>>,

  /// Extra boilerplate phrases to strip (matched case-insensitively, removed with the rest of the line)
  pub boilerplate: Vec<String>,
}

impl Default for NormalizeConfig {
  fn default() -> Self {
    Self {
      fuzzy_threshold: 0.90,
      aliases: default_aliases(),
      boilerplate: Vec::new(),
    }
  }
}

fn default_aliases() -> BTreeMap<String, Vec<String>> {
  let table: &[(&str, &[&str])] = &[
    // Indian stocks
    ("INFY", &["Infosys", "Infy"]),
    ("TCS", &["Tata Consultancy", "TCS"]),
    ("HCLTECH", &["HCL Technologies", "HCL Tech"]),
    ("HDFCBANK", &["HDFC Bank"]),
    ("RELIANCE", &["Reliance Industries", "Reliance Jio", "Reliance Retail", "RIL"]),
    ("LT", &["Larsen & Toubro", "L&T", "Larsen Toubro"]),
    ("M&M", &["Mahindra", "Mahindra & Mahindra"]),
    ("ITC", &["ITC Limited"]),
    ("WIPRO", &["Wipro"]),
    ("DRREDDY", &["Dr Reddys", "Dr. Reddy"]),
    ("INDIGO", &["IndiGo", "InterGlobe Aviation"]),
    ("SUZLON", &["Suzlon Energy", "Suzlon"]),
    // US stocks
    ("AMZN", &["Amazon"]),
    ("AAPL", &["Apple"]),
    ("GOOGL", &["Google", "Alphabet"]),
    ("MSFT", &["Microsoft"]),
    ("NVDA", &["Nvidia"]),
    ("AMD", &["Advanced Micro Devices"]),
    ("META", &["Meta Platforms", "Facebook"]),
    ("TSM", &["TSMC", "Taiwan Semiconductor"]),
    ("CRWD", &["CrowdStrike"]),
    ("PLTR", &["Palantir"]),
    ("AVGO", &["Broadcom"]),
  ];

  table
    .iter()
    .map(|(ticker, aliases)| (ticker.to_string(), aliases.iter().map(|a| a.to_string()).collect()))
    .collect()
}

// ============================================================================
// Deduplication Configuration
// ============================================================================

/// Near-duplicate detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
  /// Minimum canonical-headline token overlap to call two articles the same event (default: 0.6)
  pub headline_threshold: f64,

  /// Minimum body Jaccard similarity when body SimHashes are close (default: 0.8)
  pub body_threshold: f64,

  /// Maximum hours between two reports of the same event (default: 36)
  pub proximity_hours: i64,

  /// Synonym groups; every word in a group is folded to the group's first word
  pub synonyms: Vec<Vec<String>>,
}

impl Default for DedupConfig {
  fn default() -> Self {
    Self {
      headline_threshold: 0.6,
      body_threshold: 0.8,
      proximity_hours: 36,
      synonyms: default_synonyms(),
    }
  }
}

fn default_synonyms() -> Vec<Vec<String>> {
  let groups: &[&[&str]] = &[
    &["win", "wins", "won", "secure", "secures", "secured", "bag", "bags", "bagged", "land", "lands", "clinch", "clinches"],
    &["deal", "deals", "contract", "contracts", "order", "orders", "agreement", "pact"],
    &["profit", "profits", "earnings", "income"],
    &["rise", "rises", "rose", "jump", "jumps", "surge", "surges", "climb", "climbs", "gain", "gains"],
    &["fall", "falls", "fell", "drop", "drops", "slump", "slumps", "slide", "slides", "decline", "declines"],
    &["share", "shares", "stock", "stocks"],
    &["acquire", "acquires", "acquired", "buy", "buys", "purchase", "purchases"],
    &["cut", "cuts", "lower", "lowers", "reduce", "reduces"],
    &["ceo", "chief", "boss"],
  ];

  groups
    .iter()
    .map(|group| group.iter().map(|w| w.to_string()).collect())
    .collect()
}

// ============================================================================
// Relevance Filter Configuration
// ============================================================================

/// A keyword that signals a potentially material event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
  pub keyword: String,
  pub severity: Severity,
}

impl KeywordRule {
  pub fn new(keyword: impl Into<String>, severity: Severity) -> Self {
    Self {
      keyword: keyword.into(),
      severity,
    }
  }
}

/// Relevance filter policy. A cluster is admitted when any enabled criterion holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
  /// Admit clusters reported by at least this many articles (default: 2; omit to disable)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min_cluster_size: Option<usize>,

  /// Admit clusters published within this many hours of the window end (default: 6; omit to disable)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub recency_hours: Option<i64>,

  /// Admit clusters mentioning a keyword at or above this severity (default: medium; omit to disable)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min_keyword_severity: Option<Severity>,

  /// Drop clusters with no member inside the run window (default: true)
  pub exclude_out_of_window: bool,

  /// Keyword table used for severity assessment
  pub keywords: Vec<KeywordRule>,
}

impl Default for FilterConfig {
  fn default() -> Self {
    Self {
      min_cluster_size: Some(2),
      recency_hours: Some(6),
      min_keyword_severity: Some(Severity::Medium),
      exclude_out_of_window: true,
      keywords: default_keywords(),
    }
  }
}

fn default_keywords() -> Vec<KeywordRule> {
  let table: &[(&str, Severity)] = &[
    ("delisting", Severity::Critical),
    ("delisted", Severity::Critical),
    ("fraud", Severity::Critical),
    ("bankruptcy", Severity::Critical),
    ("insolvency", Severity::Critical),
    ("trading halt", Severity::Critical),
    ("lawsuit", Severity::High),
    ("downgrade", Severity::High),
    ("probe", Severity::High),
    ("investigation", Severity::High),
    ("profit warning", Severity::High),
    ("guidance cut", Severity::High),
    ("resign", Severity::High),
    ("recall", Severity::High),
    ("penalty", Severity::High),
    ("data breach", Severity::High),
    ("earnings", Severity::Medium),
    ("results", Severity::Medium),
    ("upgrade", Severity::Medium),
    ("merger", Severity::Medium),
    ("acquisition", Severity::Medium),
    ("layoff", Severity::Medium),
    ("guidance", Severity::Medium),
    ("dividend", Severity::Low),
    ("buyback", Severity::Low),
    ("stock split", Severity::Low),
    ("price target", Severity::Low),
  ];

  table.iter().map(|(k, s)| KeywordRule::new(*k, *s)).collect()
}

// ============================================================================
// Ranking Configuration
// ============================================================================

/// Shape of the recency decay curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecayKind {
  #[default]
  Exponential,
  Linear,
}

/// Recency decay for one run mode.
///
/// Only the length that drives `kind` is required in TOML; the other one is
/// derived from it, so `kind = "linear"` without `horizon_hours` is an error
/// rather than a silently borrowed default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DecayTable")]
pub struct DecayConfig {
  pub kind: DecayKind,
  /// Age at which an exponential weight halves
  pub half_life_hours: f64,
  /// Age at which a linear weight reaches zero
  pub horizon_hours: f64,
}

#[derive(Deserialize)]
struct DecayTable {
  #[serde(default)]
  kind: DecayKind,
  half_life_hours: Option<f64>,
  horizon_hours: Option<f64>,
}

impl TryFrom<DecayTable> for DecayConfig {
  type Error = String;

  fn try_from(table: DecayTable) -> std::result::Result<Self, Self::Error> {
    let mut decay = match table.kind {
      DecayKind::Exponential => {
        Self::exponential(table.half_life_hours.ok_or("exponential decay needs half_life_hours")?)
      }
      DecayKind::Linear => Self::linear(table.horizon_hours.ok_or("linear decay needs horizon_hours")?),
    };
    // Keep an explicitly given secondary length
    if let Some(h) = table.half_life_hours {
      decay.half_life_hours = h;
    }
    if let Some(h) = table.horizon_hours {
      decay.horizon_hours = h;
    }
    Ok(decay)
  }
}

impl Default for DecayConfig {
  fn default() -> Self {
    Self::exponential(12.0)
  }
}

impl DecayConfig {
  pub fn exponential(half_life_hours: f64) -> Self {
    Self {
      kind: DecayKind::Exponential,
      half_life_hours,
      horizon_hours: half_life_hours * 4.0,
    }
  }

  pub fn linear(horizon_hours: f64) -> Self {
    Self {
      kind: DecayKind::Linear,
      half_life_hours: horizon_hours / 2.0,
      horizon_hours,
    }
  }
}

/// Urgency score weights and per-mode decay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
  /// Weight of the surviving cluster count (default: 0.3)
  pub count_weight: f64,

  /// Weight of the maximum keyword severity (default: 0.4)
  pub severity_weight: f64,

  /// Weight of recency (default: 0.3)
  pub recency_weight: f64,

  /// Weight of prior runs' average urgency, weekly/monthly only (default: 0.15)
  pub history_weight: f64,

  /// Cluster count at which the count signal reaches 0.5 (default: 2.0)
  pub count_half_saturation: f64,

  /// Scores at or above this are high priority (default: 0.6)
  pub high_threshold: f64,

  /// Scores at or above this are medium priority (default: 0.3)
  pub medium_threshold: f64,

  pub daily: DecayConfig,
  pub weekly: DecayConfig,
  pub monthly: DecayConfig,
}

impl Default for RankConfig {
  fn default() -> Self {
    Self {
      count_weight: 0.3,
      severity_weight: 0.4,
      recency_weight: 0.3,
      history_weight: 0.15,
      count_half_saturation: 2.0,
      high_threshold: 0.6,
      medium_threshold: 0.3,
      daily: DecayConfig::exponential(12.0),
      weekly: DecayConfig::exponential(72.0),
      monthly: DecayConfig::linear(30.0 * 24.0),
    }
  }
}

impl RankConfig {
  pub fn decay_for(&self, mode: RunMode) -> &DecayConfig {
    match mode {
      RunMode::Daily => &self.daily,
      RunMode::Weekly => &self.weekly,
      RunMode::Monthly => &self.monthly,
    }
  }
}

// ============================================================================
// Analysis Configuration
// ============================================================================

/// Language-model analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
  /// Command that reads a prompt on stdin and prints JSON (e.g. "claude"); unset = offline keyword summaries
  #[serde(skip_serializing_if = "Option::is_none")]
  pub command: Option<String>,

  /// Arguments passed to the command
  pub args: Vec<String>,

  /// Per-request timeout in seconds (default: 60)
  pub timeout_secs: u64,

  /// Maximum in-flight requests (default: 4)
  pub max_concurrent: usize,

  /// Requests allowed per rate-limit window (default: 15)
  pub rate_limit_requests: usize,

  /// Rate-limit window in seconds (default: 60)
  pub rate_limit_window_secs: u64,

  /// Attempts per request on retryable failures (default: 3)
  pub max_retries: u32,

  /// Clusters analyzed per holding, most urgent holdings first (default: 5)
  pub max_clusters_per_holding: usize,

  /// Body words sent per cluster (default: 300)
  pub max_words: usize,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      command: None,
      args: Vec::new(),
      timeout_secs: 60,
      max_concurrent: 4,
      rate_limit_requests: 15,
      rate_limit_window_secs: 60,
      max_retries: 3,
      max_clusters_per_holding: 5,
      max_words: 300,
    }
  }
}

// ============================================================================
// Pipeline Configuration
// ============================================================================

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Lock files and checkpoints (default: platform data dir)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub state_dir: Option<PathBuf>,

  /// Digest output directory (default: ./output)
  pub output_dir: PathBuf,

  /// Append-only history log (default: <state_dir>/history.jsonl)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub history_file: Option<PathBuf>,

  /// Sources fetched concurrently (default: 4)
  pub max_concurrent_sources: usize,

  /// Daily window length in days (default: 1)
  pub daily_days_back: i64,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      state_dir: None,
      output_dir: PathBuf::from("output"),
      history_file: None,
      max_concurrent_sources: 4,
      daily_days_back: 1,
    }
  }
}

impl PipelineConfig {
  pub fn resolved_state_dir(&self) -> PathBuf {
    if let Some(dir) = &self.state_dir {
      return dir.clone();
    }
    if let Ok(dir) = std::env::var("HOLDWATCH_DATA_DIR") {
      return PathBuf::from(dir);
    }
    dirs::data_local_dir()
      .map(|p| p.join("holdwatch"))
      .unwrap_or_else(|| PathBuf::from(".holdwatch"))
  }

  pub fn resolved_history_file(&self) -> PathBuf {
    self
      .history_file
      .clone()
      .unwrap_or_else(|| self.resolved_state_dir().join("history.jsonl"))
  }

  pub fn days_for(&self, mode: RunMode) -> i64 {
    match mode {
      RunMode::Daily => self.daily_days_back,
      other => other.default_days(),
    }
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// off, error, warn, info, debug, trace (default: info)
  pub level: String,

  /// Log file rotation: daily, hourly, never (default: daily)
  pub rotation: String,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      rotation: "daily".to_string(),
    }
  }
}

// ============================================================================
// Main Configuration
// ============================================================================

/// Holdwatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub normalize: NormalizeConfig,
  pub dedup: DedupConfig,
  pub filter: FilterConfig,
  pub rank: RankConfig,
  pub analysis: AnalysisConfig,
  pub pipeline: PipelineConfig,
  pub logging: LoggingConfig,
}

impl Config {
  /// Load config for a working directory, with fallback to user config and then defaults
  pub fn load_for_dir(dir: &Path) -> Self {
    let project_config = Self::project_config_path(dir);
    if project_config.exists()
      && let Ok(config) = Self::from_file(&project_config)
    {
      return config;
    }

    if let Some(user_config_path) = Self::user_config_path()
      && user_config_path.exists()
      && let Ok(config) = Self::from_file(&user_config_path)
    {
      return config;
    }

    Self::default()
  }

  /// Load and validate an explicit config file
  pub fn from_file(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("HOLDWATCH_CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("holdwatch").join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("holdwatch").join("config.toml"))
  }

  pub fn project_config_path(dir: &Path) -> PathBuf {
    dir.join(PROJECT_CONFIG_FILE)
  }

  /// Reject thresholds outside their meaningful ranges
  pub fn validate(&self) -> Result<()> {
    let unit = [
      ("normalize.fuzzy_threshold", self.normalize.fuzzy_threshold),
      ("dedup.headline_threshold", self.dedup.headline_threshold),
      ("dedup.body_threshold", self.dedup.body_threshold),
    ];
    for (name, value) in unit {
      if !(0.0..=1.0).contains(&value) {
        return Err(Error::Config(format!("{} must be between 0.0 and 1.0 (got {})", name, value)));
      }
    }

    let weights = [
      ("rank.count_weight", self.rank.count_weight),
      ("rank.severity_weight", self.rank.severity_weight),
      ("rank.recency_weight", self.rank.recency_weight),
      ("rank.history_weight", self.rank.history_weight),
    ];
    for (name, value) in weights {
      if !value.is_finite() || value < 0.0 {
        return Err(Error::Config(format!("{} must be a non-negative number (got {})", name, value)));
      }
    }

    if self.rank.count_half_saturation <= 0.0 {
      return Err(Error::Config("rank.count_half_saturation must be positive".into()));
    }

    for (mode, decay) in [
      (RunMode::Daily, &self.rank.daily),
      (RunMode::Weekly, &self.rank.weekly),
      (RunMode::Monthly, &self.rank.monthly),
    ] {
      let lengths = [decay.half_life_hours, decay.horizon_hours];
      if lengths.iter().any(|h| !h.is_finite() || *h <= 0.0) {
        return Err(Error::Config(format!("rank.{} decay lengths must be positive", mode)));
      }
    }

    if !(0..=MAX_PROXIMITY_HOURS).contains(&self.dedup.proximity_hours) {
      return Err(Error::Config(format!(
        "dedup.proximity_hours must be between 0 and {} (got {})",
        MAX_PROXIMITY_HOURS, self.dedup.proximity_hours
      )));
    }
    if !(1..=MAX_LOOKBACK_DAYS).contains(&self.pipeline.daily_days_back) {
      return Err(Error::Config(format!(
        "pipeline.daily_days_back must be between 1 and {} (got {})",
        MAX_LOOKBACK_DAYS, self.pipeline.daily_days_back
      )));
    }
    if self.analysis.max_concurrent == 0 || self.pipeline.max_concurrent_sources == 0 {
      return Err(Error::Config("concurrency limits must be at least 1".into()));
    }
    if self.analysis.rate_limit_requests == 0 {
      return Err(Error::Config("analysis.rate_limit_requests must be at least 1".into()));
    }

    Ok(())
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    r#"# Holdwatch Configuration
# Place in ./holdwatch.toml or ~/.config/holdwatch/config.toml

# ============================================================================
# Article Normalizer
# ============================================================================

[normalize]
# Minimum Jaro-Winkler similarity for fuzzy company-name matches
fuzzy_threshold = 0.90

# Extra boilerplate phrases to strip from article bodies
# boilerplate = ["Subscribe to our newsletter"]

# Company-name aliases per ticker (replaces the built-in table when set)
# [normalize.aliases]
# INFY = ["Infosys", "Infy"]
# TSM = ["TSMC", "Taiwan Semiconductor"]

# ============================================================================
# Deduplicator
# ============================================================================

[dedup]
# Canonical headline token overlap needed to call two articles one event
headline_threshold = 0.6

# Body Jaccard similarity needed when body SimHashes are close
body_threshold = 0.8

# Reports further apart than this (hours) are separate events
proximity_hours = 36

# ============================================================================
# Relevance Filter (a cluster passes when ANY enabled criterion holds)
# ============================================================================

[filter]
# Reported by at least this many articles (remove to disable)
min_cluster_size = 2

# Published within this many hours of the run (remove to disable)
recency_hours = 6

# Mentions a keyword at or above this severity (remove to disable)
min_keyword_severity = "medium"

# Drop clusters entirely outside the run window
exclude_out_of_window = true

# Keyword table (replaces the built-in table when set)
# [[filter.keywords]]
# keyword = "lawsuit"
# severity = "high"

# ============================================================================
# Priority Ranker
# ============================================================================

[rank]
count_weight = 0.3
severity_weight = 0.4
recency_weight = 0.3
history_weight = 0.15
count_half_saturation = 2.0
high_threshold = 0.6
medium_threshold = 0.3

[rank.daily]
kind = "exponential"
half_life_hours = 12.0

[rank.weekly]
kind = "exponential"
half_life_hours = 72.0

[rank.monthly]
kind = "linear"
horizon_hours = 720.0

# ============================================================================
# Analysis (language model)
# ============================================================================

[analysis]
# Command reading a prompt on stdin and printing JSON; leave unset for offline summaries
# command = "claude"
# args = ["-p", "--output-format", "text"]
timeout_secs = 60
max_concurrent = 4
rate_limit_requests = 15
rate_limit_window_secs = 60
max_retries = 3
max_clusters_per_holding = 5
max_words = 300

# ============================================================================
# Pipeline
# ============================================================================

[pipeline]
# state_dir = "/var/lib/holdwatch"
# history_file = "/var/lib/holdwatch/history.jsonl"
output_dir = "output"
max_concurrent_sources = 4
daily_days_back = 1

[logging]
level = "info"
rotation = "daily"
"#
    .to_string()
  }
}
