pub mod article;
pub mod cluster;
pub mod config;
pub mod error;
pub mod holding;
pub mod ranking;
pub mod run;

pub use article::{ArticleId, Fingerprint, NormalizedArticle, RawArticle};
pub use cluster::{AdmitReason, ClusterId, DuplicateCluster, FilteredCluster, Severity};
pub use config::{
  AnalysisConfig, Config, DecayConfig, DecayKind, DedupConfig, FilterConfig, KeywordRule, LoggingConfig,
  MAX_PROXIMITY_HOURS, NormalizeConfig, PROJECT_CONFIG_FILE, PipelineConfig, RankConfig,
};
pub use error::{Error, Result};
pub use holding::{Holding, Market, canonical_ticker};
pub use ranking::{Priority, RankedHolding};
pub use run::{HistoryRecord, MAX_LOOKBACK_DAYS, RunContext, RunId, RunMode, TimeWindow};
