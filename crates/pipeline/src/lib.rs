//! Run orchestration: ingest → normalize → dedupe → filter → rank → analyze → deliver → log
//!
//! The [`Orchestrator`] drives one run as a state machine over [`Stage`]s,
//! committing each stage's output to a [`Checkpoint`] so a failed or
//! cancelled run can resume after its last completed stage.

pub mod analyze;
pub mod checkpoint;
pub mod delivery;
pub mod error;
#[cfg(test)]
mod fixtures;
pub mod history;
pub mod ingest;
pub mod lock;
pub mod orchestrator;
pub mod stage;

pub use analyze::AnalysisOutcome;
pub use checkpoint::{Checkpoint, RunStats};
pub use delivery::{Delivery, Digest, DigestSink, JsonFileSink, MarkdownFileSink};
pub use error::{PipelineError, Result, StageFailure};
pub use history::{HistoryLog, JsonlHistoryLog};
pub use ingest::{ArticleSource, IngestOutcome, JsonFileSource, SourceFailure, fetch_all};
pub use lock::{LockInfo, RunLock};
pub use orchestrator::{Orchestrator, RunReport};
pub use stage::Stage;
