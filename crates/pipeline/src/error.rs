use holdwatch_core::RunMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::stage::Stage;

/// A fatal stage error: which stage failed and what was already committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("stage {stage} failed: {message}")]
pub struct StageFailure {
  pub stage: Stage,
  pub message: String,
  /// Last stage whose output was committed before the failure
  pub last_completed: Option<Stage>,
}

impl StageFailure {
  pub fn new(stage: Stage, message: impl Into<String>, last_completed: Option<Stage>) -> Self {
    Self {
      stage,
      message: message.into(),
      last_completed,
    }
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error(transparent)]
  Stage(#[from] StageFailure),

  #[error("A {mode} run is already in progress (pid {pid}, lock {path})")]
  Locked { mode: RunMode, pid: u32, path: PathBuf },

  #[error("Run cancelled after stage {}", .last_completed.map(|s| s.as_str()).unwrap_or("none"))]
  Cancelled { last_completed: Option<Stage> },

  #[error("Checkpoint is for a {found} run, expected {expected}")]
  CheckpointMismatch { expected: RunMode, found: RunMode },

  #[error("Source {source_name}: {message}")]
  Source { source_name: String, message: String },

  #[error("Sink {sink}: {message}")]
  Sink { sink: String, message: String },

  #[error("IO: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
