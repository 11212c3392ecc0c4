//! Append-only run history

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dyn_clone::DynClone;
use holdwatch_core::HistoryRecord;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;

/// Where completed runs are recorded. Records are appended, never rewritten.
#[async_trait]
pub trait HistoryLog: Send + Sync + DynClone {
  async fn append(&self, record: &HistoryRecord) -> Result<()>;

  /// Records with `timestamp >= since`, oldest first
  async fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<HistoryRecord>>;
}

dyn_clone::clone_trait_object!(HistoryLog);

/// One JSON record per line
#[derive(Debug, Clone)]
pub struct JsonlHistoryLog {
  path: PathBuf,
}

impl JsonlHistoryLog {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[async_trait]
impl HistoryLog for JsonlHistoryLog {
  async fn append(&self, record: &HistoryRecord) -> Result<()> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }

    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .await?;
    file.write_all(line.as_bytes()).await?;
    file.sync_all().await?;

    debug!(run_id = %record.run_id, path = %self.path.display(), "History record appended");
    Ok(())
  }

  async fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<HistoryRecord>> {
    let content = match tokio::fs::read_to_string(&self.path).await {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    let mut records: Vec<HistoryRecord> = content
      .lines()
      .enumerate()
      .filter(|(_, line)| !line.trim().is_empty())
      .filter_map(|(i, line)| match serde_json::from_str::<HistoryRecord>(line) {
        Ok(record) => Some(record),
        Err(e) => {
          warn!(line = i + 1, err = %e, path = %self.path.display(), "Skipping corrupt history record");
          None
        }
      })
      .filter(|record| record.timestamp >= since)
      .collect();
    records.sort_by_key(|r| r.timestamp);
    Ok(records)
  }
}
