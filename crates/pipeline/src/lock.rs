// Per-mode run lock
//
// One lock file per mode at <state_dir>/locks/<mode>.lock, holding the owner's
// pid. The file is written in full under a temporary name and hard-linked into
// place, so a lock is never visible half-written. A lock left behind by a dead
// process is treated as stale and replaced.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use holdwatch_core::RunMode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// How long an unreadable lock counts as held before it is treated as abandoned
const UNREADABLE_LOCK_GRACE: Duration = Duration::from_secs(30);

/// Lock file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
  pub mode: RunMode,
  pub pid: u32,
  pub started_at: DateTime<Utc>,
}

/// Held for the duration of a run; released on drop
#[derive(Debug)]
pub struct RunLock {
  path: PathBuf,
  info: LockInfo,
}

impl RunLock {
  pub fn path_for(state_dir: &Path, mode: RunMode) -> PathBuf {
    state_dir.join("locks").join(format!("{}.lock", mode))
  }

  /// Take the lock for `mode`, or fail with `PipelineError::Locked` when a
  /// live process holds it
  pub fn acquire(state_dir: &Path, mode: RunMode) -> Result<Self> {
    let path = Self::path_for(state_dir, mode);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }

    let info = LockInfo {
      mode,
      pid: std::process::id(),
      started_at: Utc::now(),
    };

    let staged = path.with_extension(format!("lock.{}.tmp", info.pid));
    fs::write(&staged, serde_json::to_string_pretty(&info)?)?;
    let result = Self::link_into_place(&staged, &path, info);
    let _ = fs::remove_file(&staged);
    result
  }

  fn link_into_place(staged: &Path, path: &Path, info: LockInfo) -> Result<Self> {
    let mode = info.mode;

    // Two attempts: the second follows removal of a stale lock
    for _ in 0..2 {
      match fs::hard_link(staged, path) {
        Ok(()) => {
          info!(mode = %mode, path = %path.display(), "Acquired run lock");
          return Ok(Self {
            path: path.to_path_buf(),
            info,
          });
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => match read_lock(path) {
          Some(existing) if is_process_running(existing.pid) => {
            debug!(pid = existing.pid, mode = %mode, "Run lock held");
            return Err(PipelineError::Locked {
              mode,
              pid: existing.pid,
              path: path.to_path_buf(),
            });
          }
          Some(existing) => {
            info!(pid = existing.pid, "Removing stale run lock from dead process");
            fs::remove_file(path)?;
          }
          None if lock_age(path).is_some_and(|age| age < UNREADABLE_LOCK_GRACE) => {
            debug!(path = %path.display(), "Unreadable run lock is recent, treating as held");
            return Err(PipelineError::Locked {
              mode,
              pid: 0,
              path: path.to_path_buf(),
            });
          }
          None => {
            warn!(path = %path.display(), "Abandoned unreadable run lock, removing");
            fs::remove_file(path)?;
          }
        },
        Err(e) => return Err(e.into()),
      }
    }

    Err(PipelineError::Locked {
      mode,
      pid: 0,
      path: path.to_path_buf(),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn info(&self) -> &LockInfo {
    &self.info
  }
}

impl Drop for RunLock {
  fn drop(&mut self) {
    // Only remove a lock we still own
    match read_lock(&self.path) {
      Some(existing) if existing.pid == self.info.pid => {
        if let Err(e) = fs::remove_file(&self.path) {
          warn!(err = %e, path = %self.path.display(), "Failed to release run lock");
        } else {
          debug!(path = %self.path.display(), "Released run lock");
        }
      }
      Some(existing) => warn!(pid = existing.pid, "Run lock taken over by another process"),
      None => {}
    }
  }
}

/// Time since the lock file was last written; `None` when it cannot be read
fn lock_age(path: &Path) -> Option<Duration> {
  let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
  Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

fn read_lock(path: &Path) -> Option<LockInfo> {
  let content = fs::read_to_string(path).ok()?;
  serde_json::from_str(&content).ok()
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
  // kill(pid, 0) succeeds if the process exists
  unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
  true
}
