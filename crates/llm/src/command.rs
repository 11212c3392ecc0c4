//! Analysis through an external command
//!
//! The command receives the full prompt on stdin and prints a JSON summary on
//! stdout (optionally inside a markdown code block). Any CLI that follows this
//! contract works, e.g. `claude -p --output-format text`.

use std::{
  path::Path,
  process::Stdio,
  sync::LazyLock,
  time::{Duration, Instant},
};

use async_trait::async_trait;
use regex::Regex;
use tokio::{
  io::{AsyncReadExt, AsyncWriteExt},
  process::Command,
  time::timeout,
};
use tracing::{debug, error, trace, warn};

use crate::{
  AnalysisError, AnalysisProvider, AnalysisRequest, Result, Summary, parse_json,
  prompts::{build_summary_prompt, estimate_tokens},
};

/// Seconds added on top of a server-suggested retry delay
const RETRY_DELAY_PADDING_SECS: u64 = 2;

static RETRY_IN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)retry\s+in\s+(\d+)").expect("valid regex"));
static RETRY_DELAY_SECONDS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"retry_delay\s*\{\s*seconds:\s*(\d+)").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct CommandProvider {
  program: String,
  args: Vec<String>,
  timeout_secs: u64,
  /// Resolved executable path, empty when not found
  resolved: String,
}

impl CommandProvider {
  pub fn new(program: impl Into<String>, args: Vec<String>, timeout_secs: u64) -> Self {
    let program = program.into();
    let resolved = find_executable(&program).unwrap_or_default();
    Self {
      program,
      args,
      timeout_secs,
      resolved,
    }
  }
}

#[async_trait]
impl AnalysisProvider for CommandProvider {
  fn name(&self) -> &str {
    &self.program
  }

  fn is_available(&self) -> bool {
    !self.resolved.is_empty()
  }

  async fn summarize(&self, request: &AnalysisRequest) -> Result<Summary> {
    if self.resolved.is_empty() {
      return Err(AnalysisError::Unavailable(self.program.clone()));
    }
    let output = run_command(&self.resolved, &self.args, &build_summary_prompt(request), self.timeout_secs).await?;
    let summary: Summary = parse_json(&output).inspect_err(|e| {
      warn!(
        err = %e,
        cluster = %request.cluster_id,
        output_preview = %output.chars().take(200).collect::<String>(),
        "Failed to parse analysis output"
      );
    })?;
    Ok(summary)
  }
}

/// Locate the program on PATH (or accept an explicit path)
fn find_executable(program: &str) -> Option<String> {
  if program.contains(std::path::MAIN_SEPARATOR) {
    return Path::new(program).is_file().then(|| program.to_string());
  }

  let which_cmd = if cfg!(windows) { "where" } else { "which" };
  let output = std::process::Command::new(which_cmd).arg(program).output().ok()?;
  if !output.status.success() {
    debug!(program = %program, "Analysis command not found in PATH");
    return None;
  }

  let path = String::from_utf8_lossy(&output.stdout)
    .lines()
    .next()
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())?;
  trace!(program = %program, path = %path, "Found analysis command");
  Some(path)
}

async fn run_command(path: &str, args: &[String], prompt: &str, timeout_secs: u64) -> Result<String> {
  let start = Instant::now();
  debug!(
    command = %path,
    prompt_len = prompt.len(),
    est_tokens = estimate_tokens(prompt),
    timeout_secs,
    "Starting analysis request"
  );

  let mut cmd = Command::new(path);
  cmd
    .args(args)
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  let mut child = match cmd.spawn() {
    Ok(child) => child,
    Err(e) => {
      error!(err = %e, command = %path, "Failed to spawn analysis command");
      return Err(e.into());
    }
  };

  if let Some(mut stdin) = child.stdin.take() {
    stdin.write_all(prompt.as_bytes()).await?;
    drop(stdin);
  }

  let mut stdout = child
    .stdout
    .take()
    .ok_or_else(|| std::io::Error::other("stdout not piped"))?;
  let mut stderr = child
    .stderr
    .take()
    .ok_or_else(|| std::io::Error::other("stderr not piped"))?;

  let read_future = async {
    let mut out = String::new();
    let mut err = String::new();
    let (a, b) = tokio::join!(stdout.read_to_string(&mut out), stderr.read_to_string(&mut err));
    a?;
    b?;
    let status = child.wait().await?;
    Ok::<_, std::io::Error>((status, out, err))
  };

  let (status, output, stderr) = match timeout(Duration::from_secs(timeout_secs), read_future).await {
    Ok(Ok(result)) => result,
    Ok(Err(e)) => {
      error!(err = %e, "Failed to read analysis command output");
      return Err(e.into());
    }
    Err(_) => {
      warn!(
        timeout_secs,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Analysis command timed out"
      );
      return Err(AnalysisError::Timeout(timeout_secs));
    }
  };

  if !status.success() {
    let code = status.code().unwrap_or(-1);
    if is_rate_limited(&stderr) || is_rate_limited(&output) {
      let retry_after = retry_delay(&stderr).or_else(|| retry_delay(&output));
      warn!(code, retry_after_secs = retry_after.map(|d| d.as_secs()), "Analysis command rate limited");
      return Err(AnalysisError::RateLimited { retry_after });
    }
    error!(code, stderr = %stderr.trim(), "Analysis command failed");
    return Err(AnalysisError::ProcessFailed {
      code,
      stderr: stderr.trim().to_string(),
    });
  }

  trace!(
    output_len = output.len(),
    elapsed_ms = start.elapsed().as_millis() as u64,
    "Analysis command completed"
  );

  if output.trim().is_empty() {
    return Err(AnalysisError::NoResponse);
  }
  Ok(output)
}

fn is_rate_limited(text: &str) -> bool {
  let lower = text.to_lowercase();
  lower.contains("429") || lower.contains("rate limit") || lower.contains("resource_exhausted")
}

/// Server-suggested delay, padded; `None` when the message names none
fn retry_delay(text: &str) -> Option<Duration> {
  let caps = RETRY_IN.captures(text).or_else(|| RETRY_DELAY_SECONDS.captures(text))?;
  let secs: u64 = caps[1].parse().ok()?;
  Some(Duration::from_secs(secs + RETRY_DELAY_PADDING_SECS))
}
