use serde::{Deserialize, Serialize};

/// Orchestrator stages, in execution order.
///
/// `Analyze`, `Deliver` and `Log` talk to external services; the others are
/// pure functions of the previous stage's output plus the run context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Init,
  Ingest,
  Normalize,
  Dedupe,
  Filter,
  Rank,
  Analyze,
  Deliver,
  Log,
  Done,
}

impl Stage {
  pub const ALL: [Stage; 10] = [
    Stage::Init,
    Stage::Ingest,
    Stage::Normalize,
    Stage::Dedupe,
    Stage::Filter,
    Stage::Rank,
    Stage::Analyze,
    Stage::Deliver,
    Stage::Log,
    Stage::Done,
  ];

  pub fn next(self) -> Option<Stage> {
    let i = Self::ALL.iter().position(|s| *s == self)?;
    Self::ALL.get(i + 1).copied()
  }

  pub fn is_external(self) -> bool {
    matches!(self, Stage::Analyze | Stage::Deliver | Stage::Log)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Init => "init",
      Stage::Ingest => "ingest",
      Stage::Normalize => "normalize",
      Stage::Dedupe => "dedupe",
      Stage::Filter => "filter",
      Stage::Rank => "rank",
      Stage::Analyze => "analyze",
      Stage::Deliver => "deliver",
      Stage::Log => "log",
      Stage::Done => "done",
    }
  }
}

impl std::fmt::Display for Stage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
