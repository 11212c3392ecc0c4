//! Portfolio file loading

use std::path::Path;

use anyhow::{Context, Result, bail};
use holdwatch_core::Holding;
use serde::Deserialize;

/// Accepted shapes: a bare list of holdings or a `holdings` table
#[derive(Deserialize)]
#[serde(untagged)]
enum PortfolioFile {
  List(Vec<Holding>),
  Table { holdings: Vec<Holding> },
}

impl PortfolioFile {
  fn into_holdings(self) -> Vec<Holding> {
    match self {
      PortfolioFile::List(holdings) | PortfolioFile::Table { holdings } => holdings,
    }
  }
}

/// Load holdings from a `.toml` (`[[holdings]]`) or JSON file
pub fn load_portfolio(path: &Path) -> Result<Vec<Holding>> {
  let content =
    std::fs::read_to_string(path).with_context(|| format!("Failed to read portfolio {}", path.display()))?;

  let file: PortfolioFile = if path.extension().is_some_and(|ext| ext == "toml") {
    toml::from_str(&content).with_context(|| format!("Invalid portfolio TOML in {}", path.display()))?
  } else {
    serde_json::from_str(&content).with_context(|| format!("Invalid portfolio JSON in {}", path.display()))?
  };

  let holdings = file.into_holdings();
  if let Some(blank) = holdings.iter().position(|h| h.ticker.trim().is_empty()) {
    bail!("Holding #{} in {} has an empty ticker", blank + 1, path.display());
  }
  Ok(holdings)
}
