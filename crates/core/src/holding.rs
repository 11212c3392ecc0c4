use serde::{Deserialize, Serialize};

/// Exchange prefixes used by portfolio sheets (e.g. "NSE:INFY")
const EXCHANGE_PREFIXES: &[&str] = &["NSE:", "BSE:", "NASDAQ:", "NYSE:"];

/// Yahoo-style exchange suffixes (e.g. "INFY.NS")
const EXCHANGE_SUFFIXES: &[&str] = &[".NS", ".BO"];

/// Market a holding trades in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Market {
  #[serde(alias = "in")]
  India,
  #[default]
  #[serde(alias = "US")]
  Us,
}

impl Market {
  pub fn as_str(&self) -> &'static str {
    match self {
      Market::India => "india",
      Market::Us => "us",
    }
  }
}

impl std::str::FromStr for Market {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "india" | "in" | "nse" | "bse" => Ok(Market::India),
      "us" | "usa" => Ok(Market::Us),
      _ => Err(format!("Unknown market: {}", s)),
    }
  }
}

/// One portfolio position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
  pub ticker: String,
  pub name: String,
  #[serde(default)]
  pub market: Market,
  /// Portfolio weight or quantity; only its ordering matters
  #[serde(default)]
  pub weight: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sector: Option<String>,
  /// Extra company-name aliases for news matching
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub aliases: Vec<String>,
}

impl Holding {
  pub fn new(ticker: impl Into<String>, name: impl Into<String>, market: Market, weight: f64) -> Self {
    Self {
      ticker: ticker.into(),
      name: name.into(),
      market,
      weight,
      sector: None,
      aliases: Vec::new(),
    }
  }

  pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
    self.sector = Some(sector.into());
    self
  }

  pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
    self.aliases.push(alias.into());
    self
  }

  pub fn canonical_ticker(&self) -> String {
    canonical_ticker(&self.ticker)
  }
}

/// Canonical form of a ticker: trimmed, uppercased, exchange decorations removed.
///
/// `NSE:INFY`, `infy.ns` and `INFY` all map to `INFY`.
pub fn canonical_ticker(raw: &str) -> String {
  let mut ticker = raw.trim().to_uppercase();
  for prefix in EXCHANGE_PREFIXES {
    if let Some(rest) = ticker.strip_prefix(prefix) {
      ticker = rest.to_string();
      break;
    }
  }
  for suffix in EXCHANGE_SUFFIXES {
    if let Some(rest) = ticker.strip_suffix(suffix) {
      ticker = rest.to_string();
      break;
    }
  }
  ticker
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_canonical_ticker() {
    assert_eq!(canonical_ticker("NSE:INFY"), "INFY");
    assert_eq!(canonical_ticker("infy.ns"), "INFY");
    assert_eq!(canonical_ticker(" RELIANCE.BO "), "RELIANCE");
    assert_eq!(canonical_ticker("AAPL"), "AAPL");
    assert_eq!(canonical_ticker("M&M"), "M&M");
  }

  #[test]
  fn test_market_parsing() {
    assert_eq!("IN".parse::<Market>().unwrap(), Market::India);
    assert_eq!("us".parse::<Market>().unwrap(), Market::Us);
    assert!("mars".parse::<Market>().is_err());
  }

  #[test]
  fn test_holding_from_json() {
    let h: Holding = serde_json::from_str(r#"{"ticker":"NSE:TCS","name":"Tata Consultancy","market":"in"}"#).unwrap();
    assert_eq!(h.market, Market::India);
    assert_eq!(h.weight, 0.0);
    assert_eq!(h.canonical_ticker(), "TCS");
  }
}
