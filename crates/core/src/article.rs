use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Stable identifier for an article, derived from every field the source supplied.
///
/// Used as the final tie-break everywhere ordering matters, so results never
/// depend on the order articles arrived in. Two articles share an id only when
/// they are field-for-field identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
  pub fn derive(raw: &RawArticle) -> Self {
    let published = raw.published.map(|t| t.to_rfc3339()).unwrap_or_default();
    let mut hasher = Sha256::new();
    for field in [&raw.source, &raw.url, &raw.headline, &published, &raw.body]
      .into_iter()
      .chain(&raw.tickers)
    {
      // Length prefix keeps "ab" + "c" apart from "a" + "bc"
      hasher.update((field.len() as u64).to_le_bytes());
      hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    Self(hex::encode(&digest[..12]))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for ArticleId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// An article exactly as a news source returned it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
  /// Feed or outlet name (e.g. "Yahoo Finance", "Economic Times")
  pub source: String,
  pub headline: String,
  /// Body or summary text, possibly containing HTML and boilerplate
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub published: Option<DateTime<Utc>>,
  #[serde(default)]
  pub url: String,
  /// Ticker symbols the source associated with the article (per-ticker feeds)
  #[serde(default)]
  pub tickers: Vec<String>,
}

impl RawArticle {
  pub fn new(source: impl Into<String>, headline: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      headline: headline.into(),
      body: String::new(),
      published: None,
      url: String::new(),
      tickers: Vec::new(),
    }
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = body.into();
    self
  }

  pub fn with_published(mut self, published: DateTime<Utc>) -> Self {
    self.published = Some(published);
    self
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.url = url.into();
    self
  }

  pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
    self.tickers.push(ticker.into());
    self
  }

  pub fn id(&self) -> ArticleId {
    ArticleId::derive(self)
  }
}

/// Two-level content fingerprint.
///
/// `exact` is a digest of the stopword-trimmed normalized text; `simhash` is a
/// locality-sensitive hash of the cleaned body used for near-duplicate checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
  pub exact: String,
  pub simhash: u64,
}

/// A raw article after ticker resolution, cleanup and fingerprinting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedArticle {
  pub id: ArticleId,
  pub raw: RawArticle,
  /// Canonical tickers of the portfolio holdings this article references
  pub tickers: BTreeSet<String>,
  /// Headline with case, whitespace and punctuation folded
  pub headline: String,
  /// Canonical headline tokens (synonyms and amounts folded, stopwords removed)
  pub headline_tokens: BTreeSet<String>,
  /// Body with HTML and source boilerplate stripped
  pub body: String,
  pub fingerprint: Fingerprint,
  /// Whether the publish time falls inside the run's active window
  pub in_window: bool,
}

impl NormalizedArticle {
  pub fn published(&self) -> Option<DateTime<Utc>> {
    self.raw.published
  }

  pub fn source(&self) -> &str {
    &self.raw.source
  }

  /// Length of the cleaned body in characters
  pub fn body_len(&self) -> usize {
    self.body.chars().count()
  }

  pub fn shares_holding(&self, other: &NormalizedArticle) -> bool {
    !self.tickers.is_disjoint(&other.tickers)
  }
}
