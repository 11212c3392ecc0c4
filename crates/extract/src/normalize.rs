use holdwatch_core::{
  DedupConfig, Fingerprint, Holding, NormalizeConfig, NormalizedArticle, RawArticle, RunContext, canonical_ticker,
};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::dedup::{content_hash, simhash};
use crate::error::MatchingError;
use crate::text::{Boilerplate, Canonicalizer, fold, phrase_pattern, trim_stopwords};

/// Aliases shorter than this never match (too ambiguous)
const MIN_ALIAS_LEN: usize = 3;

/// Name aliases shorter than this only match exactly, never fuzzily
const MIN_FUZZY_LEN: usize = 6;

/// First word of a company name used as an alias when at least this long
const MIN_NAME_WORD_LEN: usize = 4;

/// Counts reported by a normalization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
  pub seen: usize,
  pub kept: usize,
  /// Articles matching no holding (or otherwise unusable)
  pub dropped: usize,
  pub out_of_window: usize,
}

/// Compiled matchers for one holding
#[derive(Debug, Clone)]
struct HoldingMatcher {
  ticker: String,
  /// Symbol and name aliases as whole-word patterns
  patterns: Vec<Regex>,
  /// Lowercased name aliases as token lists, for fuzzy window matching
  fuzzy: Vec<Vec<String>>,
}

impl HoldingMatcher {
  fn new(holding: &Holding, config: &NormalizeConfig) -> Self {
    let ticker = holding.canonical_ticker();

    let mut names: Vec<String> = vec![holding.name.clone()];
    if let Some(word) = holding
      .name
      .split_whitespace()
      .next()
      .filter(|w| w.chars().count() >= MIN_NAME_WORD_LEN)
    {
      names.push(word.to_string());
    }
    names.extend(holding.aliases.iter().cloned());
    if let Some(configured) = config.aliases.get(&ticker) {
      names.extend(configured.iter().cloned());
    }

    let mut unique = HashSet::new();
    names.retain(|n| {
      let n = n.trim();
      n.chars().count() >= MIN_ALIAS_LEN && unique.insert(n.to_lowercase())
    });

    let mut patterns = Vec::new();
    // Symbols only match as uppercase whole words
    if ticker.chars().count() >= MIN_ALIAS_LEN
      && let Ok(re) = Regex::new(&format!(r"\b{}\b", regex::escape(&ticker)))
    {
      patterns.push(re);
    }
    patterns.extend(names.iter().filter_map(|n| phrase_pattern(n, false)));

    let fuzzy = names
      .iter()
      .filter(|n| n.chars().count() >= MIN_FUZZY_LEN)
      .map(|n| fold(n).split(' ').map(str::to_string).collect())
      .collect();

    Self {
      ticker,
      patterns,
      fuzzy,
    }
  }

  fn matches(&self, text: &str, words: &[&str], threshold: f64) -> bool {
    if self.patterns.iter().any(|re| re.is_match(text)) {
      return true;
    }

    self.fuzzy.iter().any(|alias| {
      let target = alias.join(" ");
      words.windows(alias.len()).any(|window| {
        let candidate = window.join(" ");
        strsim::jaro_winkler(&target, &candidate) >= threshold
      })
    })
  }
}

/// Resolves tickers, strips boilerplate and fingerprints raw articles
#[derive(Debug, Clone)]
pub struct Normalizer {
  holdings: Vec<HoldingMatcher>,
  known: HashSet<String>,
  boilerplate: Boilerplate,
  canonicalizer: Canonicalizer,
  fuzzy_threshold: f64,
}

impl Normalizer {
  pub fn new(holdings: &[Holding], normalize: &NormalizeConfig, dedup: &DedupConfig) -> Self {
    let holdings: Vec<HoldingMatcher> = holdings.iter().map(|h| HoldingMatcher::new(h, normalize)).collect();
    let known = holdings.iter().map(|m| m.ticker.clone()).collect();

    Self {
      holdings,
      known,
      boilerplate: Boilerplate::new(&normalize.boilerplate),
      canonicalizer: Canonicalizer::new(&dedup.synonyms),
      fuzzy_threshold: normalize.fuzzy_threshold,
    }
  }

  /// Canonical tickers of the holdings an article references.
  ///
  /// Tickers the source declared are trusted when they are holdings; the text is
  /// searched for every other holding.
  pub fn resolve_tickers(&self, raw: &RawArticle, body: &str) -> BTreeSet<String> {
    let mut tickers: BTreeSet<String> = raw
      .tickers
      .iter()
      .map(|t| canonical_ticker(t))
      .filter(|t| self.known.contains(t))
      .collect();

    let text = format!("{}\n{}", raw.headline, body);
    let folded = fold(&text);
    let words: Vec<&str> = folded.split(' ').filter(|w| !w.is_empty()).collect();

    for matcher in &self.holdings {
      if !tickers.contains(&matcher.ticker) && matcher.matches(&text, &words, self.fuzzy_threshold) {
        tickers.insert(matcher.ticker.clone());
      }
    }
    tickers
  }

  pub fn normalize(&self, raw: RawArticle, ctx: &RunContext) -> Result<NormalizedArticle, MatchingError> {
    let id = raw.id();
    if raw.headline.trim().is_empty() {
      return Err(MatchingError::EmptyHeadline(id));
    }

    let body = self.boilerplate.strip(&raw.body);
    let tickers = self.resolve_tickers(&raw, &body);
    if tickers.is_empty() {
      return Err(MatchingError::NoHolding(id));
    }

    let headline = fold(&raw.headline);
    let exact = content_hash(&trim_stopwords(&format!("{} {}", headline, fold(&body))));

    Ok(NormalizedArticle {
      id,
      tickers,
      headline_tokens: self.canonicalizer.tokens(&raw.headline),
      headline,
      fingerprint: Fingerprint {
        exact,
        simhash: simhash(&body),
      },
      body,
      in_window: ctx.window.contains(raw.published),
      raw,
    })
  }

  /// Lazily normalize a sequence; unmatched articles are skipped and counted
  pub fn normalize_all<'a, I>(&'a self, raw: I, ctx: &'a RunContext) -> Normalized<'a, I::IntoIter>
  where
    I: IntoIterator<Item = RawArticle>,
  {
    Normalized {
      normalizer: self,
      ctx,
      inner: raw.into_iter(),
      stats: NormalizeStats::default(),
    }
  }
}

/// Iterator returned by [`Normalizer::normalize_all`]
pub struct Normalized<'a, I> {
  normalizer: &'a Normalizer,
  ctx: &'a RunContext,
  inner: I,
  stats: NormalizeStats,
}

impl<I> Normalized<'_, I> {
  pub fn stats(&self) -> NormalizeStats {
    self.stats
  }
}

impl<I: Iterator<Item = RawArticle>> Iterator for Normalized<'_, I> {
  type Item = NormalizedArticle;

  fn next(&mut self) -> Option<Self::Item> {
    for raw in self.inner.by_ref() {
      self.stats.seen += 1;
      match self.normalizer.normalize(raw, self.ctx) {
        Ok(article) => {
          self.stats.kept += 1;
          if !article.in_window {
            self.stats.out_of_window += 1;
          }
          return Some(article);
        }
        Err(e) => {
          debug!(reason = %e, "article dropped");
          self.stats.dropped += 1;
        }
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone, Utc};
  use holdwatch_core::{Market, RunMode};

  fn holdings() -> Vec<Holding> {
    vec![
      Holding::new("NSE:INFY", "Infosys Limited", Market::India, 10.0),
      Holding::new("AAPL", "Apple Inc", Market::Us, 5.0),
      Holding::new("CRWD", "CrowdStrike Holdings", Market::Us, 2.0),
    ]
  }

  fn normalizer() -> Normalizer {
    Normalizer::new(&holdings(), &NormalizeConfig::default(), &DedupConfig::default())
  }

  fn ctx() -> RunContext {
    RunContext::new(RunMode::Daily, Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap())
  }

  #[test]
  fn test_symbol_and_name_matching() {
    let n = normalizer();
    let ctx = ctx();

    let a = n.normalize(RawArticle::new("ET", "INFY shares rally on guidance"), &ctx).unwrap();
    assert_eq!(a.tickers, BTreeSet::from(["INFY".to_string()]));

    let b = n.normalize(RawArticle::new("ET", "infosys bags large deal"), &ctx).unwrap();
    assert!(b.tickers.contains("INFY"));
  }

  #[test]
  fn test_declared_ticker_trusted() {
    let n = normalizer();
    let raw = RawArticle::new("Yahoo", "Quarterly update").with_ticker("INFY.NS");
    let a = n.normalize(raw, &ctx()).unwrap();
    assert!(a.tickers.contains("INFY"));
  }

  #[test]
  fn test_declared_non_holding_ignored() {
    let n = normalizer();
    let raw = RawArticle::new("Yahoo", "Quarterly update").with_ticker("TSLA");
    assert!(matches!(n.normalize(raw, &ctx()), Err(MatchingError::NoHolding(_))));
  }

  #[test]
  fn test_fuzzy_name_match() {
    let n = normalizer();
    // Misspelled company name
    let a = n.normalize(RawArticle::new("Blog", "Crowdstrik outage hits airlines"), &ctx()).unwrap();
    assert!(a.tickers.contains("CRWD"));
  }

  #[test]
  fn test_symbol_is_whole_word() {
    let n = normalizer();
    let raw = RawArticle::new("Wire", "AAPLX fund launches");
    assert!(n.normalize(raw, &ctx()).is_err());
  }

  #[test]
  fn test_boilerplate_removed_and_fingerprint_ignores_it() {
    let n = normalizer();
    let ctx = ctx();
    let clean = n
      .normalize(
        RawArticle::new("A", "Apple recalls chargers").with_body("Apple is recalling chargers."),
        &ctx,
      )
      .unwrap();
    let noisy = n
      .normalize(
        RawArticle::new("B", "Apple recalls chargers").with_body("<p>Apple is recalling chargers.</p>\nRead more here"),
        &ctx,
      )
      .unwrap();
    assert_eq!(noisy.body, "Apple is recalling chargers.");
    assert_eq!(clean.fingerprint, noisy.fingerprint);
    assert_ne!(clean.id, noisy.id);
  }

  #[test]
  fn test_window_tagging() {
    let n = normalizer();
    let ctx = ctx();
    let old = RawArticle::new("ET", "Infosys AGM").with_published(ctx.now - Duration::days(3));
    let undated = RawArticle::new("ET", "Infosys AGM notice");
    assert!(!n.normalize(old, &ctx).unwrap().in_window);
    assert!(n.normalize(undated, &ctx).unwrap().in_window);
  }

  #[test]
  fn test_normalize_all_counts_drops() {
    let n = normalizer();
    let ctx = ctx();
    let raw = vec![
      RawArticle::new("ET", "Infosys wins deal"),
      RawArticle::new("ET", "Monsoon arrives early"),
      RawArticle::new("ET", "   "),
      RawArticle::new("ET", "Apple unveils phone"),
    ];

    let mut iter = n.normalize_all(raw, &ctx);
    let kept: Vec<_> = iter.by_ref().collect();
    assert_eq!(kept.len(), 2);
    assert_eq!(
      iter.stats(),
      NormalizeStats {
        seen: 4,
        kept: 2,
        dropped: 2,
        out_of_window: 0,
      }
    );
  }
}
