use holdwatch_core::ArticleId;
use thiserror::Error;

/// Why an article was dropped by the normalizer. Never fatal; only counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchingError {
  #[error("article {0} references no portfolio holding")]
  NoHolding(ArticleId),

  #[error("article {0} has an empty headline")]
  EmptyHeadline(ArticleId),
}

/// A pair of articles whose similarity could not be computed; treated as non-duplicate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot compare {left} and {right}: {reason}")]
pub struct SimilarityError {
  pub left: ArticleId,
  pub right: ArticleId,
  pub reason: &'static str,
}

/// The filter policy produced an empty result from a non-empty input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterPolicyError {
  #[error("relevance filter admitted none of {clusters} clusters ({articles} articles)")]
  NoSurvivors { clusters: usize, articles: usize },
}
