pub mod decay;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod history;
pub mod normalize;
pub mod rank;
pub mod severity;
pub mod text;

pub use decay::recency_weight;
pub use dedup::{
  DedupOutcome, Deduplicator, DuplicateMatch, adaptive_threshold, content_hash, hamming_distance, jaccard, simhash,
};
pub use error::{FilterPolicyError, MatchingError, SimilarityError};
pub use filter::{FilterOutcome, FilterStats, RelevanceFilter, SuppressReason, Suppression};
pub use history::prior_urgency;
pub use normalize::{NormalizeStats, Normalized, Normalizer};
pub use rank::{Ranker, ScoreBreakdown, merge_holdings};
pub use severity::{Assessment, KeywordClassifier, KeywordHit};
pub use text::{Boilerplate, Canonicalizer};
