use chrono::Duration;
use holdwatch_core::{ClusterId, DedupConfig, DuplicateCluster, MAX_PROXIMITY_HOURS, NormalizedArticle};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::error::SimilarityError;

const FNV_PRIME: u64 = 0x100000001b3;
const FNV_OFFSET: u64 = 0xcbf29ce484222325;

/// Compute 64-bit SimHash for locality-sensitive hashing
pub fn simhash(text: &str) -> u64 {
  let mut vector = [0i32; 64];

  for token in tokenize(text) {
    let hash = fnv1a_hash(&token);
    for (i, v) in vector.iter_mut().enumerate() {
      if (hash >> i) & 1 == 1 {
        *v += 1;
      } else {
        *v -= 1;
      }
    }
  }

  let mut result = 0u64;
  for (i, &v) in vector.iter().enumerate() {
    if v > 0 {
      result |= 1 << i;
    }
  }
  result
}

/// Compute Hamming distance between two SimHashes
pub fn hamming_distance(a: u64, b: u64) -> u32 {
  (a ^ b).count_ones()
}

fn fnv1a_hash(s: &str) -> u64 {
  let mut hash = FNV_OFFSET;
  for byte in s.bytes() {
    hash ^= byte as u64;
    hash = hash.wrapping_mul(FNV_PRIME);
  }
  hash
}

/// Lowercased body tokens of at least 3 characters
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
  text
    .split(|c: char| !c.is_alphanumeric() && c != '_')
    .filter(|s| s.len() >= 3)
    .map(str::to_lowercase)
}

/// Jaccard similarity of two token sets; `None` when both are empty
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> Option<f64> {
  let union = a.union(b).count();
  if union == 0 {
    return None;
  }
  let intersection = a.intersection(b).count();
  Some(intersection as f64 / union as f64)
}

/// Adaptive SimHash distance threshold based on content length
pub fn adaptive_threshold(content_len: usize) -> u32 {
  match content_len {
    0..=50 => 2,
    51..=200 => 3,
    201..=500 => 4,
    _ => 5,
  }
}

/// Compute SHA-256 hex digest of already-normalized content
pub fn content_hash(content: &str) -> String {
  hex::encode(Sha256::digest(content.as_bytes()))
}

/// How two articles were judged to report the same event
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateMatch {
  /// Exact content fingerprint match
  Exact,
  /// Canonical headline overlap above threshold
  Headline { overlap: f64 },
  /// Close body SimHash confirmed by Jaccard
  Body { distance: u32, jaccard: f64 },
  /// No match
  None,
}

impl DuplicateMatch {
  pub fn is_duplicate(&self) -> bool {
    !matches!(self, DuplicateMatch::None)
  }
}

/// Partition of a run's articles into duplicate clusters
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
  /// Ordered by cluster id
  pub clusters: Vec<Arc<DuplicateCluster>>,
  /// Pairs whose similarity could not be computed
  pub similarity_errors: usize,
  pub pairs_compared: usize,
}

impl DedupOutcome {
  pub fn article_count(&self) -> usize {
    self.clusters.iter().map(|c| c.size()).sum()
  }
}

/// Groups near-duplicate articles across sources with union-find over pairwise edges
#[derive(Debug, Clone)]
pub struct Deduplicator {
  headline_threshold: f64,
  body_threshold: f64,
  proximity: Duration,
}

impl Default for Deduplicator {
  fn default() -> Self {
    Self::new(&DedupConfig::default())
  }
}

impl Deduplicator {
  pub fn new(config: &DedupConfig) -> Self {
    Self {
      headline_threshold: config.headline_threshold,
      body_threshold: config.body_threshold,
      proximity: Duration::try_hours(config.proximity_hours.clamp(0, MAX_PROXIMITY_HOURS)).unwrap_or_default(),
    }
  }

  /// Decide whether two articles report the same event.
  ///
  /// Exact fingerprints always match. Otherwise the pair must share a holding,
  /// fall inside the proximity window and be similar enough.
  pub fn compare(&self, a: &NormalizedArticle, b: &NormalizedArticle) -> Result<DuplicateMatch, SimilarityError> {
    if a.fingerprint.exact == b.fingerprint.exact {
      return Ok(DuplicateMatch::Exact);
    }

    if !a.shares_holding(b) || !self.within_proximity(a, b) {
      return Ok(DuplicateMatch::None);
    }

    if a.headline_tokens.is_empty() || b.headline_tokens.is_empty() {
      return Err(SimilarityError {
        left: a.id.clone(),
        right: b.id.clone(),
        reason: "empty canonical headline",
      });
    }

    let overlap = jaccard(&a.headline_tokens, &b.headline_tokens).unwrap_or(0.0);
    if overlap >= self.headline_threshold {
      return Ok(DuplicateMatch::Headline { overlap });
    }

    let distance = hamming_distance(a.fingerprint.simhash, b.fingerprint.simhash);
    let threshold = adaptive_threshold(a.body_len().min(b.body_len()));
    if distance <= threshold {
      let body_a: BTreeSet<String> = tokenize(&a.body).collect();
      let body_b: BTreeSet<String> = tokenize(&b.body).collect();
      // Empty bodies hash alike; they prove nothing
      if !body_a.is_empty()
        && !body_b.is_empty()
        && let Some(similarity) = jaccard(&body_a, &body_b)
        && similarity >= self.body_threshold
      {
        return Ok(DuplicateMatch::Body {
          distance,
          jaccard: similarity,
        });
      }
    }

    Ok(DuplicateMatch::None)
  }

  fn within_proximity(&self, a: &NormalizedArticle, b: &NormalizedArticle) -> bool {
    match (a.published(), b.published()) {
      (Some(ta), Some(tb)) => (ta - tb).abs() <= self.proximity,
      _ => false,
    }
  }

  /// Partition articles into clusters. Never fails: incomparable pairs count as distinct.
  pub fn cluster(&self, articles: &[Arc<NormalizedArticle>]) -> DedupOutcome {
    let n = articles.len();
    let mut sets = UnionFind::new(n);

    // Exact fingerprints are joined without pairwise comparison
    let mut by_fingerprint: HashMap<&str, usize> = HashMap::new();
    for (i, article) in articles.iter().enumerate() {
      if let Some(&first) = by_fingerprint.get(article.fingerprint.exact.as_str()) {
        sets.union(first, i);
      } else {
        by_fingerprint.insert(article.fingerprint.exact.as_str(), i);
      }
    }

    // Only pairs sharing a holding can be near-duplicates
    let mut by_ticker: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, article) in articles.iter().enumerate() {
      for ticker in &article.tickers {
        by_ticker.entry(ticker.as_str()).or_default().push(i);
      }
    }

    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    let mut similarity_errors = 0;
    for members in by_ticker.values() {
      for (pos, &i) in members.iter().enumerate() {
        for &j in &members[pos + 1..] {
          if !seen.insert((i, j)) || sets.find(i) == sets.find(j) {
            continue;
          }
          match self.compare(&articles[i], &articles[j]) {
            Ok(found) if found.is_duplicate() => {
              debug!(left = %articles[i].id, right = %articles[j].id, ?found, "duplicate pair");
              sets.union(i, j);
            }
            Ok(_) => {}
            Err(e) => {
              debug!(error = %e, "similarity skipped");
              similarity_errors += 1;
            }
          }
        }
      }
    }

    let mut groups: BTreeMap<usize, Vec<Arc<NormalizedArticle>>> = BTreeMap::new();
    for (i, article) in articles.iter().enumerate() {
      groups.entry(sets.find(i)).or_default().push(Arc::clone(article));
    }

    let mut clusters: Vec<Arc<DuplicateCluster>> = groups.into_values().map(|m| Arc::new(build_cluster(m))).collect();
    clusters.sort_by(|a, b| a.id.cmp(&b.id));

    DedupOutcome {
      clusters,
      similarity_errors,
      pairs_compared: seen.len(),
    }
  }
}

/// Representative order: longest body, earliest timestamp (missing last), source name,
/// article id, then fingerprint and body so the order is total
fn representative_order(a: &NormalizedArticle, b: &NormalizedArticle) -> Ordering {
  b.body_len()
    .cmp(&a.body_len())
    .then_with(|| match (a.published(), b.published()) {
      (Some(ta), Some(tb)) => ta.cmp(&tb),
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    })
    .then_with(|| a.source().cmp(b.source()))
    .then_with(|| a.id.cmp(&b.id))
    .then_with(|| a.fingerprint.exact.cmp(&b.fingerprint.exact))
    .then_with(|| a.body.cmp(&b.body))
}

fn build_cluster(mut members: Vec<Arc<NormalizedArticle>>) -> DuplicateCluster {
  members.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| representative_order(a, b)));

  let representative = members
    .iter()
    .min_by(|a, b| representative_order(a, b))
    .map(Arc::clone)
    .unwrap_or_else(|| Arc::clone(&members[0]));

  DuplicateCluster {
    id: ClusterId::from(representative.id.clone()),
    tickers: members.iter().flat_map(|m| m.tickers.iter().cloned()).collect(),
    sources: members.iter().map(|m| m.source().to_string()).collect(),
    latest: members.iter().filter_map(|m| m.published()).max(),
    in_window: members.iter().any(|m| m.in_window),
    representative,
    members,
  }
}

/// Disjoint sets with path compression and union by rank
struct UnionFind {
  parent: Vec<usize>,
  rank: Vec<u8>,
}

impl UnionFind {
  fn new(n: usize) -> Self {
    Self {
      parent: (0..n).collect(),
      rank: vec![0; n],
    }
  }

  fn find(&mut self, mut x: usize) -> usize {
    let mut root = x;
    while self.parent[root] != root {
      root = self.parent[root];
    }
    while self.parent[x] != root {
      let next = self.parent[x];
      self.parent[x] = root;
      x = next;
    }
    root
  }

  fn union(&mut self, a: usize, b: usize) {
    let (ra, rb) = (self.find(a), self.find(b));
    if ra == rb {
      return;
    }
    match self.rank[ra].cmp(&self.rank[rb]) {
      Ordering::Less => self.parent[ra] = rb,
      Ordering::Greater => self.parent[rb] = ra,
      Ordering::Equal => {
        self.parent[rb] = ra;
        self.rank[ra] += 1;
      }
    }
  }
}
