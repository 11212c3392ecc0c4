//! Provider trait for cluster analysis

use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::{AnalysisError, AnalysisRequest, Summary};

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// A backend that turns one cluster into a structured summary.
///
/// Implementations must be cheap to clone; wrappers such as
/// [`RateLimitedProvider`](crate::RateLimitedProvider) share state behind `Arc`.
#[async_trait]
pub trait AnalysisProvider: Send + Sync + DynClone {
  /// The name of this provider (for logging/identification)
  fn name(&self) -> &str;

  /// Whether the provider can serve requests right now
  fn is_available(&self) -> bool;

  async fn summarize(&self, request: &AnalysisRequest) -> Result<Summary>;
}

dyn_clone::clone_trait_object!(AnalysisProvider);
