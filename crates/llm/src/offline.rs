//! Offline summaries from keyword severity and the lead sentences

use async_trait::async_trait;
use extract::KeywordClassifier;
use holdwatch_core::KeywordRule;

use crate::{AnalysisProvider, AnalysisRequest, Result, Summary};

/// Sentences of the body kept in an offline summary
const LEAD_SENTENCES: usize = 2;

/// Summarizes without any external service.
///
/// Severity is the stronger of the filter's assessment and a fresh keyword
/// pass over the request text.
#[derive(Debug, Clone, Default)]
pub struct KeywordProvider {
  classifier: KeywordClassifier,
}

impl KeywordProvider {
  pub fn new(rules: &[KeywordRule]) -> Self {
    Self {
      classifier: KeywordClassifier::new(rules),
    }
  }
}

#[async_trait]
impl AnalysisProvider for KeywordProvider {
  fn name(&self) -> &str {
    "keyword"
  }

  fn is_available(&self) -> bool {
    true
  }

  async fn summarize(&self, request: &AnalysisRequest) -> Result<Summary> {
    let assessment = self
      .classifier
      .assess_text(&format!("{}\n{}", request.headline, request.body));
    let severity = assessment.severity.max(request.severity);

    let mut summary = request.headline.trim().to_string();
    let lead = lead_sentences(&request.body, LEAD_SENTENCES);
    if !lead.is_empty() {
      if !summary.ends_with(['.', '!', '?']) {
        summary.push('.');
      }
      summary.push(' ');
      summary.push_str(&lead);
    }
    if request.member_count > 1 {
      summary.push_str(&format!(" ({} reports)", request.member_count));
    }

    let mut key_points = assessment.keywords();
    for keyword in &request.keywords {
      if !key_points.contains(keyword) {
        key_points.push(keyword.clone());
      }
    }

    Ok(Summary {
      summary,
      severity,
      key_points,
    })
  }
}

fn lead_sentences(text: &str, count: usize) -> String {
  let mut out = String::new();
  let mut taken = 0;
  let mut start = 0;
  let chars: Vec<(usize, char)> = text.char_indices().collect();

  for (i, &(pos, c)) in chars.iter().enumerate() {
    let at_end = i + 1 == chars.len();
    let boundary = matches!(c, '.' | '!' | '?') && chars.get(i + 1).is_none_or(|(_, next)| next.is_whitespace());
    if boundary || at_end {
      let sentence = text[start..pos + c.len_utf8()].trim();
      if !sentence.is_empty() {
        if !out.is_empty() {
          out.push(' ');
        }
        out.push_str(sentence);
        taken += 1;
      }
      start = pos + c.len_utf8();
      if taken == count {
        break;
      }
    }
  }
  out
}
