//! Prompt templates for cluster analysis

use tracing::trace;

use crate::AnalysisRequest;

/// JSON schema the analysis command is asked to follow
pub const SUMMARY_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "summary": { "type": "string" },
    "severity": { "type": "string", "enum": ["none", "low", "medium", "high", "critical"] },
    "key_points": { "type": "array", "items": { "type": "string" } }
  },
  "required": ["summary", "severity"]
}"#;

/// Instructions prepended to every cluster context
pub const SUMMARY_PROMPT: &str = r#"You are a portfolio news analyst. Several outlets may have reported the same event; you see one representative article and how many reports exist.

Write a two or three sentence summary of what happened and why it matters to a holder of the stock. Then rate severity for the holder:
- critical: threatens the investment (fraud, delisting, insolvency, trading halt)
- high: material negative or positive surprise (lawsuits, downgrades, probes, large contract wins)
- medium: scheduled or expected events with some impact (results, guidance, mergers)
- low: routine corporate actions (dividends, buybacks)
- none: no bearing on the holding

Respond with JSON only, matching this schema:
"#;

/// Render the context block for one cluster
pub fn build_context(request: &AnalysisRequest) -> String {
  let mut block = format!("STOCK: {} | {} | {}", request.ticker, request.name, request.market);
  if let Some(sector) = &request.sector {
    block.push_str(&format!(" | {}", sector));
  }

  block.push_str(&format!("\nREPORTS: {} ({})", request.member_count, request.sources.join(", ")));
  if let Some(published) = request.published {
    block.push_str(&format!("\nDATE: {}", published.format("%Y-%m-%d %H:%M UTC")));
  }
  if !request.keywords.is_empty() {
    block.push_str(&format!("\nFLAGS: {}", request.keywords.join(", ")));
  }

  block.push_str(&format!("\n\nHEADLINE: {}", request.headline));
  if !request.body.is_empty() {
    block.push_str(&format!("\n{}", request.body));
  }
  block
}

/// Full prompt: instructions, schema, then the cluster context
pub fn build_summary_prompt(request: &AnalysisRequest) -> String {
  let context = build_context(request);
  let prompt = format!("{}{}\n\n{}", SUMMARY_PROMPT, SUMMARY_SCHEMA, context);
  trace!(
    cluster = %request.cluster_id,
    context_len = context.len(),
    total_len = prompt.len(),
    "Built summary prompt"
  );
  prompt
}

/// Rough token estimate (four characters per token)
pub fn estimate_tokens(text: &str) -> usize {
  text.chars().count().div_ceil(4)
}
