use holdwatch_core::HistoryRecord;
use std::collections::BTreeMap;

/// Average urgency per canonical ticker across prior runs.
///
/// Read-only input to the ranker; tickers absent from every record are absent here.
pub fn prior_urgency(history: &[HistoryRecord]) -> BTreeMap<String, f64> {
  let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
  for record in history {
    for ranked in &record.ranked {
      let entry = totals.entry(ranked.ticker.clone()).or_insert((0.0, 0));
      entry.0 += ranked.score;
      entry.1 += 1;
    }
  }

  totals
    .into_iter()
    .map(|(ticker, (sum, count))| (ticker, sum / count as f64))
    .collect()
}
