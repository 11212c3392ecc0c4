use holdwatch_core::{DecayConfig, DecayKind};

/// Recency weight in `[0, 1]` for an item `age_hours` old
pub fn recency_weight(config: &DecayConfig, age_hours: f64) -> f64 {
  let age = age_hours.max(0.0);
  match config.kind {
    DecayKind::Exponential => 0.5f64.powf(age / config.half_life_hours),
    DecayKind::Linear => (1.0 - age / config.horizon_hours).clamp(0.0, 1.0),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
  }

  #[test]
  fn test_exponential_half_life() {
    let config = DecayConfig::exponential(12.0);
    assert!(close(recency_weight(&config, 0.0), 1.0));
    assert!(close(recency_weight(&config, 12.0), 0.5));
    assert!(close(recency_weight(&config, 24.0), 0.25));
  }

  #[test]
  fn test_linear_horizon() {
    let config = DecayConfig::linear(720.0);
    assert!(close(recency_weight(&config, 360.0), 0.5));
    assert_eq!(recency_weight(&config, 1000.0), 0.0);
  }

  #[test]
  fn test_future_items_are_fresh() {
    let config = DecayConfig::exponential(12.0);
    assert!(close(recency_weight(&config, -5.0), 1.0));
  }
}
