// crates/tessera-formulas/src/consistency.rs
//
// Historical consistency quality metric.
//
// A validator whose historical scores are stable (low standard deviation)
// gets a quality score near 1; an erratic one decays linearly toward 0.
// This is a fixed heuristic without a stated derivation; the stddev
// ceiling is configurable and needs empirical calibration.

/// Quality score in [0, 1] from the standard deviation of historical scores.
///
/// With fewer than two data points there is nothing to measure, so the
/// uninformative prior 0.5 is returned. A non-positive `max_stddev` falls
/// back to 0.5 to avoid dividing by zero.
pub fn historical_consistency(scores: &[f64], max_stddev: f64) -> f64 {
    if scores.len() < 2 {
        return 0.5;
    }

    let ceiling = if max_stddev <= 0.0 { 0.5 } else { max_stddev };

    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let normalized_penalty = (stddev / ceiling).min(1.0);
    (1.0 - normalized_penalty).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_history_returns_prior() {
        assert_eq!(historical_consistency(&[], 0.2), 0.5);
        assert_eq!(historical_consistency(&[0.8], 0.2), 0.5);
    }

    #[test]
    fn test_constant_history_is_perfect() {
        let scores = vec![0.7; 8];
        assert!((historical_consistency(&scores, 0.2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_erratic_history_floors_at_zero() {
        // Alternating 0/1 has stddev 0.5, beyond a 0.2 ceiling.
        let scores = vec![0.0, 1.0, 0.0, 1.0];
        assert_eq!(historical_consistency(&scores, 0.2), 0.0);
    }

    #[test]
    fn test_mild_variation_scores_between() {
        let scores = vec![0.5, 0.55, 0.45, 0.5];
        let quality = historical_consistency(&scores, 0.2);
        assert!(quality > 0.5 && quality < 1.0);
    }

    #[test]
    fn test_invalid_ceiling_falls_back() {
        let scores = vec![0.0, 1.0];
        // Ceiling <= 0 uses the 0.5 safety value; stddev 0.5 hits the cap.
        assert_eq!(historical_consistency(&scores, 0.0), 0.0);
    }
}
