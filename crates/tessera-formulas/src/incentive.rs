// crates/tessera-formulas/src/incentive.rs
//
// Incentive (reward share) formulas.
//
// An entity's incentive is its weighted performance share of the total
// contribution pool, scaled by a sigmoid of its trust score. Low-trust
// entities therefore earn a fraction of their proportional share.

use crate::params::SigmoidParams;
use crate::util::sigmoid;

/// Reward share for a validator.
///
/// incentive = sigmoid(trust) * (weight * performance) / total_contribution.
/// Returns 0.0 when the pool is empty; never negative.
pub fn validator_incentive(
    trust_score: f64,
    weight: f64,
    performance: f64,
    total_contribution: f64,
    sigmoid_params: &SigmoidParams,
) -> f64 {
    if total_contribution == 0.0 {
        return 0.0;
    }

    let trust_factor = sigmoid(trust_score, sigmoid_params);
    let incentive = trust_factor * (weight * performance) / total_contribution;
    incentive.max(0.0)
}

/// Reward share for a miner, aggregating the performance scores it
/// received from validators this cycle.
pub fn miner_incentive(
    trust_score: f64,
    weight: f64,
    performance_scores: &[f64],
    total_contribution: f64,
    sigmoid_params: &SigmoidParams,
) -> f64 {
    if total_contribution == 0.0 {
        return 0.0;
    }

    let trust_factor = sigmoid(trust_score, sigmoid_params);
    let weighted_performance: f64 = weight * performance_scores.iter().sum::<f64>();
    (trust_factor * weighted_performance / total_contribution).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_pool_gives_zero() {
        let p = SigmoidParams::default();
        assert_eq!(validator_incentive(0.9, 1.0, 1.0, 0.0, &p), 0.0);
        assert_eq!(miner_incentive(0.9, 1.0, &[1.0], 0.0, &p), 0.0);
    }

    #[test]
    fn test_zero_weighted_performance_gives_zero() {
        let p = SigmoidParams::default();
        assert_eq!(validator_incentive(0.9, 0.0, 1.0, 2.0, &p), 0.0);
        assert_eq!(validator_incentive(0.9, 1.0, 0.0, 2.0, &p), 0.0);
    }

    #[test]
    fn test_incentive_bounded_by_trust_factor() {
        // With weight * performance == total_contribution, the incentive
        // equals sigmoid(trust) exactly; it can never exceed it.
        let p = SigmoidParams::default();
        let incentive = validator_incentive(0.7, 2.0, 0.5, 1.0, &p);
        let trust_factor = sigmoid(0.7, &p);
        assert!((incentive - trust_factor).abs() < 1e-12);

        let partial = validator_incentive(0.7, 2.0, 0.5, 4.0, &p);
        assert!(partial <= trust_factor);
    }

    #[test]
    fn test_higher_trust_earns_more() {
        let p = SigmoidParams::default();
        let low = validator_incentive(0.2, 1.0, 0.8, 2.0, &p);
        let high = validator_incentive(0.8, 1.0, 0.8, 2.0, &p);
        assert!(high > low);
    }

    #[test]
    fn test_miner_incentive_sums_scores() {
        let p = SigmoidParams::default();
        let one = miner_incentive(0.5, 1.0, &[0.4], 10.0, &p);
        let two = miner_incentive(0.5, 1.0, &[0.4, 0.4], 10.0, &p);
        assert!((two - 2.0 * one).abs() < 1e-12);
    }
}
