// crates/tessera-formulas/src/weight.rs
//
// Weight formulas for miners and validators.

use crate::params::WeightParams;

const EPSILON: f64 = 1e-9;

/// Miner weight from performance history with exponential decay.
///
/// W_x = sum over t of P_t * e^(-decay * (T - t)), where the first history
/// entry is the oldest. A `current_time_step` smaller than the history
/// length is treated as the history length.
pub fn miner_weight(performance_history: &[f64], current_time_step: u64, decay: f64) -> f64 {
    let history_len = performance_history.len() as u64;
    let effective_t = current_time_step.max(history_len);

    let weight: f64 = performance_history
        .iter()
        .enumerate()
        .map(|(t, &p)| {
            let age = (effective_t - t as u64) as f64;
            p * (-decay * age).exp()
        })
        .sum();

    weight.max(0.0)
}

/// Validator weight from stake share, relative performance, and tenure.
///
/// weight = lambda * stake_share
///        + (1 - lambda) * (E_v / E_avg) * (1 + log_b(1 + time_participated))
///
/// The stake share is the raw stake fraction; the performance ratio falls
/// back to 1 (or 0 for a zero performer) when E_avg is zero.
pub fn validator_weight(
    stake: f64,
    total_stake: f64,
    e_validator: f64,
    e_avg: f64,
    time_participated: f64,
    params: &WeightParams,
) -> f64 {
    let stake_share = if total_stake <= 0.0 {
        0.0
    } else {
        stake / total_stake
    };

    let performance_ratio = if e_avg > 0.0 {
        e_validator / e_avg.max(EPSILON)
    } else if e_validator > 0.0 {
        1.0
    } else {
        0.0
    };

    let time_bonus = if params.time_log_base > 1.0 {
        (1.0 + time_participated.max(0.0)).log(params.time_log_base)
    } else {
        0.0
    };

    let weight = params.lambda_balance * stake_share
        + (1.0 - params.lambda_balance) * performance_ratio * (1.0 + time_bonus);
    weight.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miner_weight_empty_history() {
        assert_eq!(miner_weight(&[], 5, 0.5), 0.0);
    }

    #[test]
    fn test_miner_weight_recent_scores_count_more() {
        // Same score placed later in history contributes more weight.
        let old_heavy = miner_weight(&[0.9, 0.1], 2, 0.5);
        let new_heavy = miner_weight(&[0.1, 0.9], 2, 0.5);
        assert!(new_heavy > old_heavy);
    }

    #[test]
    fn test_miner_weight_handles_small_time_step() {
        // A time step below the history length falls back to the length.
        let a = miner_weight(&[0.5, 0.5, 0.5], 0, 0.5);
        let b = miner_weight(&[0.5, 0.5, 0.5], 3, 0.5);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_validator_weight_zero_stake_pool() {
        let params = WeightParams::default();
        let w = validator_weight(100.0, 0.0, 0.5, 0.5, 10.0, &params);
        // Only the performance/time component remains.
        assert!(w > 0.0);
    }

    #[test]
    fn test_validator_weight_grows_with_stake_share() {
        let params = WeightParams::default();
        let small = validator_weight(100.0, 1000.0, 0.5, 0.5, 10.0, &params);
        let large = validator_weight(500.0, 1000.0, 0.5, 0.5, 10.0, &params);
        assert!(large > small);
    }

    #[test]
    fn test_validator_weight_above_average_performer() {
        let params = WeightParams::default();
        let average = validator_weight(100.0, 1000.0, 0.5, 0.5, 10.0, &params);
        let better = validator_weight(100.0, 1000.0, 0.8, 0.5, 10.0, &params);
        assert!(better > average);
    }

    #[test]
    fn test_validator_weight_never_negative() {
        let params = WeightParams::default();
        assert!(validator_weight(0.0, 0.0, 0.0, 0.0, 0.0, &params) >= 0.0);
    }
}
