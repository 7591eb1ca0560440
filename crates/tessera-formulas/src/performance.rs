// crates/tessera-formulas/src/performance.rs
//
// Miner and validator performance formulas.

use crate::params::{PenaltyParams, PerformanceParams};

/// Trust-weighted mean of the scores validators gave one miner.
///
/// # Arguments
/// * `scores` - Per-validator scores for the miner (P_miner,v).
/// * `trusts` - The scoring validators' trust scores, same order.
///
/// # Returns
/// The adjusted performance P_adj in [0, 1]; 0.0 when the inputs are
/// empty, mismatched, or total trust is zero.
pub fn adjusted_miner_performance(scores: &[f64], trusts: &[f64]) -> f64 {
    if scores.is_empty() || scores.len() != trusts.len() {
        return 0.0;
    }

    let total_trust: f64 = trusts.iter().sum();
    if total_trust == 0.0 {
        return 0.0;
    }

    let weighted: f64 = scores.iter().zip(trusts.iter()).map(|(s, t)| s * t).sum();
    (weighted / total_trust).clamp(0.0, 1.0)
}

/// Deviation penalty term: 1 / (1 + k * max(0, deviation - threshold)^p).
///
/// Always in (0, 1]; 1.0 means no penalty.
pub fn penalty_term(deviation: f64, params: &PenaltyParams) -> f64 {
    let excess = (deviation - params.threshold).max(0.0);
    1.0 / (1.0 + params.k * excess.powf(params.p))
}

/// Composite validator performance E_v.
///
/// E_v = theta1 * q_task + theta2 * metric_quality + theta3 * penalty_term,
/// clamped to [0, 1]. The thetas are expected to sum to 1; a deviation is
/// logged as a warning rather than treated as an error.
pub fn validator_performance(
    q_task: f64,
    metric_quality: f64,
    deviation: f64,
    params: &PerformanceParams,
) -> f64 {
    let theta_sum = params.theta1 + params.theta2 + params.theta3;
    if (theta_sum - 1.0).abs() > 1e-9 {
        tracing::warn!(
            theta_sum,
            "validator performance weights do not sum to 1.0"
        );
    }

    let penalty = penalty_term(deviation, &params.penalty);
    let e_v = params.theta1 * q_task + params.theta2 * metric_quality + params.theta3 * penalty;
    e_v.clamp(0.0, 1.0)
}

/// Task completion rate with exponential time decay.
///
/// Both the successes and the totals are discounted by e^(-decay * age),
/// so recent cycles dominate the ratio.
///
/// # Arguments
/// * `success_tasks` - Completed task counts per past cycle, oldest first.
/// * `total_tasks` - Assigned task counts per past cycle, same order.
/// * `current_time` - The current cycle index T.
/// * `decay` - Decay constant.
pub fn task_completion_rate(
    success_tasks: &[u64],
    total_tasks: &[u64],
    current_time: u64,
    decay: f64,
) -> f64 {
    let discounted = |counts: &[u64]| -> f64 {
        counts
            .iter()
            .enumerate()
            .map(|(t, &count)| {
                let age = current_time.saturating_sub(t as u64) as f64;
                count as f64 * (-decay * age).exp()
            })
            .sum()
    };

    let denominator = discounted(total_tasks);
    if denominator == 0.0 {
        return 0.0;
    }

    (discounted(success_tasks) / denominator).clamp(0.0, 1.0)
}
