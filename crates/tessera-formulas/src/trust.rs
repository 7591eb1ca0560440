// crates/tessera-formulas/src/trust.rs
//
// Trust score decay and update.
//
// Trust decays exponentially with the number of cycles since the last
// evaluation, and only gains from fresh evidence: an entity with no new
// score this cycle decays but never gains.

use crate::params::TrustParams;
use crate::util::{alpha_effective, sigmoid};

/// Update a trust score with decay and (optionally) new evidence.
///
/// # Arguments
/// * `trust_old` - Trust score at the start of the period.
/// * `cycles_since_eval` - Number of cycles since the last evaluation.
/// * `score_new` - New performance score (P_adj or E_v); 0.0 means the
///   entity was not evaluated and only decay applies.
/// * `params` - Decay and learning-rate parameters.
///
/// # Returns
/// The updated trust score, clamped to [0, 1].
pub fn update_trust_score(
    trust_old: f64,
    cycles_since_eval: u32,
    score_new: f64,
    params: &TrustParams,
) -> f64 {
    let decayed = trust_old * (-params.delta * cycles_since_eval as f64).exp();

    // Gain applies only when the entity was actually scored.
    let update_term = if score_new > 0.0 {
        let alpha = alpha_effective(trust_old, params.alpha_base, params.k_alpha);
        alpha * sigmoid(score_new, &params.update_sigmoid)
    } else {
        0.0
    };

    (decayed + update_term).clamp(0.0, 1.0)
}

/// Selection weight for a miner or validator, combining trust with a
/// fairness bonus for entities that have not been selected recently.
///
/// The bonus is capped at `max_time_bonus` cycles so long-idle entities
/// cannot dominate selection on staleness alone.
pub fn selection_probability(
    trust_score: f64,
    cycles_since_selection: u32,
    beta: f64,
    max_time_bonus: u32,
) -> f64 {
    let effective_time = cycles_since_selection.min(max_time_bonus);
    let fairness_bonus = 1.0 + beta * effective_time as f64;
    (trust_score * fairness_bonus).max(0.0)
}
