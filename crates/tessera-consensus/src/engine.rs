// crates/tessera-consensus/src/engine.rs
//
// ConsensusEngine: turns one cycle's collected scores into per-miner
// consensus performance and per-validator trust/reward states.
//
// State machine per cycle: Collecting -> Aggregating -> Finalized, or
// Skipped when fewer than the quorum of distinct validators contributed
// scores. A skipped cycle is a first-class outcome, not an error: every
// validator receives trust decay only, and no data is invented.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tessera_core::{
    CalculatedValidatorState, MinerInfo, NodeStatus, ValidatorInfo, ValidatorScore,
};
use tessera_formulas::{
    adjusted_miner_performance, historical_consistency, miner_incentive, update_trust_score,
    validator_incentive, validator_performance, PerformanceParams, SigmoidParams, TrustParams,
};

const EPSILON: f64 = 1e-9;

/// Tunable parameters for one consensus computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    /// Minimum number of distinct scoring validators before consensus runs.
    pub min_validators_for_consensus: usize,
    /// Trust decay/update parameters.
    pub trust: TrustParams,
    /// Validator performance (E_v) parameters.
    pub performance: PerformanceParams,
    /// Sigmoid applied to trust when computing incentives.
    pub incentive_sigmoid: SigmoidParams,
    /// Stddev ceiling for the historical-consistency quality metric.
    pub metric_max_stddev: f64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            min_validators_for_consensus: 2,
            trust: TrustParams::default(),
            performance: PerformanceParams::default(),
            incentive_sigmoid: SigmoidParams::default(),
            metric_max_stddev: 0.2,
        }
    }
}

/// Observable state of the engine within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    /// Scores are still being collected.
    Collecting,
    /// Aggregation in progress.
    Aggregating,
    /// Consensus computed for the cycle.
    Finalized,
    /// Quorum was not met; only trust decay was applied.
    Skipped,
}

/// Terminal outcome of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    Finalized,
    Skipped,
}

/// Everything the engine produces for one cycle.
#[derive(Debug, Clone)]
pub struct CycleResult {
    /// The cycle the result belongs to.
    pub cycle: u64,
    /// Whether consensus ran or was skipped for lack of quorum.
    pub outcome: CycleOutcome,
    /// Stake-weighted average validator performance at cycle start.
    pub e_avg: f64,
    /// Consensus performance P_adj per scored miner.
    pub miner_scores: HashMap<String, f64>,
    /// Calculated end-of-cycle state per validator.
    pub validator_states: HashMap<String, CalculatedValidatorState>,
}

/// A prepared trust/performance update for one miner.
#[derive(Debug, Clone)]
pub struct MinerUpdate {
    pub uid: String,
    /// New trust score after decay and (for scored miners) the P_adj gain.
    pub trust_score: f64,
    /// The consensus performance this cycle; 0.0 for unscored miners.
    pub performance: f64,
    /// Calculated incentive share; 0.0 for unscored miners.
    pub incentive: f64,
    /// Whether any validator scored this miner this cycle.
    pub scored: bool,
}

/// The per-cycle consensus computation.
pub struct ConsensusEngine {
    params: ConsensusParams,
    phase: CyclePhase,
}

impl ConsensusEngine {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            params,
            phase: CyclePhase::Collecting,
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// The engine's current phase within the cycle.
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Reset to Collecting at the start of a new cycle.
    pub fn begin_cycle(&mut self) {
        self.phase = CyclePhase::Collecting;
    }

    /// Run the consensus computation for a cycle.
    ///
    /// `scores` is the full set of collected scores (local + peers);
    /// `validators` is the registry snapshot taken at cycle start.
    /// Only scores from currently Active validators enter aggregation.
    pub fn run_cycle(
        &mut self,
        cycle: u64,
        scores: &[ValidatorScore],
        validators: &HashMap<String, ValidatorInfo>,
    ) -> CycleResult {
        self.phase = CyclePhase::Aggregating;
        tracing::info!(cycle, score_count = scores.len(), "running consensus");

        // Quorum: distinct validators that contributed any score.
        let mut scorer_uids: Vec<&str> = scores.iter().map(|s| s.validator_uid.as_str()).collect();
        scorer_uids.sort_unstable();
        scorer_uids.dedup();

        if scorer_uids.len() < self.params.min_validators_for_consensus {
            tracing::warn!(
                cycle,
                scorers = scorer_uids.len(),
                required = self.params.min_validators_for_consensus,
                "quorum not met, skipping consensus and applying trust decay only"
            );
            self.phase = CyclePhase::Skipped;
            return self.decay_only_result(cycle, validators);
        }

        // --- 1. Consensus score (P_adj) per miner, from Active scorers. ---
        let mut scores_by_miner: HashMap<&str, Vec<(f64, f64)>> = HashMap::new();
        let mut active_scores: Vec<&ValidatorScore> = Vec::new();
        for score in scores {
            let scorer = match validators.get(&score.validator_uid) {
                Some(v) if v.status == NodeStatus::Active => v,
                _ => continue,
            };
            scores_by_miner
                .entry(score.miner_uid.as_str())
                .or_default()
                .push((score.score, scorer.trust_score));
            active_scores.push(score);
        }

        let mut miner_scores: HashMap<String, f64> = HashMap::new();
        for (miner_uid, pairs) in &scores_by_miner {
            let (s, t): (Vec<f64>, Vec<f64>) = pairs.iter().copied().unzip();
            let p_adj = adjusted_miner_performance(&s, &t);
            tracing::debug!(miner = *miner_uid, p_adj, "consensus score computed");
            miner_scores.insert((*miner_uid).to_string(), p_adj);
        }

        // --- 2. Per-validator deviation from the consensus score. ---
        let mut deviations: HashMap<&str, Vec<f64>> = HashMap::new();
        for score in &active_scores {
            if let Some(&p_adj) = miner_scores.get(&score.miner_uid) {
                deviations
                    .entry(score.validator_uid.as_str())
                    .or_default()
                    .push((score.score - p_adj).abs());
            }
        }

        // --- 3. Stake-weighted average performance over Active validators,
        // using the *prior* cycle's last_performance to avoid circularity. ---
        let e_avg = stake_weighted_e_avg(validators);
        tracing::debug!(cycle, e_avg, "stake-weighted validator performance average");

        // --- 4. E_v, trust, and contribution per validator. ---
        let mut validator_states: HashMap<String, CalculatedValidatorState> = HashMap::new();
        let mut total_contribution = 0.0;
        for (uid, info) in validators {
            let devs = deviations.get(uid.as_str());
            let avg_deviation = devs
                .map(|d| d.iter().sum::<f64>() / d.len() as f64)
                .unwrap_or(0.0);

            let metric_quality = historical_consistency(
                &info.performance_history,
                self.params.metric_max_stddev,
            );

            // A validator that also mined this cycle uses its own P_adj as
            // the task-completion component.
            let q_task = miner_scores.get(uid).copied().unwrap_or(0.0);

            let e_v = validator_performance(
                q_task,
                metric_quality,
                avg_deviation,
                &self.params.performance,
            );

            // Non-Active validators decay only; they never gain trust.
            let score_for_trust = if info.status == NodeStatus::Active {
                e_v
            } else {
                0.0
            };
            let trust = update_trust_score(info.trust_score, 1, score_for_trust, &self.params.trust);

            let contribution = if info.status == NodeStatus::Active {
                let c = info.weight * e_v;
                total_contribution += c;
                c
            } else {
                0.0
            };

            tracing::debug!(
                validator = uid.as_str(),
                e_v,
                trust,
                avg_deviation,
                metric_quality,
                "validator state calculated"
            );

            validator_states.insert(
                uid.clone(),
                CalculatedValidatorState {
                    uid: uid.clone(),
                    cycle,
                    e_v,
                    trust,
                    weight: info.weight,
                    contribution,
                    reward: 0.0,
                    avg_deviation,
                    metric_quality,
                    start_trust: info.trust_score,
                    start_status: info.status,
                },
            );
        }

        // --- 5. Normalize rewards over the Active contribution pool. ---
        if total_contribution > EPSILON {
            for state in validator_states.values_mut() {
                if state.start_status == NodeStatus::Active {
                    state.reward = validator_incentive(
                        state.start_trust,
                        state.weight,
                        state.e_v,
                        total_contribution,
                        &self.params.incentive_sigmoid,
                    );
                }
            }
        } else {
            tracing::warn!(cycle, "total active contribution is zero, no rewards");
        }

        self.phase = CyclePhase::Finalized;
        tracing::info!(
            cycle,
            miners = miner_scores.len(),
            validators = validator_states.len(),
            "consensus finalized"
        );

        CycleResult {
            cycle,
            outcome: CycleOutcome::Finalized,
            e_avg,
            miner_scores,
            validator_states,
        }
    }

    /// The conservative fallback when quorum is not met: every validator
    /// decays, nobody earns, and no miner score is produced.
    fn decay_only_result(
        &self,
        cycle: u64,
        validators: &HashMap<String, ValidatorInfo>,
    ) -> CycleResult {
        let mut validator_states = HashMap::new();
        for (uid, info) in validators {
            let trust = update_trust_score(info.trust_score, 1, 0.0, &self.params.trust);
            validator_states.insert(
                uid.clone(),
                CalculatedValidatorState {
                    uid: uid.clone(),
                    cycle,
                    // E_v carries over; there is no new evidence either way.
                    e_v: info.last_performance,
                    trust,
                    weight: info.weight,
                    contribution: 0.0,
                    reward: 0.0,
                    avg_deviation: 0.0,
                    metric_quality: 0.5,
                    start_trust: info.trust_score,
                    start_status: info.status,
                },
            );
        }

        CycleResult {
            cycle,
            outcome: CycleOutcome::Skipped,
            e_avg: 0.0,
            miner_scores: HashMap::new(),
            validator_states,
        }
    }

    /// Prepare post-consensus trust/performance updates for miners.
    ///
    /// Scored miners gain trust from their P_adj and earn an incentive
    /// share of the weighted performance pool; unscored miners decay.
    pub fn prepare_miner_updates(
        &self,
        miners: &HashMap<String, MinerInfo>,
        miner_scores: &HashMap<String, f64>,
    ) -> HashMap<String, MinerUpdate> {
        let total_miner_value: f64 = miners
            .iter()
            .filter_map(|(uid, m)| miner_scores.get(uid).map(|p| m.weight * p))
            .sum();

        let mut updates = HashMap::new();
        for (uid, miner) in miners {
            let update = match miner_scores.get(uid) {
                Some(&p_adj) => {
                    let trust_score =
                        update_trust_score(miner.trust_score, 1, p_adj, &self.params.trust);
                    let incentive = miner_incentive(
                        miner.trust_score,
                        miner.weight,
                        &[p_adj],
                        total_miner_value,
                        &self.params.incentive_sigmoid,
                    );
                    MinerUpdate {
                        uid: uid.clone(),
                        trust_score,
                        performance: p_adj,
                        incentive,
                        scored: true,
                    }
                }
                None => MinerUpdate {
                    uid: uid.clone(),
                    trust_score: update_trust_score(miner.trust_score, 1, 0.0, &self.params.trust),
                    performance: 0.0,
                    incentive: 0.0,
                    scored: false,
                },
            };
            updates.insert(uid.clone(), update);
        }
        updates
    }
}

/// Stake-weighted mean of Active validators' prior performance.
/// Falls back to 0.5 when no Active validator has stake.
fn stake_weighted_e_avg(validators: &HashMap<String, ValidatorInfo>) -> f64 {
    let active: Vec<&ValidatorInfo> = validators
        .values()
        .filter(|v| v.status == NodeStatus::Active)
        .collect();
    let total_stake: f64 = active.iter().map(|v| v.stake).sum();
    if total_stake <= EPSILON {
        return 0.5;
    }
    active
        .iter()
        .map(|v| v.stake * v.last_performance)
        .sum::<f64>()
        / total_stake
}
