// crates/tessera-core/src/state.rs
//
// Per-cycle consensus output records.
//
// CalculatedValidatorState is the unit exchanged between the consensus
// engine and the fraud detector: it carries both the computed outputs and
// the inputs used, so the state can be re-derived and compared one cycle
// later. It is retained for exactly one extra cycle, then discarded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::node_info::NodeStatus;

/// The locally computed end-of-cycle state for one validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedValidatorState {
    /// Validator this state belongs to.
    pub uid: String,
    /// Cycle the state was computed for.
    pub cycle: u64,
    /// Validator performance E_v for this cycle, in [0, 1].
    pub e_v: f64,
    /// Projected trust score at end of cycle, in [0, 1].
    pub trust: f64,
    /// Validator weight at cycle start.
    pub weight: f64,
    /// Contribution W*E toward the reward pool; > 0 only for Active validators.
    pub contribution: f64,
    /// Calculated reward share for this cycle.
    pub reward: f64,
    // Inputs retained so the fraud detector can re-derive the state.
    /// Mean absolute deviation of this validator's scores from consensus.
    pub avg_deviation: f64,
    /// Historical-consistency quality metric used for E_v.
    pub metric_quality: f64,
    /// Trust score at cycle start.
    pub start_trust: f64,
    /// Status at cycle start.
    pub start_status: NodeStatus,
}

/// The consensus outcome a validator publishes for one miner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConsensusResult {
    /// Miner this result belongs to.
    pub miner_uid: String,
    /// Trust-weighted consensus performance P_adj, in [0, 1].
    pub p_adj: f64,
    /// Calculated incentive for this miner.
    pub incentive: f64,
}

/// All consensus results a validator publishes for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConsensusResults {
    /// The cycle number.
    pub cycle: u64,
    /// Per-miner results, keyed by miner UID.
    pub results: HashMap<String, MinerConsensusResult>,
    /// UID of the publishing validator.
    pub publisher_uid: String,
    /// Unix timestamp (seconds) when the results were published.
    pub published_at: f64,
}
