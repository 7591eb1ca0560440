// crates/tessera-core/src/node_info.rs
//
// In-memory registry entries for validators and miners.
//
// These structs mirror the state persisted by the ledger contract. They are
// refreshed from the ledger client at cycle boundaries and mutated only by
// the consensus engine and fraud detector, one cycle at a time.

use serde::{Deserialize, Serialize};

/// Maximum number of historical performance scores retained per node.
pub const PERFORMANCE_HISTORY_LEN: usize = 10;

/// Participation status of a validator or miner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Registered but not currently participating.
    Inactive,
    /// Actively participating in cycles.
    Active,
    /// Suspended after a severe deviation. Only a governance action
    /// can restore an Active status.
    Jailed,
}

/// State of a validator as known to the local node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorInfo {
    /// Unique identifier (hex string).
    pub uid: String,
    /// On-ledger account address.
    pub address: String,
    /// Publicly reachable score-exchange endpoint, if known.
    pub api_endpoint: Option<String>,
    /// Staked amount backing this validator.
    pub stake: f64,
    /// Decaying reputation value in [0, 1].
    pub trust_score: f64,
    /// Validator weight W_v, >= 0.
    pub weight: f64,
    /// Participation status.
    pub status: NodeStatus,
    /// Performance score E_v from the previous cycle, in [0, 1].
    pub last_performance: f64,
    /// Bounded history of performance scores, newest last.
    pub performance_history: Vec<f64>,
    /// Unix timestamp of registration.
    pub registration_time: i64,
    /// Cycle of the last state update committed to the ledger, if any.
    pub last_update_cycle: Option<u64>,
}

impl ValidatorInfo {
    /// Append a performance score, dropping the oldest entry once the
    /// history is full.
    pub fn push_performance(&mut self, score: f64) {
        if self.performance_history.len() >= PERFORMANCE_HISTORY_LEN {
            self.performance_history.remove(0);
        }
        self.performance_history.push(score);
    }
}

/// State of a miner as known to the local node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerInfo {
    /// Unique identifier (hex string).
    pub uid: String,
    /// On-ledger account address.
    pub address: String,
    /// Task endpoint of the miner, if known.
    pub api_endpoint: Option<String>,
    /// Staked amount backing this miner.
    pub stake: f64,
    /// Decaying reputation value in [0, 1].
    pub trust_score: f64,
    /// Miner weight W_x, >= 0.
    pub weight: f64,
    /// Participation status.
    pub status: NodeStatus,
    /// Bounded history of adjusted performance scores, newest last.
    pub performance_history: Vec<f64>,
    /// Subnet this miner belongs to.
    pub subnet_uid: u32,
    /// Unix timestamp of registration.
    pub registration_time: i64,
    /// Cycle in which this miner was last assigned a task, -1 if never.
    pub last_selected_cycle: i64,
}

impl MinerInfo {
    /// Append a performance score, dropping the oldest entry once the
    /// history is full.
    pub fn push_performance(&mut self, score: f64) {
        if self.performance_history.len() >= PERFORMANCE_HISTORY_LEN {
            self.performance_history.remove(0);
        }
        self.performance_history.push(score);
    }
}
