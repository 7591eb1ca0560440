// crates/tessera-slot/src/phase.rs

use serde::{Deserialize, Serialize};

/// The phase of a slot the network is currently in.
///
/// Lifecycle within a slot: TaskAssignment -> TaskExecution -> Consensus
/// -> MetagraphUpdate. Any time left after the configured minimum phase
/// durations belongs to MetagraphUpdate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotPhase {
    /// Validators select miners and dispatch tasks.
    TaskAssignment,
    /// Miners execute tasks; validators collect results.
    TaskExecution,
    /// Scores are exchanged between validators and consensus is computed.
    Consensus,
    /// Final state is committed to the ledger/metagraph.
    MetagraphUpdate,
}

impl SlotPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotPhase::TaskAssignment => "task_assignment",
            SlotPhase::TaskExecution => "task_execution",
            SlotPhase::Consensus => "consensus",
            SlotPhase::MetagraphUpdate => "metagraph_update",
        }
    }
}

impl std::fmt::Display for SlotPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
