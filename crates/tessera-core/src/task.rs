// crates/tessera-core/src/task.rs
//
// Task assignment and miner result records.
//
// A TaskAssignment is created when a validator dispatches a task and is
// read-only afterward; both records are discarded at cycle end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task dispatched by a validator to a miner for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    /// Unique per validator per cycle.
    pub task_id: String,
    /// The miner the task was sent to.
    pub miner_uid: String,
    /// The validator that dispatched the task.
    pub validator_uid: String,
    /// Opaque task payload, interpreted only by the task factory and scorer.
    pub task_data: serde_json::Value,
    /// When the task was dispatched.
    pub timestamp_sent: DateTime<Utc>,
    /// Results arriving after this point are rejected.
    pub deadline: DateTime<Utc>,
}

/// A miner's response to a task. At most one result is accepted per task_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerResult {
    /// The task this result answers.
    pub task_id: String,
    /// The responding miner.
    pub miner_uid: String,
    /// Opaque result payload, interpreted only by the scorer.
    pub result_data: serde_json::Value,
    /// When the result arrived.
    pub timestamp_received: DateTime<Utc>,
}
