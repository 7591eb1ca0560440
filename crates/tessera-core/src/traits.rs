// crates/tessera-core/src/traits.rs

use async_trait::async_trait;

use crate::error::TesseraError;
use crate::node_info::{MinerInfo, ValidatorInfo};
use crate::task::{MinerResult, TaskAssignment};

/// Trait for the ledger/contract client that persists final state.
///
/// Failures are treated as retryable by the orchestration layer and never
/// invalidate an in-memory consensus result.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch one validator's on-ledger state.
    async fn get_validator(&self, uid: &str) -> Result<Option<ValidatorInfo>, TesseraError>;

    /// Fetch all registered validators.
    async fn get_all_validators(&self) -> Result<Vec<ValidatorInfo>, TesseraError>;

    /// Fetch all registered miners.
    async fn get_all_miners(&self) -> Result<Vec<MinerInfo>, TesseraError>;

    /// Commit a validator's trust/performance update for a cycle.
    /// Returns a transaction hash on success.
    async fn submit_validator_update(
        &self,
        uid: &str,
        cycle: u64,
        trust_score: f64,
        performance: f64,
    ) -> Result<String, TesseraError>;

    /// Commit a miner's trust/performance update for a cycle.
    /// Returns a transaction hash on success.
    async fn submit_miner_update(
        &self,
        uid: &str,
        cycle: u64,
        trust_score: f64,
        performance: f64,
    ) -> Result<String, TesseraError>;
}

/// Trait for the transport that carries tasks to miners and results back.
///
/// The concrete wire format is outside the consensus engine's concern;
/// only the timeout/ack contract matters.
#[async_trait]
pub trait TaskTransport: Send + Sync {
    /// Deliver a task to a miner endpoint. An error marks the miner
    /// unreachable for this cycle, not a cycle failure.
    async fn send_task(&self, endpoint: &str, task: &TaskAssignment) -> Result<(), TesseraError>;

    /// Poll a miner endpoint for the result of a task. `Ok(None)` means
    /// the result is not ready yet.
    async fn poll_result(
        &self,
        endpoint: &str,
        task_id: &str,
    ) -> Result<Option<MinerResult>, TesseraError>;
}

/// Produces the opaque task payload for a miner, or None to skip the miner
/// this cycle. Injected into the validator node at construction.
pub trait TaskFactory: Send + Sync {
    fn create_task(&self, miner_uid: &str) -> Option<serde_json::Value>;
}

/// Grades a miner's result against the task that produced it.
///
/// Must be deterministic so independent validators scoring the same miner
/// agree, and must return 0.0 (not an error) on malformed input so a single
/// bad result cannot crash a cycle.
pub trait Scorer: Send + Sync {
    fn score(&self, task_data: &serde_json::Value, result_data: &serde_json::Value) -> f64;
}

/// Discovery of which validators are active in a slot.
///
/// The slot coordinator only consumes this capability; when it is
/// unavailable, quorum detection degrades to "unknown" and the score
/// exchange's own submission count is used instead.
pub trait ActiveValidatorDirectory: Send + Sync {
    /// Mark the local validator active for a slot.
    fn register(&self, validator_uid: &str, slot: u64) -> Result<(), TesseraError>;

    /// List the validators known to be active in a slot.
    fn list_active_validators(&self, slot: u64) -> Result<Vec<String>, TesseraError>;
}
