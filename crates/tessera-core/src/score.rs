// crates/tessera-core/src/score.rs
//
// Validator score records and the signed submission payload exchanged
// between peers.
//
// Canonical serialization: scores are sorted by (task_id, miner_uid,
// validator_uid) and encoded with serde_json. Struct field order is fixed
// by the declaration below, and serde_json emits the shortest
// round-trippable decimal form for every f64, so the same score list
// always produces the same bytes on every node.

use serde::{Deserialize, Serialize};

use crate::error::TesseraError;

/// A single score one validator assigned to one miner for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorScore {
    /// Task being scored.
    pub task_id: String,
    /// Miner that produced the result.
    pub miner_uid: String,
    /// The validator that produced this score.
    pub validator_uid: String,
    /// Score in [0, 1].
    pub score: f64,
    /// Deviation from the consensus score; None until consensus is computed.
    pub deviation: Option<f64>,
    /// Unix timestamp (seconds) when the score was produced.
    pub timestamp: f64,
}

/// A signed batch of scores broadcast to peers for one cycle.
///
/// Immutable once signed; the `cycle` field binds the payload to exactly
/// one consensus round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSubmissionPayload {
    /// The scores, in the submitter's canonical order.
    pub scores: Vec<ValidatorScore>,
    /// UID of the submitting validator.
    pub submitter_uid: String,
    /// Consensus cycle the scores belong to.
    pub cycle: u64,
    /// On-ledger address of the submitter.
    pub submitter_address: String,
    /// Hex-encoded ed25519 signature over `canonical_score_bytes(scores)`.
    pub signature: String,
    /// Hex-encoded ed25519 public key of the submitter.
    pub public_key: String,
}

/// Serialize a score list into its canonical signing form.
///
/// The list is sorted by (task_id, miner_uid, validator_uid) so that two
/// nodes holding the same scores in different orders produce identical
/// bytes.
pub fn canonical_score_bytes(scores: &[ValidatorScore]) -> Result<Vec<u8>, TesseraError> {
    let mut sorted: Vec<&ValidatorScore> = scores.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.task_id, &a.miner_uid, &a.validator_uid)
            .cmp(&(&b.task_id, &b.miner_uid, &b.validator_uid))
    });
    let json = serde_json::to_string(&sorted)?;
    Ok(json.into_bytes())
}
