// crates/tessera-p2p/src/exchange.rs
//
// Inbound side of the score exchange.
//
// Every incoming submission passes a validation pipeline before touching
// the score book: loop-back check, cycle window, submitter lookup, address
// binding, signature verification. The cheap checks run first so an
// out-of-window submission costs no signature work. Acceptance is
// idempotent: re-submitting for the same (submitter, cycle) overwrites.

use std::collections::HashMap;

use thiserror::Error;

use tessera_core::crypto::{derive_address, hex_decode, verify_signature};
use tessera_core::{canonical_score_bytes, ScoreSubmissionPayload, ValidatorInfo, ValidatorScore};

/// Why a submission was rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("loop-back submission from self")]
    SelfSubmission,
    #[error("cycle out of window (submitted {submitted}, current {current})")]
    CycleOutOfWindow { submitted: u64, current: u64 },
    #[error("unknown submitter {0}")]
    UnknownSubmitter(String),
    #[error("address mismatch (expected {expected}, derived {derived})")]
    AddressMismatch { expected: String, derived: String },
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Per-cycle book of accepted peer submissions plus the local one.
pub struct ScoreExchange {
    self_uid: String,
    min_validators_for_consensus: usize,
    /// cycle -> submitter UID -> that submitter's scores.
    received: HashMap<u64, HashMap<String, Vec<ValidatorScore>>>,
}

impl ScoreExchange {
    pub fn new(self_uid: &str, min_validators_for_consensus: usize) -> Self {
        Self {
            self_uid: self_uid.to_string(),
            min_validators_for_consensus,
            received: HashMap::new(),
        }
    }

    /// Record the local validator's own scores for a cycle.
    pub fn record_local(&mut self, cycle: u64, scores: Vec<ValidatorScore>) {
        self.received
            .entry(cycle)
            .or_default()
            .insert(self.self_uid.clone(), scores);
    }

    /// Validate and accept a peer submission.
    ///
    /// On success returns the number of scores accepted. The registry is
    /// the trust anchor: the public key in the payload must derive to the
    /// address already on record for the claimed UID — a first-time,
    /// unknown UID is rejected, not auto-trusted. Every rejection is
    /// logged with the submitter, cycle, and reason.
    pub fn accept(
        &mut self,
        payload: ScoreSubmissionPayload,
        current_cycle: u64,
        validators: &HashMap<String, ValidatorInfo>,
    ) -> Result<usize, RejectReason> {
        let submitter = payload.submitter_uid.clone();
        let cycle = payload.cycle;
        match self.try_accept(payload, current_cycle, validators) {
            Ok(accepted) => Ok(accepted),
            Err(reason) => {
                tracing::warn!(
                    submitter = submitter.as_str(),
                    cycle,
                    %reason,
                    "score submission rejected"
                );
                Err(reason)
            }
        }
    }

    fn try_accept(
        &mut self,
        payload: ScoreSubmissionPayload,
        current_cycle: u64,
        validators: &HashMap<String, ValidatorInfo>,
    ) -> Result<usize, RejectReason> {
        // 1. Loop-back: broadcast filtering should already exclude us.
        if payload.submitter_uid == self.self_uid {
            return Err(RejectReason::SelfSubmission);
        }

        // 2. Cycle window: current or immediately preceding cycle only.
        // Checked before any signature work.
        let window_start = current_cycle.saturating_sub(1);
        if payload.cycle < window_start || payload.cycle > current_cycle {
            return Err(RejectReason::CycleOutOfWindow {
                submitted: payload.cycle,
                current: current_cycle,
            });
        }

        // 3. The submitter must already be in the local registry.
        let known = validators
            .get(&payload.submitter_uid)
            .ok_or_else(|| RejectReason::UnknownSubmitter(payload.submitter_uid.clone()))?;

        // 4. Bind the signing key to the registered identity.
        let pubkey_bytes: [u8; 32] = hex_decode(&payload.public_key)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| RejectReason::MalformedPayload("bad public key hex".to_string()))?;

        let derived = derive_address(&pubkey_bytes);
        if derived != known.address {
            return Err(RejectReason::AddressMismatch {
                expected: known.address.clone(),
                derived,
            });
        }

        // 5. Verify the signature over the canonical score bytes.
        let signature = hex_decode(&payload.signature)
            .ok_or_else(|| RejectReason::MalformedPayload("bad signature hex".to_string()))?;
        let message = canonical_score_bytes(&payload.scores)
            .map_err(|e| RejectReason::MalformedPayload(e.to_string()))?;
        let valid = verify_signature(&pubkey_bytes, &message, &signature)
            .map_err(|e| RejectReason::MalformedPayload(e.to_string()))?;
        if !valid {
            return Err(RejectReason::InvalidSignature);
        }

        // 6. Keep only well-formed scores attributed to the submitter.
        let submitter = payload.submitter_uid.clone();
        let scores: Vec<ValidatorScore> = payload
            .scores
            .into_iter()
            .filter(|s| {
                if s.validator_uid != submitter {
                    tracing::warn!(
                        submitter = submitter.as_str(),
                        claimed = s.validator_uid.as_str(),
                        "dropping score attributed to another validator"
                    );
                    return false;
                }
                if !s.score.is_finite() || !(0.0..=1.0).contains(&s.score) {
                    tracing::warn!(
                        submitter = submitter.as_str(),
                        task = s.task_id.as_str(),
                        score = s.score,
                        "dropping out-of-range score"
                    );
                    return false;
                }
                true
            })
            .collect();

        let accepted = scores.len();

        // 7. Idempotent insert: overwrite, never duplicate.
        self.received
            .entry(payload.cycle)
            .or_default()
            .insert(submitter.clone(), scores);

        tracing::info!(
            submitter = submitter.as_str(),
            cycle = payload.cycle,
            accepted,
            "accepted peer score submission"
        );
        Ok(accepted)
    }

    /// Number of distinct validators (including self, once recorded) that
    /// have submitted scores for a cycle.
    pub fn received_validator_count(&self, cycle: u64) -> usize {
        self.received.get(&cycle).map_or(0, |m| m.len())
    }

    /// Quorum check exposed to the consensus engine.
    pub fn quorum_met(&self, cycle: u64) -> bool {
        self.received_validator_count(cycle) >= self.min_validators_for_consensus
    }

    /// All scores collected for a cycle, flattened across submitters.
    pub fn scores_for_cycle(&self, cycle: u64) -> Vec<ValidatorScore> {
        self.received
            .get(&cycle)
            .map(|m| m.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop score books older than the accepted window {current, current-1}.
    pub fn prune(&mut self, current_cycle: u64) {
        let window_start = current_cycle.saturating_sub(1);
        self.received.retain(|&cycle, _| cycle >= window_start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::crypto::Keypair;
    use tessera_core::NodeStatus;

    use crate::broadcast::sign_submission;

    fn make_score(task: &str, validator: &str, score: f64) -> ValidatorScore {
        ValidatorScore {
            task_id: task.to_string(),
            miner_uid: "m1".to_string(),
            validator_uid: validator.to_string(),
            score,
            deviation: None,
            timestamp: 1_700_000_000.0,
        }
    }

    fn registry_with(uid: &str, keypair: &Keypair) -> HashMap<String, ValidatorInfo> {
        let mut validators = HashMap::new();
        validators.insert(
            uid.to_string(),
            ValidatorInfo {
                uid: uid.to_string(),
                address: keypair.address(),
                api_endpoint: None,
                stake: 1000.0,
                trust_score: 0.5,
                weight: 1.0,
                status: NodeStatus::Active,
                last_performance: 0.5,
                performance_history: vec![],
                registration_time: 0,
                last_update_cycle: None,
            },
        );
        validators
    }

    #[test]
    fn test_valid_submission_accepted() {
        let keypair = Keypair::generate();
        let validators = registry_with("v2", &keypair);
        let mut exchange = ScoreExchange::new("v1", 2);

        let payload =
            sign_submission(vec![make_score("t1", "v2", 0.8)], 10, "v2", &keypair).unwrap();
        let accepted = exchange.accept(payload, 10, &validators).unwrap();
        assert_eq!(accepted, 1);
        assert_eq!(exchange.received_validator_count(10), 1);
    }

    #[test]
    fn test_loop_back_rejected() {
        let keypair = Keypair::generate();
        let validators = registry_with("v1", &keypair);
        let mut exchange = ScoreExchange::new("v1", 2);

        let payload =
            sign_submission(vec![make_score("t1", "v1", 0.8)], 10, "v1", &keypair).unwrap();
        let err = exchange.accept(payload, 10, &validators).unwrap_err();
        assert_eq!(err, RejectReason::SelfSubmission);
    }

    #[test]
    fn test_cycle_out_of_window_rejected() {
        let keypair = Keypair::generate();
        let validators = registry_with("v2", &keypair);
        let mut exchange = ScoreExchange::new("v1", 2);

        // current - 2 is outside the window.
        let payload =
            sign_submission(vec![make_score("t1", "v2", 0.8)], 8, "v2", &keypair).unwrap();
        let err = exchange.accept(payload, 10, &validators).unwrap_err();
        assert!(matches!(err, RejectReason::CycleOutOfWindow { .. }));
        assert!(err.to_string().contains("cycle out of window"));

        // current - 1 is accepted.
        let payload =
            sign_submission(vec![make_score("t1", "v2", 0.8)], 9, "v2", &keypair).unwrap();
        assert!(exchange.accept(payload, 10, &validators).is_ok());
    }

    #[test]
    fn test_unknown_submitter_rejected() {
        let keypair = Keypair::generate();
        let validators = registry_with("v2", &keypair);
        let mut exchange = ScoreExchange::new("v1", 2);

        let payload =
            sign_submission(vec![make_score("t1", "v9", 0.8)], 10, "v9", &keypair).unwrap();
        let err = exchange.accept(payload, 10, &validators).unwrap_err();
        assert_eq!(err, RejectReason::UnknownSubmitter("v9".to_string()));
    }

    #[test]
    fn test_address_mismatch_rejected_despite_valid_signature() {
        // The payload is correctly signed, but with a key whose derived
        // address is not the one on record for v2.
        let impostor = Keypair::generate();
        let real = Keypair::generate();
        let validators = registry_with("v2", &real);
        let mut exchange = ScoreExchange::new("v1", 2);

        let payload =
            sign_submission(vec![make_score("t1", "v2", 0.8)], 10, "v2", &impostor).unwrap();
        let err = exchange.accept(payload, 10, &validators).unwrap_err();
        assert!(matches!(err, RejectReason::AddressMismatch { .. }));
        assert!(err.to_string().contains("address mismatch"));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let keypair = Keypair::generate();
        let validators = registry_with("v2", &keypair);
        let mut exchange = ScoreExchange::new("v1", 2);

        let mut payload =
            sign_submission(vec![make_score("t1", "v2", 0.8)], 10, "v2", &keypair).unwrap();
        payload.scores[0].score = 0.2;
        let err = exchange.accept(payload, 10, &validators).unwrap_err();
        assert_eq!(err, RejectReason::InvalidSignature);
    }

    #[test]
    fn test_resubmission_overwrites_not_duplicates() {
        let keypair = Keypair::generate();
        let validators = registry_with("v2", &keypair);
        let mut exchange = ScoreExchange::new("v1", 2);

        let first =
            sign_submission(vec![make_score("t1", "v2", 0.8)], 10, "v2", &keypair).unwrap();
        let second = sign_submission(
            vec![make_score("t1", "v2", 0.6), make_score("t2", "v2", 0.7)],
            10,
            "v2",
            &keypair,
        )
        .unwrap();

        exchange.accept(first, 10, &validators).unwrap();
        exchange.accept(second, 10, &validators).unwrap();

        // Still one distinct submitter; the overwrite took effect.
        assert_eq!(exchange.received_validator_count(10), 1);
        let scores = exchange.scores_for_cycle(10);
        assert_eq!(scores.len(), 2);
        let t1 = scores.iter().find(|s| s.task_id == "t1").unwrap();
        assert_eq!(t1.score, 0.6);
    }

    #[test]
    fn test_quorum_counts_distinct_submitters() {
        let kp2 = Keypair::generate();
        let kp3 = Keypair::generate();
        let mut validators = registry_with("v2", &kp2);
        validators.extend(registry_with("v3", &kp3));

        let mut exchange = ScoreExchange::new("v1", 3);
        exchange.record_local(10, vec![make_score("t1", "v1", 0.9)]);
        assert!(!exchange.quorum_met(10));

        let p2 = sign_submission(vec![make_score("t1", "v2", 0.8)], 10, "v2", &kp2).unwrap();
        exchange.accept(p2, 10, &validators).unwrap();
        assert!(!exchange.quorum_met(10));

        let p3 = sign_submission(vec![make_score("t1", "v3", 0.7)], 10, "v3", &kp3).unwrap();
        exchange.accept(p3, 10, &validators).unwrap();
        assert!(exchange.quorum_met(10));
    }

    #[test]
    fn test_out_of_range_scores_filtered() {
        let keypair = Keypair::generate();
        let validators = registry_with("v2", &keypair);
        let mut exchange = ScoreExchange::new("v1", 2);

        let scores = vec![
            make_score("t1", "v2", 0.8),
            make_score("t2", "v2", 1.5),
            make_score("t3", "v2", f64::NAN),
            // Attributed to a different validator than the submitter.
            make_score("t4", "v3", 0.5),
        ];
        let payload = sign_submission(scores, 10, "v2", &keypair).unwrap();
        let accepted = exchange.accept(payload, 10, &validators).unwrap();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn test_prune_retains_window() {
        let mut exchange = ScoreExchange::new("v1", 2);
        exchange.record_local(8, vec![make_score("t1", "v1", 0.9)]);
        exchange.record_local(9, vec![make_score("t1", "v1", 0.9)]);
        exchange.record_local(10, vec![make_score("t1", "v1", 0.9)]);

        exchange.prune(10);
        assert_eq!(exchange.received_validator_count(8), 0);
        assert_eq!(exchange.received_validator_count(9), 1);
        assert_eq!(exchange.received_validator_count(10), 1);
    }
}
