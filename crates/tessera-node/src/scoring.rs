// crates/tessera-node/src/scoring.rs
//
// Default task factory and scorer plugins.
//
// Subnets bring their own implementations of these two traits; the
// defaults implement a challenge/echo protocol that exercises the full
// dispatch -> execute -> score pipeline without any model dependency:
// the task carries a challenge string and the miner is graded on how much
// of it it echoes back.

use std::sync::atomic::{AtomicU64, Ordering};

use tessera_core::crypto::{hash_bytes, hex_encode};
use tessera_core::{Scorer, TaskFactory};

/// Produces per-miner challenge payloads: {"challenge": "<hex>"}.
///
/// Challenges are derived by hashing the validator UID, the target miner,
/// and a monotonically increasing nonce, so every dispatch is distinct but
/// reproducible from the inputs.
pub struct ChallengeTaskFactory {
    validator_uid: String,
    nonce: AtomicU64,
}

impl ChallengeTaskFactory {
    pub fn new(validator_uid: &str) -> Self {
        Self {
            validator_uid: validator_uid.to_string(),
            nonce: AtomicU64::new(0),
        }
    }
}

impl TaskFactory for ChallengeTaskFactory {
    fn create_task(&self, miner_uid: &str) -> Option<serde_json::Value> {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let material = format!("{}:{}:{}", self.validator_uid, miner_uid, nonce);
        let challenge = hex_encode(&hash_bytes(material.as_bytes()));
        Some(serde_json::json!({ "challenge": challenge }))
    }
}

/// Grades an echo response: the fraction of the challenge the miner
/// echoed back, as a common-prefix ratio.
///
/// Deterministic, and returns 0.0 on any malformed input so one bad
/// result can never crash a cycle.
pub struct EchoScorer;

impl Scorer for EchoScorer {
    fn score(&self, task_data: &serde_json::Value, result_data: &serde_json::Value) -> f64 {
        let challenge = match task_data.get("challenge").and_then(|v| v.as_str()) {
            Some(c) if !c.is_empty() => c,
            _ => return 0.0,
        };
        let echo = match result_data.get("echo").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => return 0.0,
        };

        let matching = challenge
            .bytes()
            .zip(echo.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        (matching as f64 / challenge.len() as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_produces_distinct_challenges() {
        let factory = ChallengeTaskFactory::new("v1");
        let a = factory.create_task("m1").unwrap();
        let b = factory.create_task("m1").unwrap();
        assert_ne!(a["challenge"], b["challenge"]);
    }

    #[test]
    fn test_exact_echo_scores_one() {
        let factory = ChallengeTaskFactory::new("v1");
        let task = factory.create_task("m1").unwrap();
        let result = serde_json::json!({ "echo": task["challenge"] });
        assert_eq!(EchoScorer.score(&task, &result), 1.0);
    }

    #[test]
    fn test_partial_echo_scores_fractionally() {
        let task = serde_json::json!({ "challenge": "abcdefgh" });
        let result = serde_json::json!({ "echo": "abcdxxxx" });
        assert!((EchoScorer.score(&task, &result) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_input_scores_zero() {
        let task = serde_json::json!({ "challenge": "abcd" });
        assert_eq!(EchoScorer.score(&task, &serde_json::json!({})), 0.0);
        assert_eq!(
            EchoScorer.score(&task, &serde_json::json!({ "echo": 42 })),
            0.0
        );
        assert_eq!(
            EchoScorer.score(&serde_json::json!({}), &serde_json::json!({ "echo": "x" })),
            0.0
        );
        assert_eq!(
            EchoScorer.score(
                &serde_json::json!({ "challenge": "" }),
                &serde_json::json!({ "echo": "" })
            ),
            0.0
        );
    }
}
