// crates/tessera-consensus/src/fraud.rs
//
// FraudDetector: cross-cycle verification of published validator state.
//
// At the start of cycle N, the locally computed expected state from cycle
// N-1 is compared against what each validator actually published to the
// ledger. Mismatches beyond a float tolerance are classified into fixed
// severity bands, a trust penalty is applied immediately in memory, a
// pending slash amount is computed (the ledger client moves funds, not
// this module), and severe deviations jail the validator. This is the only
// place an Active validator can transition to Jailed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tessera_core::{CalculatedValidatorState, NodeStatus, ValidatorInfo};
use tessera_formulas::slash_amount;

/// Severity bands and penalty coefficients for fraud classification.
///
/// The band thresholds (10x / 3x tolerance) are fixed heuristics without a
/// stated derivation; they are configuration, not constants, and need
/// empirical calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudParams {
    /// Acceptable float difference between expected and published values.
    pub tolerance: f64,
    /// Deviation factor (diff / tolerance) at or above which the deviation
    /// is severe.
    pub severe_factor: f64,
    /// Deviation factor at or above which the deviation is moderate.
    pub moderate_factor: f64,
    /// Severity assigned to severe deviations.
    pub severity_severe: f64,
    /// Severity assigned to moderate deviations.
    pub severity_moderate: f64,
    /// Severity assigned to any other out-of-tolerance deviation.
    pub severity_minor: f64,
    /// Severity assigned when an Active validator did not commit at all.
    pub severity_no_commit: f64,
    /// Trust penalty coefficient eta: trust *= (1 - eta * severity).
    pub penalty_eta: f64,
    /// Severity at or above which an Active validator is jailed.
    pub jailed_threshold: f64,
    /// Cap on the slashable fraction of stake.
    pub max_slash_rate: f64,
}

impl Default for FraudParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            severe_factor: 10.0,
            moderate_factor: 3.0,
            severity_severe: 0.7,
            severity_moderate: 0.3,
            severity_minor: 0.1,
            severity_no_commit: 0.05,
            penalty_eta: 0.5,
            jailed_threshold: 0.2,
            max_slash_rate: 0.2,
        }
    }
}

/// The state a validator actually published to the ledger for a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedValidatorState {
    pub trust_score: f64,
    pub last_performance: f64,
}

/// One audit record produced by the detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudFinding {
    /// The validator the finding is about.
    pub uid: String,
    /// The cycle whose published state was checked.
    pub cycle: u64,
    /// Human-readable description of every mismatch found.
    pub reason: String,
    /// Classified severity in [0, 1].
    pub severity: f64,
    /// Trust before the penalty was applied.
    pub trust_before: f64,
    /// Trust after the penalty.
    pub trust_after: f64,
    /// Slash amount computed and reported for the ledger to apply.
    pub pending_slash: f64,
    /// Whether this finding transitioned the validator to Jailed.
    pub jailed: bool,
}

/// Cross-cycle fraud detection and penalty application.
pub struct FraudDetector {
    params: FraudParams,
}

impl FraudDetector {
    pub fn new(params: FraudParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FraudParams {
        &self.params
    }

    /// Verify the previous cycle's published states and penalize deviations.
    ///
    /// `expected` is the locally computed state for cycle `previous_cycle`
    /// (retained even when the local ledger commit failed); `published` is
    /// what each validator actually committed for that cycle. Trust
    /// penalties and jailing are applied to `validators` in place; slash
    /// amounts are only computed and reported.
    pub fn review_previous_cycle(
        &self,
        previous_cycle: u64,
        expected: &HashMap<String, CalculatedValidatorState>,
        published: &HashMap<String, PublishedValidatorState>,
        validators: &mut HashMap<String, ValidatorInfo>,
    ) -> Vec<FraudFinding> {
        let mut findings = Vec::new();

        for (uid, expected_state) in expected {
            let (severity, reason) = match published.get(uid) {
                None => {
                    if expected_state.start_status != NodeStatus::Active {
                        continue;
                    }
                    (
                        self.params.severity_no_commit,
                        format!("did not commit updates in cycle {}", previous_cycle),
                    )
                }
                Some(actual) => {
                    let mismatches = self.collect_mismatches(expected_state, actual);
                    if mismatches.is_empty() {
                        continue;
                    }
                    let max_factor = mismatches
                        .iter()
                        .map(|(_, factor)| *factor)
                        .fold(0.0_f64, f64::max);
                    let reason = mismatches
                        .into_iter()
                        .map(|(text, _)| text)
                        .collect::<Vec<_>>()
                        .join("; ");
                    (self.classify(max_factor), reason)
                }
            };

            let Some(info) = validators.get_mut(uid) else {
                tracing::warn!(uid = uid.as_str(), "suspicious validator missing from registry");
                continue;
            };

            tracing::warn!(
                uid = uid.as_str(),
                cycle = previous_cycle,
                severity,
                reason = reason.as_str(),
                "validator state deviation detected"
            );

            let trust_before = info.trust_score;
            let trust_after =
                (trust_before * (1.0 - self.params.penalty_eta * severity)).max(0.0);
            info.trust_score = trust_after;

            let pending_slash = slash_amount(info.stake, severity, self.params.max_slash_rate);
            if pending_slash > 0.0 {
                tracing::warn!(
                    uid = uid.as_str(),
                    pending_slash,
                    severity,
                    "pending slash computed (settlement delegated to ledger)"
                );
            }

            let jailed = severity >= self.params.jailed_threshold
                && info.status == NodeStatus::Active;
            if jailed {
                tracing::warn!(uid = uid.as_str(), "validator jailed for severe deviation");
                info.status = NodeStatus::Jailed;
            }

            findings.push(FraudFinding {
                uid: uid.clone(),
                cycle: previous_cycle,
                reason,
                severity,
                trust_before,
                trust_after,
                pending_slash,
                jailed,
            });
        }

        findings
    }

    /// Compare the comparable fields and return (description, deviation
    /// factor) for each mismatch beyond tolerance.
    fn collect_mismatches(
        &self,
        expected: &CalculatedValidatorState,
        actual: &PublishedValidatorState,
    ) -> Vec<(String, f64)> {
        let mut mismatches = Vec::new();

        let trust_diff = (actual.trust_score - expected.trust).abs();
        if trust_diff > self.params.tolerance {
            mismatches.push((
                format!(
                    "trust mismatch (expected {:.5}, published {:.5}, diff {:.5})",
                    expected.trust, actual.trust_score, trust_diff
                ),
                trust_diff / self.params.tolerance,
            ));
        }

        let perf_diff = (actual.last_performance - expected.e_v).abs();
        if perf_diff > self.params.tolerance {
            mismatches.push((
                format!(
                    "performance mismatch (expected {:.5}, published {:.5}, diff {:.5})",
                    expected.e_v, actual.last_performance, perf_diff
                ),
                perf_diff / self.params.tolerance,
            ));
        }

        mismatches
    }

    fn classify(&self, max_factor: f64) -> f64 {
        if max_factor >= self.params.severe_factor {
            self.params.severity_severe
        } else if max_factor >= self.params.moderate_factor {
            self.params.severity_moderate
        } else {
            self.params.severity_minor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_validator(uid: &str, trust: f64, status: NodeStatus) -> ValidatorInfo {
        ValidatorInfo {
            uid: uid.to_string(),
            address: format!("0x{}", uid),
            api_endpoint: None,
            stake: 1000.0,
            trust_score: trust,
            weight: 1.0,
            status,
            last_performance: 0.5,
            performance_history: vec![],
            registration_time: 0,
            last_update_cycle: None,
        }
    }

    fn make_expected(uid: &str, trust: f64, e_v: f64) -> CalculatedValidatorState {
        CalculatedValidatorState {
            uid: uid.to_string(),
            cycle: 4,
            e_v,
            trust,
            weight: 1.0,
            contribution: 0.5,
            reward: 0.01,
            avg_deviation: 0.0,
            metric_quality: 0.5,
            start_trust: trust,
            start_status: NodeStatus::Active,
        }
    }

    fn run_detector(
        expected_trust: f64,
        published_trust: f64,
    ) -> (Vec<FraudFinding>, HashMap<String, ValidatorInfo>) {
        let detector = FraudDetector::new(FraudParams::default());
        let mut expected = HashMap::new();
        expected.insert("v1".to_string(), make_expected("v1", expected_trust, 0.6));
        let mut published = HashMap::new();
        published.insert(
            "v1".to_string(),
            PublishedValidatorState {
                trust_score: published_trust,
                last_performance: 0.6,
            },
        );
        let mut validators = HashMap::new();
        validators.insert(
            "v1".to_string(),
            make_validator("v1", published_trust, NodeStatus::Active),
        );
        let findings = detector.review_previous_cycle(4, &expected, &published, &mut validators);
        (findings, validators)
    }

    #[test]
    fn test_large_trust_mismatch_is_severe_and_jails() {
        // diff 0.15 against tolerance 1e-5 is far above 10x tolerance.
        let (findings, validators) = run_detector(0.80, 0.95);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.severity, 0.7);
        assert!(finding.jailed);
        assert_eq!(validators["v1"].status, NodeStatus::Jailed);

        // Trust penalty applied in place: 0.95 * (1 - 0.5*0.7).
        let expected_trust = 0.95 * (1.0 - 0.5 * 0.7);
        assert!((validators["v1"].trust_score - expected_trust).abs() < 1e-12);

        // Pending slash capped by max_slash_rate.
        assert!((finding.pending_slash - 1000.0 * 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_within_tolerance_produces_no_finding() {
        let (findings, validators) = run_detector(0.800000, 0.800001);
        assert!(findings.is_empty());
        assert_eq!(validators["v1"].status, NodeStatus::Active);
    }

    #[test]
    fn test_moderate_band() {
        // diff 5e-5 with tolerance 1e-5 gives factor 5: moderate.
        let (findings, validators) = run_detector(0.8, 0.80005);
        assert_eq!(findings[0].severity, 0.3);
        // 0.3 >= jailed threshold 0.2, so this also jails.
        assert!(findings[0].jailed);
        assert_eq!(validators["v1"].status, NodeStatus::Jailed);
    }

    #[test]
    fn test_minor_band_does_not_jail() {
        // diff 2e-5 gives factor 2: minor, below the jail threshold.
        let (findings, validators) = run_detector(0.8, 0.80002);
        assert_eq!(findings[0].severity, 0.1);
        assert!(!findings[0].jailed);
        assert_eq!(validators["v1"].status, NodeStatus::Active);
        // Trust penalty still applies.
        assert!(validators["v1"].trust_score < 0.80002);
    }

    #[test]
    fn test_no_commit_low_severity() {
        let detector = FraudDetector::new(FraudParams::default());
        let mut expected = HashMap::new();
        expected.insert("v1".to_string(), make_expected("v1", 0.8, 0.6));
        let published = HashMap::new();
        let mut validators = HashMap::new();
        validators.insert(
            "v1".to_string(),
            make_validator("v1", 0.8, NodeStatus::Active),
        );

        let findings = detector.review_previous_cycle(4, &expected, &published, &mut validators);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, 0.05);
        assert!(!findings[0].jailed);
        assert!(findings[0].reason.contains("did not commit"));
    }

    #[test]
    fn test_inactive_non_committer_ignored() {
        let detector = FraudDetector::new(FraudParams::default());
        let mut expected = HashMap::new();
        let mut state = make_expected("v1", 0.8, 0.6);
        state.start_status = NodeStatus::Inactive;
        expected.insert("v1".to_string(), state);
        let published = HashMap::new();
        let mut validators = HashMap::new();
        validators.insert(
            "v1".to_string(),
            make_validator("v1", 0.8, NodeStatus::Inactive),
        );

        let findings = detector.review_previous_cycle(4, &expected, &published, &mut validators);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_performance_mismatch_detected() {
        let detector = FraudDetector::new(FraudParams::default());
        let mut expected = HashMap::new();
        expected.insert("v1".to_string(), make_expected("v1", 0.8, 0.6));
        let mut published = HashMap::new();
        published.insert(
            "v1".to_string(),
            PublishedValidatorState {
                trust_score: 0.8,
                last_performance: 0.9,
            },
        );
        let mut validators = HashMap::new();
        validators.insert(
            "v1".to_string(),
            make_validator("v1", 0.8, NodeStatus::Active),
        );

        let findings = detector.review_previous_cycle(4, &expected, &published, &mut validators);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].reason.contains("performance mismatch"));
        assert_eq!(findings[0].severity, 0.7);
    }
}
