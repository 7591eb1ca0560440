// crates/tessera-formulas/src/params.rs
//
// Parameter bundles for the formula functions.
//
// Defaults are the sample values the protocol shipped with. None of them
// are derived from first principles; operators should expect to calibrate
// them empirically, ideally under governance control.

use serde::{Deserialize, Serialize};

/// Parameters of the standard logistic function L / (1 + e^(-k(x - x0))).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmoidParams {
    /// Maximum value of the curve.
    pub l: f64,
    /// Steepness.
    pub k: f64,
    /// Midpoint.
    pub x0: f64,
}

impl Default for SigmoidParams {
    fn default() -> Self {
        Self {
            l: 1.0,
            k: 10.0,
            x0: 0.5,
        }
    }
}

/// Parameters for trust score decay and update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustParams {
    /// Decay constant: trust decays by e^(-delta * cycles).
    pub delta: f64,
    /// Base learning rate for new evidence.
    pub alpha_base: f64,
    /// Sensitivity of the learning rate to trust extremes.
    pub k_alpha: f64,
    /// Sigmoid mapping applied to the new performance score.
    pub update_sigmoid: SigmoidParams,
}

impl Default for TrustParams {
    fn default() -> Self {
        Self {
            delta: 0.1,
            alpha_base: 0.1,
            k_alpha: 1.0,
            update_sigmoid: SigmoidParams {
                l: 1.0,
                k: 5.0,
                x0: 0.5,
            },
        }
    }
}

/// Parameters of the deviation penalty term.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyParams {
    /// Deviation below this threshold is not penalized.
    pub threshold: f64,
    /// Penalty strength k'.
    pub k: f64,
    /// Exponent p applied to the excess deviation (typically 1 or 2).
    pub p: f64,
}

impl Default for PenaltyParams {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            k: 5.0,
            p: 1.0,
        }
    }
}

/// Weights and penalty settings for validator performance E_v.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceParams {
    /// Weight of the task-completion component.
    pub theta1: f64,
    /// Weight of the evaluation-quality component.
    pub theta2: f64,
    /// Weight of the deviation penalty component.
    pub theta3: f64,
    /// Deviation penalty settings.
    pub penalty: PenaltyParams,
}

impl Default for PerformanceParams {
    fn default() -> Self {
        Self {
            theta1: 0.3,
            theta2: 0.4,
            theta3: 0.3,
            penalty: PenaltyParams::default(),
        }
    }
}

/// Parameters for validator weight computation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightParams {
    /// Balance between stake share and performance (lambda).
    pub lambda_balance: f64,
    /// Log base applied to participation time.
    pub time_log_base: f64,
}

impl Default for WeightParams {
    fn default() -> Self {
        Self {
            lambda_balance: 0.5,
            time_log_base: 10.0,
        }
    }
}
