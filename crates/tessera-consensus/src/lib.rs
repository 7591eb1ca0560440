// crates/tessera-consensus/src/lib.rs
//
// tessera-consensus: the per-cycle consensus core of the Tessera Protocol.
//
// Three pieces: the CycleLedger (in-memory book of tasks, results, and
// scores for one cycle), the ConsensusEngine (turns collected scores into
// per-miner consensus performance and per-validator trust/reward states),
// and the FraudDetector (compares the previous cycle's locally computed
// state against what a validator actually published).

pub mod engine;
pub mod fraud;
pub mod ledger;

pub use engine::{ConsensusEngine, ConsensusParams, CycleOutcome, CyclePhase, CycleResult, MinerUpdate};
pub use fraud::{FraudDetector, FraudFinding, FraudParams, PublishedValidatorState};
pub use ledger::{CycleLedger, ResultRejection};
