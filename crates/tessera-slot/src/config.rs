// crates/tessera-slot/src/config.rs
//
// Slot timing configuration.
//
// All durations are in seconds. The invariant checked at construction is
// that the minimum phase durations fit inside the slot; leftover time is
// absorbed by the metagraph-update phase.

use serde::{Deserialize, Serialize};

use tessera_core::TesseraError;

/// Shared fixed epoch start (2024-01-01T00:00:00Z). Every validator
/// derives identical slot numbers from this anchor, which is what makes
/// mid-slot join possible without a rendezvous handshake.
pub const DEFAULT_EPOCH_START_UNIX: u64 = 1_704_067_200;

/// Timing configuration for slots and their phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Shared epoch anchor (unix seconds) from which slot numbers are derived.
    #[serde(default = "default_epoch_start")]
    pub epoch_start_unix: u64,

    /// Total slot duration in seconds.
    #[serde(default = "default_slot_duration")]
    pub slot_duration_secs: u64,

    /// Minimum duration of the task-assignment phase.
    #[serde(default = "default_min_task_assignment")]
    pub min_task_assignment_secs: u64,

    /// Minimum duration of the task-execution phase.
    #[serde(default = "default_min_task_execution")]
    pub min_task_execution_secs: u64,

    /// Minimum duration of the consensus phase.
    #[serde(default = "default_min_consensus")]
    pub min_consensus_secs: u64,

    /// Minimum duration of the metagraph-update phase.
    #[serde(default = "default_min_metagraph_update")]
    pub min_metagraph_update_secs: u64,

    /// Stop accepting miner results this many seconds before the
    /// task-execution phase ends.
    #[serde(default = "default_task_deadline_buffer")]
    pub task_deadline_buffer_secs: u64,

    /// Stop accepting peer score submissions this many seconds before the
    /// consensus phase ends.
    #[serde(default = "default_consensus_deadline_buffer")]
    pub consensus_deadline_buffer_secs: u64,

    /// Stop ledger commits this many seconds before the slot ends.
    #[serde(default = "default_metagraph_deadline_buffer")]
    pub metagraph_deadline_buffer_secs: u64,

    /// Whether a validator may begin participating partway through a slot.
    #[serde(default = "default_true")]
    pub allow_mid_slot_join: bool,

    /// Whether the consensus phase may be extended while quorum is unmet.
    #[serde(default = "default_true")]
    pub auto_extend_on_consensus: bool,

    /// Upper bound on a single consensus-phase extension.
    #[serde(default = "default_max_auto_extension")]
    pub max_auto_extension_secs: u64,
}

fn default_epoch_start() -> u64 {
    DEFAULT_EPOCH_START_UNIX
}

fn default_slot_duration() -> u64 {
    240
}

fn default_min_task_assignment() -> u64 {
    30
}

fn default_min_task_execution() -> u64 {
    60
}

fn default_min_consensus() -> u64 {
    45
}

fn default_min_metagraph_update() -> u64 {
    15
}

fn default_task_deadline_buffer() -> u64 {
    30
}

fn default_consensus_deadline_buffer() -> u64 {
    45
}

fn default_metagraph_deadline_buffer() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_max_auto_extension() -> u64 {
    90
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            epoch_start_unix: default_epoch_start(),
            slot_duration_secs: default_slot_duration(),
            min_task_assignment_secs: default_min_task_assignment(),
            min_task_execution_secs: default_min_task_execution(),
            min_consensus_secs: default_min_consensus(),
            min_metagraph_update_secs: default_min_metagraph_update(),
            task_deadline_buffer_secs: default_task_deadline_buffer(),
            consensus_deadline_buffer_secs: default_consensus_deadline_buffer(),
            metagraph_deadline_buffer_secs: default_metagraph_deadline_buffer(),
            allow_mid_slot_join: default_true(),
            auto_extend_on_consensus: default_true(),
            max_auto_extension_secs: default_max_auto_extension(),
        }
    }
}

impl SlotConfig {
    /// Sum of the configured minimum phase durations.
    pub fn min_phase_total_secs(&self) -> u64 {
        self.min_task_assignment_secs
            + self.min_task_execution_secs
            + self.min_consensus_secs
            + self.min_metagraph_update_secs
    }

    /// Check the configuration invariants.
    ///
    /// The minimum phase durations must fit inside the slot, and the slot
    /// must have a non-zero duration.
    pub fn validate(&self) -> Result<(), TesseraError> {
        if self.slot_duration_secs == 0 {
            return Err(TesseraError::InvalidState(
                "slot_duration_secs must be > 0".to_string(),
            ));
        }
        if self.min_phase_total_secs() > self.slot_duration_secs {
            return Err(TesseraError::InvalidState(format!(
                "minimum phase durations ({}s) exceed slot duration ({}s)",
                self.min_phase_total_secs(),
                self.slot_duration_secs
            )));
        }
        Ok(())
    }
}
