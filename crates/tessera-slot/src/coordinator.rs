// crates/tessera-slot/src/coordinator.rs
//
// SlotCoordinator: answers "when are we" from wall-clock time alone.
//
// slot = floor((now - epoch_start) / slot_duration); phase boundaries are
// cumulative offsets of the configured minimum phase durations, with any
// leftover slot time absorbed by the metagraph-update phase. Peer
// discovery is delegated to an ActiveValidatorDirectory capability; when
// that capability fails, quorum detection degrades to "unknown" and the
// caller falls back to the score exchange's own submission count.

use tessera_core::traits::ActiveValidatorDirectory;
use tessera_core::TesseraError;

use crate::config::SlotConfig;
use crate::phase::SlotPhase;

/// The coordinator's answer for a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotPosition {
    /// Slot (cycle) number.
    pub slot: u64,
    /// Phase within the slot.
    pub phase: SlotPhase,
    /// Seconds remaining until the current phase ends.
    pub remaining_secs: u64,
}

/// A granted consensus-phase extension for one slot.
#[derive(Debug, Clone, Copy)]
struct ConsensusExtension {
    slot: u64,
    extend_by_secs: u64,
}

/// Computes slot and phase from wall-clock time, with bounded
/// auto-extension of the consensus phase.
pub struct SlotCoordinator {
    config: SlotConfig,
    extension: Option<ConsensusExtension>,
}

impl SlotCoordinator {
    /// Create a coordinator after validating the slot configuration.
    pub fn new(config: SlotConfig) -> Result<Self, TesseraError> {
        config.validate()?;
        Ok(Self {
            config,
            extension: None,
        })
    }

    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Unix time at which a slot starts.
    pub fn slot_start(&self, slot: u64) -> u64 {
        self.config.epoch_start_unix + slot * self.config.slot_duration_secs
    }

    /// Unix time at which a slot ends.
    pub fn slot_end(&self, slot: u64) -> u64 {
        self.slot_start(slot) + self.config.slot_duration_secs
    }

    /// Offset (seconds into the slot) at which the consensus phase ends,
    /// including any granted extension. The extension never eats into the
    /// metagraph-update minimum and is never retracted.
    fn consensus_end_offset(&self, slot: u64) -> u64 {
        let nominal = self.config.min_task_assignment_secs
            + self.config.min_task_execution_secs
            + self.config.min_consensus_secs;
        let ceiling = self
            .config
            .slot_duration_secs
            .saturating_sub(self.config.min_metagraph_update_secs);

        match self.extension {
            Some(ext) if ext.slot == slot => (nominal + ext.extend_by_secs).min(ceiling),
            _ => nominal,
        }
    }

    /// Compute the slot, phase, and remaining phase time for `now_unix`.
    ///
    /// Before the epoch anchor the coordinator reports slot 0 in
    /// TaskAssignment, counting down to the real slot start.
    pub fn slot_and_phase(&self, now_unix: u64) -> SlotPosition {
        if now_unix < self.config.epoch_start_unix {
            return SlotPosition {
                slot: 0,
                phase: SlotPhase::TaskAssignment,
                remaining_secs: (self.config.epoch_start_unix - now_unix)
                    + self.config.min_task_assignment_secs,
            };
        }

        let elapsed_total = now_unix - self.config.epoch_start_unix;
        let slot = elapsed_total / self.config.slot_duration_secs;
        let elapsed = elapsed_total % self.config.slot_duration_secs;

        let assignment_end = self.config.min_task_assignment_secs;
        let execution_end = assignment_end + self.config.min_task_execution_secs;
        let consensus_end = self.consensus_end_offset(slot);

        let (phase, phase_end) = if elapsed < assignment_end {
            (SlotPhase::TaskAssignment, assignment_end)
        } else if elapsed < execution_end {
            (SlotPhase::TaskExecution, execution_end)
        } else if elapsed < consensus_end {
            (SlotPhase::Consensus, consensus_end)
        } else {
            (SlotPhase::MetagraphUpdate, self.config.slot_duration_secs)
        };

        SlotPosition {
            slot,
            phase,
            remaining_secs: phase_end - elapsed,
        }
    }

    /// Whether a validator starting at `now_unix` may participate in the
    /// current slot. Without mid-slot join, only the task-assignment phase
    /// is a valid entry point.
    pub fn can_join(&self, now_unix: u64) -> bool {
        self.config.allow_mid_slot_join
            || self.slot_and_phase(now_unix).phase == SlotPhase::TaskAssignment
    }

    /// Unix cutoff for accepting miner results in a slot.
    pub fn result_cutoff(&self, slot: u64) -> u64 {
        let execution_end = self.slot_start(slot)
            + self.config.min_task_assignment_secs
            + self.config.min_task_execution_secs;
        execution_end.saturating_sub(self.config.task_deadline_buffer_secs)
    }

    /// Unix cutoff for accepting peer score submissions in a slot,
    /// including any granted extension.
    pub fn consensus_cutoff(&self, slot: u64) -> u64 {
        let consensus_end = self.slot_start(slot) + self.consensus_end_offset(slot);
        consensus_end.saturating_sub(self.config.consensus_deadline_buffer_secs)
    }

    /// Unix cutoff for ledger commits in a slot.
    pub fn commit_cutoff(&self, slot: u64) -> u64 {
        self.slot_end(slot)
            .saturating_sub(self.config.metagraph_deadline_buffer_secs)
    }

    /// Request an extension of the consensus phase for `slot`.
    ///
    /// Granted at most once per slot, only while auto-extension is enabled
    /// and quorum has not been reached. Returns the number of seconds
    /// granted, or None if no extension applies. The extension is
    /// monotonic: once granted it is visible to `slot_and_phase` until the
    /// slot ends.
    pub fn request_consensus_extension(&mut self, slot: u64, quorum_met: bool) -> Option<u64> {
        if !self.config.auto_extend_on_consensus
            || quorum_met
            || self.config.max_auto_extension_secs == 0
        {
            return None;
        }
        if matches!(self.extension, Some(ext) if ext.slot == slot) {
            return None;
        }

        let granted = self.config.max_auto_extension_secs;
        self.extension = Some(ConsensusExtension {
            slot,
            extend_by_secs: granted,
        });
        tracing::info!(slot, granted_secs = granted, "consensus phase extended");
        Some(granted)
    }

    /// List the validators active in a slot via the directory capability.
    ///
    /// Returns None when the capability is unavailable — the caller must
    /// then treat quorum detection as unknown and defer to the score
    /// exchange's own submission count.
    pub fn active_validators(
        &self,
        directory: &dyn ActiveValidatorDirectory,
        slot: u64,
    ) -> Option<Vec<String>> {
        match directory.list_active_validators(slot) {
            Ok(uids) => Some(uids),
            Err(e) => {
                tracing::warn!(slot, error = %e, "validator directory unavailable");
                None
            }
        }
    }
}
