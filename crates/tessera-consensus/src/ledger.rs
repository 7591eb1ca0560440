// crates/tessera-consensus/src/ledger.rs
//
// CycleLedger: the in-memory book of one cycle's tasks, results, and scores.
//
// Holds everything the consensus engine aggregates: tasks the local
// validator dispatched, results miners returned (at most one per task,
// late arrivals rejected), and the scores collected locally and from
// peers, keyed by (task_id, validator_uid).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use tessera_core::{MinerResult, TaskAssignment, ValidatorScore};

/// Why a miner result was not recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultRejection {
    #[error("no task with id {0} was sent this cycle")]
    UnknownTask(String),
    #[error("a result for task {0} was already recorded")]
    Duplicate(String),
    #[error("result for task {0} arrived after the deadline")]
    PastDeadline(String),
}

/// In-memory score ledger for a single cycle. Discarded at cycle end.
#[derive(Debug, Default)]
pub struct CycleLedger {
    cycle: u64,
    tasks_sent: HashMap<String, TaskAssignment>,
    results: HashMap<String, MinerResult>,
    scores: HashMap<(String, String), ValidatorScore>,
}

impl CycleLedger {
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            tasks_sent: HashMap::new(),
            results: HashMap::new(),
            scores: HashMap::new(),
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Record a dispatched task. The assignment is read-only afterward.
    pub fn record_task(&mut self, task: TaskAssignment) {
        self.tasks_sent.insert(task.task_id.clone(), task);
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskAssignment> {
        self.tasks_sent.get(task_id)
    }

    pub fn tasks_sent(&self) -> impl Iterator<Item = &TaskAssignment> {
        self.tasks_sent.values()
    }

    pub fn task_count(&self) -> usize {
        self.tasks_sent.len()
    }

    /// Record a miner result.
    ///
    /// At most one result is accepted per task_id; duplicates and results
    /// arriving after the task deadline are rejected with a reason.
    pub fn record_result(
        &mut self,
        result: MinerResult,
        received_at: DateTime<Utc>,
    ) -> Result<(), ResultRejection> {
        let task = self
            .tasks_sent
            .get(&result.task_id)
            .ok_or_else(|| ResultRejection::UnknownTask(result.task_id.clone()))?;

        if received_at > task.deadline {
            return Err(ResultRejection::PastDeadline(result.task_id.clone()));
        }
        if self.results.contains_key(&result.task_id) {
            return Err(ResultRejection::Duplicate(result.task_id.clone()));
        }

        self.results.insert(result.task_id.clone(), result);
        Ok(())
    }

    pub fn result(&self, task_id: &str) -> Option<&MinerResult> {
        self.results.get(task_id)
    }

    pub fn results(&self) -> impl Iterator<Item = &MinerResult> {
        self.results.values()
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Record a score, overwriting any earlier score the same validator
    /// gave for the same task.
    pub fn record_score(&mut self, score: ValidatorScore) {
        self.scores
            .insert((score.task_id.clone(), score.validator_uid.clone()), score);
    }

    /// Record a batch of peer scores.
    pub fn record_peer_scores(&mut self, scores: Vec<ValidatorScore>) {
        for score in scores {
            self.record_score(score);
        }
    }

    /// All scores recorded this cycle, in no particular order.
    pub fn all_scores(&self) -> Vec<ValidatorScore> {
        self.scores.values().cloned().collect()
    }

    /// Number of distinct validators that contributed scores this cycle.
    pub fn distinct_scorers(&self) -> usize {
        let mut uids: Vec<&str> = self.scores.keys().map(|(_, v)| v.as_str()).collect();
        uids.sort_unstable();
        uids.dedup();
        uids.len()
    }
}
