// crates/tessera-node/src/node.rs
//
// ValidatorNode: drives one consensus cycle per slot.
//
// The node owns the in-memory registry snapshots and is the only flow
// that mutates them; worker fan-out (task dispatch, result polling, score
// broadcast) reads a snapshot taken at phase entry and shares no mutable
// state. Every step of a cycle resolves to a typed outcome — ok, skipped,
// retryable, fatal — and the loop always proceeds to the next slot; no
// step failure is allowed to escape as a panic or break the loop.
//
// Ordering within a cycle: fraud review of cycle N-1, task dispatch,
// result collection, local scoring, score broadcast, quorum wait (with at
// most one auto-extension), consensus, settlement. The calculated states
// of cycle N are retained in memory for exactly one extra cycle so the
// fraud detector can compare them against what peers actually published,
// even if our own ledger commit failed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use tessera_consensus::{
    ConsensusEngine, CycleLedger, CycleOutcome, CycleResult, FraudDetector,
    PublishedValidatorState,
};
use tessera_core::crypto::Keypair;
use tessera_core::{
    ActiveValidatorDirectory, CalculatedValidatorState, CycleConsensusResults, LedgerClient,
    MinerConsensusResult, MinerInfo, NodeStatus, ScoreSubmissionPayload, Scorer, TaskAssignment,
    TaskFactory, TaskTransport, TesseraError, ValidatorInfo, ValidatorScore,
};
use tessera_formulas::selection_probability;
use tessera_p2p::{broadcast_scores, sign_submission, PeerRegistry, RejectReason, ScoreExchange};
use tessera_slot::SlotCoordinator;

use crate::config::NodeConfig;

/// Typed outcome of one orchestration step.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum StepOutcome {
    Completed,
    Skipped(String),
    Retryable(String),
    Fatal(String),
}

impl StepOutcome {
    fn log(&self, cycle: u64, step: &str) {
        match self {
            StepOutcome::Completed => tracing::debug!(cycle, step, "step completed"),
            StepOutcome::Skipped(reason) => {
                tracing::info!(cycle, step, reason = reason.as_str(), "step skipped")
            }
            StepOutcome::Retryable(reason) => {
                tracing::warn!(cycle, step, reason = reason.as_str(), "step failed, retryable")
            }
            StepOutcome::Fatal(reason) => {
                tracing::error!(cycle, step, reason = reason.as_str(), "step failed, fatal")
            }
        }
    }
}

/// The validator node orchestrator.
pub struct ValidatorNode {
    config: NodeConfig,
    info: ValidatorInfo,
    keypair: Keypair,
    coordinator: SlotCoordinator,
    engine: ConsensusEngine,
    fraud: FraudDetector,
    exchange: Arc<RwLock<ScoreExchange>>,
    peer_registry: Arc<PeerRegistry>,
    ledger: Arc<dyn LedgerClient>,
    transport: Arc<dyn TaskTransport>,
    task_factory: Arc<dyn TaskFactory>,
    scorer: Arc<dyn Scorer>,
    directory: Arc<dyn ActiveValidatorDirectory>,
    /// Registry snapshot for the current cycle.
    validators: HashMap<String, ValidatorInfo>,
    miners: HashMap<String, MinerInfo>,
    /// Calculated states retained for the next cycle's fraud review.
    previous_states: Option<(u64, HashMap<String, CalculatedValidatorState>)>,
    /// Last published per-miner consensus results (for status queries).
    last_results: Option<CycleConsensusResults>,
}

impl ValidatorNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: NodeConfig,
        info: ValidatorInfo,
        keypair: Keypair,
        ledger: Arc<dyn LedgerClient>,
        transport: Arc<dyn TaskTransport>,
        task_factory: Arc<dyn TaskFactory>,
        scorer: Arc<dyn Scorer>,
        directory: Arc<dyn ActiveValidatorDirectory>,
    ) -> Result<Self, TesseraError> {
        let coordinator = SlotCoordinator::new(config.slot.clone())?;
        let engine = ConsensusEngine::new(config.consensus.clone());
        let fraud = FraudDetector::new(config.fraud.clone());
        let exchange = Arc::new(RwLock::new(ScoreExchange::new(
            &info.uid,
            config.consensus.min_validators_for_consensus,
        )));
        let peer_registry = Arc::new(PeerRegistry::new(
            config.self_url.clone(),
            config.peers.clone(),
            Duration::from_secs(config.peer_timeout_secs),
        ));

        Ok(Self {
            config,
            info,
            keypair,
            coordinator,
            engine,
            fraud,
            exchange,
            peer_registry,
            ledger,
            transport,
            task_factory,
            scorer,
            directory,
            validators: HashMap::new(),
            miners: HashMap::new(),
            previous_states: None,
            last_results: None,
        })
    }

    /// The per-miner consensus results published for the most recent
    /// finalized cycle, if any.
    #[allow(dead_code)]
    pub fn last_consensus_results(&self) -> Option<&CycleConsensusResults> {
        self.last_results.as_ref()
    }

    /// Shared handle to the score exchange, for the transport hosting the
    /// inbound `consensus/receive_scores` endpoint.
    #[allow(dead_code)]
    pub fn exchange(&self) -> Arc<RwLock<ScoreExchange>> {
        self.exchange.clone()
    }

    /// Entry point for an inbound peer submission. The current cycle is
    /// derived from wall-clock time so an out-of-window payload is
    /// rejected before any signature work.
    #[allow(dead_code)]
    pub async fn accept_submission(
        &self,
        payload: ScoreSubmissionPayload,
    ) -> Result<usize, RejectReason> {
        let current_cycle = self.coordinator.slot_and_phase(now_unix()).slot;
        let mut exchange = self.exchange.write().await;
        exchange.accept(payload, current_cycle, &self.validators)
    }

    /// Run the node: one cycle per slot until shutdown.
    pub async fn run(&mut self) -> Result<(), TesseraError> {
        tracing::info!(
            uid = self.info.uid.as_str(),
            slot_duration = self.config.slot.slot_duration_secs,
            peers = self.config.peers.len(),
            "validator node started"
        );

        let mut last_completed: Option<u64> = None;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("validator node received shutdown signal");
                    break;
                }
                _ = self.tick(&mut last_completed) => {}
            }
        }
        Ok(())
    }

    /// One iteration of the outer loop: either run the current slot's
    /// cycle or sleep toward the next opportunity.
    async fn tick(&mut self, last_completed: &mut Option<u64>) {
        let now = now_unix();
        let pos = self.coordinator.slot_and_phase(now);

        if *last_completed == Some(pos.slot) {
            let wait = self.coordinator.slot_end(pos.slot).saturating_sub(now).max(1);
            tokio::time::sleep(Duration::from_secs(wait.min(5))).await;
            return;
        }

        if !self.coordinator.can_join(now) {
            tracing::debug!(
                slot = pos.slot,
                phase = %pos.phase,
                "mid-slot join disabled, waiting for next slot"
            );
            tokio::time::sleep(Duration::from_secs(pos.remaining_secs.min(5).max(1))).await;
            return;
        }

        tracing::info!(slot = pos.slot, phase = %pos.phase, "entering slot");
        self.run_cycle(pos.slot).await;
        *last_completed = Some(pos.slot);
    }

    /// Run one full consensus cycle for a slot.
    pub async fn run_cycle(&mut self, cycle: u64) {
        // Snapshot refresh; a cycle with no registry at all is skipped.
        let outcome = self.refresh_registry().await;
        outcome.log(cycle, "refresh_registry");
        if self.validators.is_empty() {
            tracing::warn!(cycle, "no validators known, skipping cycle");
            return;
        }

        // Announce presence for this slot; discovery failure is tolerated.
        if let Err(e) = self.directory.register(&self.info.uid, cycle) {
            tracing::warn!(cycle, error = %e, "could not register slot marker");
        }
        match self.coordinator.active_validators(self.directory.as_ref(), cycle) {
            Some(active) => tracing::info!(cycle, active = active.len(), "active validators listed"),
            None => tracing::info!(cycle, "active validator count unknown"),
        }

        // Cross-cycle check of what peers published for cycle N-1.
        self.review_previous_cycle(cycle).await.log(cycle, "fraud_review");

        // Drop score books outside the accepted window.
        self.exchange.write().await.prune(cycle);

        let mut book = CycleLedger::new(cycle);

        self.dispatch_tasks(cycle, &mut book).await.log(cycle, "dispatch");
        self.collect_results(cycle, &mut book).await.log(cycle, "collect");
        self.score_and_broadcast(cycle, &mut book).await.log(cycle, "score_broadcast");
        self.await_quorum(cycle).await.log(cycle, "quorum_wait");

        let result = self.finalize_cycle(cycle).await;
        self.settle(cycle, &result).await.log(cycle, "settle");

        // Retain the calculated states for exactly one extra cycle.
        self.previous_states = Some((cycle, result.validator_states));
        tracing::info!(cycle, outcome = ?result.outcome, "cycle complete");
    }

    /// Refresh registry snapshots from the ledger. Keeps the stale
    /// snapshot on a transient failure; selection bookkeeping carries
    /// over from the previous snapshot.
    async fn refresh_registry(&mut self) -> StepOutcome {
        let validators = match self.ledger.get_all_validators().await {
            Ok(v) => v,
            Err(e) => return StepOutcome::Retryable(format!("validator fetch: {}", e)),
        };
        let miners = match self.ledger.get_all_miners().await {
            Ok(m) => m,
            Err(e) => return StepOutcome::Retryable(format!("miner fetch: {}", e)),
        };

        self.validators = validators.into_iter().map(|v| (v.uid.clone(), v)).collect();

        let old_miners = std::mem::take(&mut self.miners);
        self.miners = miners
            .into_iter()
            .map(|mut m| {
                if let Some(old) = old_miners.get(&m.uid) {
                    m.last_selected_cycle = old.last_selected_cycle;
                }
                (m.uid.clone(), m)
            })
            .collect();

        if let Some(own) = self.validators.get(&self.info.uid) {
            self.info = own.clone();
        }
        StepOutcome::Completed
    }

    /// Compare cycle N-1's locally calculated states with what was
    /// actually published, applying penalties in memory.
    async fn review_previous_cycle(&mut self, cycle: u64) -> StepOutcome {
        let Some((prev_cycle, expected)) = self.previous_states.take() else {
            return StepOutcome::Skipped("no previous cycle state".to_string());
        };
        if prev_cycle + 1 != cycle {
            return StepOutcome::Skipped(format!(
                "retained states are for cycle {}, not {}",
                prev_cycle,
                cycle.saturating_sub(1)
            ));
        }

        let published: HashMap<String, PublishedValidatorState> =
            match self.ledger.get_all_validators().await {
                Ok(all) => all
                    .into_iter()
                    .filter(|v| v.last_update_cycle == Some(prev_cycle))
                    .map(|v| {
                        (
                            v.uid.clone(),
                            PublishedValidatorState {
                                trust_score: v.trust_score,
                                last_performance: v.last_performance,
                            },
                        )
                    })
                    .collect(),
                Err(e) => {
                    // Keep the expected states for a later attempt.
                    self.previous_states = Some((prev_cycle, expected));
                    return StepOutcome::Retryable(format!("published state fetch: {}", e));
                }
            };

        let findings =
            self.fraud
                .review_previous_cycle(prev_cycle, &expected, &published, &mut self.validators);
        if findings.is_empty() {
            tracing::info!(cycle = prev_cycle, "no deviations in published states");
        } else {
            for finding in &findings {
                tracing::warn!(
                    uid = finding.uid.as_str(),
                    severity = finding.severity,
                    pending_slash = finding.pending_slash,
                    jailed = finding.jailed,
                    reason = finding.reason.as_str(),
                    "fraud finding"
                );
            }
        }
        StepOutcome::Completed
    }

    /// Rank Active miners by trust and selection fairness.
    fn select_miners(&self, cycle: u64) -> Vec<String> {
        let mut ranked: Vec<(String, f64)> = self
            .miners
            .values()
            .filter(|m| m.status == NodeStatus::Active)
            .map(|m| {
                let idle = if m.last_selected_cycle < 0 {
                    self.config.selection_max_time_bonus
                } else {
                    (cycle as i64 - m.last_selected_cycle).max(0) as u32
                };
                let p = selection_probability(
                    m.trust_score,
                    idle,
                    self.config.selection_beta,
                    self.config.selection_max_time_bonus,
                );
                (m.uid.clone(), p)
            })
            .collect();

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
            .into_iter()
            .take(self.config.miners_per_cycle)
            .map(|(uid, _)| uid)
            .collect()
    }

    /// Create and dispatch tasks to the selected miners, fanning out
    /// concurrently. A miner that cannot be reached simply yields no
    /// result this cycle.
    async fn dispatch_tasks(&mut self, cycle: u64, book: &mut CycleLedger) -> StepOutcome {
        let selected = self.select_miners(cycle);
        if selected.is_empty() {
            return StepOutcome::Skipped("no active miners to task".to_string());
        }

        let deadline = unix_to_datetime(self.coordinator.result_cutoff(cycle));
        let mut handles = Vec::new();

        for uid in &selected {
            let Some(miner) = self.miners.get(uid) else { continue };
            let Some(endpoint) = miner.api_endpoint.clone() else {
                tracing::debug!(miner = uid.as_str(), "miner has no endpoint, skipping");
                continue;
            };
            let Some(task_data) = self.task_factory.create_task(uid) else {
                continue;
            };

            let task = TaskAssignment {
                task_id: Uuid::now_v7().to_string(),
                miner_uid: uid.clone(),
                validator_uid: self.info.uid.clone(),
                task_data,
                timestamp_sent: Utc::now(),
                deadline,
            };
            book.record_task(task.clone());

            let transport = self.transport.clone();
            handles.push(tokio::spawn(async move {
                let sent = transport.send_task(&endpoint, &task).await;
                (task.task_id, task.miner_uid, sent)
            }));
        }

        for uid in &selected {
            if let Some(miner) = self.miners.get_mut(uid) {
                miner.last_selected_cycle = cycle as i64;
            }
        }

        let mut sent = 0usize;
        for handle in handles {
            match handle.await {
                Ok((_, _, Ok(()))) => sent += 1,
                Ok((task_id, miner_uid, Err(e))) => tracing::warn!(
                    task = task_id.as_str(),
                    miner = miner_uid.as_str(),
                    error = %e,
                    "task dispatch failed"
                ),
                Err(e) => tracing::warn!(error = %e, "dispatch task panicked"),
            }
        }

        tracing::info!(cycle, dispatched = sent, selected = selected.len(), "tasks dispatched");
        StepOutcome::Completed
    }

    /// Poll miners for results until the execution-phase cutoff. Missing
    /// results are non-responses, not failures.
    async fn collect_results(&self, cycle: u64, book: &mut CycleLedger) -> StepOutcome {
        if book.task_count() == 0 {
            return StepOutcome::Skipped("no tasks outstanding".to_string());
        }
        let cutoff = self.coordinator.result_cutoff(cycle);

        loop {
            let outstanding: Vec<(String, String)> = book
                .tasks_sent()
                .filter(|t| book.result(&t.task_id).is_none())
                .filter_map(|t| {
                    self.miners
                        .get(&t.miner_uid)
                        .and_then(|m| m.api_endpoint.clone())
                        .map(|endpoint| (t.task_id.clone(), endpoint))
                })
                .collect();

            if outstanding.is_empty() {
                break;
            }
            if now_unix() >= cutoff {
                tracing::info!(
                    cycle,
                    missing = outstanding.len(),
                    "result deadline reached, proceeding with collected results"
                );
                break;
            }

            for (task_id, endpoint) in outstanding {
                match self.transport.poll_result(&endpoint, &task_id).await {
                    Ok(Some(result)) => {
                        if let Err(rejection) = book.record_result(result, Utc::now()) {
                            tracing::warn!(cycle, %rejection, "miner result rejected");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!(task = task_id.as_str(), error = %e, "poll failed"),
                }
            }

            tokio::time::sleep(Duration::from_secs(self.config.result_poll_interval_secs)).await;
        }

        tracing::info!(cycle, results = book.result_count(), "result collection finished");
        StepOutcome::Completed
    }

    /// Score the collected results with the plugin, record them locally,
    /// and broadcast the signed batch to peers.
    async fn score_and_broadcast(&mut self, cycle: u64, book: &mut CycleLedger) -> StepOutcome {
        let mut scores: Vec<ValidatorScore> = Vec::new();
        for task in book.tasks_sent() {
            let Some(result) = book.result(&task.task_id) else {
                continue;
            };
            let raw = self.scorer.score(&task.task_data, &result.result_data);
            let score = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
            scores.push(ValidatorScore {
                task_id: task.task_id.clone(),
                miner_uid: task.miner_uid.clone(),
                validator_uid: self.info.uid.clone(),
                score,
                deviation: None,
                timestamp: now_unix_f64(),
            });
        }

        if scores.is_empty() {
            return StepOutcome::Skipped("no results to score".to_string());
        }

        for score in &scores {
            book.record_score(score.clone());
        }
        self.exchange.write().await.record_local(cycle, scores.clone());

        match sign_submission(scores, cycle, &self.info.uid, &self.keypair) {
            Ok(payload) => {
                broadcast_scores(self.peer_registry.clone(), payload);
                StepOutcome::Completed
            }
            Err(e) => StepOutcome::Retryable(format!("could not sign submission: {}", e)),
        }
    }

    /// Wait for quorum until the consensus cutoff, extending the phase at
    /// most once while quorum is unmet.
    async fn await_quorum(&mut self, cycle: u64) -> StepOutcome {
        loop {
            let quorum = self.exchange.read().await.quorum_met(cycle);
            if quorum {
                tracing::info!(cycle, "quorum reached");
                return StepOutcome::Completed;
            }

            let now = now_unix();
            let cutoff = self.coordinator.consensus_cutoff(cycle);
            if now >= cutoff {
                if self
                    .coordinator
                    .request_consensus_extension(cycle, quorum)
                    .is_some()
                {
                    // Cutoff moved; keep waiting inside the extension.
                    continue;
                }
                return StepOutcome::Skipped("consensus deadline passed without quorum".to_string());
            }

            let wait = (cutoff - now).min(2).max(1);
            tokio::time::sleep(Duration::from_secs(wait)).await;
        }
    }

    /// Run the consensus engine over everything collected for this cycle
    /// and fold the output back into the in-memory registry.
    async fn finalize_cycle(&mut self, cycle: u64) -> CycleResult {
        let scores = self.exchange.read().await.scores_for_cycle(cycle);
        self.engine.begin_cycle();
        let result = self.engine.run_cycle(cycle, &scores, &self.validators);

        for (uid, state) in &result.validator_states {
            if let Some(info) = self.validators.get_mut(uid) {
                info.trust_score = state.trust;
                info.last_performance = state.e_v;
                info.push_performance(state.e_v);
            }
        }

        let updates = self.engine.prepare_miner_updates(&self.miners, &result.miner_scores);
        for (uid, update) in &updates {
            if let Some(miner) = self.miners.get_mut(uid) {
                miner.trust_score = update.trust_score;
                if update.scored {
                    miner.push_performance(update.performance);
                }
            }
        }

        // Cache the publishable per-miner results for status queries.
        if result.outcome == CycleOutcome::Finalized {
            let results = result
                .miner_scores
                .iter()
                .map(|(uid, &p_adj)| {
                    let incentive = updates.get(uid).map(|u| u.incentive).unwrap_or(0.0);
                    (
                        uid.clone(),
                        MinerConsensusResult {
                            miner_uid: uid.clone(),
                            p_adj,
                            incentive,
                        },
                    )
                })
                .collect();
            self.last_results = Some(CycleConsensusResults {
                cycle,
                results,
                publisher_uid: self.info.uid.clone(),
                published_at: now_unix_f64(),
            });
        }

        result
    }

    /// Commit the node's own state for this cycle, with bounded retries,
    /// plus updates for the miners it scored. A commit failure never
    /// invalidates the in-memory result — the retained calculated states
    /// are what the next cycle's fraud review compares against.
    async fn settle(&mut self, cycle: u64, result: &CycleResult) -> StepOutcome {
        if result.outcome == CycleOutcome::Skipped {
            return StepOutcome::Skipped("cycle skipped, nothing to settle".to_string());
        }

        for (uid, &p_adj) in &result.miner_scores {
            let Some(miner) = self.miners.get(uid) else { continue };
            if let Err(e) = self
                .ledger
                .submit_miner_update(uid, cycle, miner.trust_score, p_adj)
                .await
            {
                tracing::warn!(miner = uid.as_str(), error = %e, "miner update commit failed");
            }
        }

        let Some(own_state) = result.validator_states.get(&self.info.uid) else {
            return StepOutcome::Skipped("no calculated state for self".to_string());
        };

        for attempt in 1..=self.config.commit_max_retries {
            match self
                .ledger
                .submit_validator_update(&self.info.uid, cycle, own_state.trust, own_state.e_v)
                .await
            {
                Ok(tx_hash) => {
                    tracing::info!(cycle, tx = tx_hash.as_str(), "validator state committed");
                    return StepOutcome::Completed;
                }
                Err(e) => {
                    tracing::warn!(cycle, attempt, error = %e, "validator commit failed");
                    if attempt < self.config.commit_max_retries {
                        tokio::time::sleep(Duration::from_secs(
                            self.config.commit_retry_delay_secs,
                        ))
                        .await;
                    }
                }
            }
        }

        StepOutcome::Retryable("ledger commit failed after retries".to_string())
    }
}

/// Current wall-clock time in unix seconds.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Current wall-clock time in unix seconds, fractional.
pub fn now_unix_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn unix_to_datetime(unix: u64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(unix as i64, 0).unwrap_or_else(Utc::now)
}
