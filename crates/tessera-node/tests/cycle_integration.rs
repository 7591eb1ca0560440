// crates/tessera-node/tests/cycle_integration.rs
//
// Integration tests for the full consensus cycle: signed score exchange,
// quorum, consensus computation, and the next cycle's fraud review.
//
// These tests use the public APIs of the underlying library crates
// directly (tessera-core, tessera-p2p, tessera-consensus, tessera-slot)
// since the node is a binary crate with no lib.rs.

use std::collections::HashMap;

use tessera_consensus::{
    ConsensusEngine, ConsensusParams, CycleOutcome, FraudDetector, FraudParams,
    PublishedValidatorState,
};
use tessera_core::crypto::Keypair;
use tessera_core::{NodeStatus, ValidatorInfo, ValidatorScore};
use tessera_formulas::update_trust_score;
use tessera_p2p::{sign_submission, ScoreExchange};
use tessera_slot::{SlotConfig, SlotCoordinator, SlotPhase};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_validator(uid: &str, keypair: &Keypair, trust: f64) -> ValidatorInfo {
    ValidatorInfo {
        uid: uid.to_string(),
        address: keypair.address(),
        api_endpoint: None,
        stake: 1000.0,
        trust_score: trust,
        weight: 1.0,
        status: NodeStatus::Active,
        last_performance: 0.5,
        performance_history: vec![0.5, 0.5],
        registration_time: 0,
        last_update_cycle: None,
    }
}

fn make_score(task: &str, miner: &str, validator: &str, score: f64) -> ValidatorScore {
    ValidatorScore {
        task_id: task.to_string(),
        miner_uid: miner.to_string(),
        validator_uid: validator.to_string(),
        score,
        deviation: None,
        timestamp: 1_750_000_000.0,
    }
}

/// Three validators with real keypairs; v1 is the local node.
fn three_validator_network() -> (HashMap<String, ValidatorInfo>, Vec<Keypair>) {
    let keypairs: Vec<Keypair> = (0..3).map(|_| Keypair::generate()).collect();
    let mut validators = HashMap::new();
    for (i, kp) in keypairs.iter().enumerate() {
        let uid = format!("v{}", i + 1);
        validators.insert(uid.clone(), make_validator(&uid, kp, 0.5));
    }
    (validators, keypairs)
}

// ---------------------------------------------------------------------------
// Full cycle: exchange -> quorum -> consensus
// ---------------------------------------------------------------------------

#[test]
fn test_full_cycle_with_peer_submissions() {
    let (validators, keypairs) = three_validator_network();
    let cycle = 10;

    let mut exchange = ScoreExchange::new("v1", 3);

    // Local scores for two miners.
    exchange.record_local(
        cycle,
        vec![
            make_score("t1", "m1", "v1", 0.8),
            make_score("t2", "m2", "v1", 0.4),
        ],
    );

    // Peers sign and submit their own scores.
    let p2 = sign_submission(
        vec![
            make_score("t3", "m1", "v2", 0.7),
            make_score("t4", "m2", "v2", 0.5),
        ],
        cycle,
        "v2",
        &keypairs[1],
    )
    .unwrap();
    let p3 = sign_submission(
        vec![make_score("t5", "m1", "v3", 0.9)],
        cycle,
        "v3",
        &keypairs[2],
    )
    .unwrap();

    exchange.accept(p2, cycle, &validators).unwrap();
    exchange.accept(p3, cycle, &validators).unwrap();
    assert!(exchange.quorum_met(cycle));

    // Consensus over everything collected.
    let mut engine = ConsensusEngine::new(ConsensusParams {
        min_validators_for_consensus: 3,
        ..ConsensusParams::default()
    });
    let scores = exchange.scores_for_cycle(cycle);
    let result = engine.run_cycle(cycle, &scores, &validators);

    assert_eq!(result.outcome, CycleOutcome::Finalized);
    assert_eq!(result.miner_scores.len(), 2);

    // Equal trust: m1's consensus is the plain mean of 0.8, 0.7, 0.9.
    let m1 = result.miner_scores["m1"];
    assert!((m1 - 0.8).abs() < 1e-9);

    // Every validator got a calculated state tagged with the cycle.
    assert_eq!(result.validator_states.len(), 3);
    for state in result.validator_states.values() {
        assert_eq!(state.cycle, cycle);
        assert!(state.trust >= 0.0 && state.trust <= 1.0);
        assert!(state.e_v >= 0.0 && state.e_v <= 1.0);
        assert!(state.reward > 0.0);
    }
}

#[test]
fn test_quorum_failure_is_skipped_not_error() {
    let (validators, keypairs) = three_validator_network();
    let cycle = 10;

    let mut exchange = ScoreExchange::new("v1", 3);
    exchange.record_local(cycle, vec![make_score("t1", "m1", "v1", 0.8)]);
    let p2 = sign_submission(
        vec![make_score("t2", "m1", "v2", 0.7)],
        cycle,
        "v2",
        &keypairs[1],
    )
    .unwrap();
    exchange.accept(p2, cycle, &validators).unwrap();

    // Two distinct submitters, quorum of three.
    assert!(!exchange.quorum_met(cycle));

    let mut engine = ConsensusEngine::new(ConsensusParams {
        min_validators_for_consensus: 3,
        ..ConsensusParams::default()
    });
    let scores = exchange.scores_for_cycle(cycle);
    let result = engine.run_cycle(cycle, &scores, &validators);

    assert_eq!(result.outcome, CycleOutcome::Skipped);
    assert!(result.miner_scores.is_empty());

    // Non-participation still has a cost: decay-only trust for everyone.
    let expected = update_trust_score(0.5, 1, 0.0, &ConsensusParams::default().trust);
    for state in result.validator_states.values() {
        assert!((state.trust - expected).abs() < 1e-12);
        assert_eq!(state.reward, 0.0);
    }
}

// ---------------------------------------------------------------------------
// Cross-cycle: consensus output feeds the next cycle's fraud review
// ---------------------------------------------------------------------------

#[test]
fn test_fraud_review_of_previous_cycle_states() {
    let (mut validators, keypairs) = three_validator_network();
    let cycle = 10;

    // Cycle N: run consensus to produce the expected states.
    let mut exchange = ScoreExchange::new("v1", 2);
    exchange.record_local(cycle, vec![make_score("t1", "m1", "v1", 0.8)]);
    let p2 = sign_submission(
        vec![make_score("t2", "m1", "v2", 0.75)],
        cycle,
        "v2",
        &keypairs[1],
    )
    .unwrap();
    exchange.accept(p2, cycle, &validators).unwrap();

    let mut engine = ConsensusEngine::new(ConsensusParams::default());
    let scores = exchange.scores_for_cycle(cycle);
    let result = engine.run_cycle(cycle, &scores, &validators);
    assert_eq!(result.outcome, CycleOutcome::Finalized);

    // Cycle N+1: v1 and v3 published exactly what was expected, but v2
    // published an inflated trust score.
    let mut published = HashMap::new();
    for uid in ["v1", "v3"] {
        let state = &result.validator_states[uid];
        published.insert(
            uid.to_string(),
            PublishedValidatorState {
                trust_score: state.trust,
                last_performance: state.e_v,
            },
        );
    }
    let v2_state = &result.validator_states["v2"];
    published.insert(
        "v2".to_string(),
        PublishedValidatorState {
            trust_score: (v2_state.trust + 0.15).min(1.0),
            last_performance: v2_state.e_v,
        },
    );

    let detector = FraudDetector::new(FraudParams::default());
    let findings =
        detector.review_previous_cycle(cycle, &result.validator_states, &published, &mut validators);

    // Only v2 is flagged, at the severe band, and ends up jailed.
    assert_eq!(findings.len(), 1);
    let finding = &findings[0];
    assert_eq!(finding.uid, "v2");
    assert_eq!(finding.severity, 0.7);
    assert!(finding.jailed);
    assert!(finding.pending_slash > 0.0);
    assert_eq!(validators["v2"].status, NodeStatus::Jailed);
    assert_eq!(validators["v1"].status, NodeStatus::Active);

    // A jailed validator's scores no longer count in the next cycle.
    let next_cycle = cycle + 1;
    let mut exchange2 = ScoreExchange::new("v1", 2);
    exchange2.record_local(next_cycle, vec![make_score("t9", "m1", "v1", 0.6)]);
    let p2_next = sign_submission(
        vec![make_score("t10", "m1", "v2", 0.0)],
        next_cycle,
        "v2",
        &keypairs[1],
    )
    .unwrap();
    exchange2.accept(p2_next, next_cycle, &validators).unwrap();

    let mut engine2 = ConsensusEngine::new(ConsensusParams::default());
    let scores2 = exchange2.scores_for_cycle(next_cycle);
    let result2 = engine2.run_cycle(next_cycle, &scores2, &validators);

    // v2's zero score was excluded: consensus for m1 is v1's 0.6 alone.
    assert!((result2.miner_scores["m1"] - 0.6).abs() < 1e-9);
    let jailed_state = &result2.validator_states["v2"];
    assert_eq!(jailed_state.contribution, 0.0);
    assert_eq!(jailed_state.reward, 0.0);
}

// ---------------------------------------------------------------------------
// Slot timing drives the cycle number every validator agrees on
// ---------------------------------------------------------------------------

#[test]
fn test_validators_agree_on_cycle_from_wall_clock() {
    let config = SlotConfig {
        epoch_start_unix: 1_700_000_000,
        slot_duration_secs: 240,
        ..SlotConfig::default()
    };

    let a = SlotCoordinator::new(config.clone()).unwrap();
    let b = SlotCoordinator::new(config).unwrap();

    // A validator joining 13 slots and 100 seconds in computes the same
    // slot as one that has been running since the anchor.
    let now = 1_700_000_000 + 240 * 13 + 100;
    let pos_a = a.slot_and_phase(now);
    let pos_b = b.slot_and_phase(now);
    assert_eq!(pos_a.slot, 13);
    assert_eq!(pos_a.slot, pos_b.slot);
    assert_eq!(pos_a.phase, pos_b.phase);
    assert_eq!(pos_a.phase, SlotPhase::Consensus);
}

#[test]
fn test_submission_for_stale_cycle_rejected_end_to_end() {
    let (validators, keypairs) = three_validator_network();
    let mut exchange = ScoreExchange::new("v1", 2);

    let stale = sign_submission(
        vec![make_score("t1", "m1", "v2", 0.8)],
        8,
        "v2",
        &keypairs[1],
    )
    .unwrap();
    let err = exchange.accept(stale, 10, &validators).unwrap_err();
    assert!(err.to_string().contains("cycle out of window"));
    assert_eq!(exchange.received_validator_count(10), 0);
}
