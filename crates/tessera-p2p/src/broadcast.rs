// crates/tessera-p2p/src/broadcast.rs
//
// Outbound side of the score exchange: sign the local scores for a cycle
// and push them to all configured peers.
// Fire-and-forget — failures are logged, never block the caller.

use std::sync::Arc;

use tessera_core::crypto::{hex_encode, Keypair};
use tessera_core::{canonical_score_bytes, ScoreSubmissionPayload, TesseraError, ValidatorScore};

use crate::peers::PeerRegistry;

/// Build and sign a score submission for one cycle.
///
/// The signature covers the canonical serialization of the score list, so
/// any reordering or mutation in transit invalidates it.
pub fn sign_submission(
    scores: Vec<ValidatorScore>,
    cycle: u64,
    submitter_uid: &str,
    keypair: &Keypair,
) -> Result<ScoreSubmissionPayload, TesseraError> {
    let message = canonical_score_bytes(&scores)?;
    let signature = keypair.sign(&message);

    Ok(ScoreSubmissionPayload {
        scores,
        submitter_uid: submitter_uid.to_string(),
        cycle,
        submitter_address: keypair.address(),
        signature: hex_encode(&signature),
        public_key: hex_encode(&keypair.public_key_bytes()),
    })
}

/// Broadcast a signed submission to all configured peers via
/// `consensus/receive_scores`.
///
/// For each peer, spawns an async task that POSTs the payload. Peers that
/// are unreachable are logged and marked dead in the registry; none of
/// them can fail the round.
pub fn broadcast_scores(registry: Arc<PeerRegistry>, payload: ScoreSubmissionPayload) {
    let peers = registry.configured_peer_urls().to_vec();

    if peers.is_empty() {
        return;
    }

    tracing::debug!(
        cycle = payload.cycle,
        score_count = payload.scores.len(),
        peer_count = peers.len(),
        "broadcasting scores to peers"
    );

    for peer_url in peers {
        let client = registry.http_client().clone();
        let reg = registry.clone();
        let payload = payload.clone();

        tokio::spawn(async move {
            let request_body = serde_json::json!({
                "method": "consensus/receive_scores",
                "params": payload,
            });

            match client.post(&peer_url).json(&request_body).send().await {
                Ok(resp) => {
                    if resp.status().is_success() {
                        tracing::debug!(
                            cycle = payload.cycle,
                            peer = peer_url.as_str(),
                            "scores pushed to peer"
                        );
                        reg.mark_peer(&peer_url, true, None).await;
                    } else {
                        tracing::warn!(
                            cycle = payload.cycle,
                            peer = peer_url.as_str(),
                            status = %resp.status(),
                            "peer rejected score push"
                        );
                        reg.mark_peer(&peer_url, false, None).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        cycle = payload.cycle,
                        peer = peer_url.as_str(),
                        error = %e,
                        "failed to push scores to peer"
                    );
                    reg.mark_peer(&peer_url, false, None).await;
                }
            }
        });
    }
}
