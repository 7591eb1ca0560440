// crates/tessera-p2p/src/peers.rs
//
// PeerRegistry: manages configured peer URLs and a shared HTTP client
// for validator-to-validator score relay.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Information about a peer validator endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerState {
    /// The peer's public URL.
    pub url: String,
    /// The peer's validator UID, if known.
    pub validator_uid: Option<String>,
    /// Whether the last communication attempt succeeded.
    pub alive: bool,
}

/// Manages the set of known peers and a shared HTTP client.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    /// This node's public URL, included in outbound submissions.
    pub self_url: Option<String>,
    /// Configured peer URLs (from config).
    configured_peers: Vec<String>,
    /// Live peer state, updated on successful/failed communication.
    peer_state: Arc<RwLock<HashMap<String, PeerState>>>,
    /// Shared reqwest client for all outbound HTTP calls.
    client: reqwest::Client,
}

impl PeerRegistry {
    /// Create a new PeerRegistry from config values.
    ///
    /// The shared client carries the per-peer timeout; a peer that does
    /// not answer within it is marked dead for the round.
    pub fn new(
        self_url: Option<String>,
        configured_peers: Vec<String>,
        peer_timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(peer_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let mut state_map = HashMap::new();
        for url in &configured_peers {
            state_map.insert(
                url.clone(),
                PeerState {
                    url: url.clone(),
                    validator_uid: None,
                    alive: false,
                },
            );
        }

        Self {
            self_url,
            configured_peers,
            peer_state: Arc::new(RwLock::new(state_map)),
            client,
        }
    }

    /// Return the shared reqwest::Client.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Return the list of configured peer URLs.
    pub fn configured_peer_urls(&self) -> &[String] {
        &self.configured_peers
    }

    /// Return the number of configured peers.
    pub fn peer_count(&self) -> usize {
        self.configured_peers.len()
    }

    /// Return URLs of peers that last responded successfully.
    pub async fn live_peer_urls(&self) -> Vec<String> {
        let state = self.peer_state.read().await;
        state
            .values()
            .filter(|p| p.alive)
            .map(|p| p.url.clone())
            .collect()
    }

    /// Return all peer states.
    pub async fn all_peer_states(&self) -> Vec<PeerState> {
        let state = self.peer_state.read().await;
        state.values().cloned().collect()
    }

    /// Mark a peer as alive or dead after a communication attempt.
    pub async fn mark_peer(&self, url: &str, alive: bool, validator_uid: Option<String>) {
        let mut state = self.peer_state.write().await;
        if let Some(peer) = state.get_mut(url) {
            peer.alive = alive;
            if let Some(uid) = validator_uid {
                peer.validator_uid = Some(uid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_tracks_configured_peers() {
        let registry = PeerRegistry::new(
            Some("http://self:8000".to_string()),
            vec![
                "http://peer-a:8000".to_string(),
                "http://peer-b:8000".to_string(),
            ],
            Duration::from_secs(5),
        );

        assert_eq!(registry.peer_count(), 2);
        assert!(registry.live_peer_urls().await.is_empty());

        registry
            .mark_peer("http://peer-a:8000", true, Some("v2".to_string()))
            .await;
        let live = registry.live_peer_urls().await;
        assert_eq!(live, vec!["http://peer-a:8000".to_string()]);

        let states = registry.all_peer_states().await;
        let peer_a = states
            .iter()
            .find(|p| p.url == "http://peer-a:8000")
            .unwrap();
        assert_eq!(peer_a.validator_uid.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_marking_unknown_peer_is_noop() {
        let registry = PeerRegistry::new(None, vec![], Duration::from_secs(5));
        registry.mark_peer("http://nowhere:1", true, None).await;
        assert!(registry.all_peer_states().await.is_empty());
    }
}
