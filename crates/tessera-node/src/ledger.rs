// crates/tessera-node/src/ledger.rs
//
// InMemoryLedger: the in-process LedgerClient implementation.
//
// Selected explicitly via `ledger_mode = "memory"` in the configuration —
// never substituted silently when a chain client is missing. A real
// chain-backed client plugs in through the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tessera_core::crypto::{hash_bytes, hex_encode};
use tessera_core::{LedgerClient, MinerInfo, TesseraError, ValidatorInfo};

/// In-memory ledger state shared by all clones of the client.
pub struct InMemoryLedger {
    validators: RwLock<HashMap<String, ValidatorInfo>>,
    miners: RwLock<HashMap<String, MinerInfo>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            validators: RwLock::new(HashMap::new()),
            miners: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the ledger with genesis registry entries.
    pub fn seeded(validators: Vec<ValidatorInfo>, miners: Vec<MinerInfo>) -> Self {
        Self {
            validators: RwLock::new(
                validators.into_iter().map(|v| (v.uid.clone(), v)).collect(),
            ),
            miners: RwLock::new(miners.into_iter().map(|m| (m.uid.clone(), m)).collect()),
        }
    }

    /// Insert or replace a validator entry directly (registration path).
    pub async fn register_validator(&self, info: ValidatorInfo) {
        self.validators.write().await.insert(info.uid.clone(), info);
    }

    fn tx_hash(uid: &str, cycle: u64, trust: f64, performance: f64) -> String {
        let material = format!("{}:{}:{}:{}", uid, cycle, trust, performance);
        format!("0x{}", hex_encode(&hash_bytes(material.as_bytes())))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn get_validator(&self, uid: &str) -> Result<Option<ValidatorInfo>, TesseraError> {
        Ok(self.validators.read().await.get(uid).cloned())
    }

    async fn get_all_validators(&self) -> Result<Vec<ValidatorInfo>, TesseraError> {
        Ok(self.validators.read().await.values().cloned().collect())
    }

    async fn get_all_miners(&self) -> Result<Vec<MinerInfo>, TesseraError> {
        Ok(self.miners.read().await.values().cloned().collect())
    }

    async fn submit_validator_update(
        &self,
        uid: &str,
        cycle: u64,
        trust_score: f64,
        performance: f64,
    ) -> Result<String, TesseraError> {
        let mut validators = self.validators.write().await;
        let info = validators
            .get_mut(uid)
            .ok_or_else(|| TesseraError::NotFound(format!("validator {}", uid)))?;

        info.trust_score = trust_score;
        info.last_performance = performance;
        info.push_performance(performance);
        info.last_update_cycle = Some(cycle);

        Ok(Self::tx_hash(uid, cycle, trust_score, performance))
    }

    async fn submit_miner_update(
        &self,
        uid: &str,
        cycle: u64,
        trust_score: f64,
        performance: f64,
    ) -> Result<String, TesseraError> {
        let mut miners = self.miners.write().await;
        let info = miners
            .get_mut(uid)
            .ok_or_else(|| TesseraError::NotFound(format!("miner {}", uid)))?;

        info.trust_score = trust_score;
        info.push_performance(performance);

        Ok(Self::tx_hash(uid, cycle, trust_score, performance))
    }
}
