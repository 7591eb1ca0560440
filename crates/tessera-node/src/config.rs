// crates/tessera-node/src/config.rs
//
// Runtime configuration for the Tessera validator node.
// Loaded from a TOML file or populated with sensible defaults. The parsed
// value is passed into components at construction and treated as immutable
// afterward; there is no process-wide settings singleton.

use serde::Deserialize;
use std::fs;

use tessera_consensus::{ConsensusParams, FraudParams};
use tessera_core::{MinerInfo, NodeStatus, ValidatorInfo};
use tessera_slot::SlotConfig;

/// Runtime configuration for the validator node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// This validator's UID on the network.
    #[serde(default = "default_validator_uid")]
    pub validator_uid: String,

    /// Directory for local data (keys, slot markers).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directory of per-validator per-slot marker files used for
    /// active-validator discovery. Relative paths resolve under data_dir.
    #[serde(default = "default_coordination_dir")]
    pub coordination_dir: String,

    /// Path to the hex-encoded ed25519 hotkey secret.
    #[serde(default = "default_hotkey_path")]
    pub hotkey_path: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Peer score-exchange URLs. When empty, the node runs standalone and
    /// consensus depends entirely on its own scores.
    #[serde(default)]
    pub peers: Vec<String>,

    /// This node's publicly reachable URL, if any.
    #[serde(default)]
    pub self_url: Option<String>,

    /// Ledger backend: "memory" is the only in-tree implementation; a
    /// chain-backed client plugs in through the same trait.
    #[serde(default = "default_ledger_mode")]
    pub ledger_mode: String,

    /// How many miners to task per cycle.
    #[serde(default = "default_miners_per_cycle")]
    pub miners_per_cycle: usize,

    /// Interval between result polls during the execution phase.
    #[serde(default = "default_result_poll_interval")]
    pub result_poll_interval_secs: u64,

    /// Per-peer HTTP timeout for task and score traffic.
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout_secs: u64,

    /// Bounded retries for the ledger commit.
    #[serde(default = "default_commit_max_retries")]
    pub commit_max_retries: u32,

    /// Fixed delay between ledger commit attempts.
    #[serde(default = "default_commit_retry_delay")]
    pub commit_retry_delay_secs: u64,

    /// Fairness bonus coefficient for miner selection.
    #[serde(default = "default_selection_beta")]
    pub selection_beta: f64,

    /// Cap (in cycles) on the selection fairness bonus.
    #[serde(default = "default_selection_max_bonus")]
    pub selection_max_time_bonus: u32,

    /// Slot and phase timing.
    #[serde(default)]
    pub slot: SlotConfig,

    /// Consensus formula parameters.
    #[serde(default)]
    pub consensus: ConsensusParams,

    /// Fraud detection parameters.
    #[serde(default)]
    pub fraud: FraudParams,

    /// Initial registry contents for the in-memory ledger.
    #[serde(default)]
    pub genesis: GenesisConfig,
}

/// Seed entries for the in-memory ledger backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
    #[serde(default)]
    pub miners: Vec<GenesisMiner>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisValidator {
    pub uid: String,
    pub address: String,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default = "default_stake")]
    pub stake: f64,
    #[serde(default = "default_trust")]
    pub trust_score: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisMiner {
    pub uid: String,
    pub address: String,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default = "default_stake")]
    pub stake: f64,
    #[serde(default = "default_trust")]
    pub trust_score: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub subnet_uid: u32,
}

impl GenesisValidator {
    pub fn into_info(self) -> ValidatorInfo {
        ValidatorInfo {
            uid: self.uid,
            address: self.address,
            api_endpoint: self.api_endpoint,
            stake: self.stake,
            trust_score: self.trust_score,
            weight: self.weight,
            status: NodeStatus::Active,
            last_performance: 0.0,
            performance_history: vec![],
            registration_time: 0,
            last_update_cycle: None,
        }
    }
}

impl GenesisMiner {
    pub fn into_info(self) -> MinerInfo {
        MinerInfo {
            uid: self.uid,
            address: self.address,
            api_endpoint: self.api_endpoint,
            stake: self.stake,
            trust_score: self.trust_score,
            weight: self.weight,
            status: NodeStatus::Active,
            performance_history: vec![],
            subnet_uid: self.subnet_uid,
            registration_time: 0,
            last_selected_cycle: -1,
        }
    }
}

fn default_validator_uid() -> String {
    "validator_local".to_string()
}

fn default_data_dir() -> String {
    "~/.tessera/data".to_string()
}

fn default_coordination_dir() -> String {
    "slots".to_string()
}

fn default_hotkey_path() -> String {
    "~/.tessera/keys/hotkey".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ledger_mode() -> String {
    "memory".to_string()
}

fn default_miners_per_cycle() -> usize {
    4
}

fn default_result_poll_interval() -> u64 {
    5
}

fn default_peer_timeout() -> u64 {
    10
}

fn default_commit_max_retries() -> u32 {
    3
}

fn default_commit_retry_delay() -> u64 {
    5
}

fn default_selection_beta() -> f64 {
    0.2
}

fn default_selection_max_bonus() -> u32 {
    10
}

fn default_stake() -> f64 {
    1000.0
}

fn default_trust() -> f64 {
    0.5
}

fn default_weight() -> f64 {
    1.0
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            validator_uid: default_validator_uid(),
            data_dir: default_data_dir(),
            coordination_dir: default_coordination_dir(),
            hotkey_path: default_hotkey_path(),
            log_level: default_log_level(),
            peers: Vec::new(),
            self_url: None,
            ledger_mode: default_ledger_mode(),
            miners_per_cycle: default_miners_per_cycle(),
            result_poll_interval_secs: default_result_poll_interval(),
            peer_timeout_secs: default_peer_timeout(),
            commit_max_retries: default_commit_max_retries(),
            commit_retry_delay_secs: default_commit_retry_delay(),
            selection_beta: default_selection_beta(),
            selection_max_time_bonus: default_selection_max_bonus(),
            slot: SlotConfig::default(),
            consensus: ConsensusParams::default(),
            fraud: FraudParams::default(),
            genesis: GenesisConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
