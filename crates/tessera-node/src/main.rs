// crates/tessera-node/src/main.rs
//
// Binary entrypoint for the Tessera validator node.
//
// Initializes tracing, parses CLI arguments, loads configuration, loads
// (or generates) the signing key, seeds the configured ledger backend,
// and runs the cycle orchestration loop.

mod config;
mod directory;
mod ledger;
mod node;
mod scoring;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use config::NodeConfig;
use directory::FsSlotDirectory;
use ledger::InMemoryLedger;
use node::ValidatorNode;
use scoring::{ChallengeTaskFactory, EchoScorer};
use transport::HttpTaskTransport;

use tessera_core::crypto::{hex_decode, hex_encode, Keypair};
use tessera_core::{NodeStatus, ValidatorInfo};

/// Tessera Protocol validator node.
#[derive(Parser, Debug)]
#[command(name = "tessera-node", version = "0.1.0", about = "Tessera Protocol validator node")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.tessera/config.toml")]
    config: String,

    /// Override the validator UID from the config file.
    #[arg(long)]
    uid: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the
    // file is not found.
    let config_path = expand_tilde(&args.config);
    let mut node_config = match NodeConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!(
                "Could not load config from {}: {}. Using defaults.",
                config_path, e
            );
            NodeConfig::default()
        }
    };
    if let Some(uid) = args.uid {
        node_config.validator_uid = uid;
    }

    // Initialize tracing; RUST_LOG overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(node_config.log_level.clone())),
        )
        .init();

    tracing::info!("Tessera Protocol validator node v0.1.0");
    tracing::info!("Validator UID: {}", node_config.validator_uid);
    tracing::info!("Ledger mode: {}", node_config.ledger_mode);

    node_config.slot.validate()?;

    // Load or generate the signing key.
    let keypair = load_or_generate_keypair(&expand_tilde(&node_config.hotkey_path));
    tracing::info!("Signing address: {}", keypair.address());

    // Assemble this validator's registry entry.
    let self_info = ValidatorInfo {
        uid: node_config.validator_uid.clone(),
        address: keypair.address(),
        api_endpoint: node_config.self_url.clone(),
        stake: 1000.0,
        trust_score: 0.5,
        weight: 1.0,
        status: NodeStatus::Active,
        last_performance: 0.0,
        performance_history: vec![],
        registration_time: 0,
        last_update_cycle: None,
    };

    // Ledger backend is selected explicitly by configuration.
    let ledger = match node_config.ledger_mode.as_str() {
        "memory" => {
            let validators: Vec<ValidatorInfo> = node_config
                .genesis
                .validators
                .iter()
                .cloned()
                .map(|v| v.into_info())
                .collect();
            let miners = node_config
                .genesis
                .miners
                .iter()
                .cloned()
                .map(|m| m.into_info())
                .collect();
            let ledger = InMemoryLedger::seeded(validators, miners);
            // The local validator always exists in its own registry.
            ledger.register_validator(self_info.clone()).await;
            Arc::new(ledger)
        }
        other => {
            return Err(format!("unknown ledger mode: {}", other).into());
        }
    };

    let data_dir = expand_tilde(&node_config.data_dir);
    let coordination_dir = if node_config.coordination_dir.starts_with('/')
        || node_config.coordination_dir.starts_with('~')
    {
        expand_tilde(&node_config.coordination_dir)
    } else {
        format!("{}/{}", data_dir, node_config.coordination_dir)
    };

    let transport = Arc::new(HttpTaskTransport::new(Duration::from_secs(
        node_config.peer_timeout_secs,
    )));
    let task_factory = Arc::new(ChallengeTaskFactory::new(&node_config.validator_uid));
    let scorer = Arc::new(EchoScorer);
    let slot_directory = Arc::new(FsSlotDirectory::new(&coordination_dir));

    // Periodically clear slot markers outside the current window.
    let janitor = slot_directory.clone();
    let epoch_start = node_config.slot.epoch_start_unix;
    let slot_duration = node_config.slot.slot_duration_secs.max(1);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(600)).await;
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let slot = now.saturating_sub(epoch_start) / slot_duration;
            janitor.prune(slot.saturating_sub(1));
        }
    });

    let mut node = ValidatorNode::new(
        node_config,
        self_info,
        keypair,
        ledger,
        transport,
        task_factory,
        scorer,
        slot_directory,
    )?;

    node.run().await?;

    tracing::info!("Tessera node shut down gracefully");
    Ok(())
}

/// Load the hex-encoded hotkey secret from disk, generating and persisting
/// a fresh keypair when none exists.
fn load_or_generate_keypair(path: &str) -> Keypair {
    if let Ok(hex_str) = std::fs::read_to_string(path) {
        if let Some(bytes) = hex_decode(hex_str.trim()) {
            if bytes.len() == 32 {
                let mut secret = [0u8; 32];
                secret.copy_from_slice(&bytes);
                return Keypair::from_secret_bytes(&secret);
            }
        }
        tracing::warn!("Invalid hotkey secret at {}, generating a new key", path);
    }

    let keypair = Keypair::generate();
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let secret_hex = hex_encode(&keypair.signing_key.to_bytes());
    match std::fs::write(path, secret_hex) {
        Ok(()) => tracing::info!("Generated new hotkey at {}", path),
        Err(e) => tracing::warn!("Could not persist hotkey to {}: {}", path, e),
    }
    keypair
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{}", home.display(), &path[1..]);
        }
    }
    path.to_string()
}
