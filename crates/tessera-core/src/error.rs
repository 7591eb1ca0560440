use thiserror::Error;

/// Protocol-wide error types for the Tessera Protocol.
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Consensus error (score aggregation, cycle state, quorum handling).
    #[error("Consensus error: {0}")]
    Consensus(String),

    /// Cryptographic error (key loading, signing, verification).
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Network error (peer broadcast, task transport).
    #[error("Network error: {0}")]
    Network(String),

    /// Ledger client error (state fetch or commit failed).
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Invalid state transition or configuration.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for TesseraError {
    fn from(e: serde_json::Error) -> Self {
        TesseraError::Serialization(e.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for TesseraError {
    fn from(e: ed25519_dalek::SignatureError) -> Self {
        TesseraError::Crypto(e.to_string())
    }
}
