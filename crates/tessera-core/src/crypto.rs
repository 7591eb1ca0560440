// crates/tessera-core/src/crypto.rs

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::TesseraError;

/// An ed25519 keypair for signing score submissions.
pub struct Keypair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl Keypair {
    /// Generate a new random ed25519 keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Keypair {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct a keypair from 32 secret key bytes.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let verifying_key = signing_key.verifying_key();
        Keypair {
            signing_key,
            verifying_key,
        }
    }

    /// Get the public key bytes (32 bytes).
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// The ledger address derived from this keypair's public key.
    pub fn address(&self) -> String {
        derive_address(&self.public_key_bytes())
    }

    /// Sign a message and return the signature bytes.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

/// Verify an ed25519 signature.
///
/// Returns `true` if the signature is valid for the given message and public key.
pub fn verify_signature(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<bool, TesseraError> {
    let verifying_key = VerifyingKey::from_bytes(public_key_bytes)
        .map_err(|e| TesseraError::Crypto(format!("Invalid public key: {}", e)))?;

    let signature_array: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| TesseraError::Crypto("Signature must be exactly 64 bytes".to_string()))?;

    let signature = ed25519_dalek::Signature::from_bytes(&signature_array);

    match verifying_key.verify(message, &signature) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Derive the ledger address for a public key: `0x` + hex(SHA-256(pubkey)).
///
/// This is the binding used by the score exchange to check that the key a
/// peer signs with belongs to the validator UID it claims to be.
pub fn derive_address(public_key_bytes: &[u8; 32]) -> String {
    let digest = hash_bytes(public_key_bytes);
    format!("0x{}", hex_encode(&digest))
}

/// Compute SHA-256 hash of the given bytes.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Encode bytes as a lowercase hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode a hex string into bytes. Returns None if the string is invalid hex.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let message = b"tessera score submission";

        let signature = keypair.sign(message);
        let pubkey = keypair.public_key_bytes();

        let valid = verify_signature(&pubkey, message, &signature).unwrap();
        assert!(valid);

        // Verify wrong message fails
        let wrong_message = b"wrong message";
        let invalid = verify_signature(&pubkey, wrong_message, &signature).unwrap();
        assert!(!invalid);
    }

    #[test]
    fn test_address_is_deterministic() {
        let keypair = Keypair::generate();
        let addr1 = keypair.address();
        let addr2 = derive_address(&keypair.public_key_bytes());
        assert_eq!(addr1, addr2);
        assert!(addr1.starts_with("0x"));
        assert_eq!(addr1.len(), 2 + 64);
    }

    #[test]
    fn test_different_keys_different_addresses() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_hex_round_trip() {
        let bytes = vec![0x00, 0x7f, 0xff, 0x10];
        let hex = hex_encode(&bytes);
        assert_eq!(hex, "007fff10");
        assert_eq!(hex_decode(&hex).unwrap(), bytes);
        assert!(hex_decode("abc").is_none());
        assert!(hex_decode("zz").is_none());
    }
}
