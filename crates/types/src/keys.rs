//! The closed set of supported key algorithms.

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Supported long-lived key algorithms.
///
/// Ed25519 is the default for new identities; the ECDSA curves exist for
/// deployments with hardware or policy constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyType {
    /// Ed25519 (RFC 8032). Raw 32-byte public keys, 64-byte signatures.
    Ed25519,
    /// ECDSA over NIST P-256 with SHA-256. SEC1 uncompressed public keys.
    EcdsaP256,
    /// ECDSA over NIST P-384 with SHA-384. SEC1 uncompressed public keys.
    EcdsaP384,
}

impl KeyType {
    /// Stable lowercase name, used in PEM routing and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
            KeyType::EcdsaP256 => "ecdsa-p256",
            KeyType::EcdsaP384 => "ecdsa-p384",
        }
    }

    /// Length of the canonical public-key encoding in bytes.
    ///
    /// Ed25519 is the raw point; ECDSA is the SEC1 uncompressed form
    /// `0x04 ‖ X ‖ Y`.
    pub fn public_key_len(&self) -> usize {
        match self {
            KeyType::Ed25519 => 32,
            KeyType::EcdsaP256 => 65,
            KeyType::EcdsaP384 => 97,
        }
    }

    /// Length of a signature in bytes (fixed-width `r ‖ s` for ECDSA).
    pub fn signature_len(&self) -> usize {
        match self {
            KeyType::Ed25519 => 64,
            KeyType::EcdsaP256 => 64,
            KeyType::EcdsaP384 => 96,
        }
    }

    /// Resolves a stable name back to a key type.
    pub fn from_name(name: &str) -> Result<Self, CryptoError> {
        match name {
            "ed25519" => Ok(KeyType::Ed25519),
            "ecdsa-p256" => Ok(KeyType::EcdsaP256),
            "ecdsa-p384" => Ok(KeyType::EcdsaP384),
            other => Err(CryptoError::UnsupportedKeyType(other.to_string())),
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
