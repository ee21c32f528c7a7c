//! Ed25519 key objects.

use dep2p_api::crypto::{
    SerializableKey, Signature as SignatureTrait, SigningKey as SigningKeyTrait, SigningKeyPair,
    VerifyingKey as VerifyingKeyTrait,
};
use ed25519_dalek::{Signer, Verifier};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

/// Length of an Ed25519 seed in bytes.
pub const SEED_LEN: usize = 32;
/// Length of the serialized private form (seed ‖ public) in bytes.
pub const KEYPAIR_LEN: usize = 64;

/// Ed25519 key pair.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing: ed25519_dalek::SigningKey,
}

/// Ed25519 public key.
#[derive(Clone)]
pub struct Ed25519PublicKey(ed25519_dalek::VerifyingKey);

/// Ed25519 private key.
#[derive(Clone)]
pub struct Ed25519PrivateKey(ed25519_dalek::SigningKey);

/// Ed25519 signature (64 bytes).
pub struct Ed25519Signature(ed25519_dalek::Signature);

impl Ed25519KeyPair {
    /// Generates a fresh key pair from OS entropy.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut seed = [0u8; SEED_LEN];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| CryptoError::InsufficientEntropy(e.to_string()))?;
        Ok(Self {
            signing: ed25519_dalek::SigningKey::from_bytes(&seed),
        })
    }

    /// Rebuilds the pair from an existing private key.
    pub fn from_private_key(private: &Ed25519PrivateKey) -> Self {
        Self {
            signing: private.0.clone(),
        }
    }
}

impl SigningKeyPair for Ed25519KeyPair {
    type PublicKey = Ed25519PublicKey;
    type PrivateKey = Ed25519PrivateKey;
    type Signature = Ed25519Signature;

    fn public_key(&self) -> Self::PublicKey {
        Ed25519PublicKey(self.signing.verifying_key())
    }

    fn private_key(&self) -> Self::PrivateKey {
        Ed25519PrivateKey(self.signing.clone())
    }

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        Ok(Ed25519Signature(self.signing.sign(message)))
    }
}

impl VerifyingKeyTrait for Ed25519PublicKey {
    type Signature = Ed25519Signature;

    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::InvalidSignature("ed25519 verification failed".into()))
    }
}

impl SerializableKey for Ed25519PublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeySize {
            expected: 32,
            got: bytes.len(),
        })?;
        ed25519_dalek::VerifyingKey::from_bytes(&arr)
            .map(Ed25519PublicKey)
            .map_err(|e| CryptoError::InvalidKey(format!("failed to parse public key: {e}")))
    }
}

impl SigningKeyTrait for Ed25519PrivateKey {
    type Signature = Ed25519Signature;

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        Ok(Ed25519Signature(self.0.sign(message)))
    }
}

impl SerializableKey for Ed25519PrivateKey {
    fn to_bytes(&self) -> Vec<u8> {
        // seed ‖ public, 64 bytes
        self.0.to_keypair_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEYPAIR_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKeySize {
            expected: KEYPAIR_LEN,
            got: bytes.len(),
        })?;
        ed25519_dalek::SigningKey::from_keypair_bytes(&arr)
            .map(Ed25519PrivateKey)
            .map_err(|_| CryptoError::KeyPairMismatch)
    }
}

impl SerializableKey for Ed25519Signature {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        ed25519_dalek::Signature::from_slice(bytes)
            .map(Ed25519Signature)
            .map_err(|e| CryptoError::InvalidSignature(format!("failed to parse signature: {e}")))
    }
}

impl SignatureTrait for Ed25519Signature {}

impl Ed25519PrivateKey {
    /// Builds a private key from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SEED_LEN]) -> Self {
        Ed25519PrivateKey(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    /// The raw 32-byte seed.
    pub fn seed(&self) -> [u8; SEED_LEN] {
        self.0.to_bytes()
    }

    /// The public key corresponding to this private key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.0.verifying_key())
    }

    /// PKCS#8 v1 DER encoding, used when the key doubles as a TLS
    /// certificate key.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, CryptoError> {
        use ed25519_dalek::pkcs8::EncodePrivateKey;
        self.0
            .to_pkcs8_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::OperationFailed(format!("pkcs8 encoding failed: {e}")))
    }
}

impl Ed25519PublicKey {
    /// Borrow of the inner dalek key.
    pub(crate) fn inner(&self) -> &ed25519_dalek::VerifyingKey {
        &self.0
    }
}

#[cfg(test)]
mod tests;
