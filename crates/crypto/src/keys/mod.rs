//! Key primitives: generation, serialization, signing, verification.
//!
//! The key algorithms form a closed, tagged set ([`KeyType`]); the
//! [`PublicKey`] and [`PrivateKey`] enums dispatch to one module per
//! algorithm. Equality is canonical-byte equality and is always false
//! across algorithms.

pub mod ecdsa;
pub mod eddsa;
pub mod encoding;

use dep2p_api::crypto::{SerializableKey, SigningKey as _, SigningKeyPair, VerifyingKey as _};
use dep2p_types::KeyType;

pub use ecdsa::{EcdsaCurve, EcdsaKeyPair, EcdsaPrivateKey, EcdsaPublicKey, EcdsaSignature};
pub use eddsa::{Ed25519KeyPair, Ed25519PrivateKey, Ed25519PublicKey, Ed25519Signature};

use crate::error::CryptoError;

/// A public key of any supported algorithm.
#[derive(Clone)]
pub enum PublicKey {
    /// Ed25519 public key.
    Ed25519(Ed25519PublicKey),
    /// ECDSA public key (P-256 or P-384).
    Ecdsa(EcdsaPublicKey),
}

/// A private key of any supported algorithm.
#[derive(Clone)]
pub enum PrivateKey {
    /// Ed25519 private key.
    Ed25519(Ed25519PrivateKey),
    /// ECDSA private key (P-256 or P-384).
    Ecdsa(EcdsaPrivateKey),
}

/// Generates a fresh keypair of the requested algorithm.
///
/// The only failure mode is the OS entropy source.
pub fn generate(key_type: KeyType) -> Result<(PrivateKey, PublicKey), CryptoError> {
    match key_type {
        KeyType::Ed25519 => {
            let pair = Ed25519KeyPair::generate()?;
            Ok((
                PrivateKey::Ed25519(pair.private_key()),
                PublicKey::Ed25519(pair.public_key()),
            ))
        }
        KeyType::EcdsaP256 => {
            let pair = EcdsaKeyPair::generate(EcdsaCurve::P256)?;
            Ok((
                PrivateKey::Ecdsa(pair.private_key()),
                PublicKey::Ecdsa(pair.public_key()),
            ))
        }
        KeyType::EcdsaP384 => {
            let pair = EcdsaKeyPair::generate(EcdsaCurve::P384)?;
            Ok((
                PrivateKey::Ecdsa(pair.private_key()),
                PublicKey::Ecdsa(pair.public_key()),
            ))
        }
    }
}

/// Canonical-byte equality; false across algorithms.
pub fn equals(a: &PublicKey, b: &PublicKey) -> bool {
    a.key_type() == b.key_type() && a.to_bytes() == b.to_bytes()
}

impl PublicKey {
    /// The algorithm tag.
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Ed25519(_) => KeyType::Ed25519,
            PublicKey::Ecdsa(pk) => pk.curve().key_type(),
        }
    }

    /// Canonical byte encoding (raw 32 bytes for Ed25519, SEC1
    /// uncompressed for ECDSA).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(pk) => pk.to_bytes(),
            PublicKey::Ecdsa(pk) => pk.to_bytes(),
        }
    }

    /// Parses a canonical encoding for a declared algorithm, rejecting
    /// lengths that do not match the declaration.
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, CryptoError> {
        match key_type {
            KeyType::Ed25519 => Ed25519PublicKey::from_bytes(bytes).map(PublicKey::Ed25519),
            KeyType::EcdsaP256 => {
                EcdsaPublicKey::from_sec1_bytes(EcdsaCurve::P256, bytes).map(PublicKey::Ecdsa)
            }
            KeyType::EcdsaP384 => {
                EcdsaPublicKey::from_sec1_bytes(EcdsaCurve::P384, bytes).map(PublicKey::Ecdsa)
            }
        }
    }

    /// Verifies a signature over a message.
    ///
    /// Returns `Ok(false)` on a malformed or non-matching signature; an
    /// `Err` is reserved for structurally unusable keys.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        match self {
            PublicKey::Ed25519(pk) => {
                let sig = match Ed25519Signature::from_bytes(signature) {
                    Ok(sig) => sig,
                    Err(_) => return Ok(false),
                };
                Ok(pk.verify(message, &sig).is_ok())
            }
            PublicKey::Ecdsa(pk) => {
                let sig = match EcdsaSignature::from_fixed_bytes(pk.curve(), signature) {
                    Ok(sig) => sig,
                    Err(_) => return Ok(false),
                };
                Ok(pk.verify(message, &sig).is_ok())
            }
        }
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        equals(self, other)
    }
}

impl Eq for PublicKey {}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        let prefix = bytes.get(..8).unwrap_or(&bytes);
        write!(f, "PublicKey({}, {})", self.key_type(), hex::encode(prefix))
    }
}

impl PrivateKey {
    /// The algorithm tag.
    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Ed25519(_) => KeyType::Ed25519,
            PrivateKey::Ecdsa(sk) => sk.curve().key_type(),
        }
    }

    /// Signs a message, producing the algorithm's fixed-width signature.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            PrivateKey::Ed25519(sk) => sk.sign(message).map(|s| s.to_bytes()),
            PrivateKey::Ecdsa(sk) => sk.sign(message).map(|s| s.to_bytes()),
        }
    }

    /// Derives the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ed25519(sk) => PublicKey::Ed25519(sk.public_key()),
            PrivateKey::Ecdsa(sk) => PublicKey::Ecdsa(sk.public_key()),
        }
    }

    /// Serialized private form: raw 64 bytes (seed ‖ public) for Ed25519,
    /// PKCS#8 DER for ECDSA. Only call when the caller explicitly needs
    /// the secret material.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PrivateKey::Ed25519(sk) => sk.to_bytes(),
            PrivateKey::Ecdsa(sk) => sk.to_bytes(),
        }
    }

    /// Parses a serialized private key for a declared algorithm.
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, CryptoError> {
        match key_type {
            KeyType::Ed25519 => Ed25519PrivateKey::from_bytes(bytes).map(PrivateKey::Ed25519),
            KeyType::EcdsaP256 | KeyType::EcdsaP384 => {
                let sk = EcdsaPrivateKey::from_pkcs8_der(bytes)?;
                if sk.curve().key_type() != key_type {
                    return Err(CryptoError::UnsupportedKeyType(format!(
                        "pkcs8 key is {}, expected {}",
                        sk.curve().key_type(),
                        key_type
                    )));
                }
                Ok(PrivateKey::Ecdsa(sk))
            }
        }
    }

    /// PKCS#8 DER form, used when the identity key doubles as a TLS
    /// certificate key.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, CryptoError> {
        match self {
            PrivateKey::Ed25519(sk) => sk.to_pkcs8_der(),
            PrivateKey::Ecdsa(sk) => sk.to_pkcs8_der(),
        }
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secret material.
        write!(f, "PrivateKey({})", self.key_type())
    }
}
