//! ECDSA key objects over the NIST P-256 and P-384 curves.
//!
//! Signatures are fixed-width `r ‖ s` (64 bytes for P-256, 96 for P-384);
//! public keys use the SEC1 uncompressed encoding `0x04 ‖ X ‖ Y`; private
//! keys serialize as PKCS#8 DER. P-256 pairs with SHA-256, P-384 with
//! SHA-384.

use dep2p_api::crypto::{
    SerializableKey, Signature as SignatureTrait, SigningKey as SigningKeyTrait, SigningKeyPair,
    VerifyingKey as VerifyingKeyTrait,
};
use dep2p_types::KeyType;
use p256::ecdsa::signature::{Signer, Verifier};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

/// Curve selector for the ECDSA objects in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaCurve {
    /// NIST P-256 with SHA-256.
    P256,
    /// NIST P-384 with SHA-384.
    P384,
}

impl EcdsaCurve {
    /// The corresponding key type tag.
    pub fn key_type(&self) -> KeyType {
        match self {
            EcdsaCurve::P256 => KeyType::EcdsaP256,
            EcdsaCurve::P384 => KeyType::EcdsaP384,
        }
    }

    fn scalar_len(&self) -> usize {
        match self {
            EcdsaCurve::P256 => 32,
            EcdsaCurve::P384 => 48,
        }
    }
}

/// ECDSA public key.
#[derive(Clone)]
pub enum EcdsaPublicKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

/// ECDSA private key.
#[derive(Clone)]
pub enum EcdsaPrivateKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
}

/// Fixed-width `r ‖ s` ECDSA signature.
pub struct EcdsaSignature {
    curve: EcdsaCurve,
    bytes: Vec<u8>,
}

/// ECDSA key pair.
#[derive(Clone)]
pub struct EcdsaKeyPair {
    private: EcdsaPrivateKey,
    public: EcdsaPublicKey,
}

impl EcdsaKeyPair {
    /// Generates a fresh key pair on the given curve from OS entropy.
    pub fn generate(curve: EcdsaCurve) -> Result<Self, CryptoError> {
        let private = EcdsaPrivateKey::generate(curve)?;
        let public = private.public_key();
        Ok(Self { private, public })
    }

    /// Rebuilds the pair from an existing private key.
    pub fn from_private_key(private: &EcdsaPrivateKey) -> Self {
        Self {
            private: private.clone(),
            public: private.public_key(),
        }
    }
}

impl SigningKeyPair for EcdsaKeyPair {
    type PublicKey = EcdsaPublicKey;
    type PrivateKey = EcdsaPrivateKey;
    type Signature = EcdsaSignature;

    fn public_key(&self) -> Self::PublicKey {
        self.public.clone()
    }

    fn private_key(&self) -> Self::PrivateKey {
        self.private.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        self.private.sign(message)
    }
}

impl EcdsaPrivateKey {
    /// Generates a fresh private scalar on the given curve.
    ///
    /// Drawn bytes outside the scalar field are rejected and redrawn, so
    /// the only failure mode is the OS entropy source itself.
    pub fn generate(curve: EcdsaCurve) -> Result<Self, CryptoError> {
        let mut buf = vec![0u8; curve.scalar_len()];
        for _ in 0..16 {
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|e| CryptoError::InsufficientEntropy(e.to_string()))?;
            let parsed = match curve {
                EcdsaCurve::P256 => p256::SecretKey::from_slice(&buf).map(EcdsaPrivateKey::P256),
                EcdsaCurve::P384 => p384::SecretKey::from_slice(&buf).map(EcdsaPrivateKey::P384),
            };
            if let Ok(key) = parsed {
                return Ok(key);
            }
        }
        Err(CryptoError::OperationFailed(
            "could not draw a valid scalar".into(),
        ))
    }

    /// The curve this key lives on.
    pub fn curve(&self) -> EcdsaCurve {
        match self {
            EcdsaPrivateKey::P256(_) => EcdsaCurve::P256,
            EcdsaPrivateKey::P384(_) => EcdsaCurve::P384,
        }
    }

    /// The public key corresponding to this private key.
    pub fn public_key(&self) -> EcdsaPublicKey {
        match self {
            EcdsaPrivateKey::P256(sk) => {
                EcdsaPublicKey::P256(p256::ecdsa::VerifyingKey::from(sk.public_key()))
            }
            EcdsaPrivateKey::P384(sk) => {
                EcdsaPublicKey::P384(p384::ecdsa::VerifyingKey::from(sk.public_key()))
            }
        }
    }

    /// PKCS#8 DER encoding of the private key.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, CryptoError> {
        use p256::pkcs8::EncodePrivateKey;
        let doc = match self {
            EcdsaPrivateKey::P256(sk) => sk.to_pkcs8_der(),
            EcdsaPrivateKey::P384(sk) => sk.to_pkcs8_der(),
        };
        doc.map(|d| d.as_bytes().to_vec())
            .map_err(|e| CryptoError::OperationFailed(format!("pkcs8 encoding failed: {e}")))
    }

    /// Parses a PKCS#8 DER private key; the curve is read from the DER.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        use p256::pkcs8::DecodePrivateKey;
        if let Ok(sk) = p256::SecretKey::from_pkcs8_der(der) {
            return Ok(EcdsaPrivateKey::P256(sk));
        }
        p384::SecretKey::from_pkcs8_der(der)
            .map(EcdsaPrivateKey::P384)
            .map_err(|e| CryptoError::InvalidKey(format!("failed to parse pkcs8 key: {e}")))
    }
}

impl SigningKeyTrait for EcdsaPrivateKey {
    type Signature = EcdsaSignature;

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        match self {
            EcdsaPrivateKey::P256(sk) => {
                let signing = p256::ecdsa::SigningKey::from(sk.clone());
                let sig: p256::ecdsa::Signature = signing.sign(message);
                Ok(EcdsaSignature {
                    curve: EcdsaCurve::P256,
                    bytes: sig.to_bytes().to_vec(),
                })
            }
            EcdsaPrivateKey::P384(sk) => {
                let signing = p384::ecdsa::SigningKey::from(sk.clone());
                let sig: p384::ecdsa::Signature = signing.sign(message);
                Ok(EcdsaSignature {
                    curve: EcdsaCurve::P384,
                    bytes: sig.to_bytes().to_vec(),
                })
            }
        }
    }
}

impl SerializableKey for EcdsaPrivateKey {
    fn to_bytes(&self) -> Vec<u8> {
        // PKCS#8 DER; encoding an in-memory scalar cannot fail.
        self.to_pkcs8_der().unwrap_or_default()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::from_pkcs8_der(bytes)
    }
}

impl EcdsaPublicKey {
    /// The curve this key lives on.
    pub fn curve(&self) -> EcdsaCurve {
        match self {
            EcdsaPublicKey::P256(_) => EcdsaCurve::P256,
            EcdsaPublicKey::P384(_) => EcdsaCurve::P384,
        }
    }

    /// Parses a SEC1 uncompressed point for a known curve.
    pub fn from_sec1_bytes(curve: EcdsaCurve, bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != curve.key_type().public_key_len() {
            return Err(CryptoError::InvalidKeySize {
                expected: curve.key_type().public_key_len(),
                got: bytes.len(),
            });
        }
        match curve {
            EcdsaCurve::P256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(EcdsaPublicKey::P256)
                .map_err(|e| CryptoError::InvalidKey(format!("invalid P-256 point: {e}"))),
            EcdsaCurve::P384 => p384::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(EcdsaPublicKey::P384)
                .map_err(|e| CryptoError::InvalidKey(format!("invalid P-384 point: {e}"))),
        }
    }
}

impl VerifyingKeyTrait for EcdsaPublicKey {
    type Signature = EcdsaSignature;

    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError> {
        match (self, signature.curve) {
            (EcdsaPublicKey::P256(vk), EcdsaCurve::P256) => {
                let sig = p256::ecdsa::Signature::from_slice(&signature.bytes)
                    .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
                vk.verify(message, &sig)
                    .map_err(|_| CryptoError::InvalidSignature("P-256 verification failed".into()))
            }
            (EcdsaPublicKey::P384(vk), EcdsaCurve::P384) => {
                let sig = p384::ecdsa::Signature::from_slice(&signature.bytes)
                    .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
                vk.verify(message, &sig)
                    .map_err(|_| CryptoError::InvalidSignature("P-384 verification failed".into()))
            }
            _ => Err(CryptoError::InvalidSignature(
                "signature curve does not match key curve".into(),
            )),
        }
    }
}

impl SerializableKey for EcdsaPublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            EcdsaPublicKey::P256(vk) => vk.to_encoded_point(false).as_bytes().to_vec(),
            EcdsaPublicKey::P384(vk) => vk.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        // The SEC1 uncompressed lengths are disjoint, so the curve is
        // inferable from the input length.
        match bytes.len() {
            65 => Self::from_sec1_bytes(EcdsaCurve::P256, bytes),
            97 => Self::from_sec1_bytes(EcdsaCurve::P384, bytes),
            got => Err(CryptoError::InvalidKeySize { expected: 65, got }),
        }
    }
}

impl EcdsaSignature {
    /// Wraps fixed-width signature bytes for a known curve.
    pub fn from_fixed_bytes(curve: EcdsaCurve, bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != curve.key_type().signature_len() {
            return Err(CryptoError::InvalidSignature(format!(
                "expected {} signature bytes, got {}",
                curve.key_type().signature_len(),
                bytes.len()
            )));
        }
        Ok(Self {
            curve,
            bytes: bytes.to_vec(),
        })
    }

    /// The fixed-width `r ‖ s` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl SerializableKey for EcdsaSignature {
    fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        match bytes.len() {
            64 => Self::from_fixed_bytes(EcdsaCurve::P256, bytes),
            96 => Self::from_fixed_bytes(EcdsaCurve::P384, bytes),
            got => Err(CryptoError::InvalidSignature(format!(
                "unexpected signature length {got}"
            ))),
        }
    }
}

impl SignatureTrait for EcdsaSignature {}

#[cfg(test)]
mod tests;
