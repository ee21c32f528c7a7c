//! Node identities.
//!
//! An [`Identity`] bundles a private key, its public key, and the derived
//! [`NodeId`]. The three are internally consistent by construction; the
//! factories are the only way to build one.

pub mod persist;

use dep2p_api::crypto::SerializableKey;
use dep2p_types::{KeyType, NodeId};
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::keys::{self, Ed25519PublicKey, PrivateKey, PublicKey};
use crate::node_id;

/// A node identity: private key, public key, and derived identifier.
#[derive(Clone)]
pub struct Identity {
    private: PrivateKey,
    public: PublicKey,
    node_id: NodeId,
    master: bool,
}

/// An X25519 static keypair for the Noise engine, rooted in an identity.
pub struct NoiseStaticKeypair {
    /// Clamped X25519 secret scalar.
    pub secret: [u8; 32],
    /// Corresponding X25519 public key.
    pub public: [u8; 32],
}

impl Drop for NoiseStaticKeypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl Identity {
    /// Generates a fresh Ed25519 master identity.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::generate_with(KeyType::Ed25519)
    }

    /// Generates a fresh master identity of the given algorithm.
    pub fn generate_with(key_type: KeyType) -> Result<Self, CryptoError> {
        let (private, public) = keys::generate(key_type)?;
        let node_id = node_id::derive(&public);
        Ok(Self {
            private,
            public,
            node_id,
            master: true,
        })
    }

    /// Builds a master identity from an existing private key, deriving
    /// the public key and identifier.
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        let node_id = node_id::derive(&public);
        Self {
            private,
            public,
            node_id,
            master: true,
        }
    }

    /// Builds an identity from both halves of a keypair, validating that
    /// they belong together.
    pub fn from_keypair(private: PrivateKey, public: PublicKey) -> Result<Self, CryptoError> {
        if !keys::equals(&private.public_key(), &public) {
            return Err(CryptoError::KeyPairMismatch);
        }
        Ok(Self::from_private(private))
    }

    /// Builds a non-master identity for a delegated device. Device
    /// identities sign messages but never issue certificates.
    pub(crate) fn device_from_private(private: PrivateKey) -> Self {
        let mut identity = Self::from_private(private);
        identity.master = false;
        identity
    }

    /// The derived node identifier.
    pub fn id(&self) -> NodeId {
        self.node_id
    }

    /// The public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The private key.
    ///
    /// Guarded accessor: callers take responsibility for not serializing
    /// or exposing the secret material beyond explicit persistence.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    /// The key algorithm of this identity.
    pub fn key_type(&self) -> KeyType {
        self.private.key_type()
    }

    /// Whether this identity may issue device certificates.
    pub fn is_master(&self) -> bool {
        self.master
    }

    /// Signs arbitrary data with the identity key.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.private.sign(data)
    }

    /// Self-verify convenience: checks a signature under this identity's
    /// own public key.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        self.public.verify(data, signature)
    }

    /// Derives the Noise static keypair for this identity.
    ///
    /// Ed25519 identities map deterministically onto X25519 (private:
    /// SHA-512 of the seed with RFC 7748 clamping; public: the Montgomery
    /// form of the Edwards point), so the identity key stays the root of
    /// trust. ECDSA identities have no such map and use a fresh static
    /// per handshake; the identity-binding signature still links it to
    /// the identity key.
    pub fn noise_static_keypair(&self) -> Result<NoiseStaticKeypair, CryptoError> {
        let secret = match &self.private {
            PrivateKey::Ed25519(sk) => {
                let mut digest = Sha512::digest(sk.seed());
                let mut secret = [0u8; 32];
                secret.copy_from_slice(digest.get(..32).ok_or_else(|| {
                    CryptoError::OperationFailed("sha512 digest too short".into())
                })?);
                digest.as_mut_slice().zeroize();
                clamp(&mut secret);
                secret
            }
            PrivateKey::Ecdsa(_) => {
                use rand::RngCore;
                let mut secret = [0u8; 32];
                rand::rngs::OsRng
                    .try_fill_bytes(&mut secret)
                    .map_err(|e| CryptoError::InsufficientEntropy(e.to_string()))?;
                clamp(&mut secret);
                secret
            }
        };
        let public = *x25519_dalek::PublicKey::from(&x25519_dalek::StaticSecret::from(secret))
            .as_bytes();
        Ok(NoiseStaticKeypair { secret, public })
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("node_id", &self.node_id)
            .field("key_type", &self.key_type().name())
            .field("master", &self.master)
            .finish_non_exhaustive()
    }
}

/// RFC 7748 §5 clamping.
fn clamp(secret: &mut [u8; 32]) {
    if let [first, .., last] = secret {
        *first &= 248;
        *last &= 127;
        *last |= 64;
    }
}

/// Converts an Ed25519 public key to its X25519 (Montgomery) form via the
/// birational Edwards→Curve25519 map.
pub fn ed25519_public_to_x25519(public: &Ed25519PublicKey) -> Result<[u8; 32], CryptoError> {
    use curve25519_dalek::edwards::CompressedEdwardsY;
    let compressed = CompressedEdwardsY::from_slice(&public.to_bytes())
        .map_err(|_| CryptoError::InvalidKey("invalid Ed25519 public key".into()))?;
    let point = compressed
        .decompress()
        .ok_or_else(|| CryptoError::InvalidKey("Ed25519 point decompression failed".into()))?;
    Ok(point.to_montgomery().to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_id::derive;

    #[test]
    fn generated_identity_is_consistent() {
        let identity = Identity::generate().unwrap();
        assert_eq!(identity.id(), derive(identity.public_key()));
        assert!(identity.is_master());
        assert_eq!(identity.key_type(), KeyType::Ed25519);
    }

    #[test]
    fn sign_verify_roundtrip() {
        let identity = Identity::generate().unwrap();
        let sig = identity.sign(b"payload").unwrap();
        assert!(identity.verify(b"payload", &sig).unwrap());
        assert!(!identity.verify(b"other", &sig).unwrap());
    }

    #[test]
    fn from_keypair_rejects_mismatch() {
        let a = Identity::generate().unwrap();
        let b = Identity::generate().unwrap();
        let err = Identity::from_keypair(a.private_key().clone(), b.public_key().clone());
        assert!(matches!(err, Err(CryptoError::KeyPairMismatch)));
    }

    #[test]
    fn from_keypair_accepts_matching_halves() {
        let a = Identity::generate().unwrap();
        let rebuilt =
            Identity::from_keypair(a.private_key().clone(), a.public_key().clone()).unwrap();
        assert_eq!(rebuilt.id(), a.id());
    }

    #[test]
    fn noise_static_is_deterministic_for_ed25519() {
        let identity = Identity::generate().unwrap();
        let a = identity.noise_static_keypair().unwrap();
        let b = identity.noise_static_keypair().unwrap();
        assert_eq!(a.secret, b.secret);
        assert_eq!(a.public, b.public);
    }

    #[test]
    fn noise_static_public_matches_edwards_conversion() {
        let identity = Identity::generate().unwrap();
        let static_pair = identity.noise_static_keypair().unwrap();
        let PublicKey::Ed25519(ed) = identity.public_key() else {
            panic!("expected ed25519 identity");
        };
        let converted = ed25519_public_to_x25519(ed).unwrap();
        assert_eq!(static_pair.public, converted);
    }

    #[test]
    fn ecdsa_noise_static_is_ephemeral() {
        let identity = Identity::generate_with(KeyType::EcdsaP256).unwrap();
        let a = identity.noise_static_keypair().unwrap();
        let b = identity.noise_static_keypair().unwrap();
        assert_ne!(a.secret, b.secret);
    }

    #[test]
    fn identities_of_all_algorithms() {
        for kt in [KeyType::Ed25519, KeyType::EcdsaP256, KeyType::EcdsaP384] {
            let identity = Identity::generate_with(kt).unwrap();
            assert_eq!(identity.key_type(), kt);
            let sig = identity.sign(b"x").unwrap();
            assert!(identity.verify(b"x", &sig).unwrap());
        }
    }
}
