//! Self-certifying identifier derivation.
//!
//! `NodeId = SHA-256(canonical_public_key_bytes)`. The canonical form per
//! algorithm is fixed by the key modules; this function is the sole
//! interop contract between every component that must agree on a NodeId.

use dep2p_types::NodeId;
use sha2::{Digest, Sha256};

use crate::keys::PublicKey;

/// Derives the identifier of a public key.
pub fn derive(public_key: &PublicKey) -> NodeId {
    derive_from_bytes(&public_key.to_bytes())
}

/// Derives an identifier from canonical public-key bytes.
pub fn derive_from_bytes(canonical: &[u8]) -> NodeId {
    let digest: [u8; 32] = Sha256::digest(canonical).into();
    NodeId::new(digest)
}

/// Derives an identifier directly from a Noise Curve25519 static key.
///
/// Legacy fallback only (peers that omit the identity-binding payload).
/// The result never equals an identity-derived identifier for the same
/// party; new code must not rely on it.
pub fn derive_legacy_from_noise_static(static_public: &[u8; 32]) -> NodeId {
    derive_from_bytes(static_public)
}

#[cfg(test)]
mod tests {
    use dep2p_types::KeyType;

    use super::*;
    use crate::keys::generate;

    #[test]
    fn derivation_is_deterministic() {
        let (_, public) = generate(KeyType::Ed25519).unwrap();
        assert_eq!(derive(&public), derive(&public));
        assert_eq!(derive(&public), derive_from_bytes(&public.to_bytes()));
    }

    #[test]
    fn distinct_keys_get_distinct_ids() {
        let (_, a) = generate(KeyType::Ed25519).unwrap();
        let (_, b) = generate(KeyType::Ed25519).unwrap();
        assert_ne!(derive(&a), derive(&b));
    }

    #[test]
    fn all_algorithms_derive() {
        for kt in [KeyType::Ed25519, KeyType::EcdsaP256, KeyType::EcdsaP384] {
            let (_, public) = generate(kt).unwrap();
            assert!(!derive(&public).is_empty());
        }
    }
}
