//! Identity-binding verification.
//!
//! An identifier is trustworthy only after the verifier has seen the
//! public key and confirmed `SHA-256(canonical(pk)) == NodeId`. This
//! module checks that relation directly and implements the off-channel
//! [`IdentityProof`] used for attestation outside a handshake.

use dep2p_api::Clock;
use dep2p_types::{KeyType, NodeId};

use crate::error::{CertificateError, CryptoError, TransportError};
use crate::identity::Identity;
use crate::keys::PublicKey;
use crate::node_id;

/// Current identity-proof version.
pub const PROOF_VERSION: u8 = 1;
/// Maximum accepted proof age.
pub const PROOF_MAX_AGE_SECS: u64 = 24 * 3_600;
/// Maximum accepted clock skew into the future.
pub const PROOF_MAX_SKEW_SECS: u64 = 5 * 60;

/// Confirms that `claimed` is the identifier of `public_key`.
pub fn verify_binding(public_key: &PublicKey, claimed: &NodeId) -> Result<(), TransportError> {
    let derived = node_id::derive(public_key);
    if derived != *claimed {
        return Err(TransportError::RemoteIdentityMismatch);
    }
    Ok(())
}

/// Same check from raw canonical bytes (Ed25519 32-byte form).
pub fn verify_binding_from_bytes(
    public_key_bytes: &[u8],
    claimed: &NodeId,
) -> Result<(), TransportError> {
    let public_key = PublicKey::from_bytes(KeyType::Ed25519, public_key_bytes)
        .map_err(TransportError::Crypto)?;
    verify_binding(&public_key, claimed)
}

/// An out-of-band identity assertion.
///
/// Wire layout: `version (1) ‖ timestamp (u64 BE) ‖ pubkey_len (u16 BE) ‖
/// pubkey ‖ peerid_len (u16 BE) ‖ peerid ‖ sig_len (u16 BE) ‖ sig ‖
/// ext_len (u16 BE) ‖ ext`. The signature covers everything except the
/// signature field itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProof {
    /// Proof format version.
    pub version: u8,
    /// Creation time, unix seconds.
    pub timestamp: u64,
    /// Canonical public-key bytes of the asserting identity.
    pub public_key: Vec<u8>,
    /// The asserted identifier.
    pub node_id: NodeId,
    /// Identity signature over the proof body.
    pub signature: Vec<u8>,
    /// Opaque extension bytes, empty today.
    pub extensions: Vec<u8>,
}

impl IdentityProof {
    fn signed_body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(1 + 8 + 2 + self.public_key.len() + 2 + 32 + 2);
        body.push(self.version);
        body.extend_from_slice(&self.timestamp.to_be_bytes());
        push_prefixed(&mut body, &self.public_key);
        push_prefixed(&mut body, self.node_id.as_bytes());
        push_prefixed(&mut body, &self.extensions);
        body
    }

    /// Serializes the proof.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.version);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        push_prefixed(&mut out, &self.public_key);
        push_prefixed(&mut out, self.node_id.as_bytes());
        push_prefixed(&mut out, &self.signature);
        push_prefixed(&mut out, &self.extensions);
        out
    }

    /// Parses a serialized proof.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut cursor = Cursor { rest: bytes };
        let version = cursor.take_u8()?;
        let timestamp = cursor.take_u64()?;
        let public_key = cursor.take_prefixed()?.to_vec();
        let peer_id = cursor.take_prefixed()?;
        let signature = cursor.take_prefixed()?.to_vec();
        let extensions = cursor.take_prefixed()?.to_vec();
        if !cursor.rest.is_empty() {
            return Err(CryptoError::OperationFailed(
                "trailing bytes after identity proof".into(),
            ));
        }
        let node_id = NodeId::from_bytes(peer_id)
            .map_err(|e| CryptoError::OperationFailed(e.to_string()))?;
        Ok(Self {
            version,
            timestamp,
            public_key,
            node_id,
            signature,
            extensions,
        })
    }
}

struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CryptoError> {
        if self.rest.len() < n {
            return Err(CryptoError::OperationFailed(
                "identity proof truncated".into(),
            ));
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn take_u8(&mut self) -> Result<u8, CryptoError> {
        Ok(*self.take(1)?.first().unwrap_or(&0))
    }

    fn take_u64(&mut self) -> Result<u64, CryptoError> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| CryptoError::OperationFailed("identity proof truncated".into()))?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn take_prefixed(&mut self) -> Result<&'a [u8], CryptoError> {
        let len_bytes: [u8; 2] = self
            .take(2)?
            .try_into()
            .map_err(|_| CryptoError::OperationFailed("identity proof truncated".into()))?;
        self.take(u16::from_be_bytes(len_bytes) as usize)
    }
}

fn push_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes.get(..len as usize).unwrap_or(bytes));
}

/// Creates a signed identity proof at the clock's current time.
pub fn create_proof(identity: &Identity, clock: &dyn Clock) -> Result<IdentityProof, CryptoError> {
    let mut proof = IdentityProof {
        version: PROOF_VERSION,
        timestamp: clock.now_unix(),
        public_key: identity.public_key().to_bytes(),
        node_id: identity.id(),
        signature: Vec::new(),
        extensions: Vec::new(),
    };
    proof.signature = identity.sign(&proof.signed_body())?;
    Ok(proof)
}

/// Verifies an identity proof: version, freshness window, hash binding,
/// and the signature over the proof body.
pub fn verify_proof(
    proof: &IdentityProof,
    clock: &dyn Clock,
    allow_expired: bool,
) -> Result<(), TransportError> {
    if proof.version != PROOF_VERSION {
        return Err(TransportError::HandshakeFailed(format!(
            "unsupported identity proof version {}",
            proof.version
        )));
    }

    if !allow_expired {
        let now = clock.now_unix();
        if proof.timestamp > now.saturating_add(PROOF_MAX_SKEW_SECS) {
            return Err(CertificateError::NotYetValid.into());
        }
        if now.saturating_sub(proof.timestamp) > PROOF_MAX_AGE_SECS {
            return Err(CertificateError::Expired.into());
        }
    }

    let public_key = parse_proof_key(&proof.public_key)?;
    verify_binding(&public_key, &proof.node_id)?;

    let valid = public_key
        .verify(&proof.signed_body(), &proof.signature)
        .map_err(TransportError::Crypto)?;
    if !valid {
        return Err(TransportError::BindingSignatureInvalid);
    }
    Ok(())
}

fn parse_proof_key(bytes: &[u8]) -> Result<PublicKey, TransportError> {
    // Canonical lengths are disjoint across the supported algorithms.
    let key_type = match bytes.len() {
        32 => KeyType::Ed25519,
        65 => KeyType::EcdsaP256,
        97 => KeyType::EcdsaP384,
        got => {
            return Err(TransportError::Crypto(CryptoError::InvalidKeySize {
                expected: 32,
                got,
            }))
        }
    };
    PublicKey::from_bytes(key_type, bytes).map_err(TransportError::Crypto)
}

#[cfg(test)]
mod tests {
    use dep2p_api::FixedClock;

    use super::*;
    use crate::keys;

    #[test]
    fn binding_accepts_own_id() {
        let identity = Identity::generate().unwrap();
        verify_binding(identity.public_key(), &identity.id()).unwrap();
        verify_binding_from_bytes(&identity.public_key().to_bytes(), &identity.id()).unwrap();
    }

    #[test]
    fn binding_rejects_foreign_id() {
        let a = Identity::generate().unwrap();
        let b = Identity::generate().unwrap();
        assert!(matches!(
            verify_binding(a.public_key(), &b.id()),
            Err(TransportError::RemoteIdentityMismatch)
        ));
    }

    #[test]
    fn proof_roundtrip_and_verify() {
        let identity = Identity::generate().unwrap();
        let clock = FixedClock::new(1_000_000);

        let proof = create_proof(&identity, &clock).unwrap();
        let parsed = IdentityProof::from_bytes(&proof.to_bytes()).unwrap();
        assert_eq!(parsed, proof);

        verify_proof(&parsed, &clock, false).unwrap();
    }

    #[test]
    fn stale_proof_is_expired() {
        let identity = Identity::generate().unwrap();
        let clock = FixedClock::new(1_000_000);
        let proof = create_proof(&identity, &clock).unwrap();

        clock.advance(PROOF_MAX_AGE_SECS + 1);
        assert!(matches!(
            verify_proof(&proof, &clock, false),
            Err(TransportError::Certificate(CertificateError::Expired))
        ));
        // The test-only toggle skips freshness but nothing else.
        verify_proof(&proof, &clock, true).unwrap();
    }

    #[test]
    fn future_proof_is_rejected() {
        let identity = Identity::generate().unwrap();
        let clock = FixedClock::new(1_000_000);
        let mut proof = create_proof(&identity, &clock).unwrap();

        proof.timestamp = 1_000_000 + PROOF_MAX_SKEW_SECS + 1;
        assert!(matches!(
            verify_proof(&proof, &clock, false),
            Err(TransportError::Certificate(CertificateError::NotYetValid))
        ));
    }

    #[test]
    fn tampered_proof_fails_signature() {
        let identity = Identity::generate().unwrap();
        let clock = FixedClock::new(1_000_000);
        let mut proof = create_proof(&identity, &clock).unwrap();

        proof.timestamp += 1;
        assert!(matches!(
            verify_proof(&proof, &clock, false),
            Err(TransportError::BindingSignatureInvalid)
        ));
    }

    #[test]
    fn swapped_key_fails_binding() {
        let identity = Identity::generate().unwrap();
        let other = Identity::generate().unwrap();
        let clock = FixedClock::new(1_000_000);
        let mut proof = create_proof(&identity, &clock).unwrap();

        proof.public_key = other.public_key().to_bytes();
        assert!(matches!(
            verify_proof(&proof, &clock, false),
            Err(TransportError::RemoteIdentityMismatch)
        ));
    }

    #[test]
    fn ecdsa_identities_can_prove() {
        let (private, _) = keys::generate(dep2p_types::KeyType::EcdsaP384).unwrap();
        let identity = Identity::from_private(private);
        let clock = FixedClock::new(1_000_000);

        let proof = create_proof(&identity, &clock).unwrap();
        verify_proof(&proof, &clock, false).unwrap();
    }
}
