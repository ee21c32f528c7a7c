//! The identity-binding payload carried inside the XX handshake.
//!
//! Wire layout: `"D2P1" (4) ‖ version (1) ‖ pubkey_len (u16 BE) ‖
//! pubkey ‖ sig_len (u16 BE) ‖ sig`. The signature covers the ASCII
//! prefix `noise-libp2p-static-key:` concatenated with the sender's
//! static Curve25519 public key; the receiver verifies it against the
//! static key it *observed* in the handshake, which ties the Noise
//! session to the long-lived identity key.

use dep2p_crypto::{node_id, Identity, PublicKey};
use dep2p_types::{KeyType, NodeId};

use crate::error::{CryptoError, TransportError};

/// Payload magic bytes.
pub const PAYLOAD_MAGIC: &[u8; 4] = b"D2P1";
/// Current payload version.
pub const PAYLOAD_VERSION: u8 = 1;
/// Signature context prefix for the static-key binding.
pub const STATIC_KEY_PREFIX: &[u8] = b"noise-libp2p-static-key:";

/// The verified content of a peer's payload.
#[derive(Debug)]
pub struct VerifiedPayload {
    /// The peer's identity public key.
    pub public_key: PublicKey,
    /// The identifier derived from the identity key.
    pub node_id: NodeId,
}

/// Builds and signs the local payload for a handshake using
/// `static_public` as the local Noise static key.
pub fn encode(identity: &Identity, static_public: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let public_key = identity.public_key().to_bytes();
    let signature = identity.sign(&binding_message(static_public))?;

    let mut out = Vec::with_capacity(4 + 1 + 2 + public_key.len() + 2 + signature.len());
    out.extend_from_slice(PAYLOAD_MAGIC);
    out.push(PAYLOAD_VERSION);
    out.extend_from_slice(&(public_key.len() as u16).to_be_bytes());
    out.extend_from_slice(&public_key);
    out.extend_from_slice(&(signature.len() as u16).to_be_bytes());
    out.extend_from_slice(&signature);
    Ok(out)
}

/// Parses and verifies a peer payload against the observed static key.
pub fn decode_and_verify(
    payload: &[u8],
    observed_static: &[u8],
) -> Result<VerifiedPayload, TransportError> {
    let mut cursor = payload;

    let magic = take(&mut cursor, 4)?;
    if magic != PAYLOAD_MAGIC {
        return Err(TransportError::HandshakeFailed(
            "identity payload has wrong magic".into(),
        ));
    }
    let version = *take(&mut cursor, 1)?.first().unwrap_or(&0);
    if version != PAYLOAD_VERSION {
        return Err(TransportError::HandshakeFailed(format!(
            "unsupported identity payload version {version}"
        )));
    }

    let key_bytes = take_prefixed(&mut cursor)?;
    let signature = take_prefixed(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(TransportError::HandshakeFailed(
            "trailing bytes in identity payload".into(),
        ));
    }

    let public_key = parse_identity_key(key_bytes)?;
    let message = binding_message_slice(observed_static);
    let valid = public_key
        .verify(&message, signature)
        .map_err(TransportError::Crypto)?;
    if !valid {
        return Err(TransportError::BindingSignatureInvalid);
    }

    let node_id = node_id::derive(&public_key);
    Ok(VerifiedPayload {
        public_key,
        node_id,
    })
}

fn binding_message(static_public: &[u8; 32]) -> Vec<u8> {
    binding_message_slice(static_public)
}

fn binding_message_slice(static_public: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(STATIC_KEY_PREFIX.len() + static_public.len());
    message.extend_from_slice(STATIC_KEY_PREFIX);
    message.extend_from_slice(static_public);
    message
}

fn parse_identity_key(bytes: &[u8]) -> Result<PublicKey, TransportError> {
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

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8], TransportError> {
    if cursor.len() < n {
        return Err(TransportError::HandshakeFailed(
            "identity payload truncated".into(),
        ));
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

fn take_prefixed<'a>(cursor: &mut &'a [u8]) -> Result<&'a [u8], TransportError> {
    let len_bytes: [u8; 2] = take(cursor, 2)?
        .try_into()
        .map_err(|_| TransportError::HandshakeFailed("identity payload truncated".into()))?;
    take(cursor, u16::from_be_bytes(len_bytes) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_verifies() {
        let identity = Identity::generate().unwrap();
        let static_kp = identity.noise_static_keypair().unwrap();

        let payload = encode(&identity, &static_kp.public).unwrap();
        let verified = decode_and_verify(&payload, &static_kp.public).unwrap();

        assert_eq!(verified.node_id, identity.id());
        assert_eq!(&verified.public_key, identity.public_key());
    }

    #[test]
    fn wrong_observed_static_fails_binding() {
        let identity = Identity::generate().unwrap();
        let static_kp = identity.noise_static_keypair().unwrap();

        let payload = encode(&identity, &static_kp.public).unwrap();
        let err = decode_and_verify(&payload, &[9u8; 32]).unwrap_err();
        assert!(matches!(err, TransportError::BindingSignatureInvalid));
    }

    #[test]
    fn forged_signature_fails() {
        let identity = Identity::generate().unwrap();
        let imposter = Identity::generate().unwrap();
        let static_kp = identity.noise_static_keypair().unwrap();

        // The imposter signs the victim's static key with its own key
        // but claims the victim's public key.
        let mut payload = encode(&imposter, &static_kp.public).unwrap();
        let victim_key = identity.public_key().to_bytes();
        payload.splice(7..7 + 32, victim_key);

        let err = decode_and_verify(&payload, &static_kp.public).unwrap_err();
        assert!(matches!(err, TransportError::BindingSignatureInvalid));
    }

    #[test]
    fn bad_magic_rejected() {
        let identity = Identity::generate().unwrap();
        let static_kp = identity.noise_static_keypair().unwrap();

        let mut payload = encode(&identity, &static_kp.public).unwrap();
        payload[0] = b'X';
        assert!(matches!(
            decode_and_verify(&payload, &static_kp.public),
            Err(TransportError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let identity = Identity::generate().unwrap();
        let static_kp = identity.noise_static_keypair().unwrap();

        let payload = encode(&identity, &static_kp.public).unwrap();
        assert!(decode_and_verify(&payload[..10], &static_kp.public).is_err());
    }

    #[test]
    fn ecdsa_identity_payload_verifies() {
        let identity = Identity::generate_with(dep2p_types::KeyType::EcdsaP256).unwrap();
        let static_kp = identity.noise_static_keypair().unwrap();

        let payload = encode(&identity, &static_kp.public).unwrap();
        let verified = decode_and_verify(&payload, &static_kp.public).unwrap();
        assert_eq!(verified.node_id, identity.id());
    }
}
