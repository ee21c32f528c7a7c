use dep2p_api::crypto::{SerializableKey, SigningKeyPair, VerifyingKey};

use super::*;

#[test]
fn test_keypair_generation() {
    let keypair = Ed25519KeyPair::generate().unwrap();
    let message = b"Test message";

    let signature = keypair.sign(message).unwrap();

    let public_key = keypair.public_key();
    assert!(public_key.verify(message, &signature).is_ok());
}

#[test]
fn test_serialization_roundtrip() {
    let keypair = Ed25519KeyPair::generate().unwrap();

    let public_bytes = keypair.public_key().to_bytes();
    let private_bytes = keypair.private_key().to_bytes();

    assert_eq!(public_bytes.len(), 32);
    assert_eq!(private_bytes.len(), 64); // seed ‖ public

    let public_key = Ed25519PublicKey::from_bytes(&public_bytes).unwrap();
    let private_key = Ed25519PrivateKey::from_bytes(&private_bytes).unwrap();

    assert_eq!(public_key.to_bytes(), private_key.public_key().to_bytes());
}

#[test]
fn test_keypair_bytes_reject_mismatched_public_half() {
    let a = Ed25519KeyPair::generate().unwrap();
    let b = Ed25519KeyPair::generate().unwrap();

    let mut forged = a.private_key().seed().to_vec();
    forged.extend_from_slice(&b.public_key().to_bytes());

    assert!(matches!(
        Ed25519PrivateKey::from_bytes(&forged),
        Err(CryptoError::KeyPairMismatch)
    ));
}

#[test]
fn test_signatures_are_deterministic() {
    let keypair = Ed25519KeyPair::generate().unwrap();
    let message = b"Test message for persistence";

    let original = keypair.sign(message).unwrap();

    let reloaded =
        Ed25519KeyPair::from_private_key(&Ed25519PrivateKey::from_seed(&keypair.private_key().seed()));
    let again = reloaded.sign(message).unwrap();

    assert_eq!(original.to_bytes(), again.to_bytes());
}

#[test]
fn test_wrong_signature_fails() {
    let keypair1 = Ed25519KeyPair::generate().unwrap();
    let keypair2 = Ed25519KeyPair::generate().unwrap();

    let message = b"Test message";
    let signature = keypair1.sign(message).unwrap();

    assert!(keypair2.public_key().verify(message, &signature).is_err());
}

#[test]
fn test_tampered_message_fails() {
    let keypair = Ed25519KeyPair::generate().unwrap();
    let message = b"Original message";
    let tampered = b"Tampered message";

    let signature = keypair.sign(message).unwrap();
    let public_key = keypair.public_key();

    assert!(public_key.verify(message, &signature).is_ok());
    assert!(public_key.verify(tampered, &signature).is_err());
}
