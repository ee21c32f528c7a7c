use dep2p_api::crypto::{SerializableKey, SigningKeyPair, VerifyingKey};

use super::*;

#[test]
fn test_p256_sign_verify() {
    let keypair = EcdsaKeyPair::generate(EcdsaCurve::P256).unwrap();
    let message = b"Test message";

    let signature = keypair.sign(message).unwrap();
    assert_eq!(signature.as_bytes().len(), 64);

    assert!(keypair.public_key().verify(message, &signature).is_ok());
}

#[test]
fn test_p384_sign_verify() {
    let keypair = EcdsaKeyPair::generate(EcdsaCurve::P384).unwrap();
    let message = b"Test message";

    let signature = keypair.sign(message).unwrap();
    assert_eq!(signature.as_bytes().len(), 96);

    assert!(keypair.public_key().verify(message, &signature).is_ok());
}

#[test]
fn test_sec1_roundtrip() {
    for curve in [EcdsaCurve::P256, EcdsaCurve::P384] {
        let keypair = EcdsaKeyPair::generate(curve).unwrap();
        let bytes = keypair.public_key().to_bytes();

        assert_eq!(bytes.len(), curve.key_type().public_key_len());
        assert_eq!(bytes.first(), Some(&0x04)); // uncompressed marker

        let parsed = EcdsaPublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.to_bytes(), bytes);
    }
}

#[test]
fn test_pkcs8_roundtrip() {
    for curve in [EcdsaCurve::P256, EcdsaCurve::P384] {
        let keypair = EcdsaKeyPair::generate(curve).unwrap();
        let der = keypair.private_key().to_pkcs8_der().unwrap();

        let loaded = EcdsaPrivateKey::from_pkcs8_der(&der).unwrap();
        assert_eq!(loaded.curve(), curve);
        assert_eq!(
            loaded.public_key().to_bytes(),
            keypair.public_key().to_bytes()
        );
    }
}

#[test]
fn test_cross_curve_verification_fails() {
    let p256 = EcdsaKeyPair::generate(EcdsaCurve::P256).unwrap();
    let p384 = EcdsaKeyPair::generate(EcdsaCurve::P384).unwrap();
    let message = b"cross";

    let signature = p256.sign(message).unwrap();
    assert!(p384.public_key().verify(message, &signature).is_err());
}

#[test]
fn test_wrong_key_fails() {
    let a = EcdsaKeyPair::generate(EcdsaCurve::P256).unwrap();
    let b = EcdsaKeyPair::generate(EcdsaCurve::P256).unwrap();
    let message = b"Test message";

    let signature = a.sign(message).unwrap();
    assert!(b.public_key().verify(message, &signature).is_err());
}

#[test]
fn test_malformed_signature_is_rejected() {
    assert!(EcdsaSignature::from_bytes(&[0u8; 63]).is_err());
    assert!(EcdsaSignature::from_fixed_bytes(EcdsaCurve::P384, &[0u8; 64]).is_err());
}
