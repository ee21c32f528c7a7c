//! PEM-style textual envelopes for key storage.
//!
//! One key per envelope. Labels: `ED25519 PRIVATE KEY` (raw 64-byte
//! seed ‖ public), `EC PRIVATE KEY` (PKCS#8 DER), `PUBLIC KEY`
//! (canonical public bytes; the algorithm is inferred from the length,
//! which is disjoint across the supported set).

use dep2p_types::KeyType;
use pem::Pem;

use crate::error::CryptoError;
use crate::keys::{PrivateKey, PublicKey};

/// PEM label for Ed25519 private keys.
pub const ED25519_PRIVATE_LABEL: &str = "ED25519 PRIVATE KEY";
/// PEM label for ECDSA private keys.
pub const EC_PRIVATE_LABEL: &str = "EC PRIVATE KEY";
/// PEM label for public keys.
pub const PUBLIC_LABEL: &str = "PUBLIC KEY";

/// Encodes a private key into its PEM envelope.
pub fn encode_private(key: &PrivateKey) -> String {
    let label = match key.key_type() {
        KeyType::Ed25519 => ED25519_PRIVATE_LABEL,
        KeyType::EcdsaP256 | KeyType::EcdsaP384 => EC_PRIVATE_LABEL,
    };
    pem::encode(&Pem::new(label, key.to_bytes()))
}

/// Decodes a private key from its PEM envelope, routing on the label.
pub fn decode_private(text: &str) -> Result<PrivateKey, CryptoError> {
    let block = pem::parse(text).map_err(|e| CryptoError::InvalidPem(e.to_string()))?;
    match block.tag() {
        ED25519_PRIVATE_LABEL => PrivateKey::from_bytes(KeyType::Ed25519, block.contents()),
        EC_PRIVATE_LABEL => {
            // PKCS#8 carries the curve; accept either NIST curve here.
            crate::keys::ecdsa::EcdsaPrivateKey::from_pkcs8_der(block.contents())
                .map(PrivateKey::Ecdsa)
        }
        other => Err(CryptoError::InvalidPem(format!(
            "unknown PEM label: {other}"
        ))),
    }
}

/// Encodes a public key into its PEM envelope.
pub fn encode_public(key: &PublicKey) -> String {
    pem::encode(&Pem::new(PUBLIC_LABEL, key.to_bytes()))
}

/// Decodes a public key from its PEM envelope.
pub fn decode_public(text: &str) -> Result<PublicKey, CryptoError> {
    let block = pem::parse(text).map_err(|e| CryptoError::InvalidPem(e.to_string()))?;
    if block.tag() != PUBLIC_LABEL {
        return Err(CryptoError::InvalidPem(format!(
            "unknown PEM label: {}",
            block.tag()
        )));
    }
    let contents = block.contents();
    let key_type = match contents.len() {
        32 => KeyType::Ed25519,
        65 => KeyType::EcdsaP256,
        97 => KeyType::EcdsaP384,
        got => {
            return Err(CryptoError::InvalidKeySize {
                expected: 32,
                got,
            })
        }
    };
    PublicKey::from_bytes(key_type, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate;

    #[test]
    fn private_pem_roundtrip_all_types() {
        for kt in [KeyType::Ed25519, KeyType::EcdsaP256, KeyType::EcdsaP384] {
            let (private, public) = generate(kt).unwrap();
            let text = encode_private(&private);
            let loaded = decode_private(&text).unwrap();
            assert_eq!(loaded.key_type(), kt);
            assert_eq!(loaded.public_key(), public);
        }
    }

    #[test]
    fn labels_match_key_types() {
        let (ed, _) = generate(KeyType::Ed25519).unwrap();
        assert!(encode_private(&ed).contains("BEGIN ED25519 PRIVATE KEY"));

        let (ec, _) = generate(KeyType::EcdsaP384).unwrap();
        assert!(encode_private(&ec).contains("BEGIN EC PRIVATE KEY"));
    }

    #[test]
    fn public_pem_roundtrip() {
        for kt in [KeyType::Ed25519, KeyType::EcdsaP256, KeyType::EcdsaP384] {
            let (_, public) = generate(kt).unwrap();
            let text = encode_public(&public);
            assert!(text.contains("BEGIN PUBLIC KEY"));
            assert_eq!(decode_public(&text).unwrap(), public);
        }
    }

    #[test]
    fn garbage_is_invalid_pem() {
        assert!(matches!(
            decode_private("not a pem"),
            Err(CryptoError::InvalidPem(_))
        ));
    }
}
