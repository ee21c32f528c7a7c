//! X.509 certificate management for the TLS engine.
//!
//! Certificates are self-signed and the subject public key IS the
//! identity's public key; trust derives from the identifier-to-key
//! binding, never from a chain. A non-critical extension carries a copy
//! of the NodeId for debugging; verification never trusts it over the
//! value derived from the public key.

use dep2p_types::{KeyType, NodeId};
use log::warn;
use rustls_pki_types::PrivatePkcs8KeyDer;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{CertificateError, CryptoError, TransportError};
use crate::identity::Identity;
use crate::keys::PublicKey;
use crate::node_id;

/// OID arc of the NodeId debugging extension.
pub const NODE_ID_EXTENSION_ARC: [u64; 9] = [1, 3, 6, 1, 4, 1, 53594, 1, 1];
/// Dotted form of [`NODE_ID_EXTENSION_ARC`].
pub const NODE_ID_EXTENSION_OID: &str = "1.3.6.1.4.1.53594.1.1";

const OID_ED25519: &str = "1.3.101.112";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";

/// Certificate validity before `now`, in seconds (1 hour of clock skew).
const VALIDITY_BACKDATE_SECS: i64 = 3_600;
/// Certificate validity after `now`, in seconds (1 year).
const VALIDITY_LIFETIME_SECS: i64 = 365 * 24 * 3_600;

/// A freshly generated self-signed certificate and its private key, both
/// DER-encoded, ready to hand to the TLS stack.
pub struct GeneratedCert {
    /// The certificate, DER.
    pub cert_der: Vec<u8>,
    /// The private key, PKCS#8 DER. Same key material as the identity.
    pub key_der: Vec<u8>,
}

/// The verified view of a peer certificate.
#[derive(Debug)]
pub struct PeerCertificate {
    /// The peer's identity public key, re-parsed to its algorithm form.
    pub public_key: PublicKey,
    /// The identifier derived from `public_key`. The sole trust root.
    pub node_id: NodeId,
}

/// Generates a self-signed certificate for an identity.
pub fn generate_certificate(identity: &Identity) -> Result<GeneratedCert, CertificateError> {
    let key_der = identity
        .private_key()
        .to_pkcs8_der()
        .map_err(|e| CertificateError::InvalidCertificate(e.to_string()))?;

    let alg = match identity.key_type() {
        KeyType::Ed25519 => &rcgen::PKCS_ED25519,
        KeyType::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
        KeyType::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
    };
    let key_pair =
        rcgen::KeyPair::from_pkcs8_der_and_sign_algo(&PrivatePkcs8KeyDer::from(key_der.as_slice()), alg)
            .map_err(|e| CertificateError::InvalidCertificate(e.to_string()))?;

    let mut params = rcgen::CertificateParams::new(Vec::new())
        .map_err(|e| CertificateError::InvalidCertificate(e.to_string()))?;
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, format!("dep2p:{}", identity.id().short()));

    let now = time::OffsetDateTime::now_utc();
    params.not_before = now - time::Duration::seconds(VALIDITY_BACKDATE_SECS);
    params.not_after = now + time::Duration::seconds(VALIDITY_LIFETIME_SECS);

    params.custom_extensions.push(rcgen::CustomExtension::from_oid_content(
        &NODE_ID_EXTENSION_ARC,
        identity.id().as_bytes().to_vec(),
    ));

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CertificateError::InvalidCertificate(e.to_string()))?;

    Ok(GeneratedCert {
        cert_der: cert.der().as_ref().to_vec(),
        key_der,
    })
}

/// Extracts the identity public key from a certificate's subject public
/// key info, dispatching on the SPKI algorithm identifier.
pub fn extract_public_key(cert_der: &[u8]) -> Result<PublicKey, CertificateError> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| CertificateError::InvalidCertificate(format!("x509 parse failed: {e}")))?;
    public_key_of(&cert)
}

fn public_key_of(cert: &X509Certificate<'_>) -> Result<PublicKey, CertificateError> {
    let spki = cert.public_key();
    let key_bytes: &[u8] = &spki.subject_public_key.data;
    let alg = spki.algorithm.algorithm.to_id_string();

    let key_type = match alg.as_str() {
        OID_ED25519 => KeyType::Ed25519,
        OID_EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.as_oid().ok())
                .map(|oid| oid.to_id_string())
                .ok_or_else(|| {
                    CertificateError::InvalidCertificate("EC key without curve parameter".into())
                })?;
            match curve.as_str() {
                OID_CURVE_P256 => KeyType::EcdsaP256,
                OID_CURVE_P384 => KeyType::EcdsaP384,
                other => {
                    return Err(CertificateError::InvalidCertificate(format!(
                        "unsupported EC curve {other}"
                    )))
                }
            }
        }
        other => {
            return Err(CertificateError::InvalidCertificate(format!(
                "unsupported SPKI algorithm {other}"
            )))
        }
    };

    PublicKey::from_bytes(key_type, key_bytes)
        .map_err(|e: CryptoError| CertificateError::InvalidCertificate(e.to_string()))
}

fn node_id_extension_of(cert: &X509Certificate<'_>) -> Option<Vec<u8>> {
    cert.extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == NODE_ID_EXTENSION_OID)
        .map(|ext| ext.value.to_vec())
}

/// Verifies a peer certificate against the identity-binding rules.
///
/// 1. Parse the leaf certificate.
/// 2. Derive the identifier from the subject public key; this is the
///    sole trust root.
/// 3. If the NodeId extension is present, it must equal the derived
///    identifier (`ExtensionForged` otherwise).
/// 4. If `expected` is supplied, the derived identifier must equal it
///    (`PeerIdMismatch` otherwise).
/// 5. The validity window must contain `now_unix`, unless
///    `skip_validity` is set by test configuration; steps 2–4 are
///    enforced regardless.
pub fn verify_peer_certificate(
    cert_der: &[u8],
    expected: Option<NodeId>,
    now_unix: u64,
    skip_validity: bool,
) -> Result<PeerCertificate, TransportError> {
    let (_, cert) = X509Certificate::from_der(cert_der).map_err(|e| {
        TransportError::Certificate(CertificateError::InvalidCertificate(format!(
            "x509 parse failed: {e}"
        )))
    })?;

    let public_key = public_key_of(&cert)?;
    let derived = node_id::derive(&public_key);

    if let Some(claimed) = node_id_extension_of(&cert) {
        if claimed != derived.as_bytes() {
            warn!(
                "certificate node id extension does not match subject key (derived {})",
                derived.short()
            );
            return Err(CertificateError::ExtensionForged.into());
        }
    }

    if let Some(expected) = expected {
        if derived != expected {
            warn!(
                "peer id mismatch: expected {}, derived {}",
                expected.short(),
                derived.short()
            );
            return Err(TransportError::PeerIdMismatch {
                expected,
                actual: derived,
            });
        }
    }

    if !skip_validity {
        let validity = cert.validity();
        let now = i64::try_from(now_unix).unwrap_or(i64::MAX);
        if now < validity.not_before.timestamp() {
            return Err(CertificateError::NotYetValid.into());
        }
        if now > validity.not_after.timestamp() {
            return Err(CertificateError::Expired.into());
        }
    }

    Ok(PeerCertificate {
        public_key,
        node_id: derived,
    })
}

#[cfg(test)]
mod tests;
