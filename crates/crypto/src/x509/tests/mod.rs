use dep2p_api::{Clock, SystemClock};
use dep2p_types::KeyType;
use rustls_pki_types::PrivatePkcs8KeyDer;

use super::*;
use crate::identity::Identity;

fn now() -> u64 {
    SystemClock.now_unix()
}

#[test]
fn generate_and_verify_all_algorithms() {
    for kt in [KeyType::Ed25519, KeyType::EcdsaP256, KeyType::EcdsaP384] {
        let identity = Identity::generate_with(kt).unwrap();
        let generated = generate_certificate(&identity).unwrap();

        let peer = verify_peer_certificate(&generated.cert_der, Some(identity.id()), now(), false)
            .unwrap();
        assert_eq!(peer.node_id, identity.id());
        assert_eq!(&peer.public_key, identity.public_key());
    }
}

#[test]
fn embedded_key_matches_identity_key() {
    let identity = Identity::generate().unwrap();
    let generated = generate_certificate(&identity).unwrap();

    let extracted = extract_public_key(&generated.cert_der).unwrap();
    assert_eq!(&extracted, identity.public_key());
}

#[test]
fn wrong_expected_peer_is_mismatch() {
    let identity = Identity::generate().unwrap();
    let other = Identity::generate().unwrap();
    let generated = generate_certificate(&identity).unwrap();

    let err =
        verify_peer_certificate(&generated.cert_der, Some(other.id()), now(), false).unwrap_err();
    assert!(matches!(err, TransportError::PeerIdMismatch { .. }));
}

#[test]
fn forged_extension_is_rejected() {
    // A certificate legitimately signed by S, but carrying C's NodeId in
    // the extension.
    let s = Identity::generate().unwrap();
    let c = Identity::generate().unwrap();

    let key_der = s.private_key().to_pkcs8_der().unwrap();
    let key_pair = rcgen::KeyPair::from_pkcs8_der_and_sign_algo(
        &PrivatePkcs8KeyDer::from(key_der.as_slice()),
        &rcgen::PKCS_ED25519,
    )
    .unwrap();

    let mut params = rcgen::CertificateParams::new(Vec::new()).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, format!("dep2p:{}", s.id().short()));
    params.custom_extensions.push(rcgen::CustomExtension::from_oid_content(
        &NODE_ID_EXTENSION_ARC,
        c.id().as_bytes().to_vec(),
    ));
    let forged = params.self_signed(&key_pair).unwrap();

    let err = verify_peer_certificate(forged.der().as_ref(), None, now(), false).unwrap_err();
    assert!(matches!(
        err,
        TransportError::Certificate(CertificateError::ExtensionForged)
    ));
}

#[test]
fn validity_window_is_enforced() {
    let identity = Identity::generate().unwrap();
    let generated = generate_certificate(&identity).unwrap();

    // Two years out: past not_after.
    let far_future = now() + 2 * 365 * 24 * 3_600;
    let err =
        verify_peer_certificate(&generated.cert_der, None, far_future, false).unwrap_err();
    assert!(matches!(
        err,
        TransportError::Certificate(CertificateError::Expired)
    ));

    // Two hours before issuance: before not_before.
    let past = now() - 2 * 3_600;
    let err = verify_peer_certificate(&generated.cert_der, None, past, false).unwrap_err();
    assert!(matches!(
        err,
        TransportError::Certificate(CertificateError::NotYetValid)
    ));
}

#[test]
fn skip_validity_keeps_binding_checks() {
    let identity = Identity::generate().unwrap();
    let generated = generate_certificate(&identity).unwrap();

    // Expired window is ignored...
    let far_future = now() + 2 * 365 * 24 * 3_600;
    verify_peer_certificate(&generated.cert_der, None, far_future, true).unwrap();

    // ...but the expected-peer check still runs.
    let other = Identity::generate().unwrap();
    let err = verify_peer_certificate(&generated.cert_der, Some(other.id()), far_future, true)
        .unwrap_err();
    assert!(matches!(err, TransportError::PeerIdMismatch { .. }));
}

#[test]
fn garbage_der_is_invalid() {
    let err = verify_peer_certificate(b"not a certificate", None, now(), false).unwrap_err();
    assert!(matches!(
        err,
        TransportError::Certificate(CertificateError::InvalidCertificate(_))
    ));
}
