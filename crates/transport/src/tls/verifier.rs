//! Identity-binding certificate verifiers.
//!
//! P2P endpoints have no CA-signed chains, so PKI verification is
//! replaced wholesale: trust derives from the relation between the
//! certificate's subject public key and the expected node identifier.
//! Failures are encoded into tagged `rustls::Error::General` values so
//! the engine can recover the typed error after the handshake aborts.

use std::sync::Arc;

use dep2p_crypto::x509;
use dep2p_types::NodeId;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, Error, SignatureScheme};

use crate::error::{CertificateError, TransportError};

/// Prefix shared by all tagged verifier errors.
pub(crate) const ERROR_TAG_PREFIX: &str = "dep2p:";

/// Encodes a transport error into a tagged rustls error.
fn tag_error(err: &TransportError) -> Error {
    let tag = match err {
        TransportError::PeerIdMismatch { actual, .. } => {
            format!("{ERROR_TAG_PREFIX}peer_id_mismatch:{}", actual.to_hex())
        }
        other => format!("{ERROR_TAG_PREFIX}{}", other.kind()),
    };
    Error::General(tag)
}

/// Recovers a typed transport error from a tagged handshake failure, if
/// the failure originated in one of our verifiers.
pub(crate) fn untag_error(message: &str, expected: Option<NodeId>) -> Option<TransportError> {
    let start = message.find(ERROR_TAG_PREFIX)?;
    let tagged = message.get(start + ERROR_TAG_PREFIX.len()..)?;
    let mut parts = tagged.split(':');
    let kind = parts.next()?;
    match kind {
        "peer_id_mismatch" => {
            let actual = parts.next().and_then(|hex| hex.parse().ok())?;
            Some(TransportError::PeerIdMismatch {
                expected: expected.unwrap_or(NodeId::EMPTY),
                actual,
            })
        }
        "extension_forged" => Some(CertificateError::ExtensionForged.into()),
        "expired" => Some(CertificateError::Expired.into()),
        "not_yet_valid" => Some(CertificateError::NotYetValid.into()),
        "invalid_certificate" => Some(
            CertificateError::InvalidCertificate("peer certificate rejected".into()).into(),
        ),
        _ => None,
    }
}

/// The verifier installed on both roles.
#[derive(Debug)]
pub(crate) struct NodeIdVerifier {
    expected: Option<NodeId>,
    skip_validity: bool,
    provider: Arc<CryptoProvider>,
}

impl NodeIdVerifier {
    pub(crate) fn new(
        expected: Option<NodeId>,
        skip_validity: bool,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        Self {
            expected,
            skip_validity,
            provider,
        }
    }

    fn check(&self, end_entity: &CertificateDer<'_>, now: UnixTime) -> Result<(), Error> {
        x509::verify_peer_certificate(
            end_entity.as_ref(),
            self.expected,
            now.as_secs(),
            self.skip_validity,
        )
        .map(|_| ())
        .map_err(|e| tag_error(&e))
    }
}

impl ServerCertVerifier for NodeIdVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        self.check(end_entity, now)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

impl ClientCertVerifier for NodeIdVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        // RequireAnyClientCert: the inbound side always demands the
        // peer's identity certificate.
        true
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<ClientCertVerified, Error> {
        self.check(end_entity, now)?;
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untag_recovers_peer_id_mismatch() {
        let actual = NodeId::new([3; 32]);
        let expected = NodeId::new([7; 32]);
        let tagged = tag_error(&TransportError::PeerIdMismatch {
            expected,
            actual,
        });
        let Error::General(message) = tagged else {
            panic!("expected a general error");
        };

        let recovered = untag_error(&message, Some(expected)).unwrap();
        assert!(matches!(
            recovered,
            TransportError::PeerIdMismatch { expected: e, actual: a }
                if e == expected && a == actual
        ));
    }

    #[test]
    fn untag_recovers_extension_forged() {
        let tagged = tag_error(&CertificateError::ExtensionForged.into());
        let Error::General(message) = tagged else {
            panic!("expected a general error");
        };
        assert!(matches!(
            untag_error(&message, None),
            Some(TransportError::Certificate(CertificateError::ExtensionForged))
        ));
    }

    #[test]
    fn untag_ignores_foreign_errors() {
        assert!(untag_error("handshake failure", None).is_none());
    }
}
