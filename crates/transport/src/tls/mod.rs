//! The TLS 1.3 secure-transport engine.
//!
//! Certificates are self-signed and chain verification is replaced by
//! identity-binding verifiers on both roles. ALPN advertises
//! `dep2p/1.0.0` and the server always demands a client certificate.

mod verifier;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dep2p_api::transport::{BoxedRawConn, SecureTransport};
use dep2p_api::{Clock, SystemClock};
use dep2p_crypto::x509;
use dep2p_crypto::Identity;
use dep2p_types::config::TlsConfig;
use dep2p_types::NodeId;
use log::{debug, warn};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::conn::SecureConn;
use crate::error::{CertificateError, TransportError};
use crate::metrics::metrics;
use crate::AccessController;

use verifier::{untag_error, NodeIdVerifier};

/// Registration label of this engine.
pub const PROTOCOL_TLS: &str = "tls";
/// The ALPN token advertised by both roles.
pub const ALPN_DEP2P: &[u8] = b"dep2p/1.0.0";
/// Default upper bound on a TLS handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// The TLS engine. Stateless after construction; shareable across
/// connections.
pub struct TlsTransport {
    identity: Arc<Identity>,
    cert_der: Vec<u8>,
    key_der: Vec<u8>,
    config: TlsConfig,
    handshake_timeout: Duration,
    provider: Arc<rustls::crypto::CryptoProvider>,
    access: Option<Arc<AccessController>>,
    clock: Arc<dyn Clock>,
}

impl TlsTransport {
    /// Builds the engine, generating the identity's self-signed
    /// certificate.
    pub fn new(identity: Arc<Identity>, config: TlsConfig) -> Result<Self, TransportError> {
        let generated = x509::generate_certificate(&identity)?;
        Ok(Self {
            identity,
            cert_der: generated.cert_der,
            key_der: generated.key_der,
            config,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
            access: None,
            clock: Arc::new(SystemClock),
        })
    }

    /// Overrides the handshake deadline.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Attaches an access controller consulted by this engine directly.
    /// Set once, before first use.
    pub fn with_access_controller(mut self, access: Arc<AccessController>) -> Self {
        self.access = Some(access);
        self
    }

    /// Substitutes the wall clock (deterministic expiration in tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn cert_chain(&self) -> Vec<CertificateDer<'static>> {
        vec![CertificateDer::from(self.cert_der.clone())]
    }

    fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }

    fn client_config(&self, expected: NodeId) -> Result<rustls::ClientConfig, TransportError> {
        let verifier = Arc::new(NodeIdVerifier::new(
            Some(expected),
            self.config.insecure_skip_verify,
            self.provider.clone(),
        ));
        let mut config = rustls::ClientConfig::builder_with_provider(self.provider.clone())
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_client_auth_cert(self.cert_chain(), self.private_key())
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;
        config.alpn_protocols = vec![ALPN_DEP2P.to_vec()];
        Ok(config)
    }

    fn server_config(&self, expected: Option<NodeId>) -> Result<rustls::ServerConfig, TransportError> {
        let verifier = Arc::new(NodeIdVerifier::new(
            expected,
            self.config.insecure_skip_verify,
            self.provider.clone(),
        ));
        let mut config = rustls::ServerConfig::builder_with_provider(self.provider.clone())
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?
            .with_client_cert_verifier(verifier)
            .with_single_cert(self.cert_chain(), self.private_key())
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;
        config.alpn_protocols = vec![ALPN_DEP2P.to_vec()];
        Ok(config)
    }

    fn map_handshake_error(err: std::io::Error, expected: Option<NodeId>) -> TransportError {
        if let Some(typed) = untag_error(&err.to_string(), expected) {
            if typed.is_security_denial() {
                warn!("tls handshake rejected: {typed}");
            }
            return typed;
        }
        TransportError::HandshakeFailed(err.to_string())
    }

    fn wrap_stream(
        &self,
        io: BoxedRawConn,
        peer: x509::PeerCertificate,
        version: String,
        cipher_suite: String,
    ) -> SecureConn {
        let remote_public_bytes = peer.public_key.to_bytes();
        SecureConn::new(
            io,
            self.identity.id(),
            self.identity.public_key().clone(),
            peer.node_id,
            Some(peer.public_key),
            remote_public_bytes,
            PROTOCOL_TLS,
            version,
            cipher_suite,
        )
    }
}

#[async_trait]
impl SecureTransport for TlsTransport {
    type Output = SecureConn;

    fn protocol(&self) -> &'static str {
        PROTOCOL_TLS
    }

    async fn secure_outbound(
        &self,
        conn: BoxedRawConn,
        remote: NodeId,
    ) -> Result<SecureConn, TransportError> {
        if let Some(access) = &self.access {
            access.check(&remote)?;
        }

        let connector = TlsConnector::from(Arc::new(self.client_config(remote)?));
        // The verifier ignores the name; it only has to be well-formed.
        let server_name = ServerName::try_from(format!("{}.dep2p", remote.short()))
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;

        let stream = tokio::time::timeout(self.handshake_timeout, connector.connect(server_name, conn))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| Self::map_handshake_error(e, Some(remote)))?;

        let (peer, version, cipher_suite) = {
            let (_, tls) = stream.get_ref();
            let cert = tls
                .peer_certificates()
                .and_then(|certs| certs.first())
                .ok_or_else(|| {
                    TransportError::HandshakeFailed("peer presented no certificate".into())
                })?;
            // Re-run the pure verification to extract the typed public
            // key and surface typed errors.
            let peer = x509::verify_peer_certificate(
                cert.as_ref(),
                Some(remote),
                self.clock.now_unix(),
                self.config.insecure_skip_verify,
            )?;
            (
                peer,
                format!("{:?}", tls.protocol_version().unwrap_or(rustls::ProtocolVersion::TLSv1_3)),
                tls.negotiated_cipher_suite()
                    .map(|s| format!("{:?}", s.suite()))
                    .unwrap_or_default(),
            )
        };

        debug!("tls outbound upgrade complete: remote {}", peer.node_id.short());
        metrics().inc_upgrades_allowed();
        Ok(self.wrap_stream(Box::new(stream), peer, version, cipher_suite))
    }

    async fn secure_inbound(
        &self,
        conn: BoxedRawConn,
        remote: Option<NodeId>,
    ) -> Result<SecureConn, TransportError> {
        let acceptor = TlsAcceptor::from(Arc::new(self.server_config(remote)?));

        let stream = tokio::time::timeout(self.handshake_timeout, acceptor.accept(conn))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| Self::map_handshake_error(e, remote))?;

        let (peer, version, cipher_suite) = {
            let (_, tls) = stream.get_ref();
            let cert = tls
                .peer_certificates()
                .and_then(|certs| certs.first())
                .ok_or_else(|| {
                    TransportError::Certificate(CertificateError::InvalidCertificate(
                        "client presented no certificate".into(),
                    ))
                })?;
            let peer = x509::verify_peer_certificate(
                cert.as_ref(),
                remote,
                self.clock.now_unix(),
                self.config.insecure_skip_verify,
            )?;
            (
                peer,
                format!("{:?}", tls.protocol_version().unwrap_or(rustls::ProtocolVersion::TLSv1_3)),
                tls.negotiated_cipher_suite()
                    .map(|s| format!("{:?}", s.suite()))
                    .unwrap_or_default(),
            )
        };

        // Inbound access decision runs on the verified identifier, before
        // the connection is surfaced.
        if let Some(access) = &self.access {
            if let Err(denied) = access.check(&peer.node_id) {
                metrics().inc_upgrades_denied();
                return Err(denied.into());
            }
        }

        debug!("tls inbound upgrade complete: remote {}", peer.node_id.short());
        metrics().inc_upgrades_allowed();
        Ok(self.wrap_stream(Box::new(stream), peer, version, cipher_suite))
    }
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport")
            .field("local_id", &self.identity.id())
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}
