//! The Noise XX secure-transport engine.
//!
//! XX flight order:
//! 1. initiator → responder: `e`
//! 2. responder → initiator: `e, ee, s, es` + responder identity payload
//! 3. initiator → responder: `s, se` + initiator identity payload
//!
//! Every handshake message is a 2-byte big-endian length prefix plus the
//! Noise message, written in a single operation. The encrypted payloads
//! bind each side's static Curve25519 key to its identity key.

pub mod payload;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dep2p_api::transport::{BoxedRawConn, SecureTransport};
use dep2p_crypto::{node_id, Identity, PublicKey};
use dep2p_types::config::NoiseConfig;
use dep2p_types::NodeId;
use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::conn::SecureConn;
use crate::error::TransportError;
use crate::metrics::metrics;
use crate::AccessController;

pub use stream::NoiseStream;

/// Registration label of this engine.
pub const PROTOCOL_NOISE: &str = "noise";
/// Default upper bound on a Noise handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_HANDSHAKE_MESSAGE: usize = 65_535;

/// The Noise engine. Stateless after construction; shareable across
/// connections.
pub struct NoiseTransport {
    identity: Arc<Identity>,
    config: NoiseConfig,
    handshake_timeout: Duration,
    access: Option<Arc<AccessController>>,
}

impl NoiseTransport {
    /// Builds the engine.
    pub fn new(identity: Arc<Identity>, config: NoiseConfig) -> Self {
        Self {
            identity,
            config,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            access: None,
        }
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

    /// The full Noise protocol name in use.
    pub fn protocol_name(&self) -> String {
        self.config.protocol_name()
    }

    fn build_state(&self, initiator: bool) -> Result<(snow::HandshakeState, [u8; 32]), TransportError> {
        let params = self
            .config
            .protocol_name()
            .parse()
            .map_err(|e| TransportError::HandshakeFailed(format!("invalid noise params: {e}")))?;
        let static_kp = self.identity.noise_static_keypair()?;
        let builder = snow::Builder::new(params).local_private_key(&static_kp.secret);
        let state = if initiator {
            builder.build_initiator()
        } else {
            builder.build_responder()
        }
        .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;
        Ok((state, static_kp.public))
    }

    /// Resolves the remote identity from the decrypted payload, or falls
    /// back to the legacy static-key derivation when the payload is
    /// empty and the configuration allows it.
    fn process_remote_payload(
        &self,
        payload_bytes: &[u8],
        observed_static: &[u8],
    ) -> Result<(Option<PublicKey>, Vec<u8>, NodeId), TransportError> {
        if payload_bytes.is_empty() {
            if self.config.require_identity_payload {
                return Err(TransportError::HandshakeFailed(
                    "peer sent no identity payload".into(),
                ));
            }
            let static_key: [u8; 32] = observed_static.try_into().map_err(|_| {
                TransportError::HandshakeFailed("remote static key is not 32 bytes".into())
            })?;
            let derived = node_id::derive_legacy_from_noise_static(&static_key);
            warn!(
                "peer sent empty identity payload; falling back to static-key id {} \
                 (not interoperable with identity-derived ids)",
                derived.short()
            );
            return Ok((None, static_key.to_vec(), derived));
        }

        let verified = payload::decode_and_verify(payload_bytes, observed_static).map_err(|e| {
            if e.is_security_denial() {
                warn!("noise identity payload rejected: {e}");
            }
            e
        })?;
        let key_bytes = verified.public_key.to_bytes();
        Ok((Some(verified.public_key), key_bytes, verified.node_id))
    }

    async fn handshake_outbound(
        &self,
        mut conn: BoxedRawConn,
        expected: NodeId,
    ) -> Result<SecureConn, TransportError> {
        let (mut hs, static_public) = self.build_state(true)?;
        let mut buf = vec![0u8; MAX_HANDSHAKE_MESSAGE];

        // -> e
        let len = hs
            .write_message(&[], &mut buf)
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;
        write_frame(&mut conn, buf.get(..len).unwrap_or_default()).await?;

        // <- e, ee, s, es  (+ responder payload)
        let message = read_frame(&mut conn).await?;
        let payload_len = hs
            .read_message(&message, &mut buf)
            .map_err(|_| TransportError::DecryptionFailed)?;
        let remote_static = hs
            .get_remote_static()
            .ok_or_else(|| TransportError::HandshakeFailed("responder sent no static key".into()))?
            .to_vec();
        let (remote_public, remote_public_bytes, remote_id) =
            self.process_remote_payload(buf.get(..payload_len).unwrap_or_default(), &remote_static)?;

        if remote_id != expected {
            warn!(
                "noise peer id mismatch: expected {}, derived {}",
                expected.short(),
                remote_id.short()
            );
            return Err(TransportError::PeerIdMismatch {
                expected,
                actual: remote_id,
            });
        }

        // -> s, se  (+ initiator payload)
        let local_payload = payload::encode(&self.identity, &static_public)?;
        let len = hs
            .write_message(&local_payload, &mut buf)
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;
        write_frame(&mut conn, buf.get(..len).unwrap_or_default()).await?;

        self.finish(conn, hs, remote_public, remote_public_bytes, remote_id)
    }

    async fn handshake_inbound(
        &self,
        mut conn: BoxedRawConn,
        expected: Option<NodeId>,
    ) -> Result<SecureConn, TransportError> {
        let (mut hs, static_public) = self.build_state(false)?;
        let mut buf = vec![0u8; MAX_HANDSHAKE_MESSAGE];

        // <- e
        let message = read_frame(&mut conn).await?;
        hs.read_message(&message, &mut buf)
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;

        // -> e, ee, s, es  (+ responder payload)
        let local_payload = payload::encode(&self.identity, &static_public)?;
        let len = hs
            .write_message(&local_payload, &mut buf)
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;
        write_frame(&mut conn, buf.get(..len).unwrap_or_default()).await?;

        // <- s, se  (+ initiator payload)
        let message = read_frame(&mut conn).await?;
        let payload_len = hs
            .read_message(&message, &mut buf)
            .map_err(|_| TransportError::DecryptionFailed)?;
        let remote_static = hs
            .get_remote_static()
            .ok_or_else(|| TransportError::HandshakeFailed("initiator sent no static key".into()))?
            .to_vec();
        let (remote_public, remote_public_bytes, remote_id) =
            self.process_remote_payload(buf.get(..payload_len).unwrap_or_default(), &remote_static)?;

        if let Some(expected) = expected {
            if remote_id != expected {
                warn!(
                    "noise peer id mismatch: expected {}, derived {}",
                    expected.short(),
                    remote_id.short()
                );
                return Err(TransportError::PeerIdMismatch {
                    expected,
                    actual: remote_id,
                });
            }
        }

        // Inbound access decision runs on the verified identifier, before
        // the connection is surfaced.
        if let Some(access) = &self.access {
            if let Err(denied) = access.check(&remote_id) {
                metrics().inc_upgrades_denied();
                return Err(denied.into());
            }
        }

        self.finish(conn, hs, remote_public, remote_public_bytes, remote_id)
    }

    fn finish(
        &self,
        conn: BoxedRawConn,
        hs: snow::HandshakeState,
        remote_public: Option<PublicKey>,
        remote_public_bytes: Vec<u8>,
        remote_id: NodeId,
    ) -> Result<SecureConn, TransportError> {
        let transport = hs
            .into_transport_mode()
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;
        let stream = NoiseStream::new(conn, transport);

        debug!("noise upgrade complete: remote {}", remote_id.short());
        metrics().inc_upgrades_allowed();
        Ok(SecureConn::new(
            Box::new(stream),
            self.identity.id(),
            self.identity.public_key().clone(),
            remote_id,
            remote_public,
            remote_public_bytes,
            PROTOCOL_NOISE,
            "XX".to_string(),
            self.protocol_name(),
        ))
    }
}

#[async_trait]
impl SecureTransport for NoiseTransport {
    type Output = SecureConn;

    fn protocol(&self) -> &'static str {
        PROTOCOL_NOISE
    }

    async fn secure_outbound(
        &self,
        conn: BoxedRawConn,
        remote: NodeId,
    ) -> Result<SecureConn, TransportError> {
        if let Some(access) = &self.access {
            access.check(&remote)?;
        }
        tokio::time::timeout(self.handshake_timeout, self.handshake_outbound(conn, remote))
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    async fn secure_inbound(
        &self,
        conn: BoxedRawConn,
        remote: Option<NodeId>,
    ) -> Result<SecureConn, TransportError> {
        tokio::time::timeout(self.handshake_timeout, self.handshake_inbound(conn, remote))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

impl std::fmt::Debug for NoiseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseTransport")
            .field("local_id", &self.identity.id())
            .field("protocol", &self.protocol_name())
            .finish_non_exhaustive()
    }
}

/// Writes one length-prefixed handshake message in a single operation.
async fn write_frame(conn: &mut BoxedRawConn, message: &[u8]) -> Result<(), TransportError> {
    if message.is_empty() || message.len() > MAX_HANDSHAKE_MESSAGE {
        return Err(TransportError::MessageTooLarge {
            size: message.len(),
        });
    }
    let mut frame = Vec::with_capacity(2 + message.len());
    frame.extend_from_slice(&(message.len() as u16).to_be_bytes());
    frame.extend_from_slice(message);
    conn.write_all(&frame).await?;
    conn.flush().await?;
    Ok(())
}

/// Reads one length-prefixed handshake message; zero-length frames fail
/// the handshake.
async fn read_frame(conn: &mut BoxedRawConn) -> Result<Vec<u8>, TransportError> {
    let mut len_bytes = [0u8; 2];
    conn.read_exact(&mut len_bytes).await?;
    let len = u16::from_be_bytes(len_bytes) as usize;
    if len == 0 {
        return Err(TransportError::HandshakeFailed(
            "zero-length handshake message".into(),
        ));
    }
    let mut message = vec![0u8; len];
    conn.read_exact(&mut message).await?;
    Ok(message)
}
