//! The secure-transport multiplexer.
//!
//! Runs a length-prefixed protocol-selection handshake to pick exactly
//! one engine per connection, gates every upgrade through the access
//! controller, and bounds negotiation with a single deadline that is
//! cleared before the chosen engine's own handshake deadline applies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dep2p_api::transport::{BoxedRawConn, SecureTransport};
use dep2p_telemetry::time::HandshakeTimer;
use dep2p_types::config::TransportConfig;
use dep2p_types::NodeId;
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::conn::SecureConn;
use crate::error::TransportError;
use crate::metrics::metrics;
use crate::noise::NoiseTransport;
use crate::tls::TlsTransport;
use crate::AccessController;

/// Reply token for a rejected proposal.
const TOKEN_NA: &str = "na";
/// Longest accepted negotiation token.
const MAX_TOKEN_LEN: usize = 64;
/// Upper bound on proposals a listener will reject before giving up.
const MAX_PROPOSALS: usize = 8;

/// A registered secure-transport engine.
pub enum Engine {
    /// The TLS 1.3 engine.
    Tls(TlsTransport),
    /// The Noise XX engine.
    Noise(NoiseTransport),
}

impl Engine {
    /// The engine's registration label.
    pub fn label(&self) -> &'static str {
        match self {
            Engine::Tls(t) => t.protocol(),
            Engine::Noise(t) => t.protocol(),
        }
    }

    async fn secure_outbound(
        &self,
        conn: BoxedRawConn,
        remote: NodeId,
    ) -> Result<SecureConn, TransportError> {
        match self {
            Engine::Tls(t) => t.secure_outbound(conn, remote).await,
            Engine::Noise(t) => t.secure_outbound(conn, remote).await,
        }
    }

    async fn secure_inbound(
        &self,
        conn: BoxedRawConn,
        remote: Option<NodeId>,
    ) -> Result<SecureConn, TransportError> {
        match self {
            Engine::Tls(t) => t.secure_inbound(conn, remote).await,
            Engine::Noise(t) => t.secure_inbound(conn, remote).await,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Engine").field(&self.label()).finish()
    }
}

/// The multiplexer: engine registry, preference order, access policy,
/// negotiation deadline.
pub struct Upgrader {
    engines: Vec<Engine>,
    preferred: usize,
    access: Arc<AccessController>,
    negotiate_timeout: Duration,
}

impl Upgrader {
    /// Builds a multiplexer.
    ///
    /// At least one engine must be registered. The preferred label, if
    /// configured, must be among the registered engines; otherwise the
    /// first registered engine becomes preferred.
    pub fn new(
        engines: Vec<Engine>,
        config: &TransportConfig,
        access: Arc<AccessController>,
    ) -> Result<Self, TransportError> {
        if engines.is_empty() {
            return Err(TransportError::NegotiationFailed(
                "no secure-transport engines registered".into(),
            ));
        }
        let preferred = match &config.preferred_protocol {
            Some(label) => engines
                .iter()
                .position(|e| e.label() == label)
                .ok_or_else(|| {
                    TransportError::NegotiationFailed(format!(
                        "preferred protocol {label} is not registered"
                    ))
                })?,
            None => 0,
        };
        Ok(Self {
            engines,
            preferred,
            access,
            negotiate_timeout: config.negotiate_timeout(),
        })
    }

    /// The registered engine labels in preference order.
    pub fn protocols(&self) -> Vec<&'static str> {
        self.preference_order()
            .filter_map(|idx| self.engines.get(idx))
            .map(|e| e.label())
            .collect()
    }

    /// The access controller consulted by this multiplexer.
    pub fn access(&self) -> &AccessController {
        &self.access
    }

    fn preference_order(&self) -> impl Iterator<Item = usize> + '_ {
        let preferred = self.preferred;
        std::iter::once(preferred)
            .chain((0..self.engines.len()).filter(move |idx| *idx != preferred))
    }

    fn engine(&self, idx: usize) -> Result<&Engine, TransportError> {
        self.engines
            .get(idx)
            .ok_or_else(|| TransportError::NegotiationFailed("engine index out of range".into()))
    }

    /// Upgrades an outbound raw stream.
    ///
    /// The access controller authorizes `expected` before anything
    /// touches the stream; negotiation runs under
    /// `min(deadline, negotiate_timeout)`; the chosen engine then applies
    /// its own handshake deadline (further bounded by what remains of
    /// `deadline`).
    pub async fn upgrade_outbound(
        &self,
        conn: BoxedRawConn,
        expected: NodeId,
        deadline: Option<Duration>,
    ) -> Result<SecureConn, TransportError> {
        let started = Instant::now();

        if let Err(denied) = self.access.check(&expected) {
            metrics().inc_upgrades_denied();
            return Err(denied.into());
        }

        let negotiate_budget = min_budget(self.negotiate_timeout, deadline);
        let (conn, idx) =
            match tokio::time::timeout(negotiate_budget, self.negotiate_outbound(conn)).await {
                Ok(Ok(selected)) => selected,
                Ok(Err(err)) => {
                    metrics().inc_negotiation_failure();
                    return Err(err);
                }
                Err(_) => {
                    metrics().inc_negotiation_failure();
                    return Err(TransportError::Timeout);
                }
            };

        let engine = self.engine(idx)?;
        debug!("negotiated {} for outbound upgrade", engine.label());

        let timer = HandshakeTimer::new(metrics());
        let result = match deadline {
            Some(total) => {
                let remaining = total.saturating_sub(started.elapsed());
                tokio::time::timeout(remaining, engine.secure_outbound(conn, expected))
                    .await
                    .map_err(|_| TransportError::Timeout)?
            }
            None => engine.secure_outbound(conn, expected).await,
        };
        drop(timer);

        result.map_err(|err| {
            metrics().inc_upgrade_failure(err.kind());
            err
        })
    }

    /// Upgrades an inbound raw stream. `expected` may be absent; the
    /// remote identifier is then learned from the handshake and checked
    /// against the access policy before the connection surfaces.
    pub async fn upgrade_inbound(
        &self,
        conn: BoxedRawConn,
        expected: Option<NodeId>,
        deadline: Option<Duration>,
    ) -> Result<SecureConn, TransportError> {
        let started = Instant::now();

        // With a known expected peer the policy runs up front and the
        // engine is never invoked on denial.
        if let Some(expected) = expected {
            if let Err(denied) = self.access.check(&expected) {
                metrics().inc_upgrades_denied();
                return Err(denied.into());
            }
        }

        let negotiate_budget = min_budget(self.negotiate_timeout, deadline);
        let (conn, idx) =
            match tokio::time::timeout(negotiate_budget, self.negotiate_inbound(conn)).await {
                Ok(Ok(selected)) => selected,
                Ok(Err(err)) => {
                    metrics().inc_negotiation_failure();
                    return Err(err);
                }
                Err(_) => {
                    metrics().inc_negotiation_failure();
                    return Err(TransportError::Timeout);
                }
            };

        let engine = self.engine(idx)?;
        debug!("negotiated {} for inbound upgrade", engine.label());

        let timer = HandshakeTimer::new(metrics());
        let result = match deadline {
            Some(total) => {
                let remaining = total.saturating_sub(started.elapsed());
                tokio::time::timeout(remaining, engine.secure_inbound(conn, expected))
                    .await
                    .map_err(|_| TransportError::Timeout)?
            }
            None => engine.secure_inbound(conn, expected).await,
        };
        drop(timer);

        let mut secured = result.map_err(|err| {
            metrics().inc_upgrade_failure(err.kind());
            err
        })?;

        // Post-handshake decision on the verified identifier. Denial
        // closes the raw stream.
        let remote_id = dep2p_api::transport::SecureInfo::remote_id(&secured);
        if let Err(denied) = self.access.check(&remote_id) {
            metrics().inc_upgrades_denied();
            let _ = tokio::io::AsyncWriteExt::shutdown(&mut secured).await;
            return Err(denied.into());
        }

        Ok(secured)
    }

    /// Dial side: propose protocols in preference order and take the
    /// first one the peer echoes.
    async fn negotiate_outbound(
        &self,
        mut conn: BoxedRawConn,
    ) -> Result<(BoxedRawConn, usize), TransportError> {
        for idx in self.preference_order() {
            let label = self.engine(idx)?.label();
            write_token(&mut conn, label).await?;
            let reply = read_token(&mut conn).await?;
            if reply == label {
                return Ok((conn, idx));
            }
            if reply != TOKEN_NA {
                return Err(TransportError::NegotiationFailed(format!(
                    "unexpected negotiation reply {reply:?}"
                )));
            }
        }
        Err(TransportError::NegotiationFailed(
            "peer accepted none of the offered protocols".into(),
        ))
    }

    /// Listen side: accept the first registered protocol the peer
    /// proposes, rejecting others with `na`.
    async fn negotiate_inbound(
        &self,
        mut conn: BoxedRawConn,
    ) -> Result<(BoxedRawConn, usize), TransportError> {
        for _ in 0..MAX_PROPOSALS {
            let token = read_token(&mut conn).await?;
            if let Some(idx) = self.engines.iter().position(|e| e.label() == token) {
                write_token(&mut conn, &token).await?;
                return Ok((conn, idx));
            }
            write_token(&mut conn, TOKEN_NA).await?;
        }
        Err(TransportError::NegotiationFailed(
            "peer proposed no supported protocol".into(),
        ))
    }
}

impl std::fmt::Debug for Upgrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upgrader")
            .field("protocols", &self.protocols())
            .field("negotiate_timeout", &self.negotiate_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SecureTransport for Upgrader {
    type Output = SecureConn;

    fn protocol(&self) -> &'static str {
        self.engines
            .get(self.preferred)
            .map(|e| e.label())
            .unwrap_or("dep2p")
    }

    async fn secure_outbound(
        &self,
        conn: BoxedRawConn,
        remote: NodeId,
    ) -> Result<SecureConn, TransportError> {
        self.upgrade_outbound(conn, remote, None).await
    }

    async fn secure_inbound(
        &self,
        conn: BoxedRawConn,
        remote: Option<NodeId>,
    ) -> Result<SecureConn, TransportError> {
        self.upgrade_inbound(conn, remote, None).await
    }
}

fn min_budget(negotiate_timeout: Duration, deadline: Option<Duration>) -> Duration {
    match deadline {
        Some(d) => std::cmp::min(negotiate_timeout, d),
        None => negotiate_timeout,
    }
}

async fn write_token(conn: &mut BoxedRawConn, token: &str) -> Result<(), TransportError> {
    let bytes = token.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_TOKEN_LEN {
        return Err(TransportError::NegotiationFailed(format!(
            "invalid negotiation token length {}",
            bytes.len()
        )));
    }
    let mut frame = Vec::with_capacity(2 + bytes.len());
    frame.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    frame.extend_from_slice(bytes);
    conn.write_all(&frame).await?;
    conn.flush().await?;
    Ok(())
}

async fn read_token(conn: &mut BoxedRawConn) -> Result<String, TransportError> {
    let mut len_bytes = [0u8; 2];
    conn.read_exact(&mut len_bytes).await?;
    let len = u16::from_be_bytes(len_bytes) as usize;
    if len == 0 || len > MAX_TOKEN_LEN {
        return Err(TransportError::NegotiationFailed(format!(
            "invalid negotiation token length {len}"
        )));
    }
    let mut token = vec![0u8; len];
    conn.read_exact(&mut token).await?;
    String::from_utf8(token)
        .map_err(|_| TransportError::NegotiationFailed("negotiation token is not UTF-8".into()))
}
