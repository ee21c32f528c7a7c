//! Service traits for the secure-transport layer.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use dep2p_types::{error::TransportError, NodeId};

/// A raw duplex byte stream handed in by the outer transport layer.
///
/// Anything async-readable and -writable qualifies; the upgrade path owns
/// the stream exclusively from the moment it is passed in, and closes it
/// on every failure path.
pub trait RawConn: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + ?Sized> RawConn for T {}

/// A boxed raw stream, the common currency of the upgrade path.
pub type BoxedRawConn = Box<dyn RawConn>;

/// Identity metadata exposed by an upgraded connection.
pub trait SecureInfo {
    /// The local node's identifier.
    fn local_id(&self) -> NodeId;

    /// The verified remote node's identifier.
    ///
    /// Always equals the SHA-256 of the remote public key's canonical
    /// bytes; the upgrade fails before a connection is surfaced otherwise.
    fn remote_id(&self) -> NodeId;

    /// Canonical bytes of the local identity public key.
    fn local_public_key_bytes(&self) -> &[u8];

    /// Canonical bytes of the verified remote identity public key.
    fn remote_public_key_bytes(&self) -> &[u8];

    /// Label of the engine that produced this connection (`"tls"`,
    /// `"noise"`).
    fn negotiated_protocol(&self) -> &str;

    /// Protocol version string (e.g. `"TLSv1_3"` or the Noise pattern).
    fn version(&self) -> &str;

    /// Negotiated cipher-suite name.
    fn cipher_suite(&self) -> &str;
}

/// A secure-transport engine: upgrades a raw stream into an
/// authenticated, encrypted connection.
#[async_trait]
pub trait SecureTransport: Send + Sync {
    /// The upgraded connection type.
    type Output: RawConn + SecureInfo;

    /// The engine's registration label.
    fn protocol(&self) -> &'static str;

    /// Upgrades an outbound stream. `remote` is the identifier the dialer
    /// expects; the upgrade fails with `PeerIdMismatch` when the verified
    /// identity differs.
    async fn secure_outbound(
        &self,
        conn: BoxedRawConn,
        remote: NodeId,
    ) -> Result<Self::Output, TransportError>;

    /// Upgrades an inbound stream. `remote` may be absent, in which case
    /// the identifier is learned from the handshake.
    async fn secure_inbound(
        &self,
        conn: BoxedRawConn,
        remote: Option<NodeId>,
    ) -> Result<Self::Output, TransportError>;
}
