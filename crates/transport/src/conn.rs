//! The wrapped secure connection.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use dep2p_api::transport::{RawConn, SecureInfo};
use dep2p_crypto::PublicKey;
use dep2p_types::NodeId;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// An upgraded connection: the encrypted stream plus the verified
/// identity metadata of both ends.
///
/// The wrapper exclusively owns the underlying stream; shutting it down
/// closes the raw stream, and any I/O after that fails. A reader and a
/// writer may proceed in parallel via `tokio::io::split`; concurrent
/// readers are not supported.
pub struct SecureConn {
    io: Box<dyn RawConn>,
    local_id: NodeId,
    local_public: PublicKey,
    local_public_bytes: Vec<u8>,
    remote_id: NodeId,
    remote_public: Option<PublicKey>,
    remote_public_bytes: Vec<u8>,
    protocol: &'static str,
    version: String,
    cipher_suite: String,
    closed: bool,
}

impl SecureConn {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        io: Box<dyn RawConn>,
        local_id: NodeId,
        local_public: PublicKey,
        remote_id: NodeId,
        remote_public: Option<PublicKey>,
        remote_public_bytes: Vec<u8>,
        protocol: &'static str,
        version: String,
        cipher_suite: String,
    ) -> Self {
        let local_public_bytes = local_public.to_bytes();
        Self {
            io,
            local_id,
            local_public,
            local_public_bytes,
            remote_id,
            remote_public,
            remote_public_bytes,
            protocol,
            version,
            cipher_suite,
            closed: false,
        }
    }

    /// The local identity public key.
    pub fn local_public_key(&self) -> &PublicKey {
        &self.local_public
    }

    /// The verified remote identity public key.
    ///
    /// `None` only on a Noise connection that was explicitly configured
    /// to accept the legacy empty payload, where the peer never presents
    /// an identity key.
    pub fn remote_public_key(&self) -> Option<&PublicKey> {
        self.remote_public.as_ref()
    }

    fn closed_error() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "connection is closed")
    }
}

impl SecureInfo for SecureConn {
    fn local_id(&self) -> NodeId {
        self.local_id
    }

    fn remote_id(&self) -> NodeId {
        self.remote_id
    }

    fn local_public_key_bytes(&self) -> &[u8] {
        &self.local_public_bytes
    }

    fn remote_public_key_bytes(&self) -> &[u8] {
        &self.remote_public_bytes
    }

    fn negotiated_protocol(&self) -> &str {
        self.protocol
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn cipher_suite(&self) -> &str {
        &self.cipher_suite
    }
}

impl AsyncRead for SecureConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        if me.closed {
            return Poll::Ready(Err(Self::closed_error()));
        }
        Pin::new(&mut me.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for SecureConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let me = self.get_mut();
        if me.closed {
            return Poll::Ready(Err(Self::closed_error()));
        }
        Pin::new(&mut me.io).poll_write(cx, data)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        if me.closed {
            return Poll::Ready(Err(Self::closed_error()));
        }
        Pin::new(&mut me.io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        if me.closed {
            return Poll::Ready(Ok(()));
        }
        match Pin::new(&mut me.io).poll_shutdown(cx) {
            Poll::Ready(result) => {
                me.closed = true;
                Poll::Ready(result)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for SecureConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureConn")
            .field("local_id", &self.local_id)
            .field("remote_id", &self.remote_id)
            .field("protocol", &self.protocol)
            .field("cipher_suite", &self.cipher_suite)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
