//! The Noise data plane.
//!
//! Each record on the wire is `len (u16 BE) ‖ ciphertext`. Plaintext
//! chunks are capped at `65535 − 16` bytes; ciphertext shorter than the
//! AEAD tag is rejected. Reads are buffered so arbitrarily small caller
//! reads compose into one decrypted record.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use snow::TransportState;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Maximum Noise record length on the wire.
pub const MAX_FRAME_LEN: usize = 65_535;
/// AEAD tag length.
pub const TAG_LEN: usize = 16;
/// Maximum plaintext chunk per record.
pub const MAX_PLAINTEXT_LEN: usize = MAX_FRAME_LEN - TAG_LEN;

#[derive(Debug)]
enum ReadState {
    ReadingHeader {
        have: usize,
        buf: [u8; 2],
    },
    ReadingBody {
        need: usize,
        have: usize,
        buf: Vec<u8>,
    },
    // Drains a decrypted record into potentially small caller buffers.
    DrainingPlaintext {
        plaintext: Vec<u8>,
        read: usize,
    },
}

impl Default for ReadState {
    fn default() -> Self {
        ReadState::ReadingHeader {
            have: 0,
            buf: [0; 2],
        }
    }
}

#[derive(Debug)]
enum WriteState {
    Idle,
    Writing { buf: Vec<u8>, written: usize },
}

/// An encrypted stream carrying Noise transport-mode records.
pub struct NoiseStream<S> {
    inner: S,
    noise: TransportState,
    read_state: ReadState,
    write_state: WriteState,
}

impl<S> NoiseStream<S> {
    pub(crate) fn new(inner: S, noise: TransportState) -> Self {
        Self {
            inner,
            noise,
            read_state: ReadState::default(),
            write_state: WriteState::Idle,
        }
    }

    fn seal_record(&mut self, plaintext: &[u8]) -> io::Result<Vec<u8>> {
        debug_assert!(plaintext.len() <= MAX_PLAINTEXT_LEN);
        let mut ciphertext = vec![0u8; plaintext.len() + TAG_LEN];
        let len = self
            .noise
            .write_message(plaintext, &mut ciphertext)
            .map_err(|_| io::Error::other("noise encryption failed"))?;
        ciphertext.truncate(len);

        let mut record = Vec::with_capacity(2 + ciphertext.len());
        record.extend_from_slice(&(ciphertext.len() as u16).to_be_bytes());
        record.extend_from_slice(&ciphertext);
        Ok(record)
    }
}

impl<S> std::fmt::Debug for NoiseStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseStream")
            .field("read_state", &self.read_state)
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for NoiseStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        loop {
            match &mut me.read_state {
                ReadState::DrainingPlaintext { plaintext, read } => {
                    let remaining = plaintext.len().saturating_sub(*read);
                    let can_write = std::cmp::min(out.remaining(), remaining);
                    if can_write > 0 {
                        if let Some(chunk) = plaintext.get(*read..*read + can_write) {
                            out.put_slice(chunk);
                        }
                        *read += can_write;
                    }
                    if *read == plaintext.len() {
                        me.read_state = ReadState::default();
                    }
                    return Poll::Ready(Ok(()));
                }

                ReadState::ReadingHeader { have, buf } => {
                    while *have < 2 {
                        let dst = buf.get_mut(*have..).unwrap_or(&mut []);
                        let mut tmp = ReadBuf::new(dst);
                        match Pin::new(&mut me.inner).poll_read(cx, &mut tmp) {
                            Poll::Ready(Ok(())) => {
                                let n = tmp.filled().len();
                                if n == 0 {
                                    return if *have == 0 {
                                        // Clean EOF between records.
                                        Poll::Ready(Ok(()))
                                    } else {
                                        Poll::Ready(Err(io::Error::new(
                                            io::ErrorKind::UnexpectedEof,
                                            "EOF in noise record header",
                                        )))
                                    };
                                }
                                *have += n;
                            }
                            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                            Poll::Pending => return Poll::Pending,
                        }
                    }
                    let len = u16::from_be_bytes(*buf) as usize;
                    if len < TAG_LEN {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("noise record shorter than AEAD tag: {len}"),
                        )));
                    }
                    me.read_state = ReadState::ReadingBody {
                        need: len,
                        have: 0,
                        buf: vec![0; len],
                    };
                }

                ReadState::ReadingBody { need, have, buf } => {
                    while *have < *need {
                        let dst = buf.get_mut(*have..).unwrap_or(&mut []);
                        let mut tmp = ReadBuf::new(dst);
                        match Pin::new(&mut me.inner).poll_read(cx, &mut tmp) {
                            Poll::Ready(Ok(())) => {
                                let n = tmp.filled().len();
                                if n == 0 {
                                    return Poll::Ready(Err(io::Error::new(
                                        io::ErrorKind::UnexpectedEof,
                                        "EOF in noise record body",
                                    )));
                                }
                                *have += n;
                            }
                            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                            Poll::Pending => return Poll::Pending,
                        }
                    }

                    let ciphertext = std::mem::take(buf);
                    let mut plaintext = vec![0u8; ciphertext.len()];
                    let len = me
                        .noise
                        .read_message(&ciphertext, &mut plaintext)
                        .map_err(|_| {
                            io::Error::new(io::ErrorKind::InvalidData, "noise decryption failed")
                        })?;
                    plaintext.truncate(len);

                    me.read_state = ReadState::DrainingPlaintext { plaintext, read: 0 };
                }
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for NoiseStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let me = self.get_mut();
        // On re-entry after Pending the caller retries with the same
        // data, so the accepted length is stable across polls.
        let accepted = std::cmp::min(data.len(), MAX_PLAINTEXT_LEN);
        if let WriteState::Idle = me.write_state {
            let chunk = data.get(..accepted).unwrap_or(data);
            let record = me.seal_record(chunk)?;
            me.write_state = WriteState::Writing {
                buf: record,
                written: 0,
            };
        }
        if let WriteState::Writing { buf, written } = &mut me.write_state {
            while *written < buf.len() {
                let rest = buf.get(*written..).unwrap_or_default();
                match Pin::new(&mut me.inner).poll_write(cx, rest) {
                    Poll::Ready(Ok(0)) => {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::WriteZero,
                            "failed to write noise record",
                        )))
                    }
                    Poll::Ready(Ok(n)) => *written += n,
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            me.write_state = WriteState::Idle;
        }
        Poll::Ready(Ok(accepted))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.as_mut().poll_write_buffered(cx).is_pending() {
            return Poll::Pending;
        }
        let me = self.get_mut();
        Pin::new(&mut me.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.as_mut().poll_write_buffered(cx).is_pending() {
            return Poll::Pending;
        }
        let me = self.get_mut();
        Pin::new(&mut me.inner).poll_shutdown(cx)
    }
}

impl<S: AsyncWrite + Unpin> NoiseStream<S> {
    fn poll_write_buffered(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        if let WriteState::Writing { buf, written } = &mut me.write_state {
            while *written < buf.len() {
                let rest = buf.get(*written..).unwrap_or_default();
                match Pin::new(&mut me.inner).poll_write(cx, rest) {
                    Poll::Ready(Ok(0)) => {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::WriteZero,
                            "failed to write noise record",
                        )))
                    }
                    Poll::Ready(Ok(n)) => *written += n,
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            me.write_state = WriteState::Idle;
        }
        Poll::Ready(Ok(()))
    }
}
