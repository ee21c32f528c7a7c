#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! # dep2p Secure Transport
//!
//! Upgrades raw duplex byte streams into authenticated, encrypted
//! connections bound to self-certifying node identifiers. Two
//! interchangeable engines (a TLS 1.3 profile and a Noise XX profile)
//! sit behind a protocol multiplexer; a policy engine gates every
//! upgrade before data flow.

pub mod access;
pub mod conn;
pub mod error;
pub mod metrics;
pub mod noise;
pub mod tls;
pub mod upgrader;

pub use access::AccessController;
pub use conn::SecureConn;
pub use noise::NoiseTransport;
pub use tls::TlsTransport;
pub use upgrader::{Engine, Upgrader};
