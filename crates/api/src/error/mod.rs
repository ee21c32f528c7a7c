// Re-export the canonical error types from the central types crate.
pub use dep2p_types::error::{
    AccessError, CertificateError, CryptoError, NodeIdError, TransportError,
};
pub use dep2p_types::Result;
