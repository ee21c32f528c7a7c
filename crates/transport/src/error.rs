//! Local error types for the `dep2p-transport` crate.

// Re-export the canonical error types from the API crate.
pub use dep2p_api::error::{AccessError, CertificateError, CryptoError, TransportError};
