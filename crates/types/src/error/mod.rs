//! The canonical error taxonomy for the dep2p secure-transport core.
//!
//! Every crate in the workspace surfaces these types; the implementation
//! crates re-export them rather than defining their own. `kind()` on each
//! enum yields a stable label used by the error-kind counters.

use thiserror::Error;

use crate::node_id::NodeId;

/// Errors raised while parsing or constructing a [`NodeId`](crate::NodeId).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    /// The input was not exactly 32 bytes.
    #[error("node id must be 32 bytes, got {got}")]
    InvalidLength {
        /// The actual length in bytes.
        got: usize,
    },
    /// The input was not valid hex.
    #[error("node id is not valid hex")]
    InvalidHex,
}

/// Errors from key generation, parsing, signing, and verification.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A private key was required but absent.
    #[error("private key is nil")]
    NilPrivateKey,
    /// A public key was required but absent.
    #[error("public key is nil")]
    NilPublicKey,
    /// Key material had the wrong length for its declared algorithm.
    #[error("invalid key size: expected {expected}, got {got}")]
    InvalidKeySize {
        /// The expected length in bytes.
        expected: usize,
        /// The actual length in bytes.
        got: usize,
    },
    /// The requested key algorithm is not in the supported set.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
    /// A PEM envelope could not be parsed or carried an unknown label.
    #[error("invalid PEM: {0}")]
    InvalidPem(String),
    /// A private key and public key presented together do not belong to
    /// the same keypair.
    #[error("key pair mismatch: public key does not match private key")]
    KeyPairMismatch,
    /// The provided key material is malformed for the specified algorithm.
    #[error("invalid cryptographic key: {0}")]
    InvalidKey(String),
    /// The provided signature material is malformed for the specified
    /// algorithm.
    #[error("invalid signature format: {0}")]
    InvalidSignature(String),
    /// The operating system failed to provide entropy.
    #[error("insufficient entropy: {0}")]
    InsufficientEntropy(String),
    /// A generic failure in an underlying cryptographic library.
    #[error("cryptographic operation failed: {0}")]
    OperationFailed(String),
    /// An I/O failure while reading or writing key material.
    #[error("key i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Stable label for the error-kind counter.
    pub fn kind(&self) -> &'static str {
        match self {
            CryptoError::NilPrivateKey => "nil_private_key",
            CryptoError::NilPublicKey => "nil_public_key",
            CryptoError::InvalidKeySize { .. } => "invalid_key_size",
            CryptoError::UnsupportedKeyType(_) => "unsupported_key_type",
            CryptoError::InvalidPem(_) => "invalid_pem",
            CryptoError::KeyPairMismatch => "key_pair_mismatch",
            CryptoError::InvalidKey(_) => "invalid_key",
            CryptoError::InvalidSignature(_) => "invalid_signature",
            CryptoError::InsufficientEntropy(_) => "insufficient_entropy",
            CryptoError::OperationFailed(_) => "operation_failed",
            CryptoError::Io(_) => "io",
        }
    }
}

/// Errors from device-delegation certificates and the X.509 manager.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// A certificate for this device public key is already registered.
    #[error("device {0} already registered")]
    AlreadyExists(NodeId),
    /// The device is on the revocation set.
    #[error("device {0} is revoked")]
    Revoked(NodeId),
    /// The issuing identity is not a master identity.
    #[error("issuer is not a master identity")]
    NotMaster,
    /// The certificate's validity window has ended.
    #[error("certificate has expired")]
    Expired,
    /// The certificate's validity window has not yet begun.
    #[error("certificate is not yet valid")]
    NotYetValid,
    /// Registering another device would exceed the configured limit.
    #[error("device registry is full (limit {limit})")]
    RegistryFull {
        /// The configured maximum number of devices.
        limit: usize,
    },
    /// The certificate is structurally invalid or its signature fails.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
    /// The NodeId extension does not match the identifier derived from
    /// the certificate's own public key.
    #[error("node id extension does not match certificate public key")]
    ExtensionForged,
}

impl CertificateError {
    /// Stable label for the error-kind counter.
    pub fn kind(&self) -> &'static str {
        match self {
            CertificateError::AlreadyExists(_) => "already_exists",
            CertificateError::Revoked(_) => "revoked",
            CertificateError::NotMaster => "not_master",
            CertificateError::Expired => "expired",
            CertificateError::NotYetValid => "not_yet_valid",
            CertificateError::RegistryFull { .. } => "registry_full",
            CertificateError::InvalidCertificate(_) => "invalid_certificate",
            CertificateError::ExtensionForged => "extension_forged",
        }
    }
}

/// Errors from the connection-level access controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The peer is denied by the active policy.
    #[error("access denied for {0}")]
    AccessDenied(NodeId),
    /// Whitelist mode is active and the peer is not on the allow set.
    #[error("{0} is not in the whitelist")]
    NotInWhitelist(NodeId),
    /// The peer is on the deny set.
    #[error("{0} is in the blacklist")]
    InBlacklist(NodeId),
    /// The empty identifier is never allowed to connect.
    #[error("empty node id is always denied")]
    EmptyNodeId,
}

impl AccessError {
    /// Stable label for the error-kind counter.
    pub fn kind(&self) -> &'static str {
        match self {
            AccessError::AccessDenied(_) => "access_denied",
            AccessError::NotInWhitelist(_) => "not_in_whitelist",
            AccessError::InBlacklist(_) => "in_blacklist",
            AccessError::EmptyNodeId => "empty_node_id",
        }
    }
}

/// Errors surfaced by `upgrade_inbound` / `upgrade_outbound` and by I/O on
/// an upgraded connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peers share no secure-transport protocol.
    #[error("protocol negotiation failed: {0}")]
    NegotiationFailed(String),
    /// The chosen engine's handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    /// A handshake or data frame exceeded the 16-bit length limit.
    #[error("message too large: {size} bytes")]
    MessageTooLarge {
        /// The offending frame length.
        size: usize,
    },
    /// An AEAD record failed to decrypt. Fatal for the connection.
    #[error("decryption failed")]
    DecryptionFailed,
    /// The verified remote identifier does not equal the expected one.
    #[error("peer id mismatch: expected {expected}, got {actual}")]
    PeerIdMismatch {
        /// The identifier the caller expected.
        expected: NodeId,
        /// The identifier derived from the observed public key.
        actual: NodeId,
    },
    /// The identity claimed inside a handshake payload does not hash to
    /// the identifier the handshake produced.
    #[error("remote identity mismatch")]
    RemoteIdentityMismatch,
    /// The identity-binding signature over the static DH key is invalid.
    #[error("identity-binding signature is invalid")]
    BindingSignatureInvalid,
    /// The deadline supplied by the caller (or the engine default) passed.
    #[error("operation timed out")]
    Timeout,
    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
    /// I/O was attempted on a closed connection.
    #[error("connection is closed")]
    Closed,
    /// An I/O failure on the underlying raw stream.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A key or signature operation failed during the upgrade.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// Certificate verification failed during the upgrade.
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    /// The access controller denied the upgrade.
    #[error(transparent)]
    Access(#[from] AccessError),
}

impl TransportError {
    /// Stable label for the error-kind counter.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::NegotiationFailed(_) => "negotiation_failed",
            TransportError::HandshakeFailed(_) => "handshake_failed",
            TransportError::MessageTooLarge { .. } => "message_too_large",
            TransportError::DecryptionFailed => "decryption_failed",
            TransportError::PeerIdMismatch { .. } => "peer_id_mismatch",
            TransportError::RemoteIdentityMismatch => "remote_identity_mismatch",
            TransportError::BindingSignatureInvalid => "binding_signature_invalid",
            TransportError::Timeout => "timeout",
            TransportError::Cancelled => "cancelled",
            TransportError::Closed => "closed",
            TransportError::Io(_) => "io",
            TransportError::Crypto(e) => e.kind(),
            TransportError::Certificate(e) => e.kind(),
            TransportError::Access(e) => e.kind(),
        }
    }

    /// Whether this error is one of the security-relevant denials that
    /// must be logged at `warn`.
    pub fn is_security_denial(&self) -> bool {
        matches!(
            self,
            TransportError::PeerIdMismatch { .. }
                | TransportError::BindingSignatureInvalid
                | TransportError::Certificate(CertificateError::ExtensionForged)
                | TransportError::Access(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        let err = TransportError::PeerIdMismatch {
            expected: NodeId::EMPTY,
            actual: NodeId::new([1; 32]),
        };
        assert_eq!(err.kind(), "peer_id_mismatch");
        assert!(err.is_security_denial());

        let err: TransportError = AccessError::EmptyNodeId.into();
        assert_eq!(err.kind(), "empty_node_id");
        assert!(err.is_security_denial());

        assert!(!TransportError::Timeout.is_security_denial());
    }

    #[test]
    fn crypto_kind_passes_through_transport() {
        let err: TransportError = CryptoError::KeyPairMismatch.into();
        assert_eq!(err.kind(), "key_pair_mismatch");
    }
}
