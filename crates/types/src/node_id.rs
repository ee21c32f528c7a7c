//! Self-certifying node identifiers.
//!
//! A [`NodeId`] is the SHA-256 digest of a public key's canonical byte
//! encoding. Derivation lives in `dep2p-crypto`; this type only carries
//! the 32 bytes and their textual forms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::NodeIdError;

/// Length of a node identifier in bytes.
pub const NODE_ID_LEN: usize = 32;

/// A 32-byte self-certifying node identifier.
///
/// The all-zero value is the "empty" identifier; it never matches a real
/// identity and is unconditionally denied by the access controller.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_ID_LEN]);

impl NodeId {
    /// The empty (all-zero) identifier.
    pub const EMPTY: NodeId = NodeId([0u8; NODE_ID_LEN]);

    /// Wraps raw identifier bytes.
    pub const fn new(bytes: [u8; NODE_ID_LEN]) -> Self {
        NodeId(bytes)
    }

    /// Parses an identifier from a byte slice, rejecting wrong lengths.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NodeIdError> {
        let arr: [u8; NODE_ID_LEN] = bytes
            .try_into()
            .map_err(|_| NodeIdError::InvalidLength { got: bytes.len() })?;
        Ok(NodeId(arr))
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Consumes the identifier into its byte array.
    pub fn into_bytes(self) -> [u8; NODE_ID_LEN] {
        self.0
    }

    /// Whether this is the empty (all-zero) identifier.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Full lowercase hex form (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Shortened hex form (first 8 bytes) for log lines.
    pub fn short(&self) -> String {
        let mut s = hex::encode(self.0);
        s.truncate(16);
        s
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| NodeIdError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; NODE_ID_LEN]> for NodeId {
    fn from(bytes: [u8; NODE_ID_LEN]) -> Self {
        NodeId(bytes)
    }
}

// Serialized as a hex string so identifiers are readable in TOML/JSON config.
impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_all_zero() {
        assert!(NodeId::EMPTY.is_empty());
        assert!(!NodeId::new([1u8; 32]).is_empty());
    }

    #[test]
    fn hex_roundtrip() {
        let id = NodeId::new([0xab; 32]);
        let parsed: NodeId = id.to_hex().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert!(matches!(
            NodeId::from_bytes(&[0u8; 16]),
            Err(NodeIdError::InvalidLength { got: 16 })
        ));
    }

    #[test]
    fn short_form_is_sixteen_chars() {
        let id = NodeId::new([0x5a; 32]);
        assert_eq!(id.short(), "5a5a5a5a5a5a5a5a");
    }

    #[test]
    fn serde_as_hex_string() {
        let id = NodeId::new([7u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
