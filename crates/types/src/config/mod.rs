//! Shared configuration structures for the dep2p secure-transport core.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::node_id::NodeId;

/// Selects the Noise AEAD cipher.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum NoiseCipher {
    /// ChaCha20-Poly1305 (default).
    ChaChaPoly,
    /// AES-256-GCM.
    AesGcm,
}

impl NoiseCipher {
    /// Token used inside the Noise protocol-name string.
    pub fn token(&self) -> &'static str {
        match self {
            NoiseCipher::ChaChaPoly => "ChaChaPoly",
            NoiseCipher::AesGcm => "AESGCM",
        }
    }
}

/// Selects the Noise handshake hash.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum NoiseHash {
    /// SHA-256 (default).
    Sha256,
    /// BLAKE2s.
    Blake2s,
    /// BLAKE2b.
    Blake2b,
}

impl NoiseHash {
    /// Token used inside the Noise protocol-name string.
    pub fn token(&self) -> &'static str {
        match self {
            NoiseHash::Sha256 => "SHA256",
            NoiseHash::Blake2s => "BLAKE2s",
            NoiseHash::Blake2b => "BLAKE2b",
        }
    }
}

/// Configuration for the Noise XX engine.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NoiseConfig {
    /// AEAD cipher for handshake and data-plane records.
    #[serde(default = "default_noise_cipher")]
    pub cipher: NoiseCipher,
    /// Handshake hash function.
    #[serde(default = "default_noise_hash")]
    pub hash: NoiseHash,
    /// Require the identity-binding payload from the peer.
    ///
    /// When false, a peer sending an empty payload falls back to the
    /// legacy static-key-derived identifier, which never matches an
    /// identity-derived identifier. Leave this on.
    #[serde(default = "default_require_identity_payload")]
    pub require_identity_payload: bool,
}

fn default_noise_cipher() -> NoiseCipher {
    NoiseCipher::ChaChaPoly
}
fn default_noise_hash() -> NoiseHash {
    NoiseHash::Sha256
}
fn default_require_identity_payload() -> bool {
    true
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            cipher: default_noise_cipher(),
            hash: default_noise_hash(),
            require_identity_payload: default_require_identity_payload(),
        }
    }
}

impl NoiseConfig {
    /// The full Noise protocol name, e.g.
    /// `Noise_XX_25519_ChaChaPoly_SHA256`.
    pub fn protocol_name(&self) -> String {
        format!(
            "Noise_XX_25519_{}_{}",
            self.cipher.token(),
            self.hash.token()
        )
    }
}

/// Configuration for the TLS 1.3 engine.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TlsConfig {
    /// Skip the certificate validity-window check. Test escape hatch only;
    /// the identity-binding and extension checks are retained regardless.
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// Access-control modes, checked before every upgrade.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum AccessMode {
    /// Allow every non-empty identifier.
    #[default]
    AllowAll,
    /// Allow only identifiers on the allow set (and not on the deny set).
    Whitelist,
    /// Deny identifiers on the deny set, allow everyone else.
    Blacklist,
    /// Allow set wins, then deny set, then allow.
    Mixed,
}

/// Startup configuration for the access controller.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AccessConfig {
    /// The active mode.
    #[serde(default)]
    pub mode: AccessMode,
    /// Initial allow set.
    #[serde(default)]
    pub allow: BTreeSet<NodeId>,
    /// Initial deny set.
    #[serde(default)]
    pub deny: BTreeSet<NodeId>,
}

/// Configuration for the device-delegation registry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Maximum number of concurrently registered devices.
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,
    /// Accept expired certificates during verification. Test-only toggle.
    #[serde(default)]
    pub allow_expired: bool,
}

fn default_max_devices() -> usize {
    16
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_devices: default_max_devices(),
            allow_expired: false,
        }
    }
}

/// Top-level configuration for the secure-transport multiplexer.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransportConfig {
    /// Preferred engine label (`"tls"` or `"noise"`). Defaults to the
    /// first registered engine when absent.
    #[serde(default)]
    pub preferred_protocol: Option<String>,
    /// Upper bound on protocol negotiation, in seconds.
    #[serde(default = "default_negotiate_timeout_secs")]
    pub negotiate_timeout_secs: u64,
    /// Upper bound on a single engine handshake, in seconds.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Noise engine settings.
    #[serde(default)]
    pub noise: NoiseConfig,
    /// TLS engine settings.
    #[serde(default)]
    pub tls: TlsConfig,
    /// Access-control settings.
    #[serde(default)]
    pub access: AccessConfig,
}

fn default_negotiate_timeout_secs() -> u64 {
    60
}
fn default_handshake_timeout_secs() -> u64 {
    10
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            preferred_protocol: None,
            negotiate_timeout_secs: default_negotiate_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            noise: NoiseConfig::default(),
            tls: TlsConfig::default(),
            access: AccessConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Negotiation timeout as a [`Duration`].
    pub fn negotiate_timeout(&self) -> Duration {
        Duration::from_secs(self.negotiate_timeout_secs)
    }

    /// Handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_and_protocol_name() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.negotiate_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.handshake_timeout(), Duration::from_secs(10));
        assert!(cfg.noise.require_identity_payload);
        assert_eq!(
            cfg.noise.protocol_name(),
            "Noise_XX_25519_ChaChaPoly_SHA256"
        );
    }

    #[test]
    fn toml_roundtrip_with_partial_input() {
        let cfg: TransportConfig = toml::from_str(
            r#"
            preferred_protocol = "noise"
            negotiate_timeout_secs = 5

            [noise]
            cipher = "AesGcm"

            [access]
            mode = "Blacklist"
            deny = ["2222222222222222222222222222222222222222222222222222222222222222"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.preferred_protocol.as_deref(), Some("noise"));
        assert_eq!(cfg.negotiate_timeout_secs, 5);
        assert_eq!(cfg.noise.cipher, NoiseCipher::AesGcm);
        assert_eq!(cfg.noise.hash, NoiseHash::Sha256);
        assert_eq!(cfg.access.mode, AccessMode::Blacklist);
        assert_eq!(cfg.access.deny.len(), 1);
    }

    #[test]
    fn aesgcm_protocol_name() {
        let cfg = NoiseConfig {
            cipher: NoiseCipher::AesGcm,
            hash: NoiseHash::Blake2s,
            require_identity_payload: true,
        };
        assert_eq!(cfg.protocol_name(), "Noise_XX_25519_AESGCM_BLAKE2s");
    }
}
