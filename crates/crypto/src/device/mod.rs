//! Device-delegation certificates.
//!
//! A master identity issues signed certificates that authorize secondary
//! device identities to act on its behalf. Certificates carry a validity
//! window and can be revoked; revocation leaves a timestamped tombstone
//! so a revoked device key can never be re-issued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dep2p_api::crypto::SerializableKey;
use dep2p_api::Clock;
use dep2p_types::config::DeviceConfig;
use dep2p_types::NodeId;
use log::debug;

use crate::error::{CertificateError, CryptoError};
use crate::identity::Identity;
use crate::keys::{Ed25519PublicKey, PrivateKey, PublicKey};
use crate::node_id;

/// A certificate authorizing a device identity, signed by its master.
///
/// Device keys are Ed25519 only.
#[derive(Clone)]
pub struct DeviceCertificate {
    /// Identifier of the device identity.
    pub device_id: NodeId,
    /// Identifier of the issuing master identity.
    pub master_id: NodeId,
    /// The device's Ed25519 public key.
    pub device_public_key: Ed25519PublicKey,
    /// Issuance time, unix seconds.
    pub issued_at: u64,
    /// Expiration time, unix seconds.
    pub expires_at: u64,
    /// Human-readable device name.
    pub name: String,
    /// Master signature over [`DeviceCertificate::body_bytes`].
    pub signature: Vec<u8>,
}

impl DeviceCertificate {
    /// The signed certificate body:
    /// `device_id (32) ‖ master_id (32) ‖ device_public_key (32) ‖
    /// issued_at (u64 BE) ‖ expires_at (u64 BE) ‖ name (UTF-8)`.
    ///
    /// The name carries no length delimiter, so the body is only
    /// unambiguous because it is the *final* field; certificates are
    /// keyed and exchanged as structured values, never re-parsed from
    /// these bytes.
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(32 + 32 + 32 + 8 + 8 + self.name.len());
        body.extend_from_slice(self.device_id.as_bytes());
        body.extend_from_slice(self.master_id.as_bytes());
        body.extend_from_slice(&self.device_public_key.to_bytes());
        body.extend_from_slice(&self.issued_at.to_be_bytes());
        body.extend_from_slice(&self.expires_at.to_be_bytes());
        body.extend_from_slice(self.name.as_bytes());
        body
    }
}

impl std::fmt::Debug for DeviceCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCertificate")
            .field("device_id", &self.device_id)
            .field("master_id", &self.master_id)
            .field("name", &self.name)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// The master-side registry of issued device certificates.
///
/// The registered map and the revocation set are guarded separately so
/// they can be inspected independently; every mutation is serialized.
pub struct DeviceRegistry {
    master_id: NodeId,
    master_public: PublicKey,
    registered: Mutex<HashMap<NodeId, DeviceCertificate>>,
    revoked: Mutex<HashMap<NodeId, u64>>,
    config: DeviceConfig,
    clock: Arc<dyn Clock>,
}

impl DeviceRegistry {
    /// Creates a registry bound to a master identity.
    pub fn new(master: &Identity, config: DeviceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            master_id: master.id(),
            master_public: master.public_key().clone(),
            registered: Mutex::new(HashMap::new()),
            revoked: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Issues a certificate for a device public key.
    ///
    /// Rejects non-master issuers, already-registered keys, revoked keys,
    /// and registrations beyond the configured limit.
    pub fn issue(
        &self,
        issuer: &Identity,
        device_public_key: &Ed25519PublicKey,
        name: &str,
        validity_secs: u64,
    ) -> Result<DeviceCertificate, CertificateError> {
        if !issuer.is_master() || issuer.id() != self.master_id {
            return Err(CertificateError::NotMaster);
        }

        let device_id = node_id::derive_from_bytes(&device_public_key.to_bytes());

        if self.is_revoked(&device_id) {
            return Err(CertificateError::Revoked(device_id));
        }

        let mut registered = lock_registered(&self.registered)?;
        if registered.contains_key(&device_id) {
            return Err(CertificateError::AlreadyExists(device_id));
        }
        if registered.len() >= self.config.max_devices {
            return Err(CertificateError::RegistryFull {
                limit: self.config.max_devices,
            });
        }

        let now = self.clock.now_unix();
        let mut certificate = DeviceCertificate {
            device_id,
            master_id: self.master_id,
            device_public_key: device_public_key.clone(),
            issued_at: now,
            expires_at: now.saturating_add(validity_secs),
            name: name.to_string(),
            signature: Vec::new(),
        };
        certificate.signature = issuer
            .sign(&certificate.body_bytes())
            .map_err(|e| CertificateError::InvalidCertificate(e.to_string()))?;

        registered.insert(device_id, certificate.clone());
        debug!(
            "issued device certificate for {} (\"{}\")",
            device_id.short(),
            name
        );
        Ok(certificate)
    }

    /// Verifies a certificate: validity window, revocation state, device
    /// identifier binding, and the master signature over the body bytes.
    pub fn verify(&self, certificate: &DeviceCertificate) -> Result<(), CertificateError> {
        let now = self.clock.now_unix();
        if now < certificate.issued_at {
            return Err(CertificateError::NotYetValid);
        }
        if now > certificate.expires_at && !self.config.allow_expired {
            return Err(CertificateError::Expired);
        }
        if self.is_revoked(&certificate.device_id) {
            return Err(CertificateError::Revoked(certificate.device_id));
        }
        if certificate.master_id != self.master_id {
            return Err(CertificateError::InvalidCertificate(
                "certificate was issued by a different master".into(),
            ));
        }

        let derived = node_id::derive_from_bytes(&certificate.device_public_key.to_bytes());
        if derived != certificate.device_id {
            return Err(CertificateError::InvalidCertificate(
                "device id does not match device public key".into(),
            ));
        }

        let valid = self
            .master_public
            .verify(&certificate.body_bytes(), &certificate.signature)
            .map_err(|e| CertificateError::InvalidCertificate(e.to_string()))?;
        if !valid {
            return Err(CertificateError::InvalidCertificate(
                "master signature does not verify".into(),
            ));
        }
        Ok(())
    }

    /// Revokes a registered device, recording a timestamped tombstone.
    pub fn revoke(&self, device_id: NodeId) -> Result<(), CertificateError> {
        let mut registered = lock_registered(&self.registered)?;
        if registered.remove(&device_id).is_none() {
            return Err(CertificateError::InvalidCertificate(format!(
                "device {} is not registered",
                device_id.short()
            )));
        }
        drop(registered);

        if let Ok(mut revoked) = self.revoked.lock() {
            revoked.insert(device_id, self.clock.now_unix());
        }
        debug!("revoked device {}", device_id.short());
        Ok(())
    }

    /// All currently registered certificates.
    pub fn list(&self) -> Vec<DeviceCertificate> {
        self.registered
            .lock()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.registered.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the registry has no devices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a device identifier is on the revocation set.
    pub fn is_revoked(&self, device_id: &NodeId) -> bool {
        self.revoked
            .lock()
            .map(|m| m.contains_key(device_id))
            .unwrap_or(false)
    }
}

fn lock_registered(
    registered: &Mutex<HashMap<NodeId, DeviceCertificate>>,
) -> Result<std::sync::MutexGuard<'_, HashMap<NodeId, DeviceCertificate>>, CertificateError> {
    registered
        .lock()
        .map_err(|_| CertificateError::InvalidCertificate("registry lock poisoned".into()))
}

/// A delegated device identity: a certificate plus the device's own
/// private key. It signs messages but cannot issue further certificates.
pub struct DeviceIdentity {
    identity: Identity,
    certificate: DeviceCertificate,
}

impl DeviceIdentity {
    /// Binds a certificate to the device private key, validating that the
    /// key matches the certified public key.
    pub fn new(
        certificate: DeviceCertificate,
        device_private: PrivateKey,
    ) -> Result<Self, CryptoError> {
        let derived = device_private.public_key();
        let certified = PublicKey::Ed25519(certificate.device_public_key.clone());
        if !crate::keys::equals(&derived, &certified) {
            return Err(CryptoError::KeyPairMismatch);
        }
        Ok(Self {
            identity: Identity::device_from_private(device_private),
            certificate,
        })
    }

    /// The device's node identifier.
    pub fn id(&self) -> NodeId {
        self.identity.id()
    }

    /// The device identity (never a master).
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The authorizing certificate.
    pub fn certificate(&self) -> &DeviceCertificate {
        &self.certificate
    }

    /// Signs data with the device key.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.identity.sign(data)
    }
}

#[cfg(test)]
mod tests {
    use dep2p_api::FixedClock;
    use dep2p_types::KeyType;

    use super::*;
    use crate::keys;

    fn setup() -> (Identity, DeviceRegistry, Arc<FixedClock>) {
        let master = Identity::generate().unwrap();
        let clock = Arc::new(FixedClock::new(1_000_000));
        let registry = DeviceRegistry::new(&master, DeviceConfig::default(), clock.clone());
        (master, registry, clock)
    }

    fn device_key() -> (PrivateKey, Ed25519PublicKey) {
        let (private, public) = keys::generate(KeyType::Ed25519).unwrap();
        let PublicKey::Ed25519(ed) = public else {
            panic!("expected ed25519 key");
        };
        (private, ed)
    }

    #[test]
    fn issue_and_verify() {
        let (master, registry, _) = setup();
        let (_, device_pub) = device_key();

        let cert = registry.issue(&master, &device_pub, "laptop", 3600).unwrap();
        assert_eq!(cert.master_id, master.id());
        assert_eq!(cert.expires_at, cert.issued_at + 3600);
        registry.verify(&cert).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_issue_rejected() {
        let (master, registry, _) = setup();
        let (_, device_pub) = device_key();

        registry.issue(&master, &device_pub, "laptop", 3600).unwrap();
        assert!(matches!(
            registry.issue(&master, &device_pub, "laptop-2", 3600),
            Err(CertificateError::AlreadyExists(_))
        ));
    }

    #[test]
    fn non_master_cannot_issue() {
        let (master, registry, _) = setup();
        let (device_priv, device_pub) = device_key();

        let cert = registry.issue(&master, &device_pub, "laptop", 3600).unwrap();
        let device = DeviceIdentity::new(cert, device_priv).unwrap();
        assert!(!device.identity().is_master());

        let (_, other_pub) = device_key();
        assert!(matches!(
            registry.issue(device.identity(), &other_pub, "phone", 3600),
            Err(CertificateError::NotMaster)
        ));
    }

    #[test]
    fn expired_certificate_rejected() {
        let (master, registry, clock) = setup();
        let (_, device_pub) = device_key();

        let cert = registry.issue(&master, &device_pub, "laptop", 3600).unwrap();
        clock.advance(3601);
        assert!(matches!(
            registry.verify(&cert),
            Err(CertificateError::Expired)
        ));
    }

    #[test]
    fn allow_expired_flag_bypasses_expiry_only() {
        let master = Identity::generate().unwrap();
        let clock = Arc::new(FixedClock::new(1_000_000));
        let config = DeviceConfig {
            allow_expired: true,
            ..DeviceConfig::default()
        };
        let registry = DeviceRegistry::new(&master, config, clock.clone());
        let (_, device_pub) = device_key();

        let cert = registry.issue(&master, &device_pub, "laptop", 10).unwrap();
        clock.advance(1_000);
        registry.verify(&cert).unwrap();
    }

    #[test]
    fn revocation_lifecycle() {
        let (master, registry, _) = setup();
        let (_, device_pub) = device_key();

        let cert = registry.issue(&master, &device_pub, "laptop", 3600).unwrap();
        registry.revoke(cert.device_id).unwrap();

        assert!(registry.list().is_empty());
        assert!(matches!(
            registry.verify(&cert),
            Err(CertificateError::Revoked(_))
        ));
        // A revoked key can never be re-issued.
        assert!(matches!(
            registry.issue(&master, &device_pub, "laptop", 3600),
            Err(CertificateError::Revoked(_))
        ));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let (master, registry, _) = setup();
        let (_, device_pub) = device_key();

        let mut cert = registry.issue(&master, &device_pub, "laptop", 3600).unwrap();
        cert.name.push_str("-tampered");
        assert!(matches!(
            registry.verify(&cert),
            Err(CertificateError::InvalidCertificate(_))
        ));
    }

    #[test]
    fn registry_limit_enforced() {
        let master = Identity::generate().unwrap();
        let clock = Arc::new(FixedClock::new(1_000_000));
        let config = DeviceConfig {
            max_devices: 2,
            ..DeviceConfig::default()
        };
        let registry = DeviceRegistry::new(&master, config, clock);

        for _ in 0..2 {
            let (_, device_pub) = device_key();
            registry.issue(&master, &device_pub, "dev", 3600).unwrap();
        }
        let (_, device_pub) = device_key();
        assert!(matches!(
            registry.issue(&master, &device_pub, "dev", 3600),
            Err(CertificateError::RegistryFull { limit: 2 })
        ));
    }

    #[test]
    fn device_identity_rejects_wrong_key() {
        let (master, registry, _) = setup();
        let (_, device_pub) = device_key();
        let (other_priv, _) = device_key();

        let cert = registry.issue(&master, &device_pub, "laptop", 3600).unwrap();
        assert!(matches!(
            DeviceIdentity::new(cert, other_priv),
            Err(CryptoError::KeyPairMismatch)
        ));
    }

    #[test]
    fn body_layout_is_stable() {
        let (master, registry, _) = setup();
        let (_, device_pub) = device_key();

        let cert = registry.issue(&master, &device_pub, "laptop", 3600).unwrap();
        let body = cert.body_bytes();
        assert_eq!(body.len(), 32 + 32 + 32 + 8 + 8 + "laptop".len());
        assert_eq!(&body[..32], cert.device_id.as_bytes());
        assert_eq!(&body[32..64], cert.master_id.as_bytes());
        assert_eq!(&body[112..], b"laptop");
    }
}
