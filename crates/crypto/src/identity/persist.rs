//! Identity persistence.
//!
//! One private key per file, PEM envelope, mode 0600, written through the
//! atomic-write protocol. The public key and identifier are re-derived on
//! load, so a key file is the complete persistent state of an identity.
//!
//! The `*_encrypted` variants wrap the PEM envelope in the passphrase
//! key-store format before it touches storage, for deployments that
//! cannot rely on file permissions alone.

use std::path::Path;

use dep2p_api::storage::KeyStorage;

use crate::atomic::FsStorage;
use crate::error::CryptoError;
use crate::identity::Identity;
use crate::key_store;
use crate::keys::encoding;

/// Saves the identity's private key through the given storage backend.
pub fn save_with(
    identity: &Identity,
    path: &Path,
    storage: &dyn KeyStorage,
) -> Result<(), CryptoError> {
    let text = encoding::encode_private(identity.private_key());
    storage.write_atomic(path, text.as_bytes())?;
    Ok(())
}

/// Loads an identity through the given storage backend.
pub fn load_with(path: &Path, storage: &dyn KeyStorage) -> Result<Identity, CryptoError> {
    let bytes = storage.read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| CryptoError::InvalidPem("key file is not UTF-8".into()))?;
    let private = encoding::decode_private(&text)?;
    Ok(Identity::from_private(private))
}

/// Saves the identity's private key to a file on disk.
pub fn save(identity: &Identity, path: &Path) -> Result<(), CryptoError> {
    save_with(identity, path, &FsStorage)
}

/// Loads an identity from a key file on disk.
pub fn load(path: &Path) -> Result<Identity, CryptoError> {
    load_with(path, &FsStorage)
}

/// Saves the identity's private key wrapped under a passphrase, through
/// the given storage backend.
pub fn save_encrypted_with(
    identity: &Identity,
    path: &Path,
    passphrase: &str,
    storage: &dyn KeyStorage,
) -> Result<(), CryptoError> {
    let text = encoding::encode_private(identity.private_key());
    let wrapped = key_store::encrypt_key(text.as_bytes(), passphrase)?;
    storage.write_atomic(path, &wrapped)?;
    Ok(())
}

/// Loads an identity from a passphrase-wrapped key file, through the
/// given storage backend. The decrypted envelope is zeroized after the
/// key is reconstructed.
pub fn load_encrypted_with(
    path: &Path,
    passphrase: &str,
    storage: &dyn KeyStorage,
) -> Result<Identity, CryptoError> {
    let wrapped = storage.read(path)?;
    let decrypted = key_store::decrypt_key(&wrapped, passphrase)?;
    let text = std::str::from_utf8(&decrypted.0)
        .map_err(|_| CryptoError::InvalidPem("decrypted key file is not UTF-8".into()))?;
    let private = encoding::decode_private(text)?;
    Ok(Identity::from_private(private))
}

/// Saves the identity's private key wrapped under a passphrase.
pub fn save_encrypted(
    identity: &Identity,
    path: &Path,
    passphrase: &str,
) -> Result<(), CryptoError> {
    save_encrypted_with(identity, path, passphrase, &FsStorage)
}

/// Loads an identity from a passphrase-wrapped key file on disk.
pub fn load_encrypted(path: &Path, passphrase: &str) -> Result<Identity, CryptoError> {
    load_encrypted_with(path, passphrase, &FsStorage)
}

#[cfg(test)]
mod tests {
    use dep2p_api::storage::MemoryStorage;
    use dep2p_types::KeyType;

    use super::*;

    #[test]
    fn memory_roundtrip() {
        let storage = MemoryStorage::new();
        let identity = Identity::generate().unwrap();
        let path = Path::new("/keys/node.key");

        save_with(&identity, path, &storage).unwrap();
        let loaded = load_with(path, &storage).unwrap();

        assert_eq!(loaded.id(), identity.id());
        assert_eq!(loaded.public_key(), identity.public_key());
    }

    #[test]
    fn disk_roundtrip_all_algorithms() {
        let dir = tempfile::tempdir().unwrap();
        for kt in [KeyType::Ed25519, KeyType::EcdsaP256, KeyType::EcdsaP384] {
            let identity = Identity::generate_with(kt).unwrap();
            let path = dir.path().join(format!("{}.key", kt.name()));

            save(&identity, &path).unwrap();
            let loaded = load(&path).unwrap();

            assert_eq!(loaded.id(), identity.id());
            assert_eq!(loaded.key_type(), kt);
        }
    }

    #[test]
    fn encrypted_roundtrip() {
        let storage = MemoryStorage::new();
        let identity = Identity::generate().unwrap();
        let path = Path::new("/keys/node.enc");

        save_encrypted_with(&identity, path, "correct horse", &storage).unwrap();

        // Nothing recognizable as a PEM envelope reaches storage.
        let on_disk = storage.read(path).unwrap();
        assert!(!on_disk.windows(5).any(|w| w == b"BEGIN"));

        let loaded = load_encrypted_with(path, "correct horse", &storage).unwrap();
        assert_eq!(loaded.id(), identity.id());
        assert_eq!(loaded.public_key(), identity.public_key());
    }

    #[test]
    fn encrypted_load_rejects_wrong_passphrase() {
        let storage = MemoryStorage::new();
        let identity = Identity::generate().unwrap();
        let path = Path::new("/keys/node.enc");

        save_encrypted_with(&identity, path, "correct horse", &storage).unwrap();
        assert!(load_encrypted_with(path, "battery staple", &storage).is_err());
    }

    #[test]
    fn encrypted_disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let identity = Identity::generate_with(KeyType::EcdsaP256).unwrap();
        let path = dir.path().join("node.enc");

        save_encrypted(&identity, &path, "pass").unwrap();
        let loaded = load_encrypted(&path, "pass").unwrap();
        assert_eq!(loaded.id(), identity.id());
        assert_eq!(loaded.key_type(), KeyType::EcdsaP256);
    }

    #[test]
    fn corrupted_file_is_rejected() {
        let storage = MemoryStorage::new();
        let path = Path::new("/keys/bad.key");
        storage.write_atomic(path, b"-----BEGIN GARBAGE-----").unwrap();
        assert!(load_with(path, &storage).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load(Path::new("/definitely/not/here.key")),
            Err(CryptoError::Io(_))
        ));
    }
}
