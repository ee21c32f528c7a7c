//! Abstract storage for key files.
//!
//! Identity persistence goes through this trait so the atomic-write
//! protocol can be exercised against the real filesystem and tests can
//! run fully in memory.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage backend for key files.
///
/// `write_atomic` must guarantee that a reader never observes a partial
/// file: after a failure mid-write, either the previous content or no
/// file exists at `path`.
pub trait KeyStorage: Send + Sync {
    /// Reads the full content of the file at `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Atomically replaces the file at `path` with `data`, restricting
    /// permissions to the owner (mode 0600 on unix).
    fn write_atomic(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// In-memory storage for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStorage for MemoryStorage {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let files = self
            .files
            .lock()
            .map_err(|_| io::Error::other("storage lock poisoned"))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such key file"))
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| io::Error::other("storage lock poisoned"))?;
        files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        let path = Path::new("/keys/node.key");
        assert!(!storage.exists(path));
        storage.write_atomic(path, b"secret").unwrap();
        assert!(storage.exists(path));
        assert_eq!(storage.read(path).unwrap(), b"secret");
    }

    #[test]
    fn missing_file_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.read(Path::new("/nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
