//! Atomic key-file writes.
//!
//! Protocol: create a uniquely-named temporary file in the destination
//! directory with owner-only permissions, write, fsync, rename into
//! place. A failure at any step removes the temporary file, so a partial
//! write never replaces a valid key file.

use std::io::{self, Write};
use std::path::Path;

use dep2p_api::storage::KeyStorage;

/// Filesystem-backed [`KeyStorage`] using the atomic-write protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl FsStorage {
    /// Creates the storage handle.
    pub fn new() -> Self {
        FsStorage
    }
}

impl KeyStorage for FsStorage {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        write_atomic(path, data)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Atomically replaces `path` with `data`, mode 0600.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".dep2p-key.")
        .tempfile_in(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tmp.as_file().set_permissions(perms)?;
    }

    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    // Rename into place; on failure the temp file is cleaned up by its
    // Drop, leaving any previous file at `path` untouched.
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.key");

        write_atomic(&path, b"first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[cfg(unix)]
    #[test]
    fn mode_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.key");
        write_atomic(&path, b"secret").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.key");
        write_atomic(&path, b"data").unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".dep2p-key."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_write_keeps_old_file() {
        // Writing into a directory that does not exist fails before the
        // destination is touched.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.key");
        write_atomic(&path, b"old").unwrap();

        let bogus = dir.path().join("missing").join("node.key");
        assert!(write_atomic(&bogus, b"new").is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"old");
    }
}
