//! Passphrase wrapping for key files.
//!
//! Format V1:
//! [ Magic: "D2P-GKEY" (8) ]
//! [ Version: u16 (2) ]
//! [ KDF Algo: u8 (1) ]
//! [ KDF Mem KiB: u32 (4) ]
//! [ KDF Iters: u32 (4) ]
//! [ KDF Lanes: u8 (1) ]
//! [ Salt: 16B ]
//! [ AEAD Algo: u8 (1) ]
//! [ Nonce: 12B ]
//! [ Ciphertext + Tag: N + 16 ]

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

// Header Constants
const HEADER_MAGIC: &[u8; 8] = b"D2P-GKEY";
const HEADER_VERSION: u16 = 1;
const HEADER_LEN: usize = 8 + 2 + 1 + 4 + 4 + 1 + 16 + 1 + 12; // 49 bytes

// Parameter defaults (strong defaults for V1)
const KDF_ALGO_ARGON2ID: u8 = 1;
const KDF_MEM_KIB: u32 = 64 * 1024; // 64 MiB
const KDF_ITERS: u32 = 3;
const KDF_LANES: u8 = 4;
const SALT_LEN: usize = 16;
const AEAD_ALGO_CHACHA20POLY1305: u8 = 1;
const NONCE_LEN: usize = 12;
const KEK_LEN: usize = 32;

/// A container for sensitive data that zeroizes on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SensitiveBytes(pub Vec<u8>);

fn derive_kek(
    passphrase: &str,
    salt: &[u8],
    mem_kib: u32,
    iters: u32,
    lanes: u8,
) -> Result<[u8; KEK_LEN], CryptoError> {
    let params = Params::new(mem_kib, iters, u32::from(lanes), Some(KEK_LEN))
        .map_err(|e| CryptoError::OperationFailed(format!("bad Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut kek = [0u8; KEK_LEN];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut kek)
        .map_err(|e| CryptoError::OperationFailed(format!("Argon2 derivation failed: {e}")))?;
    Ok(kek)
}

/// Encrypts raw key bytes with a passphrase, wrapping them in V1 format.
pub fn encrypt_key(secret: &[u8], passphrase: &str) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .and_then(|_| OsRng.try_fill_bytes(&mut nonce_bytes))
        .map_err(|e| CryptoError::InsufficientEntropy(e.to_string()))?;

    // Bytes are packed manually to keep a stable, endian-independent
    // on-disk format.
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(HEADER_MAGIC);
    header.extend_from_slice(&HEADER_VERSION.to_be_bytes());
    header.push(KDF_ALGO_ARGON2ID);
    header.extend_from_slice(&KDF_MEM_KIB.to_be_bytes());
    header.extend_from_slice(&KDF_ITERS.to_be_bytes());
    header.push(KDF_LANES);
    header.extend_from_slice(&salt);
    header.push(AEAD_ALGO_CHACHA20POLY1305);
    header.extend_from_slice(&nonce_bytes);

    debug_assert_eq!(header.len(), HEADER_LEN);

    let mut kek = derive_kek(passphrase, &salt, KDF_MEM_KIB, KDF_ITERS, KDF_LANES)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&kek)
        .map_err(|e| CryptoError::OperationFailed(e.to_string()))?;
    kek.zeroize();

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), secret)
        .map_err(|_| CryptoError::OperationFailed("encryption failed".into()))?;

    let mut output = header;
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypts a key-file blob with a passphrase, respecting the versioned
/// header. The KDF parameters recorded in the header are honored.
pub fn decrypt_key(data: &[u8], passphrase: &str) -> Result<SensitiveBytes, CryptoError> {
    if data.len() < HEADER_LEN {
        return Err(CryptoError::OperationFailed("key file too short".into()));
    }
    let (header, ciphertext) = data.split_at(HEADER_LEN);

    let mut cursor = header;
    let magic = take(&mut cursor, 8)?;
    if magic != HEADER_MAGIC {
        return Err(CryptoError::OperationFailed(
            "invalid key file signature".into(),
        ));
    }
    let version = u16::from_be_bytes(take_array(&mut cursor)?);
    if version != HEADER_VERSION {
        return Err(CryptoError::UnsupportedKeyType(format!(
            "unsupported key file version {version}"
        )));
    }

    let kdf_algo = *take(&mut cursor, 1)?.first().unwrap_or(&0);
    let mem_kib = u32::from_be_bytes(take_array(&mut cursor)?);
    let iters = u32::from_be_bytes(take_array(&mut cursor)?);
    let lanes = *take(&mut cursor, 1)?.first().unwrap_or(&0);
    let salt = take(&mut cursor, SALT_LEN)?.to_vec();
    let aead_algo = *take(&mut cursor, 1)?.first().unwrap_or(&0);
    let nonce_bytes = take(&mut cursor, NONCE_LEN)?.to_vec();

    if kdf_algo != KDF_ALGO_ARGON2ID || aead_algo != AEAD_ALGO_CHACHA20POLY1305 {
        return Err(CryptoError::UnsupportedKeyType(
            "unsupported key file algorithms".into(),
        ));
    }

    let mut kek = derive_kek(passphrase, &salt, mem_kib, iters, lanes)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&kek)
        .map_err(|e| CryptoError::OperationFailed(e.to_string()))?;
    kek.zeroize();

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext)
        .map_err(|_| {
            CryptoError::OperationFailed(
                "decryption failed (wrong passphrase or corrupted file)".into(),
            )
        })?;

    Ok(SensitiveBytes(plaintext))
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8], CryptoError> {
    if cursor.len() < n {
        return Err(CryptoError::OperationFailed(
            "key file header truncated".into(),
        ));
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

fn take_array<'a, const N: usize>(cursor: &mut &'a [u8]) -> Result<[u8; N], CryptoError> {
    take(cursor, N)?
        .try_into()
        .map_err(|_| CryptoError::OperationFailed("key file header truncated".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_v1() {
        let secret = b"my_secret_key_seed_32_bytes_long";
        let pass = "strong_password";

        let encrypted = encrypt_key(secret, pass).unwrap();

        assert_eq!(&encrypted[0..8], HEADER_MAGIC);
        assert_eq!(encrypted.len(), HEADER_LEN + secret.len() + 16); // header + plaintext + tag

        let decrypted = decrypt_key(&encrypted, pass).unwrap();
        assert_eq!(decrypted.0, secret);
    }

    #[test]
    fn test_wrong_passphrase() {
        let encrypted = encrypt_key(b"secret", "pass").unwrap();
        assert!(decrypt_key(&encrypted, "wrong").is_err());
    }

    #[test]
    fn test_tamper_header_salt() {
        // A modified salt derives a different KEK, so the AEAD tag fails.
        let mut encrypted = encrypt_key(b"secret", "pass").unwrap();
        encrypted[25] ^= 0xFF; // inside the salt range 20..36
        assert!(decrypt_key(&encrypted, "pass").is_err());
    }

    #[test]
    fn test_truncated_file_rejected() {
        let encrypted = encrypt_key(b"secret", "pass").unwrap();
        assert!(decrypt_key(&encrypted[..HEADER_LEN - 1], "pass").is_err());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut encrypted = encrypt_key(b"secret", "pass").unwrap();
        encrypted[0] = b'X';
        assert!(decrypt_key(&encrypted, "pass").is_err());
    }
}
