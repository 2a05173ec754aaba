use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{StoreError, VaultEntry};

const NONCE_LEN: usize = 12;

pub(crate) fn entry_path(dir: &Path, id: Uuid) -> PathBuf {
    dir.join(format!("{}.bin", id.simple()))
}

/// Encrypt + write entry to `dir/{id}.bin`. Writes a temporary file first and
/// renames it into place so readers never observe a partial entry.
pub(crate) fn write_entry(
    aes_key: &[u8; 32],
    dir: &Path,
    entry: &VaultEntry,
) -> Result<(), StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(entry, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(aes_key)
        .map_err(|e| StoreError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), buf.as_slice())
        .map_err(|e| StoreError::Encryption(e.to_string()))?;

    let mut file_bytes = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    file_bytes.extend_from_slice(&nonce_bytes);
    file_bytes.extend_from_slice(&ciphertext);

    let path = entry_path(dir, entry.id);
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, file_bytes)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Read + decrypt + deserialize entry from `path`.
pub(crate) fn read_entry(aes_key: &[u8; 32], path: &Path) -> Result<VaultEntry, StoreError> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < NONCE_LEN {
        return Err(StoreError::Corrupt("file too short".into()));
    }
    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(aes_key)
        .map_err(|e| StoreError::Encryption(e.to_string()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| StoreError::Encryption(e.to_string()))?;

    let entry: VaultEntry = ciborium::from_reader(plaintext.as_slice())
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    Ok(entry)
}

/// Load all valid entry files from `dir`. Logs and skips corrupt files.
pub(crate) fn load_all(aes_key: &[u8; 32], dir: &Path) -> Result<Vec<VaultEntry>, StoreError> {
    let mut entries = Vec::new();
    for dirent in std::fs::read_dir(dir)? {
        let path = dirent?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bin") {
            continue;
        }
        match read_entry(aes_key, &path) {
            Ok(entry) if entry_path(dir, entry.id) == path => entries.push(entry),
            Ok(entry) => {
                tracing::warn!(path = %path.display(), id = %entry.id, "Skipping vault file with mismatched id");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt vault file");
            }
        }
    }
    Ok(entries)
}
