use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{disk, CredentialStore, StoreError, VaultEntry};

type EntryMap = HashMap<Uuid, VaultEntry>;

/// Encrypted on-disk vault: one `<uuid>.bin` file per entry, cached in memory.
///
/// Writes run on the blocking pool with the map locked, so the file and the
/// cache change together.
pub struct DiskVault {
    aes_key:     [u8; 32],
    entries_dir: PathBuf,
    by_id:       Arc<Mutex<EntryMap>>,
}

impl DiskVault {
    /// Load all entries from disk into memory.
    pub fn load(aes_key: [u8; 32], entries_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&entries_dir)?;
        let by_id = disk::load_all(&aes_key, &entries_dir)?
            .into_iter()
            .map(|entry| (entry.id, entry))
            .collect();
        Ok(Self {
            aes_key,
            entries_dir,
            by_id: Arc::new(Mutex::new(by_id)),
        })
    }

    pub fn entry_count(&self) -> usize {
        self.by_id.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, EntryMap>, StoreError> {
        lock_map(&self.by_id)
    }

    async fn write_blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&[u8; 32], &Path, &mut EntryMap) -> Result<T, StoreError> + Send + 'static,
    {
        let aes_key = self.aes_key;
        let entries_dir = self.entries_dir.clone();
        let by_id = Arc::clone(&self.by_id);
        tokio::task::spawn_blocking(move || {
            let mut map = lock_map(&by_id)?;
            f(&aes_key, entries_dir.as_path(), &mut *map)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn lock_map(by_id: &Mutex<EntryMap>) -> Result<MutexGuard<'_, EntryMap>, StoreError> {
    by_id.lock().map_err(|_| StoreError::Poisoned)
}

#[async_trait]
impl CredentialStore for DiskVault {
    async fn get(&self, id: Uuid) -> Result<Option<VaultEntry>, StoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn get_all_decrypted(&self) -> Result<Vec<VaultEntry>, StoreError> {
        let mut entries: Vec<VaultEntry> = self.lock()?.values().cloned().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn create(&self, mut entry: VaultEntry) -> Result<Uuid, StoreError> {
        let id = self
            .write_blocking(move |aes_key, dir, by_id| {
                let mut id = Uuid::new_v4();
                while by_id.contains_key(&id) {
                    id = Uuid::new_v4();
                }
                entry.id = id;
                disk::write_entry(aes_key, dir, &entry)?;
                by_id.insert(id, entry);
                Ok(id)
            })
            .await?;
        tracing::debug!(%id, "Vault entry created");
        Ok(id)
    }

    async fn update(&self, entry: VaultEntry) -> Result<(), StoreError> {
        self.write_blocking(move |aes_key, dir, by_id| {
            if !by_id.contains_key(&entry.id) {
                return Err(StoreError::NotFound);
            }
            disk::write_entry(aes_key, dir, &entry)?;
            by_id.insert(entry.id, entry);
            Ok(())
        })
        .await
    }
}
