pub mod credential;
pub mod disk;
pub mod vault;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

pub use credential::{EntryKind, Fido2Key, KeyAlgorithm, KeyCurve, VaultEntry};
pub use vault::DiskVault;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("Encrypt: {0}")]
    Encryption(String),
    #[error("Corrupt: {0}")]
    Corrupt(String),
    #[error("Not found")]
    NotFound,
    #[error("Lock poisoned")]
    Poisoned,
    #[error("Blocking task: {0}")]
    Task(String),
}

/// The credential vault. Implementations must make each call atomic per entry
/// and durable before returning `Ok`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<VaultEntry>, StoreError>;

    /// Every entry, decrypted. Linear in vault size.
    async fn get_all_decrypted(&self) -> Result<Vec<VaultEntry>, StoreError>;

    /// Persist a new entry; the store assigns and returns its id.
    async fn create(&self, entry: VaultEntry) -> Result<Uuid, StoreError>;

    /// Replace an existing entry, matched by `entry.id`.
    async fn update(&self, entry: VaultEntry) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    async fn get(&self, id: Uuid) -> Result<Option<VaultEntry>, StoreError> {
        (**self).get(id).await
    }

    async fn get_all_decrypted(&self) -> Result<Vec<VaultEntry>, StoreError> {
        (**self).get_all_decrypted().await
    }

    async fn create(&self, entry: VaultEntry) -> Result<Uuid, StoreError> {
        (**self).create(entry).await
    }

    async fn update(&self, entry: VaultEntry) -> Result<(), StoreError> {
        (**self).update(entry).await
    }
}
