use uuid::Uuid;

use super::types::CredentialDescriptor;
use crate::store::{CredentialStore, EntryKind, Fido2Key, StoreError, VaultEntry};

/// A vault entry viewed as a WebAuthn credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    /// Public credential id as seen by the relying party.
    pub credential_id: Vec<u8>,
    pub discoverable:  bool,
    /// Vault entry holding the key. Equal to the public id only when discoverable.
    pub entry_id:      Uuid,
    pub key:           Fido2Key,
}

impl StoredCredential {
    /// `None` for deleted entries and entries without a usable credential.
    pub fn from_entry(entry: &VaultEntry) -> Option<Self> {
        if entry.is_deleted() {
            return None;
        }
        let key = entry.fido2_key.clone()?;
        let (public_id, discoverable) = match entry.kind {
            EntryKind::Passkey => (entry.id, true),
            EntryKind::Login => (key.non_discoverable_id?, false),
        };
        Some(Self {
            credential_id: public_id.as_bytes().to_vec(),
            discoverable,
            entry_id: entry.id,
            key,
        })
    }
}

/// Descriptor ids that are not 16-byte UUIDs can never match and are dropped.
fn descriptor_ids(descriptors: &[CredentialDescriptor]) -> Vec<Uuid> {
    descriptors
        .iter()
        .filter_map(|d| Uuid::from_slice(&d.id).ok())
        .collect()
}

pub struct CredentialResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CredentialStore + ?Sized> CredentialResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    async fn credentials(&self) -> Result<Vec<StoredCredential>, StoreError> {
        let entries = self.store.get_all_decrypted().await?;
        Ok(entries.iter().filter_map(StoredCredential::from_entry).collect())
    }

    /// Public ids of every stored credential named in `exclude_list`,
    /// regardless of relying party.
    pub async fn find_excluded(
        &self,
        exclude_list: &[CredentialDescriptor],
    ) -> Result<Vec<Uuid>, StoreError> {
        let ids = descriptor_ids(exclude_list);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let hits: Vec<Uuid> = self
            .credentials()
            .await?
            .into_iter()
            .filter_map(|c| Uuid::from_slice(&c.credential_id).ok())
            .filter(|public_id| ids.contains(public_id))
            .collect();
        tracing::debug!(requested = ids.len(), matched = hits.len(), "Exclude list resolved");
        Ok(hits)
    }

    pub async fn is_excluded(&self, exclude_list: &[CredentialDescriptor]) -> Result<bool, StoreError> {
        Ok(!self.find_excluded(exclude_list).await?.is_empty())
    }

    /// Non-discoverable credentials for `rp_id` named in `allow_list`, in
    /// allow-list order. Only the first stored match per id is used.
    pub async fn resolve_allowed(
        &self,
        allow_list: &[CredentialDescriptor],
        rp_id: &str,
    ) -> Result<Vec<StoredCredential>, StoreError> {
        let ids = descriptor_ids(allow_list);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let scoped: Vec<StoredCredential> = self
            .credentials()
            .await?
            .into_iter()
            .filter(|c| !c.discoverable && c.key.rp_id == rp_id)
            .collect();

        let mut resolved: Vec<StoredCredential> = Vec::new();
        for id in ids {
            let mut matches = scoped.iter().filter(|c| c.credential_id[..] == id.as_bytes()[..]);
            let Some(first) = matches.next() else { continue };
            let extra = matches.count();
            if extra > 0 {
                tracing::warn!(credential_id = %id, extra, "Multiple vault entries share a credential id; using the first");
            }
            if !resolved.iter().any(|c| c.entry_id == first.entry_id) {
                resolved.push(first.clone());
            }
        }
        tracing::debug!(rp_id, found = resolved.len(), "Allow list resolved");
        Ok(resolved)
    }

    /// Every discoverable credential scoped to `rp_id`.
    pub async fn resolve_discoverable(&self, rp_id: &str) -> Result<Vec<StoredCredential>, StoreError> {
        let found: Vec<StoredCredential> = self
            .credentials()
            .await?
            .into_iter()
            .filter(|c| c.discoverable && c.key.rp_id == rp_id)
            .collect();
        tracing::debug!(rp_id, found = found.len(), "Discoverable credentials resolved");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DiskVault, KeyAlgorithm, KeyCurve};

    fn key(rp_id: &str, non_discoverable_id: Option<Uuid>) -> Fido2Key {
        Fido2Key {
            non_discoverable_id,
            key_algorithm: KeyAlgorithm::Ecdsa,
            key_curve: KeyCurve::P256,
            key_value: Vec::new(),
            rp_id: rp_id.into(),
            rp_name: rp_id.into(),
            user_handle: vec![1, 2, 3],
            user_name: "alice".into(),
            counter: 0,
            origin: String::new(),
        }
    }

    fn login_with_key(rp_id: &str, ndid: Uuid) -> VaultEntry {
        let mut entry = VaultEntry::new_login("login");
        entry.fido2_key = Some(key(rp_id, Some(ndid)));
        entry
    }

    fn vault() -> (tempfile::TempDir, DiskVault) {
        let dir = tempfile::tempdir().unwrap();
        let vault = DiskVault::load([5u8; 32], dir.path().to_path_buf()).unwrap();
        (dir, vault)
    }

    fn desc(id: Uuid) -> CredentialDescriptor {
        CredentialDescriptor::new(id.as_bytes().to_vec())
    }

    #[test]
    fn test_public_id_of_each_kind() {
        let mut passkey = VaultEntry::new_passkey("p", key("example.com", None));
        passkey.id = Uuid::new_v4();
        let cred = StoredCredential::from_entry(&passkey).unwrap();
        assert!(cred.discoverable);
        assert_eq!(cred.credential_id, passkey.id.as_bytes());

        let ndid = Uuid::new_v4();
        let mut login = login_with_key("example.com", ndid);
        login.id = Uuid::new_v4();
        let cred = StoredCredential::from_entry(&login).unwrap();
        assert!(!cred.discoverable);
        assert_eq!(cred.credential_id, ndid.as_bytes());
        assert_ne!(cred.credential_id, login.id.as_bytes());
    }

    #[test]
    fn test_deleted_and_keyless_entries_skipped() {
        let mut deleted = VaultEntry::new_passkey("p", key("example.com", None));
        deleted.deleted_at = Some(1);
        assert!(StoredCredential::from_entry(&deleted).is_none());
        assert!(StoredCredential::from_entry(&VaultEntry::new_login("plain")).is_none());
    }

    #[tokio::test]
    async fn test_find_excluded_matches_both_kinds_any_rp() {
        let (_dir, vault) = vault();
        let passkey_id = vault.create(VaultEntry::new_passkey("p", key("a.com", None))).await.unwrap();
        let ndid = Uuid::new_v4();
        let login_id = vault.create(login_with_key("b.com", ndid)).await.unwrap();
        let resolver = CredentialResolver::new(&vault);

        assert_eq!(resolver.find_excluded(&[desc(passkey_id)]).await.unwrap(), vec![passkey_id]);
        // reported by public id, which for a login is not its entry id
        assert_eq!(resolver.find_excluded(&[desc(ndid)]).await.unwrap(), vec![ndid]);
        // the login entry id itself is not a public credential id
        assert!(!resolver.is_excluded(&[desc(login_id)]).await.unwrap());
        assert!(!resolver.is_excluded(&[CredentialDescriptor::new(vec![1, 2, 3])]).await.unwrap());
        assert!(!resolver.is_excluded(&[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_allowed_scoped_to_rp() {
        let (_dir, vault) = vault();
        let ndid = Uuid::new_v4();
        let entry_id = vault.create(login_with_key("example.com", ndid)).await.unwrap();
        let resolver = CredentialResolver::new(&vault);

        let found = resolver.resolve_allowed(&[desc(ndid)], "example.com").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entry_id, entry_id);
        assert!(resolver.resolve_allowed(&[desc(ndid)], "evil.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_allowed_is_idempotent() {
        let (_dir, vault) = vault();
        let ndid = Uuid::new_v4();
        vault.create(login_with_key("example.com", ndid)).await.unwrap();
        let passkey_id = vault.create(VaultEntry::new_passkey("p", key("example.com", None))).await.unwrap();
        let resolver = CredentialResolver::new(&vault);
        let allow = [desc(passkey_id), desc(ndid), desc(Uuid::new_v4())];

        let first = resolver.resolve_allowed(&allow, "example.com").await.unwrap();
        let second = resolver.resolve_allowed(&allow, "example.com").await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolve_allowed_skips_discoverable() {
        let (_dir, vault) = vault();
        let passkey_id = vault.create(VaultEntry::new_passkey("p", key("example.com", None))).await.unwrap();
        let resolver = CredentialResolver::new(&vault);

        let found = resolver.resolve_allowed(&[desc(passkey_id)], "example.com").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_ids_use_first_match() {
        let (_dir, vault) = vault();
        let ndid = Uuid::new_v4();
        vault.create(login_with_key("example.com", ndid)).await.unwrap();
        vault.create(login_with_key("example.com", ndid)).await.unwrap();
        let resolver = CredentialResolver::new(&vault);

        let found = resolver.resolve_allowed(&[desc(ndid), desc(ndid)], "example.com").await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_discoverable() {
        let (_dir, vault) = vault();
        let a = vault.create(VaultEntry::new_passkey("a", key("example.com", None))).await.unwrap();
        vault.create(VaultEntry::new_passkey("b", key("other.com", None))).await.unwrap();
        vault.create(login_with_key("example.com", Uuid::new_v4())).await.unwrap();
        let resolver = CredentialResolver::new(&vault);

        let found = resolver.resolve_discoverable("example.com").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entry_id, a);
        assert!(resolver.resolve_discoverable("nothing.com").await.unwrap().is_empty());
    }
}
