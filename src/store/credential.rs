use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Password login; may carry a non-discoverable credential.
    Login,
    /// Stand-alone discoverable credential.
    Passkey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Ecdsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCurve {
    P256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fido2Key {
    pub non_discoverable_id: Option<Uuid>, // set only on Login entries
    pub key_algorithm:       KeyAlgorithm,
    pub key_curve:           KeyCurve,
    pub key_value:           Vec<u8>,       // PKCS#8 DER private key
    pub rp_id:               String,
    pub rp_name:             String,
    pub user_handle:         Vec<u8>,
    pub user_name:           String,
    pub counter:             u32,
    pub origin:              String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub version:    u8,
    pub id:         Uuid,           // assigned by the store on create
    pub kind:       EntryKind,
    pub name:       String,
    pub fido2_key:  Option<Fido2Key>,
    pub created_at: u64,            // Unix timestamp
    pub deleted_at: Option<u64>,
}

impl VaultEntry {
    pub const VERSION: u8 = 1;

    pub fn new_login(name: impl Into<String>) -> Self {
        Self::new(EntryKind::Login, name.into(), None)
    }

    pub fn new_passkey(name: impl Into<String>, key: Fido2Key) -> Self {
        Self::new(EntryKind::Passkey, name.into(), Some(key))
    }

    fn new(kind: EntryKind, name: String, fido2_key: Option<Fido2Key>) -> Self {
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            version: Self::VERSION,
            id: Uuid::nil(),
            kind,
            name,
            fido2_key,
            created_at,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
