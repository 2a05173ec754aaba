#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use vaultauthn::prompt::{NewCredentialInfo, VerificationPrompter};
use vaultauthn::store::{
    CredentialStore, Fido2Key, KeyAlgorithm, KeyCurve, StoreError, VaultEntry,
};
use vaultauthn::webauthn::{
    AbortToken, Authenticator, AuthenticatorOptions, GetAssertionParams, MakeCredentialParams,
    PublicKeyAlgorithm, RelyingParty, UserEntity,
};

#[derive(Default)]
pub struct FakeStore {
    entries:         Mutex<Vec<VaultEntry>>,
    pub creates:     AtomicUsize,
    pub updates:     AtomicUsize,
    pub fail_writes: AtomicBool,
}

impl FakeStore {
    pub fn entries(&self) -> Vec<VaultEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Insert directly, bypassing the counters.
    pub fn insert(&self, mut entry: VaultEntry) -> Uuid {
        entry.id = Uuid::new_v4();
        let id = entry.id;
        self.entries.lock().unwrap().push(entry);
        id
    }

    pub fn entry(&self, id: Uuid) -> Option<VaultEntry> {
        self.entries().into_iter().find(|e| e.id == id)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FakeStore {
    async fn get(&self, id: Uuid) -> Result<Option<VaultEntry>, StoreError> {
        Ok(self.entry(id))
    }

    async fn get_all_decrypted(&self) -> Result<Vec<VaultEntry>, StoreError> {
        Ok(self.entries())
    }

    async fn create(&self, entry: VaultEntry) -> Result<Uuid, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        Ok(self.insert(entry))
    }

    async fn update(&self, entry: VaultEntry) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        let mut entries = self.entries.lock().unwrap();
        let slot = entries.iter_mut().find(|e| e.id == entry.id).ok_or(StoreError::NotFound)?;
        *slot = entry;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    #[default]
    First,
    Decline,
    Outsider,
}

#[derive(Default)]
pub struct FakePrompter {
    pub confirm_new:    bool,
    pub attach_to:      Option<Uuid>,
    pub pick:           Pick,
    /// Every prompt hangs until aborted.
    pub pending:        bool,
    pub confirms:       AtomicUsize,
    pub attaches:       AtomicUsize,
    pub informs:        AtomicUsize,
    pub picks:          AtomicUsize,
    pub last_info:      Mutex<Option<NewCredentialInfo>>,
    pub last_excluded:  Mutex<Vec<Uuid>>,
    pub last_offered:   Mutex<Vec<Uuid>>,
}

impl FakePrompter {
    pub fn accepting() -> Self {
        Self { confirm_new: true, ..Self::default() }
    }

    pub fn prompts(&self) -> usize {
        self.confirms.load(Ordering::SeqCst)
            + self.attaches.load(Ordering::SeqCst)
            + self.informs.load(Ordering::SeqCst)
            + self.picks.load(Ordering::SeqCst)
    }

    async fn hang_if_pending(&self) {
        if self.pending {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl VerificationPrompter for FakePrompter {
    async fn confirm_new_credential(&self, info: &NewCredentialInfo, _abort: &AbortToken) -> bool {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        *self.last_info.lock().unwrap() = Some(info.clone());
        self.hang_if_pending().await;
        self.confirm_new
    }

    async fn confirm_new_non_discoverable_credential(
        &self,
        info: &NewCredentialInfo,
        _abort: &AbortToken,
    ) -> Option<Uuid> {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        *self.last_info.lock().unwrap() = Some(info.clone());
        self.hang_if_pending().await;
        self.attach_to
    }

    async fn inform_excluded_credential(
        &self,
        existing: &[Uuid],
        info: &NewCredentialInfo,
        _abort: &AbortToken,
    ) {
        self.informs.fetch_add(1, Ordering::SeqCst);
        *self.last_info.lock().unwrap() = Some(info.clone());
        *self.last_excluded.lock().unwrap() = existing.to_vec();
        self.hang_if_pending().await;
    }

    async fn pick_credential(&self, candidates: &[Uuid], _abort: &AbortToken) -> Option<Uuid> {
        self.picks.fetch_add(1, Ordering::SeqCst);
        *self.last_offered.lock().unwrap() = candidates.to_vec();
        self.hang_if_pending().await;
        match self.pick {
            Pick::First => candidates.first().copied(),
            Pick::Decline => None,
            Pick::Outsider => Some(Uuid::new_v4()),
        }
    }

    async fn confirm_credential(&self, _id: Uuid, _abort: &AbortToken) -> bool {
        self.hang_if_pending().await;
        true
    }
}

pub type TestAuthenticator = Authenticator<Arc<FakeStore>, Arc<FakePrompter>>;

pub fn authenticator(
    store: &Arc<FakeStore>,
    prompter: &Arc<FakePrompter>,
    options: AuthenticatorOptions,
) -> TestAuthenticator {
    Authenticator::new(Arc::clone(store), Arc::clone(prompter), options)
}

pub fn make_params(rp_id: &str, resident: bool) -> MakeCredentialParams {
    MakeCredentialParams {
        rp: RelyingParty { id: rp_id.into(), name: "Example Corp".into() },
        user: UserEntity {
            id:           b"user-handle-1".to_vec(),
            name:         "alice@example.com".into(),
            display_name: "Alice".into(),
        },
        algorithms: vec![PublicKeyAlgorithm::Es256],
        exclude_list: Vec::new(),
        require_resident_key: resident,
        require_user_verification: false,
        challenge: vec![0x5A; 32],
        origin: format!("https://{rp_id}"),
    }
}

pub fn assertion_params(rp_id: &str) -> GetAssertionParams {
    GetAssertionParams {
        rp_id: rp_id.into(),
        allow_list: Vec::new(),
        require_user_verification: false,
        challenge: vec![0xC3; 32],
        origin: format!("https://{rp_id}"),
    }
}

pub fn fido2_key(rp_id: &str, non_discoverable_id: Option<Uuid>, counter: u32) -> Fido2Key {
    let key_value = vaultauthn::keys::generate_key_pair().to_pkcs8_der().unwrap();
    Fido2Key {
        non_discoverable_id,
        key_algorithm: KeyAlgorithm::Ecdsa,
        key_curve: KeyCurve::P256,
        key_value,
        rp_id: rp_id.into(),
        rp_name: rp_id.into(),
        user_handle: b"stored-user".to_vec(),
        user_name: "bob".into(),
        counter,
        origin: String::new(),
    }
}

/// `authData` bytes out of a CBOR attestationObject.
pub fn auth_data_of(attestation_object: &[u8]) -> Vec<u8> {
    let value: ciborium::value::Value = ciborium::from_reader(attestation_object).unwrap();
    let map = value.into_map().unwrap();
    map.into_iter()
        .find(|(k, _)| k.as_text() == Some("authData"))
        .and_then(|(_, v)| v.into_bytes().ok())
        .unwrap()
}

pub fn fmt_of(attestation_object: &[u8]) -> String {
    let value: ciborium::value::Value = ciborium::from_reader(attestation_object).unwrap();
    let map = value.into_map().unwrap();
    map.into_iter()
        .find(|(k, _)| k.as_text() == Some("fmt"))
        .and_then(|(_, v)| v.into_text().ok())
        .unwrap()
}
