pub(crate) mod cbor;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod keys;
pub mod prompt;
pub mod store;
pub mod webauthn;

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use config::{Command, Config};
use prompt::{PinentryPrompter, PromptEntry};
use store::{CredentialStore, DiskVault, EntryKind, VaultEntry};
use webauthn::{
    AbortToken, Authenticator, AuthenticatorOptions, Ceremony, ClientData, CredentialDescriptor,
    GetAssertionParams, MakeCredentialParams, PublicKeyAlgorithm, RelyingParty, UserEntity,
};

const VAULT_KEY_FILE: &str = "vault.key";
const ENTRIES_DIR: &str = "entries";

pub async fn run(cfg: Config) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let level = match cfg.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .init();

    // Preflight checks
    diagnostics::check(&cfg)?;

    let data_dir = cfg.vault_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    // Single-writer lock on the vault for the whole command
    let lock_path = data_dir.join("vaultauthn.lock");
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = lock
        .try_write()
        .map_err(|_| anyhow::anyhow!("vault is in use by another process (lock: {})", lock_path.display()))?;

    if matches!(cfg.command, Command::Wipe) {
        return wipe(&data_dir);
    }

    let aes_key = load_or_create_vault_key(&data_dir.join(VAULT_KEY_FILE))?;
    let vault = Arc::new(
        DiskVault::load(aes_key, data_dir.join(ENTRIES_DIR))
            .map_err(|e| anyhow::anyhow!("Failed to load vault: {e}"))?,
    );
    tracing::info!(count = vault.entry_count(), dir = %data_dir.display(), "Vault loaded");

    match cfg.command.clone() {
        Command::Register { rp_id, rp_name, user_name, display_name, resident, origin } => {
            let params = MakeCredentialParams {
                rp: RelyingParty {
                    name: rp_name.unwrap_or_else(|| rp_id.clone()),
                    id:   rp_id,
                },
                user: UserEntity {
                    id:           random_bytes(16),
                    display_name: display_name.unwrap_or_else(|| user_name.clone()),
                    name:         user_name,
                },
                algorithms: vec![PublicKeyAlgorithm::Es256],
                exclude_list: Vec::new(),
                require_resident_key: resident,
                require_user_verification: false,
                challenge: random_bytes(32),
                origin,
            };
            cmd_register(&cfg, vault, &params).await?;
        }
        Command::Assert { rp_id, allow, challenge, origin } => {
            let allow_list = allow
                .iter()
                .map(|id| URL_SAFE_NO_PAD.decode(id).map(CredentialDescriptor::new))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("invalid --allow id: {e}"))?;
            let challenge = match challenge {
                Some(c) => URL_SAFE_NO_PAD
                    .decode(c)
                    .map_err(|e| anyhow::anyhow!("invalid --challenge: {e}"))?,
                None => random_bytes(32),
            };
            let params = GetAssertionParams {
                rp_id,
                allow_list,
                require_user_verification: false,
                challenge,
                origin,
            };
            cmd_assert(&cfg, vault, &params).await?;
        }
        Command::AddLogin { name } => {
            let id = vault.create(VaultEntry::new_login(name)).await?;
            println!("{id}");
        }
        Command::List => cmd_list(vault.as_ref()).await?,
        Command::Wipe => {} // handled before the vault is opened
    }
    Ok(())
}

fn authenticator(
    cfg: &Config,
    vault: Arc<DiskVault>,
    entries: Vec<PromptEntry>,
) -> Authenticator<Arc<DiskVault>, PinentryPrompter> {
    let options = AuthenticatorOptions {
        attestation_format: cfg.attestation,
        ..AuthenticatorOptions::default()
    };
    Authenticator::new(vault, PinentryPrompter::new(cfg.pinentry.clone(), entries), options)
}

async fn prompt_entries(vault: &DiskVault) -> error::Result<Vec<PromptEntry>> {
    let entries = vault.get_all_decrypted().await?;
    Ok(entries
        .into_iter()
        .filter(|e| !e.is_deleted())
        .map(|e| PromptEntry {
            attachable: e.kind == EntryKind::Login && e.fido2_key.is_none(),
            name: match &e.fido2_key {
                Some(key) => format!("{} ({} @ {})", e.name, key.user_name, key.rp_id),
                None => e.name.clone(),
            },
            id: e.id,
        })
        .collect())
}

async fn cmd_register(cfg: &Config, vault: Arc<DiskVault>, params: &MakeCredentialParams) -> error::Result<()> {
    let entries = prompt_entries(&vault).await?;
    let auth = authenticator(cfg, vault, entries);
    let abort = AbortToken::with_timeout(cfg.timeout());

    let attestation_object = auth.make_credential(params, &abort).await?;
    let client_data_json = ClientData::new(Ceremony::Create, &params.challenge, &params.origin)
        .to_json()
        .map_err(|e| error::Error::Internal(e.to_string()))?;

    if let Some(id) = credential_id(&attestation_object) {
        println!("credentialId:      {}", URL_SAFE_NO_PAD.encode(id));
    }
    println!("clientDataJSON:    {}", String::from_utf8_lossy(&client_data_json));
    println!("attestationObject: {}", URL_SAFE_NO_PAD.encode(&attestation_object));
    Ok(())
}

async fn cmd_assert(cfg: &Config, vault: Arc<DiskVault>, params: &GetAssertionParams) -> error::Result<()> {
    let entries = prompt_entries(&vault).await?;
    let auth = authenticator(cfg, vault, entries);
    let abort = AbortToken::with_timeout(cfg.timeout());

    let result = auth.get_assertion(params, &abort).await?;
    println!("credentialId:      {}", URL_SAFE_NO_PAD.encode(&result.credential_id));
    println!("clientDataJSON:    {}", String::from_utf8_lossy(&result.client_data_json));
    println!("authenticatorData: {}", URL_SAFE_NO_PAD.encode(&result.authenticator_data));
    println!("signature:         {}", URL_SAFE_NO_PAD.encode(&result.signature));
    println!("userHandle:        {}", URL_SAFE_NO_PAD.encode(&result.user_handle));
    Ok(())
}

async fn cmd_list(vault: &DiskVault) -> error::Result<()> {
    for entry in vault.get_all_decrypted().await? {
        let state = if entry.is_deleted() { " [deleted]" } else { "" };
        match &entry.fido2_key {
            Some(key) => println!(
                "{} {:?} {}: {} @ {} (counter {}){state}",
                entry.id, entry.kind, entry.name, key.user_name, key.rp_id, key.counter
            ),
            None => println!("{} {:?} {}{state}", entry.id, entry.kind, entry.name),
        }
    }
    Ok(())
}

/// Credential id from the attested data inside an attestationObject.
fn credential_id(attestation_object: &[u8]) -> Option<Vec<u8>> {
    let map = cbor::parse_map(attestation_object).ok()?;
    let auth_data = cbor::get_str(&map, "authData").and_then(cbor::as_bytes)?;
    // rpIdHash(32) flags(1) signCount(4) aaguid(16)
    let len_bytes = auth_data.get(53..55)?;
    let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    auth_data.get(55..55 + len).map(<[u8]>::to_vec)
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

pub fn wipe(data_dir: &Path) -> anyhow::Result<()> {
    let entries_dir = data_dir.join(ENTRIES_DIR);
    let mut count = 0usize;
    if entries_dir.exists() {
        for entry in std::fs::read_dir(&entries_dir)? {
            std::fs::remove_file(entry?.path())?;
            count += 1;
        }
    }
    println!("Deleted {count} vault entr(ies) from {}", entries_dir.display());

    let key_path = data_dir.join(VAULT_KEY_FILE);
    if key_path.exists() {
        std::fs::remove_file(&key_path)?;
        println!("Vault key deleted (a new one is created on next use)");
    }
    Ok(())
}

/// Read the 32-byte vault key, creating it on first use.
pub fn load_or_create_vault_key(path: &Path) -> error::Result<[u8; 32]> {
    if path.exists() {
        let blob = std::fs::read(path)?;
        return <[u8; 32]>::try_from(blob.as_slice())
            .map_err(|_| error::Error::Internal(format!("{} is not a 32-byte key", path.display())));
    }

    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    std::io::Write::write_all(&mut file, &key)?;
    file.sync_all()?;
    tracing::info!(path = %path.display(), "Vault key created");
    Ok(key)
}
