use std::path::PathBuf;
use std::time::Duration;

use crate::webauthn::AttestationFormat;

pub const AAGUID: [u8; 16] = [
    0x6e, 0x82, 0x48, 0xd5, 0xb4, 0x79, 0x40, 0xdb, 0xa3, 0xd8, 0x11, 0x11, 0x6f, 0x7e, 0x83, 0x49,
];

/// COSE algorithm identifier for ECDSA w/ SHA-256.
pub const ES256: i64 = -7;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const MIN_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "vaultauthn", about = "Software WebAuthn authenticator backed by an encrypted vault")]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Vault directory. Defaults to the XDG data dir.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    #[arg(long, default_value = "pinentry", global = true)]
    pub pinentry: String,
    /// Per-operation timeout; clamped to [30, 600].
    #[arg(long, default_value_t = 120, global = true)]
    pub timeout_secs: u64,
    #[arg(long, value_enum, default_value_t = AttestationFormat::None, global = true)]
    pub attestation: AttestationFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a new credential (MakeCredential).
    Register {
        #[arg(long)]
        rp_id: String,
        #[arg(long)]
        rp_name: Option<String>,
        #[arg(long)]
        user_name: String,
        #[arg(long)]
        display_name: Option<String>,
        /// Store as a discoverable (resident) credential.
        #[arg(long)]
        resident: bool,
        #[arg(long, default_value = "")]
        origin: String,
    },
    /// Produce an assertion (GetAssertion).
    Assert {
        #[arg(long)]
        rp_id: String,
        /// base64url non-discoverable credential id; repeatable. Omit to use passkeys.
        #[arg(long = "allow")]
        allow: Vec<String>,
        /// base64url challenge. Random if omitted.
        #[arg(long)]
        challenge: Option<String>,
        #[arg(long, default_value = "")]
        origin: String,
    },
    /// Add a plain login entry that a non-resident credential can attach to.
    AddLogin {
        #[arg(long)]
        name: String,
    },
    /// List vault entries.
    List,
    /// Delete every vault entry and the vault key, then exit.
    Wipe,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn vault_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let dirs = directories::ProjectDirs::from("", "", "vaultauthn")
            .ok_or_else(|| anyhow::anyhow!("cannot determine XDG data dir"))?;
        Ok(dirs.data_dir().to_path_buf())
    }
}
