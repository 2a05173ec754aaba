use sha2::{Digest, Sha256};

use crate::keys::COSE_EC2_KEY_LEN;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AuthenticatorDataFlags: u8 {
        const USER_PRESENT             = 0x01;
        const USER_VERIFIED            = 0x04;
        const ATTESTED_CREDENTIAL_DATA = 0x40;
        const EXTENSION_DATA           = 0x80;
    }
}

/// rpIdHash (32) + flags (1) + signCount (4)
pub const AUTH_DATA_BASE_LEN: usize = 37;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid:                [u8; 16],
    credential_id:             Vec<u8>,
    pub credential_public_key: [u8; COSE_EC2_KEY_LEN],
}

impl AttestedCredentialData {
    /// Returns `None` if the credential id does not fit the 16-bit length prefix.
    pub fn new(
        aaguid: [u8; 16],
        credential_id: Vec<u8>,
        credential_public_key: [u8; COSE_EC2_KEY_LEN],
    ) -> Option<Self> {
        u16::try_from(credential_id.len()).ok()?;
        Some(Self { aaguid, credential_id, credential_public_key })
    }

    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags:      AuthenticatorDataFlags,
    pub sign_count: u32,
    pub attested:   Option<AttestedCredentialData>,
}

impl AuthenticatorData {
    /// authenticatorData for MakeCredential (UP=1, AT=1).
    pub fn for_registration(rp_id: &str, sign_count: u32, attested: AttestedCredentialData) -> Self {
        Self {
            rp_id_hash: rp_id_hash(rp_id),
            flags: AuthenticatorDataFlags::USER_PRESENT,
            sign_count,
            attested: Some(attested),
        }
    }

    /// authenticatorData for GetAssertion (UP=1).
    pub fn for_assertion(rp_id: &str, sign_count: u32) -> Self {
        Self {
            rp_id_hash: rp_id_hash(rp_id),
            flags: AuthenticatorDataFlags::USER_PRESENT,
            sign_count,
            attested: None,
        }
    }

    /// Serialize: rpIdHash ‖ flags ‖ signCount(BE32) ‖ [aaguid ‖ credIdLen(BE16) ‖ credId ‖ COSE key].
    /// The AT flag always reflects whether attested credential data follows; extension data is
    /// never emitted, so ED is always cleared.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = self.flags;
        flags.set(AuthenticatorDataFlags::ATTESTED_CREDENTIAL_DATA, self.attested.is_some());
        flags.remove(AuthenticatorDataFlags::EXTENSION_DATA);

        let extra = self
            .attested
            .as_ref()
            .map_or(0, |a| 16 + 2 + a.credential_id.len() + COSE_EC2_KEY_LEN);
        let mut data = Vec::with_capacity(AUTH_DATA_BASE_LEN + extra);
        data.extend_from_slice(&self.rp_id_hash);
        data.push(flags.bits());
        data.extend_from_slice(&self.sign_count.to_be_bytes());
        if let Some(attested) = &self.attested {
            // length checked in AttestedCredentialData::new
            let cred_id_len = attested.credential_id.len() as u16;
            data.extend_from_slice(&attested.aaguid);
            data.extend_from_slice(&cred_id_len.to_be_bytes());
            data.extend_from_slice(&attested.credential_id);
            data.extend_from_slice(&attested.credential_public_key);
        }
        data
    }
}

pub fn rp_id_hash(rp_id: &str) -> [u8; 32] {
    Sha256::digest(rp_id.as_bytes()).into()
}

/// Wall-clock epoch seconds truncated to 32 bits.
///
/// Increases within a session, which is all relying parties check for. This is
/// not a cryptographically secure counter.
pub fn sign_counter_now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

/// Next counter value for a credential whose stored counter is `stored`. Never decreases.
pub fn next_sign_count(stored: u32) -> u32 {
    stored.saturating_add(1).max(sign_counter_now())
}
