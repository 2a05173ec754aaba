use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ciborium::value::Value;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::resolver::StoredCredential;
use super::types::AttestationFormat;
use crate::cbor::{encode, int, text};
use crate::config::ES256;
use crate::keys::{self, KeyError, KeyPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceremony {
    Create,
    Get,
}

impl Ceremony {
    fn as_str(self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }
}

/// The collected client data, serialized to `clientDataJSON`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientData<'a> {
    #[serde(rename = "type")]
    kind:         &'static str,
    challenge:    String,
    origin:       &'a str,
    cross_origin: bool,
}

impl<'a> ClientData<'a> {
    pub fn new(ceremony: Ceremony, challenge: &[u8], origin: &'a str) -> Self {
        Self {
            kind: ceremony.as_str(),
            challenge: URL_SAFE_NO_PAD.encode(challenge),
            origin,
            cross_origin: false,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

pub fn client_data_hash(client_data_json: &[u8]) -> [u8; 32] {
    Sha256::digest(client_data_json).into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatement {
    None,
    /// Self attestation: DER signature by the credential key itself.
    Packed { sig: Vec<u8> },
}

impl AttestationStatement {
    pub fn new(
        format: AttestationFormat,
        key: &KeyPair,
        auth_data: &[u8],
        client_data_hash: &[u8; 32],
    ) -> Result<Self, KeyError> {
        match format {
            AttestationFormat::None => Ok(Self::None),
            AttestationFormat::Packed => {
                let mut to_sign = Vec::with_capacity(auth_data.len() + 32);
                to_sign.extend_from_slice(auth_data);
                to_sign.extend_from_slice(client_data_hash);
                let sig = keys::raw_to_der(&key.sign(&to_sign))?;
                Ok(Self::Packed { sig })
            }
        }
    }

    pub fn format(&self) -> AttestationFormat {
        match self {
            Self::None => AttestationFormat::None,
            Self::Packed { .. } => AttestationFormat::Packed,
        }
    }

    fn to_cbor(&self) -> Value {
        match self {
            Self::None => Value::Map(Vec::new()),
            Self::Packed { sig } => Value::Map(vec![
                (text("alg"), int(ES256)),
                (text("sig"), Value::Bytes(sig.clone())),
            ]),
        }
    }
}

/// Encode `{fmt, attStmt, authData}` with text keys.
pub fn build_attestation_object(
    auth_data: &[u8],
    statement: &AttestationStatement,
) -> Result<Vec<u8>, String> {
    let map = Value::Map(vec![
        (text("fmt"), text(statement.format().as_str())),
        (text("attStmt"), statement.to_cbor()),
        (text("authData"), Value::Bytes(auth_data.to_vec())),
    ]);
    encode(&map)
}

/// Result of GetAssertion, handed back unserialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    pub credential_id:      Vec<u8>,
    pub client_data_json:   Vec<u8>,
    pub authenticator_data: Vec<u8>,
    /// DER-encoded ECDSA signature over `authenticatorData ‖ SHA-256(clientDataJSON)`.
    pub signature:          Vec<u8>,
    pub user_handle:        Vec<u8>,
}

impl AssertionResult {
    pub fn for_get(
        credential: &StoredCredential,
        authenticator_data: Vec<u8>,
        signature: Vec<u8>,
        client_data_json: Vec<u8>,
    ) -> Self {
        Self {
            credential_id: credential.credential_id.clone(),
            client_data_json,
            authenticator_data,
            signature,
            user_handle: credential.key.user_handle.clone(),
        }
    }
}
