use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticatorError {
    #[error("unsupported algorithm")]     UnsupportedAlgorithm,
    #[error("malformed input")]           MalformedInput,
    #[error("constraint unsatisfied")]    ConstraintUnsatisfied,
    #[error("operation not allowed")]     NotAllowed,
    #[error("no credential found")]       NoCredentialFound,
    #[error("timed out or aborted")]      TimeoutAborted,
    #[error("unknown error")]             Unknown,
}

impl AuthenticatorError {
    /// Name of the DOMException the browser surfaces to the relying party.
    pub fn dom_exception_name(&self) -> &'static str {
        match self {
            Self::UnsupportedAlgorithm  => "NotSupportedError",
            Self::MalformedInput        => "TypeError",
            Self::ConstraintUnsatisfied => "ConstraintError",
            Self::NotAllowed            => "NotAllowedError",
            Self::NoCredentialFound     => "NotAllowedError",
            Self::TimeoutAborted        => "AbortError",
            Self::Unknown               => "UnknownError",
        }
    }
}

/// Log an internal failure and collapse it to [`AuthenticatorError::Unknown`].
pub(crate) fn internal<E: std::fmt::Display>(
    context: &'static str,
) -> impl FnOnce(E) -> AuthenticatorError {
    move |e| {
        tracing::warn!(error = %e, "{context} failed");
        AuthenticatorError::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    Es256,
    Es384,
    EdDsa,
    Rs256,
}

impl PublicKeyAlgorithm {
    pub fn cose_id(self) -> i64 {
        match self {
            Self::Es256 => crate::config::ES256,
            Self::Es384 => -35,
            Self::EdDsa => -8,
            Self::Rs256 => -257,
        }
    }

    pub fn from_cose_id(id: i64) -> Option<Self> {
        [Self::Es256, Self::Es384, Self::EdDsa, Self::Rs256]
            .into_iter()
            .find(|alg| alg.cose_id() == id)
    }

    pub fn is_supported(self) -> bool {
        match self {
            Self::Es256 => true,
            Self::Es384 | Self::EdDsa | Self::Rs256 => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum AttestationFormat {
    #[default]
    None,
    Packed,
}

impl AttestationFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Packed => "packed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    pub id:   String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    pub id:           Vec<u8>,
    pub name:         String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    pub id:         Vec<u8>,
    pub transports: Vec<String>,
}

impl CredentialDescriptor {
    pub fn new(id: impl Into<Vec<u8>>) -> Self {
        Self { id: id.into(), transports: Vec::new() }
    }
}

#[derive(Debug, Clone)]
pub struct MakeCredentialParams {
    pub rp:                        RelyingParty,
    pub user:                      UserEntity,
    pub algorithms:                Vec<PublicKeyAlgorithm>,
    pub exclude_list:              Vec<CredentialDescriptor>,
    pub require_resident_key:      bool,
    pub require_user_verification: bool,
    pub challenge:                 Vec<u8>,
    pub origin:                    String,
}

#[derive(Debug, Clone)]
pub struct GetAssertionParams {
    pub rp_id:                     String,
    pub allow_list:                Vec<CredentialDescriptor>,
    pub require_user_verification: bool,
    pub challenge:                 Vec<u8>,
    pub origin:                    String,
}

// JSON parsing helpers. Binary members travel as base64url strings.

fn as_object(v: &Value) -> Result<&Map<String, Value>, AuthenticatorError> {
    v.as_object().ok_or(AuthenticatorError::MalformedInput)
}

fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String, AuthenticatorError> {
    present(obj, key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AuthenticatorError::MalformedInput)
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Result<String, AuthenticatorError> {
    match present(obj, key) {
        None => Ok(String::new()),
        Some(v) => v.as_str().map(str::to_string).ok_or(AuthenticatorError::MalformedInput),
    }
}

fn optional_bool(obj: &Map<String, Value>, key: &str) -> Result<bool, AuthenticatorError> {
    match present(obj, key) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(AuthenticatorError::MalformedInput),
    }
}

fn b64(v: &Value) -> Result<Vec<u8>, AuthenticatorError> {
    let s = v.as_str().ok_or(AuthenticatorError::MalformedInput)?;
    URL_SAFE_NO_PAD
        .decode(s.trim_end_matches('='))
        .map_err(|_| AuthenticatorError::MalformedInput)
}

fn descriptors(
    obj: &Map<String, Value>,
    key: &str,
) -> Result<Vec<CredentialDescriptor>, AuthenticatorError> {
    let Some(list) = present(obj, key) else {
        return Ok(Vec::new());
    };
    let list = list.as_array().ok_or(AuthenticatorError::MalformedInput)?;
    list.iter()
        .map(|item| {
            let m = as_object(item)?;
            let id = b64(present(m, "id").ok_or(AuthenticatorError::MalformedInput)?)?;
            let transports = present(m, "transports")
                .and_then(Value::as_array)
                .map(|t| t.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            Ok(CredentialDescriptor { id, transports })
        })
        .collect()
}

impl TryFrom<&Value> for MakeCredentialParams {
    type Error = AuthenticatorError;

    /// Checks run in protocol order: algorithms, option types, then members.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let map = as_object(value)?;

        // credTypesAndPubKeyAlgs: unknown identifiers are skipped
        let algorithms: Vec<PublicKeyAlgorithm> = present(map, "credTypesAndPubKeyAlgs")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|p| p.get("alg").and_then(Value::as_i64))
                    .filter_map(PublicKeyAlgorithm::from_cose_id)
                    .collect()
            })
            .unwrap_or_default();
        if !algorithms.iter().any(|a| a.is_supported()) {
            return Err(AuthenticatorError::UnsupportedAlgorithm);
        }

        let require_resident_key = optional_bool(map, "requireResidentKey")?;
        let require_user_verification = optional_bool(map, "requireUserVerification")?;

        let rp_map = as_object(present(map, "rp").ok_or(AuthenticatorError::MalformedInput)?)?;
        let rp = RelyingParty {
            id:   required_str(rp_map, "id")?,
            name: optional_str(rp_map, "name")?,
        };

        let user_map = as_object(present(map, "user").ok_or(AuthenticatorError::MalformedInput)?)?;
        let user = UserEntity {
            id:           b64(present(user_map, "id").ok_or(AuthenticatorError::MalformedInput)?)?,
            name:         optional_str(user_map, "name")?,
            display_name: optional_str(user_map, "displayName")?,
        };

        let exclude_list = descriptors(map, "excludeCredentialDescriptorList")?;
        let challenge = present(map, "challenge").map(b64).transpose()?.unwrap_or_default();
        let origin = optional_str(map, "origin")?;

        Ok(MakeCredentialParams {
            rp,
            user,
            algorithms,
            exclude_list,
            require_resident_key,
            require_user_verification,
            challenge,
            origin,
        })
    }
}

impl TryFrom<&Value> for GetAssertionParams {
    type Error = AuthenticatorError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let map = as_object(value)?;

        let require_user_verification = optional_bool(map, "requireUserVerification")?;
        let rp_id = required_str(map, "rpId")?;
        let allow_list = descriptors(map, "allowCredentialDescriptorList")?;
        let challenge = b64(present(map, "challenge").ok_or(AuthenticatorError::MalformedInput)?)?;
        let origin = optional_str(map, "origin")?;

        Ok(GetAssertionParams { rp_id, allow_list, require_user_verification, challenge, origin })
    }
}
