use tokio::sync::Mutex;

use super::abort::AbortToken;
use super::attestation::AssertionResult;
use super::types::{AttestationFormat, AuthenticatorError, GetAssertionParams, MakeCredentialParams};
use super::{get_assertion, make_credential};
use crate::keys::{self, KeyPair};
use crate::prompt::VerificationPrompter;
use crate::store::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorOptions {
    pub aaguid:             [u8; 16],
    pub attestation_format: AttestationFormat,
}

impl Default for AuthenticatorOptions {
    fn default() -> Self {
        Self {
            aaguid: crate::config::AAGUID,
            attestation_format: AttestationFormat::None,
        }
    }
}

/// Platform authenticator over an injected vault and prompter.
///
/// Operations are serialized: at most one consent prompt is outstanding, so
/// key generation and signing never race on the same credential.
pub struct Authenticator<S, P> {
    pub(crate) store:          S,
    pub(crate) prompter:       P,
    pub(crate) options:        AuthenticatorOptions,
    pub(crate) operation_lock: Mutex<()>,
}

impl<S: CredentialStore, P: VerificationPrompter> Authenticator<S, P> {
    pub fn new(store: S, prompter: P, options: AuthenticatorOptions) -> Self {
        Self {
            store,
            prompter,
            options,
            operation_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &AuthenticatorOptions {
        &self.options
    }

    /// Create a credential and return the CBOR `attestationObject`.
    pub async fn make_credential(
        &self,
        params: &MakeCredentialParams,
        abort: &AbortToken,
    ) -> Result<Vec<u8>, AuthenticatorError> {
        make_credential::handle_make_credential(self, params, abort).await
    }

    pub async fn get_assertion(
        &self,
        params: &GetAssertionParams,
        abort: &AbortToken,
    ) -> Result<AssertionResult, AuthenticatorError> {
        get_assertion::handle_get_assertion(self, params, abort).await
    }
}

/// Key generation off the async runtime, abortable.
pub(crate) async fn generate_key_pair(abort: &AbortToken) -> Result<KeyPair, AuthenticatorError> {
    abort
        .guard(tokio::task::spawn_blocking(keys::generate_key_pair))
        .await?
        .map_err(super::types::internal("key generation"))
}
