use super::abort::AbortToken;
use super::attestation::{client_data_hash, AssertionResult, Ceremony, ClientData};
use super::authenticator::Authenticator;
use super::authenticator_data::{next_sign_count, AuthenticatorData};
use super::resolver::CredentialResolver;
use super::types::{internal, AuthenticatorError, GetAssertionParams};
use crate::keys::{self, KeyError, KeyPair};
use crate::prompt::VerificationPrompter;
use crate::store::CredentialStore;

/// Sign `authData ‖ clientDataHash` with a PKCS#8 key; DER output.
fn sign_assertion(key_value: &[u8], auth_data: &[u8], client_data_hash: &[u8; 32]) -> Result<Vec<u8>, KeyError> {
    let key_pair = KeyPair::from_pkcs8_der(key_value)?;
    let mut to_sign = Vec::with_capacity(auth_data.len() + 32);
    to_sign.extend_from_slice(auth_data);
    to_sign.extend_from_slice(client_data_hash);
    keys::raw_to_der(&key_pair.sign(&to_sign))
}

pub(crate) async fn handle_get_assertion<S, P>(
    auth: &Authenticator<S, P>,
    params: &GetAssertionParams,
    abort: &AbortToken,
) -> Result<AssertionResult, AuthenticatorError>
where
    S: CredentialStore,
    P: VerificationPrompter,
{
    if params.require_user_verification {
        return Err(AuthenticatorError::ConstraintUnsatisfied);
    }

    let _op = abort.guard(auth.operation_lock.lock()).await?;

    let resolver = CredentialResolver::new(&auth.store);
    let candidates = if !params.allow_list.is_empty() {
        abort.guard(resolver.resolve_allowed(&params.allow_list, &params.rp_id)).await?
    } else {
        abort.guard(resolver.resolve_discoverable(&params.rp_id)).await?
    }
    .map_err(internal("credential lookup"))?;

    if candidates.is_empty() {
        tracing::info!(rp_id = %params.rp_id, "No matching credential");
        return Err(AuthenticatorError::NoCredentialFound);
    }

    // explicit selection even for a single candidate: it is the presence check
    let ids: Vec<_> = candidates.iter().map(|c| c.entry_id).collect();
    let Some(chosen) = abort.guard(auth.prompter.pick_credential(&ids, abort)).await? else {
        tracing::info!(rp_id = %params.rp_id, "User declined assertion");
        return Err(AuthenticatorError::NotAllowed);
    };
    let Some(credential) = candidates.into_iter().find(|c| c.entry_id == chosen) else {
        tracing::warn!(%chosen, "Prompter picked an entry outside the candidate set");
        return Err(AuthenticatorError::NotAllowed);
    };

    // Re-read so the counter reflects the latest persisted value.
    let mut entry = abort
        .guard(auth.store.get(credential.entry_id))
        .await?
        .map_err(internal("vault read"))?
        .ok_or_else(|| internal("vault read")(format!("entry {chosen} vanished")))?;
    let fido2_key = entry
        .fido2_key
        .as_mut()
        .ok_or_else(|| internal("vault read")(format!("entry {chosen} lost its credential")))?;
    let sign_count = next_sign_count(fido2_key.counter);
    fido2_key.counter = sign_count;
    let key_value = fido2_key.key_value.clone();
    abort
        .guard(auth.store.update(entry))
        .await?
        .map_err(internal("counter update"))?;

    let client_data_json = ClientData::new(Ceremony::Get, &params.challenge, &params.origin)
        .to_json()
        .map_err(internal("clientDataJSON encoding"))?;
    let cdh = client_data_hash(&client_data_json);
    let auth_data = AuthenticatorData::for_assertion(&params.rp_id, sign_count).to_bytes();

    let to_sign = auth_data.clone();
    let signature = abort
        .guard(tokio::task::spawn_blocking(move || sign_assertion(&key_value, &to_sign, &cdh)))
        .await?
        .map_err(internal("signing task"))?
        .map_err(internal("signing"))?;

    tracing::info!(
        rp_id = %params.rp_id,
        discoverable = credential.discoverable,
        sign_count,
        "Assertion produced"
    );
    Ok(AssertionResult::for_get(&credential, auth_data, signature, client_data_json))
}
