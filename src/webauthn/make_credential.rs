use std::time::Duration;

use uuid::Uuid;

use super::abort::AbortToken;
use super::attestation::{build_attestation_object, client_data_hash, AttestationStatement, Ceremony, ClientData};
use super::authenticator::{generate_key_pair, Authenticator};
use super::authenticator_data::{AttestedCredentialData, AuthenticatorData};
use super::resolver::CredentialResolver;
use super::types::{internal, AuthenticatorError, MakeCredentialParams};
use crate::keys::KeyPair;
use crate::prompt::{NewCredentialInfo, VerificationPrompter};
use crate::store::{CredentialStore, EntryKind, Fido2Key, KeyAlgorithm, KeyCurve, VaultEntry};

fn new_fido2_key(
    params: &MakeCredentialParams,
    key_pair: &KeyPair,
    non_discoverable_id: Option<Uuid>,
) -> Result<Fido2Key, AuthenticatorError> {
    Ok(Fido2Key {
        non_discoverable_id,
        key_algorithm: KeyAlgorithm::Ecdsa,
        key_curve: KeyCurve::P256,
        key_value: key_pair.to_pkcs8_der().map_err(internal("private key export"))?,
        rp_id: params.rp.id.clone(),
        rp_name: params.rp.name.clone(),
        user_handle: params.user.id.clone(),
        user_name: params.user.name.clone(),
        counter: 0,
        origin: params.origin.clone(),
    })
}

pub(crate) async fn handle_make_credential<S, P>(
    auth: &Authenticator<S, P>,
    params: &MakeCredentialParams,
    abort: &AbortToken,
) -> Result<Vec<u8>, AuthenticatorError>
where
    S: CredentialStore,
    P: VerificationPrompter,
{
    if !params.algorithms.iter().any(|alg| alg.is_supported()) {
        return Err(AuthenticatorError::UnsupportedAlgorithm);
    }
    // presence is all this authenticator can attest to
    if params.require_user_verification {
        return Err(AuthenticatorError::ConstraintUnsatisfied);
    }

    let _op = abort.guard(auth.operation_lock.lock()).await?;

    let info = NewCredentialInfo {
        credential_name: params.rp.name.clone(),
        user_name:       params.user.name.clone(),
    };

    let resolver = CredentialResolver::new(&auth.store);
    let excluded = abort
        .guard(resolver.find_excluded(&params.exclude_list))
        .await?
        .map_err(internal("exclude list lookup"))?;
    if !excluded.is_empty() {
        tracing::info!(rp_id = %params.rp.id, matched = excluded.len(), "Excluded credential already in vault");
        // polled once to start the notice, then dropped
        let _ = tokio::time::timeout(
            Duration::ZERO,
            auth.prompter.inform_excluded_credential(&excluded, &info, abort),
        )
        .await;
        return Err(AuthenticatorError::NotAllowed);
    }

    let client_data_json = ClientData::new(Ceremony::Create, &params.challenge, &params.origin)
        .to_json()
        .map_err(internal("clientDataJSON encoding"))?;

    let (key_pair, public_id) = if params.require_resident_key {
        if !abort.guard(auth.prompter.confirm_new_credential(&info, abort)).await? {
            tracing::info!(rp_id = %params.rp.id, "User declined new credential");
            return Err(AuthenticatorError::NotAllowed);
        }
        let key_pair = generate_key_pair(abort).await?;
        let name = if params.rp.name.is_empty() { &params.rp.id } else { &params.rp.name };
        let entry = VaultEntry::new_passkey(name.clone(), new_fido2_key(params, &key_pair, None)?);
        let entry_id = abort
            .guard(auth.store.create(entry))
            .await?
            .map_err(internal("vault create"))?;
        (key_pair, entry_id)
    } else {
        let Some(entry_id) = abort
            .guard(auth.prompter.confirm_new_non_discoverable_credential(&info, abort))
            .await?
        else {
            tracing::info!(rp_id = %params.rp.id, "User declined new credential");
            return Err(AuthenticatorError::NotAllowed);
        };
        let key_pair = generate_key_pair(abort).await?;

        let mut entry = abort
            .guard(auth.store.get(entry_id))
            .await?
            .map_err(internal("vault read"))?
            .ok_or_else(|| internal("vault read")(format!("entry {entry_id} not found")))?;
        if entry.kind != EntryKind::Login || entry.is_deleted() {
            tracing::warn!(%entry_id, "Chosen vault entry cannot hold a non-discoverable credential");
            return Err(AuthenticatorError::Unknown);
        }
        let non_discoverable_id = Uuid::new_v4();
        entry.fido2_key = Some(new_fido2_key(params, &key_pair, Some(non_discoverable_id))?);
        abort
            .guard(auth.store.update(entry))
            .await?
            .map_err(internal("vault update"))?;
        (key_pair, non_discoverable_id)
    };

    let cose_key = key_pair.public_key_cose().map_err(internal("COSE export"))?;
    let attested = AttestedCredentialData::new(auth.options.aaguid, public_id.as_bytes().to_vec(), cose_key)
        .ok_or(AuthenticatorError::Unknown)?;
    let auth_data = AuthenticatorData::for_registration(&params.rp.id, 0, attested).to_bytes();

    let statement = AttestationStatement::new(
        auth.options.attestation_format,
        &key_pair,
        &auth_data,
        &client_data_hash(&client_data_json),
    )
    .map_err(internal("attestation signature"))?;
    let attestation_object =
        build_attestation_object(&auth_data, &statement).map_err(internal("attestation object"))?;

    tracing::info!(
        rp_id = %params.rp.id,
        resident = params.require_resident_key,
        fmt = statement.format().as_str(),
        "Credential created"
    );
    Ok(attestation_object)
}
