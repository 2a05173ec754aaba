pub(crate) mod pinentry;
pub(crate) mod text;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::webauthn::AbortToken;

pub use pinentry::{PinentryPrompter, PromptEntry};

/// What the user is shown when asked to create or reuse a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCredentialInfo {
    pub credential_name: String,
    pub user_name:       String,
}

/// Human-facing consent and selection. Ids are vault entry ids, except in
/// `inform_excluded_credential`, which receives public credential ids.
///
/// Implementations may block for as long as the user takes; the caller
/// bounds each call with `abort`.
#[async_trait]
pub trait VerificationPrompter: Send + Sync {
    async fn confirm_new_credential(&self, info: &NewCredentialInfo, abort: &AbortToken) -> bool;

    /// Pick an existing login entry to attach a non-discoverable credential to.
    async fn confirm_new_non_discoverable_credential(
        &self,
        info: &NewCredentialInfo,
        abort: &AbortToken,
    ) -> Option<Uuid>;

    /// Fire-and-forget. The caller polls this once and does not wait for
    /// it, so the notice must be started before the first `Pending`.
    async fn inform_excluded_credential(
        &self,
        existing: &[Uuid],
        info: &NewCredentialInfo,
        abort: &AbortToken,
    );

    async fn pick_credential(&self, candidates: &[Uuid], abort: &AbortToken) -> Option<Uuid>;

    async fn confirm_credential(&self, id: Uuid, abort: &AbortToken) -> bool;
}

#[async_trait]
impl<T: VerificationPrompter + ?Sized> VerificationPrompter for Arc<T> {
    async fn confirm_new_credential(&self, info: &NewCredentialInfo, abort: &AbortToken) -> bool {
        (**self).confirm_new_credential(info, abort).await
    }

    async fn confirm_new_non_discoverable_credential(
        &self,
        info: &NewCredentialInfo,
        abort: &AbortToken,
    ) -> Option<Uuid> {
        (**self).confirm_new_non_discoverable_credential(info, abort).await
    }

    async fn inform_excluded_credential(
        &self,
        existing: &[Uuid],
        info: &NewCredentialInfo,
        abort: &AbortToken,
    ) {
        (**self).inform_excluded_credential(existing, info, abort).await
    }

    async fn pick_credential(&self, candidates: &[Uuid], abort: &AbortToken) -> Option<Uuid> {
        (**self).pick_credential(candidates, abort).await
    }

    async fn confirm_credential(&self, id: Uuid, abort: &AbortToken) -> bool {
        (**self).confirm_credential(id, abort).await
    }
}
