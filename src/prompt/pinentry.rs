use async_trait::async_trait;
use uuid::Uuid;

use super::text::{self, Prompt};
use super::{NewCredentialInfo, VerificationPrompter};
use crate::webauthn::AbortToken;

/// A vault entry as the prompter presents it.
#[derive(Debug, Clone)]
pub struct PromptEntry {
    pub id:         Uuid,
    pub name:       String,
    /// Login entry without a credential yet.
    pub attachable: bool,
}

/// Asks through a pinentry dialog. pinentry only offers OK/Cancel, so a
/// choice among several entries is a sequence of yes/no questions.
pub struct PinentryPrompter {
    bin:     String,
    entries: Vec<PromptEntry>,
}

impl PinentryPrompter {
    pub fn new(bin: impl Into<String>, entries: Vec<PromptEntry>) -> Self {
        Self { bin: bin.into(), entries }
    }

    fn entry_name(&self, id: Uuid) -> String {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    async fn ask(&self, prompt: Prompt, abort: &AbortToken) -> bool {
        let bin = self.bin.clone();
        let join = tokio::task::spawn_blocking(move || {
            let input = pinentry::PassphraseInput::with_binary(&bin);
            match input {
                None => Err(pinentry::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "pinentry binary not found",
                ))),
                Some(mut input) => input
                    .with_title(&prompt.title)
                    .with_description(&prompt.description)
                    .with_ok("Confirm")
                    .with_cancel("Deny")
                    .interact(),
            }
        });

        match abort.guard(join).await {
            Ok(Ok(Ok(_))) => true,
            Ok(Ok(Err(e))) => {
                tracing::debug!(error = %e, "Prompt declined");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Prompt task failed");
                false
            }
            Err(_) => false,
        }
    }
}

#[async_trait]
impl VerificationPrompter for PinentryPrompter {
    async fn confirm_new_credential(&self, info: &NewCredentialInfo, abort: &AbortToken) -> bool {
        self.ask(text::new_credential_prompt(info), abort).await
    }

    async fn confirm_new_non_discoverable_credential(
        &self,
        info: &NewCredentialInfo,
        abort: &AbortToken,
    ) -> Option<Uuid> {
        for entry in self.entries.iter().filter(|e| e.attachable) {
            if abort.is_aborted() {
                return None;
            }
            if self.ask(text::attach_credential_prompt(info, &entry.name), abort).await {
                return Some(entry.id);
            }
        }
        None
    }

    async fn inform_excluded_credential(
        &self,
        existing: &[Uuid],
        info: &NewCredentialInfo,
        abort: &AbortToken,
    ) {
        tracing::info!(count = existing.len(), "Informing user of excluded credential");
        self.ask(text::excluded_credential_prompt(info), abort).await;
    }

    async fn pick_credential(&self, candidates: &[Uuid], abort: &AbortToken) -> Option<Uuid> {
        let total = candidates.len();
        for (i, id) in candidates.iter().enumerate() {
            if abort.is_aborted() {
                return None;
            }
            let name = self.entry_name(*id);
            if self.ask(text::pick_credential_prompt(&name, i + 1, total), abort).await {
                return Some(*id);
            }
        }
        None
    }

    async fn confirm_credential(&self, id: Uuid, abort: &AbortToken) -> bool {
        let name = self.entry_name(id);
        self.ask(text::pick_credential_prompt(&name, 1, 1), abort).await
    }
}
