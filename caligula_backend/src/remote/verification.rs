use async_trait::async_trait;

use super::Verifier;
use crate::error::ReplyError;
use crate::llm_client::{LlmClient, Message};
use crate::persona::Persona;

/// Second pass over generated text that keeps it in character and in period.
pub struct VerificationClient {
    llm: LlmClient,
    model: String,
    persona: Persona,
}

impl VerificationClient {
    pub fn new(llm: LlmClient, model: impl Into<String>, persona: Persona) -> Self {
        Self {
            llm,
            model: model.into(),
            persona,
        }
    }
}

#[async_trait]
impl Verifier for VerificationClient {
    async fn verify(&self, candidate: &str) -> Result<String, ReplyError> {
        if !self.llm.has_credentials() {
            return Err(ReplyError::MissingCredential);
        }

        let prompt = build_audit_prompt(self.persona, candidate);
        tracing::debug!("Verifying {} char reply with {}", candidate.len(), self.model);

        self.llm
            .generate_with_model(&[Message::user(prompt)], &self.model)
            .await
            .map_err(ReplyError::remote)
    }
}

pub fn build_audit_prompt(persona: Persona, candidate: &str) -> String {
    format!(
        "You ensure the following text sounds like {name}. It must not use any formatting \
         such as italics, bold text or emojis. It must not mention anything the speaker \
         could not know: {limits}. If the text is correct, return an exact copy of it. \
         If it is incorrect, return a corrected version. Return only the text.\n\n\
         Text to check:\n{candidate}\n",
        name = persona.display_name(),
        limits = persona.era_limits(),
        candidate = candidate,
    )
}
