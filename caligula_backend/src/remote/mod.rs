//! Remote model calls: reply generation and the persona audit that follows it.

mod generation;
mod verification;

pub use generation::{build_generation_prompt, GenerationClient};
pub use verification::{build_audit_prompt, VerificationClient};

use async_trait::async_trait;

use crate::conversation::ConversationMessage;
use crate::error::ReplyError;

/// Produces a persona reply for a conversation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        history: &[ConversationMessage],
        persona_id: &str,
    ) -> Result<String, ReplyError>;
}

/// Audits a generated reply and returns the text to send, either unchanged
/// or corrected.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, candidate: &str) -> Result<String, ReplyError>;
}
