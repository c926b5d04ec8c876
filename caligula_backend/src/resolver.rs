use std::sync::Arc;

use crate::conversation::{latest_user_message, ConversationMessage, ReplyOutcome};
use crate::error::ReplyError;
use crate::local_engine::PatternTable;
use crate::remote::{Generator, Verifier};

/// Where a request is in the pipeline; used for tracing and failure logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStage {
    Received,
    LocalLookup,
    Miss,
    Generating,
    Generated,
    Verifying,
    Resolved,
    Failed,
}

/// Turns a conversation into one reply: canned table first, otherwise
/// generation followed by a mandatory verification pass.
#[derive(Clone)]
pub struct ReplyResolver {
    patterns: Arc<PatternTable>,
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    persona_id: String,
}

impl ReplyResolver {
    pub fn new(
        patterns: Arc<PatternTable>,
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn Verifier>,
        persona_id: impl Into<String>,
    ) -> Self {
        Self {
            patterns,
            generator,
            verifier,
            persona_id: persona_id.into(),
        }
    }

    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }

    pub async fn resolve(&self, history: &[ConversationMessage]) -> Result<ReplyOutcome, ReplyError> {
        trace_stage(ResolveStage::Received);
        let query = latest_user_message(history).ok_or(ReplyError::NoUserMessage)?;

        trace_stage(ResolveStage::LocalLookup);
        if let Some(outcome) = self.patterns.find(&query.text) {
            tracing::debug!("Local pattern hit: {:?}", outcome.source);
            trace_stage(ResolveStage::Resolved);
            return Ok(outcome);
        }

        trace_stage(ResolveStage::Miss);
        trace_stage(ResolveStage::Generating);
        let draft = self
            .generator
            .generate(history, &self.persona_id)
            .await
            .map_err(|e| failed(ResolveStage::Generating, e))?;
        trace_stage(ResolveStage::Generated);

        trace_stage(ResolveStage::Verifying);
        let verified = self
            .verifier
            .verify(&draft)
            .await
            .map_err(|e| failed(ResolveStage::Verifying, e))?;

        if verified != draft {
            tracing::debug!("Verification rewrote the generated reply");
        }

        trace_stage(ResolveStage::Resolved);
        Ok(ReplyOutcome::remote(verified))
    }
}

fn trace_stage(stage: ResolveStage) {
    tracing::debug!(?stage, "resolve");
}

/// `stage` is the stage that was running when the error surfaced.
fn failed(stage: ResolveStage, error: ReplyError) -> ReplyError {
    trace_stage(ResolveStage::Failed);
    tracing::warn!(?stage, kind = error.kind(), "Reply resolution failed: {}", error);
    error
}
