use thiserror::Error;

/// Failures of the reply pipeline.
///
/// The HTTP boundary maps `NoUserMessage` to a 400 and every other kind to a
/// generic 500; the detail carried here is for server-side logs only.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("unknown persona '{0}'")]
    UnknownPersona(String),

    #[error("no LLM API key configured")]
    MissingCredential,

    #[error("remote model unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("conversation has no user message")]
    NoUserMessage,
}

impl ReplyError {
    pub fn remote(error: anyhow::Error) -> Self {
        ReplyError::RemoteUnavailable(format!("{:#}", error))
    }

    /// Short stable label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ReplyError::UnknownPersona(_) => "unknown_persona",
            ReplyError::MissingCredential => "missing_credential",
            ReplyError::RemoteUnavailable(_) => "remote_unavailable",
            ReplyError::NoUserMessage => "no_user_message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn remote_error_keeps_context_chain() {
        let source: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
        let error = ReplyError::remote(source.context("Failed to send LLM request").unwrap_err());
        let rendered = error.to_string();
        assert!(rendered.contains("Failed to send LLM request"));
        assert!(rendered.contains("connection refused"));
        assert_eq!(error.kind(), "remote_unavailable");
    }
}
