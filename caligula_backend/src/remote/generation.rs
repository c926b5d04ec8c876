use async_trait::async_trait;
use serde_json::{json, Value};

use super::Generator;
use crate::conversation::ConversationMessage;
use crate::error::ReplyError;
use crate::llm_client::{LlmClient, Message};
use crate::persona::Persona;

pub struct GenerationClient {
    llm: LlmClient,
    model: String,
}

impl GenerationClient {
    pub fn new(llm: LlmClient, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Generator for GenerationClient {
    async fn generate(
        &self,
        history: &[ConversationMessage],
        persona_id: &str,
    ) -> Result<String, ReplyError> {
        if !self.llm.has_credentials() {
            return Err(ReplyError::MissingCredential);
        }
        let persona = Persona::from_id(persona_id)?;

        let prompt = build_generation_prompt(persona, history);
        tracing::debug!(
            "Generating reply with {} ({} history message(s))",
            self.model,
            history.len()
        );

        self.llm
            .generate_with_model(&[Message::user(prompt)], &self.model)
            .await
            .map_err(ReplyError::remote)
    }
}

/// Persona instruction followed by the history as a JSON array of
/// `{role, text}` objects, oldest first.
pub fn build_generation_prompt(persona: Persona, history: &[ConversationMessage]) -> String {
    let transcript = Value::Array(
        history
            .iter()
            .map(|message| json!({ "role": message.role.as_str(), "text": message.text }))
            .collect(),
    );
    format!(
        "{}\n\nHere is the chat history:\n{}",
        persona.system_prompt(),
        transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_instruction_once_and_history_in_order() {
        let history = vec![
            ConversationMessage::assistant("Hello. I am Emperor Caligula."),
            ConversationMessage::user("Why the horse?"),
        ];
        let prompt = build_generation_prompt(Persona::Caligula, &history);

        assert!(prompt.starts_with(Persona::Caligula.system_prompt()));
        assert_eq!(prompt.matches(Persona::Caligula.system_prompt()).count(), 1);

        let (_, transcript) = prompt.split_once("Here is the chat history:\n").unwrap();
        let parsed: Vec<ConversationMessage> = serde_json::from_str(transcript).unwrap();
        assert_eq!(parsed, history);
    }

    #[tokio::test]
    async fn missing_key_fails_before_persona_lookup() {
        let llm = LlmClient::new("http://127.0.0.1:9".to_string(), None, reqwest::Client::new());
        let client = GenerationClient::new(llm, "gemma-3-27b-it");
        let result = client
            .generate(&[ConversationMessage::user("hi")], "nero")
            .await;
        assert!(matches!(result, Err(ReplyError::MissingCredential)));
    }

    #[tokio::test]
    async fn unknown_persona_fails_without_remote_call() {
        let llm = LlmClient::new(
            "http://127.0.0.1:9".to_string(),
            Some("key".to_string()),
            reqwest::Client::new(),
        );
        let client = GenerationClient::new(llm, "gemma-3-27b-it");
        let result = client
            .generate(&[ConversationMessage::user("hi")], "nero")
            .await;
        assert!(matches!(result, Err(ReplyError::UnknownPersona(id)) if id == "nero"));
    }
}
