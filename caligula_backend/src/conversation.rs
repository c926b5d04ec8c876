use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One turn of a conversation as the caller holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// The most recent user turn, if the history has one.
pub fn latest_user_message(history: &[ConversationMessage]) -> Option<&ConversationMessage> {
    history.iter().rev().find(|message| message.role == Role::User)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySource {
    /// Answered from the canned table; carries the pattern id.
    Local(String),
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub text: String,
    pub source: ReplySource,
}

impl ReplyOutcome {
    pub fn local(pattern_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ReplySource::Local(pattern_id.into()),
        }
    }

    pub fn remote(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ReplySource::Remote,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, ReplySource::Local(_))
    }
}
