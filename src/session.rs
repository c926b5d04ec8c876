use caligula_backend::conversation::ConversationMessage;

/// The one conversation this client keeps; the backend holds no history.
pub struct ChatSession {
    greeting: String,
    messages: Vec<ConversationMessage>,
}

impl ChatSession {
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        Self {
            messages: vec![ConversationMessage::assistant(greeting.clone())],
            greeting,
        }
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Append a user turn; blank input is ignored.
    pub fn push_user(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.messages.push(ConversationMessage::user(text));
        true
    }

    pub fn push_reply(&mut self, text: impl Into<String>) {
        self.messages.push(ConversationMessage::assistant(text));
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages
            .push(ConversationMessage::assistant(self.greeting.clone()));
    }
}
