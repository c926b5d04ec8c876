use crate::error::ReplyError;

/// The fixed set of characters the model can be asked to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    Caligula,
}

struct PersonaProfile {
    id: &'static str,
    display_name: &'static str,
    greeting: &'static str,
    /// What the persona cannot know about, used by the verification audit.
    era_limits: &'static str,
    system_prompt: &'static str,
}

static CALIGULA: PersonaProfile = PersonaProfile {
    id: "caligula",
    display_name: "Roman Emperor Caligula",
    greeting: "Hello. I am Emperor Caligula. What would you want to ask his divinity?",
    era_limits: "modern events, technology, or his own death",
    system_prompt: "You are Roman Emperor Caligula. Respond to the user in an educational way \
                    that is still unmistakably Caligula. Keep replies to no more than 4 sentences \
                    and avoid any formatting such as italics, bold text or emojis. You will receive \
                    a JSON array holding the history of user messages and your replies; where the \
                    user refers to earlier turns, refer back to that history. If the user's \
                    message is unsafe or inappropriate, respond in a way that is short, blunt \
                    and dismissive.",
};

impl Persona {
    pub const ALL: [Persona; 1] = [Persona::Caligula];

    fn profile(&self) -> &'static PersonaProfile {
        match self {
            Persona::Caligula => &CALIGULA,
        }
    }

    pub fn from_id(id: &str) -> Result<Self, ReplyError> {
        let wanted = id.trim();
        Self::ALL
            .into_iter()
            .find(|persona| persona.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ReplyError::UnknownPersona(id.to_string()))
    }

    pub fn id(&self) -> &'static str {
        self.profile().id
    }

    pub fn display_name(&self) -> &'static str {
        self.profile().display_name
    }

    pub fn greeting(&self) -> &'static str {
        self.profile().greeting
    }

    pub fn era_limits(&self) -> &'static str {
        self.profile().era_limits
    }

    pub fn system_prompt(&self) -> &'static str {
        self.profile().system_prompt
    }
}

/// System prompt for `persona_id`.
pub fn prompt_for(persona_id: &str) -> Result<&'static str, ReplyError> {
    Persona::from_id(persona_id).map(|persona| persona.system_prompt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caligula_resolves_case_insensitively() {
        assert_eq!(Persona::from_id("caligula").unwrap(), Persona::Caligula);
        assert_eq!(Persona::from_id(" Caligula ").unwrap(), Persona::Caligula);
        assert!(prompt_for("caligula").unwrap().contains("Caligula"));
    }

    #[test]
    fn unknown_persona_is_a_typed_error() {
        match prompt_for("nero") {
            Err(ReplyError::UnknownPersona(id)) => assert_eq!(id, "nero"),
            other => panic!("expected UnknownPersona, got {:?}", other),
        }
    }

    #[test]
    fn every_persona_has_complete_profile() {
        for persona in Persona::ALL {
            assert!(!persona.id().is_empty());
            assert!(!persona.display_name().is_empty());
            assert!(!persona.greeting().is_empty());
            assert!(!persona.era_limits().is_empty());
            assert!(!persona.system_prompt().is_empty());
            assert_eq!(Persona::from_id(persona.id()).unwrap(), persona);
        }
    }
}
