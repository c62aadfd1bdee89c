//! External inputs resolved by collaborators: the simulated opponent's
//! profile and the human's profile. Both are read-only to the core; their
//! storage and authoring live outside this crate.

use serde::{Deserialize, Serialize};

/// The simulated conversational opponent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaDescriptor {
    /// Display name, also the fallback transcript speaker.
    pub name: String,
    /// Personality text injected into the system instruction.
    pub personality: String,
    /// Difficulty-specific rule text.
    pub rules: String,
    /// Prebuilt voice id for speech synthesis.
    pub voice: String,
}

/// The human participant. All fields are optional self-reported data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDescriptor {
    pub name: Option<String>,
    pub college: Option<String>,
    pub state: Option<String>,
}

impl UserDescriptor {
    /// Name to address the user by, with a neutral fallback.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "there",
        }
    }

    /// Transcript speaker label for the user's own speech.
    pub fn speaker_label(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "You",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_when_unset() {
        let user = UserDescriptor::default();
        assert_eq!(user.display_name(), "there");
        assert_eq!(user.speaker_label(), "You");

        let named = UserDescriptor {
            name: Some("Priya".into()),
            ..Default::default()
        };
        assert_eq!(named.display_name(), "Priya");
        assert_eq!(named.speaker_label(), "Priya");
    }

    #[test]
    fn empty_name_is_treated_as_unset() {
        let user = UserDescriptor {
            name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "there");
    }
}
