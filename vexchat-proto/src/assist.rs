//! Types exchanged with the AI assistant: role-tagged transcripts and the
//! fixed set of text actions.

use serde::{Deserialize, Serialize};

/// Speaker role in a transcript sent to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The local user.
    User,
    /// The assistant (or any non-local participant).
    Model,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One entry of a role-tagged transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who said it.
    pub role: Role,
    /// What was said.
    pub text: String,
}

impl Turn {
    /// Creates a turn.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// A single-shot text transformation offered by the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiAction {
    /// Rewrite to be more professional, polite, and concise.
    RewriteProfessional,
    /// Rewrite to be more friendly, casual, and warm.
    RewriteFriendly,
    /// Fix grammar and spelling without changing tone.
    FixGrammar,
    /// Translate to English.
    TranslateEn,
    /// Summarize briefly.
    Summarize,
    /// Explain meaning or context.
    Explain,
}

impl AiAction {
    /// Every action, in menu order.
    pub const ALL: [Self; 6] = [
        Self::RewriteProfessional,
        Self::RewriteFriendly,
        Self::FixGrammar,
        Self::TranslateEn,
        Self::Summarize,
        Self::Explain,
    ];

    /// Short menu label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::RewriteProfessional => "Professional",
            Self::RewriteFriendly => "Friendly",
            Self::FixGrammar => "Fix grammar",
            Self::TranslateEn => "Translate",
            Self::Summarize => "Summarize",
            Self::Explain => "Explain",
        }
    }

    /// Whether the result is meant to replace compose-box text, as opposed
    /// to being shown alongside an existing message.
    #[must_use]
    pub const fn replaces_draft(&self) -> bool {
        matches!(
            self,
            Self::RewriteProfessional | Self::RewriteFriendly | Self::FixGrammar | Self::TranslateEn
        )
    }
}

impl std::fmt::Display for AiAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
