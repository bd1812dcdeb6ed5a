//! Conversation participants.

use serde::{Deserialize, Serialize};

/// Identifies a user (the local user, a human peer, or the AI assistant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A participant. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identity.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Avatar reference (URL or asset key).
    #[serde(default)]
    pub avatar: String,
    /// Whether the user is currently online.
    #[serde(default)]
    pub is_online: bool,
    /// Whether this user is the AI assistant rather than a human.
    #[serde(default)]
    pub is_agent: bool,
}

impl User {
    /// Creates an online human user with no avatar.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
            avatar: String::new(),
            is_online: true,
            is_agent: false,
        }
    }

    /// Marks this user as the AI assistant.
    #[must_use]
    pub const fn agent(mut self) -> Self {
        self.is_agent = true;
        self
    }

    /// Sets the avatar reference.
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = avatar.into();
        self
    }

    /// Sets the online flag.
    #[must_use]
    pub const fn online(mut self, is_online: bool) -> Self {
        self.is_online = is_online;
        self
    }
}
