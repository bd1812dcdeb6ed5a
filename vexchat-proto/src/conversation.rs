//! Conversation threads.

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageId};
use crate::user::{User, UserId};

/// Identifies a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Creates a conversation identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A thread between the local user and one or more peers.
///
/// `messages` is in append order, which is chronological order. It is
/// only ever appended to or updated element-wise, never reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier.
    pub id: ConversationId,
    /// Participants, in display order.
    pub participants: Vec<User>,
    /// Messages in append order.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Number of inbound messages not yet seen.
    #[serde(default)]
    pub unread_count: u32,
    /// Whether a peer is currently composing a reply.
    #[serde(default)]
    pub is_typing: bool,
    /// Unsent compose-box text.
    #[serde(default)]
    pub draft: Option<String>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub const fn new(id: ConversationId, participants: Vec<User>) -> Self {
        Self {
            id,
            participants,
            messages: Vec::new(),
            unread_count: 0,
            is_typing: false,
            draft: None,
        }
    }

    /// The first participant that is not `local`.
    ///
    /// Falls back to the first participant, so a self-only thread still
    /// has a displayable peer.
    #[must_use]
    pub fn peer(&self, local: &UserId) -> Option<&User> {
        self.participants
            .iter()
            .find(|u| &u.id != local)
            .or_else(|| self.participants.first())
    }

    /// Looks up a participant by id.
    #[must_use]
    pub fn participant(&self, id: &UserId) -> Option<&User> {
        self.participants.iter().find(|u| &u.id == id)
    }

    /// The most recent message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Index of the message with `id`, if present.
    #[must_use]
    pub fn position_of(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }
}
