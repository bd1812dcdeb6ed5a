//! Message types for `VexChat` conversations.
//!
//! A [`Message`] is identified by a [`MessageId`] that is unique within its
//! conversation. Re-using an id is how streamed AI replies update a single
//! logical message in place, so ids are plain strings: fresh ids are UUID v7
//! (time-ordered), seeded ids such as `"m1"` are kept verbatim.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reaction::Reaction;
use crate::user::UserId;

/// Maximum allowed message text size in bytes (64 KB).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Unique identifier for a message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a new time-ordered message identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Millisecond-precision UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Creates a timestamp from milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns the timestamp `minutes` minutes earlier, saturating at the epoch.
    #[must_use]
    pub const fn minutes_before(self, minutes: u64) -> Self {
        Self(self.0.saturating_sub(minutes.saturating_mul(60_000)))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Delivery lifecycle of a message.
///
/// Ordered `Sent < Delivered < Read`. Locally sent messages only ever move
/// forward through this order (see [`MessageStatus::advance`]).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Handed to the conversation, not yet confirmed.
    #[default]
    Sent,
    /// Confirmed delivered to the peer.
    Delivered,
    /// Seen by the peer.
    Read,
}

impl MessageStatus {
    /// Moves to `next` if it is later in the lifecycle.
    ///
    /// Returns `true` if the status changed. Regressions are ignored.
    pub fn advance(&mut self, next: Self) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }

    /// Display symbol for this status.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Sent => "\u{2713}",
            Self::Delivered => "\u{2713}\u{2713}",
            Self::Read => "\u{2713}\u{2713}\u{00b7}",
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier within the owning conversation.
    pub id: MessageId,
    /// The participant who authored this message.
    pub sender_id: UserId,
    /// Message body.
    pub text: String,
    /// When the message was created.
    pub timestamp: Timestamp,
    /// Delivery status.
    pub status: MessageStatus,
    /// Whether the text was produced by the AI gateway.
    #[serde(default)]
    pub ai_generated: bool,
    /// Per-emoji reactions, in first-reacted order.
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// Creates a message with status [`MessageStatus::Sent`], stamped now.
    #[must_use]
    pub fn new(id: MessageId, sender_id: UserId, text: impl Into<String>) -> Self {
        Self {
            id,
            sender_id,
            text: text.into(),
            timestamp: Timestamp::now(),
            status: MessageStatus::Sent,
            ai_generated: false,
            reactions: Vec::new(),
        }
    }

    /// Marks the message as AI-authored with the given status.
    #[must_use]
    pub fn with_ai_origin(mut self, status: MessageStatus) -> Self {
        self.ai_generated = true;
        self.status = status;
        self
    }
}

/// Error returned when outgoing message text fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Text is empty or whitespace-only.
    #[error("message content is empty")]
    Empty,
    /// Text exceeds the maximum allowed size.
    #[error("message too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Actual size of the text in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

/// Validates outgoing message text.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] if the text is empty or whitespace-only,
/// or [`ValidationError::TooLarge`] if it exceeds [`MAX_MESSAGE_SIZE`] bytes.
pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    let size = text.len();
    if size > MAX_MESSAGE_SIZE {
        return Err(ValidationError::TooLarge {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}
