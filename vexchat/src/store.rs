//! In-memory conversation store.
//!
//! [`MessageStore`] is the single source of truth for the UI: it owns every
//! [`Conversation`] and the list ordering, and exposes command-style
//! mutations that preserve the model invariants:
//!
//! - message ids are unique within a conversation; appending an existing id
//!   replaces the message in place instead of inserting a duplicate;
//! - a conversation's messages are never reordered;
//! - at most one reaction entry exists per emoji per message.
//!
//! Operations on an unknown conversation or message are no-ops reported as
//! [`StoreError`]; they never panic.

use std::collections::HashMap;
use std::sync::Arc;

use vexchat_proto::conversation::{Conversation, ConversationId};
use vexchat_proto::message::{Message, MessageId, MessageStatus};
use vexchat_proto::reaction::{Reaction, ReactionChange, toggle_reaction};
use vexchat_proto::user::{User, UserId};

/// Store shared between the controller, spawned reply tasks, and the UI.
///
/// The lock is only ever held for the duration of one store operation.
pub type SharedStore = Arc<parking_lot::Mutex<MessageStore>>;

/// Errors reported by store operations that target unknown ids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No conversation with this id.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// The conversation exists but has no message with this id.
    #[error("message {message} not found in conversation {conversation}")]
    MessageNotFound {
        /// Conversation that was searched.
        conversation: ConversationId,
        /// Message that was requested.
        message: MessageId,
    },
}

/// How [`MessageStore::append_or_replace`] applied a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The id was new; the message was appended at the end.
    Appended,
    /// The id existed; the message replaced it at this index.
    Replaced(usize),
}

/// Authoritative mapping from conversation id to [`Conversation`].
#[derive(Debug)]
pub struct MessageStore {
    /// The local user.
    local_user: UserId,
    /// Conversations keyed by id.
    conversations: HashMap<ConversationId, Conversation>,
    /// List ordering, most recently active first.
    order: Vec<ConversationId>,
    /// Every user seen as a participant or registered explicitly.
    users: HashMap<UserId, User>,
}

impl MessageStore {
    /// Creates an empty store for the given local user.
    #[must_use]
    pub fn new(local_user: User) -> Self {
        let local_id = local_user.id.clone();
        let mut users = HashMap::new();
        users.insert(local_id.clone(), local_user);
        Self {
            local_user: local_id,
            conversations: HashMap::new(),
            order: Vec::new(),
            users,
        }
    }

    /// Wraps the store for sharing.
    #[must_use]
    pub fn into_shared(self) -> SharedStore {
        Arc::new(parking_lot::Mutex::new(self))
    }

    /// The local user's id.
    #[must_use]
    pub const fn local_user(&self) -> &UserId {
        &self.local_user
    }

    /// Adds a user to the directory without attaching it to a conversation.
    pub fn register_user(&mut self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Looks up a user by id.
    #[must_use]
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// Display name for `id`, or `"Unknown"`.
    #[must_use]
    pub fn display_name(&self, id: &UserId) -> &str {
        self.users.get(id).map_or("Unknown", |u| u.name.as_str())
    }

    /// Inserts a conversation at the end of the list ordering.
    ///
    /// Re-inserting an existing id replaces the conversation but keeps its
    /// list position. Participants are added to the user directory.
    pub fn insert_conversation(&mut self, conversation: Conversation) {
        for user in &conversation.participants {
            self.users
                .entry(user.id.clone())
                .or_insert_with(|| user.clone());
        }
        let id = conversation.id.clone();
        if self.conversations.insert(id.clone(), conversation).is_none() {
            self.order.push(id);
        }
    }

    /// Looks up a conversation.
    #[must_use]
    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Conversations in list order (most recently active first).
    pub fn ordered(&self) -> impl Iterator<Item = &Conversation> {
        self.order
            .iter()
            .filter_map(|id| self.conversations.get(id))
    }

    /// Conversations in list order whose peer name contains `query`,
    /// case-insensitively. An empty query matches everything.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Conversation> {
        let needle = query.trim().to_lowercase();
        self.ordered()
            .filter(|c| {
                needle.is_empty()
                    || c.peer(&self.local_user)
                        .is_some_and(|p| p.name.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// The conversation's non-local participant, if it is an AI agent.
    #[must_use]
    pub fn ai_peer(&self, id: &ConversationId) -> Option<&User> {
        self.conversations
            .get(id)?
            .peer(&self.local_user)
            .filter(|u| u.id != self.local_user && u.is_agent)
    }

    /// Appends `message`, or replaces the message with the same id in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConversationNotFound`] if the conversation does
    /// not exist; the store is left unchanged.
    pub fn append_or_replace(
        &mut self,
        conversation: &ConversationId,
        message: Message,
    ) -> Result<Upsert, StoreError> {
        let conv = self.conversation_mut(conversation)?;
        if let Some(index) = conv.position_of(&message.id) {
            conv.messages[index] = message;
            Ok(Upsert::Replaced(index))
        } else {
            conv.messages.push(message);
            Ok(Upsert::Appended)
        }
    }

    /// Toggles the local user's `emoji` reaction on a message.
    ///
    /// Returns the change applied and the message's reactions afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the conversation or message is unknown.
    pub fn set_reaction(
        &mut self,
        conversation: &ConversationId,
        message: &MessageId,
        emoji: &str,
    ) -> Result<(ReactionChange, Vec<Reaction>), StoreError> {
        let msg = self.message_mut(conversation, message)?;
        let change = toggle_reaction(&mut msg.reactions, emoji);
        Ok((change, msg.reactions.clone()))
    }

    /// Sets the peer-typing indicator.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConversationNotFound`] if the conversation is unknown.
    pub fn set_typing(
        &mut self,
        conversation: &ConversationId,
        is_typing: bool,
    ) -> Result<(), StoreError> {
        self.conversation_mut(conversation)?.is_typing = is_typing;
        Ok(())
    }

    /// Moves the conversation to the front of the list ordering.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConversationNotFound`] if the conversation is unknown.
    pub fn reorder_to_front(&mut self, conversation: &ConversationId) -> Result<(), StoreError> {
        let index = self
            .order
            .iter()
            .position(|id| id == conversation)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation.clone()))?;
        let id = self.order.remove(index);
        self.order.insert(0, id);
        Ok(())
    }

    /// Replaces the compose-box draft. `None` or empty text clears it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConversationNotFound`] if the conversation is unknown.
    pub fn set_draft(
        &mut self,
        conversation: &ConversationId,
        draft: Option<String>,
    ) -> Result<(), StoreError> {
        self.conversation_mut(conversation)?.draft = draft.filter(|d| !d.is_empty());
        Ok(())
    }

    /// Increments the unread counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConversationNotFound`] if the conversation is unknown.
    pub fn bump_unread(&mut self, conversation: &ConversationId) -> Result<u32, StoreError> {
        let conv = self.conversation_mut(conversation)?;
        conv.unread_count = conv.unread_count.saturating_add(1);
        Ok(conv.unread_count)
    }

    /// Resets the unread counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConversationNotFound`] if the conversation is unknown.
    pub fn clear_unread(&mut self, conversation: &ConversationId) -> Result<(), StoreError> {
        self.conversation_mut(conversation)?.unread_count = 0;
        Ok(())
    }

    /// Advances a message's delivery status. Never moves it backwards.
    ///
    /// Returns `true` if the status changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the conversation or message is unknown.
    pub fn update_status(
        &mut self,
        conversation: &ConversationId,
        message: &MessageId,
        status: MessageStatus,
    ) -> Result<bool, StoreError> {
        Ok(self.message_mut(conversation, message)?.status.advance(status))
    }

    fn conversation_mut(
        &mut self,
        conversation: &ConversationId,
    ) -> Result<&mut Conversation, StoreError> {
        self.conversations.get_mut(conversation).ok_or_else(|| {
            tracing::debug!(%conversation, "unknown conversation");
            StoreError::ConversationNotFound(conversation.clone())
        })
    }

    fn message_mut(
        &mut self,
        conversation: &ConversationId,
        message: &MessageId,
    ) -> Result<&mut Message, StoreError> {
        self.conversation_mut(conversation)?
            .messages
            .iter_mut()
            .find(|m| &m.id == message)
            .ok_or_else(|| {
                tracing::debug!(%conversation, %message, "unknown message");
                StoreError::MessageNotFound {
                    conversation: conversation.clone(),
                    message: message.clone(),
                }
            })
    }
}
