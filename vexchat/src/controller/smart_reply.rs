//! Smart-reply suggestions.
//!
//! Suggestions are offered only when the last message came from a human
//! peer. They are best effort: any gateway failure clears them, and a
//! result that arrives after the conversation moved on is discarded.

use vexchat_proto::conversation::{Conversation, ConversationId};

use super::{ChatEvent, ControllerError, ConversationController};
use crate::gateway::AiGateway;
use crate::gateway::prompts::{SELF_LABEL, smart_reply_prompt};
use crate::store::{MessageStore, StoreError};

impl<G: AiGateway> ConversationController<G> {
    /// Recomputes the smart replies for a conversation.
    ///
    /// Clears them without calling the gateway when the last message was
    /// sent by the local user, by an AI, or when the peer is an AI agent.
    /// Returns the suggestions now in effect.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] for an unknown conversation.
    pub async fn refresh_smart_replies(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<String>, ControllerError> {
        let settings = &self.inner.settings;
        let request = {
            let store = self.store.lock();
            let conversation = store
                .conversation(conversation_id)
                .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.clone()))?;
            wants_suggestions(&store, conversation).then(|| {
                let context = render_context(&store, conversation, settings.smart_reply_window);
                let anchor = conversation.last_message().map(|m| m.id.clone());
                (anchor, smart_reply_prompt(settings.smart_reply_count, &context))
            })
        };
        let Some((anchor, prompt)) = request else {
            self.set_suggestions(conversation_id, Vec::new());
            return Ok(Vec::new());
        };

        let replies = match self.inner.gateway.structured_complete(&prompt).await {
            Ok(raw) => normalize(raw, settings.smart_reply_count),
            Err(error) => {
                tracing::warn!(conversation = %conversation_id, %error, "smart replies unavailable");
                Vec::new()
            }
        };

        let still_current = self
            .store
            .lock()
            .conversation(conversation_id)
            .and_then(|c| c.last_message())
            .map(|m| m.id.clone())
            == anchor;
        if !still_current {
            tracing::debug!(conversation = %conversation_id, "discarding stale smart replies");
            return Ok(self.smart_replies(conversation_id));
        }

        self.set_suggestions(conversation_id, replies.clone());
        Ok(replies)
    }

    /// Current smart replies for a conversation (empty if none).
    #[must_use]
    pub fn smart_replies(&self, conversation_id: &ConversationId) -> Vec<String> {
        self.inner
            .suggestions
            .lock()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces the suggestions, emitting an event only on change.
    pub(super) fn set_suggestions(&self, conversation_id: &ConversationId, replies: Vec<String>) {
        let changed = {
            let mut suggestions = self.inner.suggestions.lock();
            let previous = suggestions.get(conversation_id).map_or(&[][..], Vec::as_slice);
            if previous == replies.as_slice() {
                false
            } else {
                if replies.is_empty() {
                    suggestions.remove(conversation_id);
                } else {
                    suggestions.insert(conversation_id.clone(), replies.clone());
                }
                true
            }
        };
        if changed {
            self.emit(ChatEvent::SmartRepliesChanged {
                conversation_id: conversation_id.clone(),
                replies,
            });
        }
    }
}

fn wants_suggestions(store: &MessageStore, conversation: &Conversation) -> bool {
    let Some(last) = conversation.last_message() else {
        return false;
    };
    let from_local = &last.sender_id == store.local_user();
    let from_agent = store.user(&last.sender_id).is_some_and(|u| u.is_agent);
    !from_local && !from_agent && !last.ai_generated && store.ai_peer(&conversation.id).is_none()
}

/// Renders the last `window` messages as `Speaker: text` lines.
fn render_context(store: &MessageStore, conversation: &Conversation, window: usize) -> String {
    let skip = conversation.messages.len().saturating_sub(window);
    conversation.messages[skip..]
        .iter()
        .map(|m| {
            let speaker = if &m.sender_id == store.local_user() {
                SELF_LABEL
            } else {
                store.display_name(&m.sender_id)
            };
            format!("{speaker}: {}", m.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize(raw: Vec<String>, count: usize) -> Vec<String> {
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(count)
        .collect()
}
