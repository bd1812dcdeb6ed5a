//! Assistant tools: draft rewriting, message annotations, and summaries.
//!
//! Each tool is a single-turn gateway call. A second invocation of the
//! same tool on the same target while one is pending is ignored
//! ([`ToolOutcome::Busy`]), never queued.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use vexchat_proto::assist::AiAction;
use vexchat_proto::conversation::ConversationId;
use vexchat_proto::message::{Message, MessageId, MessageStatus};

use super::{ChatEvent, ControllerError, ConversationController};
use crate::gateway::AiGateway;
use crate::gateway::prompts::action_prompt;
use crate::store::StoreError;

/// Text applied to a draft or annotation when the gateway fails.
pub const FALLBACK_APOLOGY: &str = "Sorry, I couldn't process that request right now.";

/// First line of every summary message.
pub const SUMMARY_HEADER: &str = "📝 **Conversation Summary**";

/// Summary body used when the gateway fails.
pub const SUMMARY_UNAVAILABLE: &str = "Unable to summarize conversation at this time.";

/// Summary body used when the gateway answers with nothing.
pub const SUMMARY_EMPTY: &str = "Could not generate summary.";

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The same tool is already running on this target.
    Busy,
    /// There was nothing to work on (e.g. an empty draft).
    Skipped,
    /// The gateway answered; this text was applied.
    Applied(String),
    /// The gateway failed; this fallback text was applied.
    Fallback(String),
}

/// Ephemeral tool output attached to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub action: AiAction,
    pub text: String,
}

/// Tool target used for the in-flight guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) enum InFlightKey {
    Draft(ConversationId),
    Annotation(ConversationId, MessageId),
    Summary(ConversationId),
}

/// Releases its in-flight slot on drop.
struct InFlightTicket {
    slots: Arc<Mutex<HashSet<InFlightKey>>>,
    key: InFlightKey,
}

impl InFlightTicket {
    fn acquire(slots: &Arc<Mutex<HashSet<InFlightKey>>>, key: InFlightKey) -> Option<Self> {
        if !slots.lock().insert(key.clone()) {
            return None;
        }
        Some(Self {
            slots: Arc::clone(slots),
            key,
        })
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.slots.lock().remove(&self.key);
    }
}

impl<G: AiGateway> ConversationController<G> {
    /// Rewrites the conversation's draft with `action`.
    ///
    /// The draft is replaced and [`ChatEvent::DraftChanged`] is emitted. An
    /// empty answer keeps the source text; a gateway failure puts
    /// [`FALLBACK_APOLOGY`] in the draft.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] for an unknown conversation.
    pub async fn transform_draft(
        &self,
        conversation_id: &ConversationId,
        action: AiAction,
    ) -> Result<ToolOutcome, ControllerError> {
        let draft = self
            .store
            .lock()
            .conversation(conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.clone()))?
            .draft
            .clone();
        let Some(source) = draft.filter(|d| !d.trim().is_empty()) else {
            return Ok(ToolOutcome::Skipped);
        };
        let Some(_ticket) = InFlightTicket::acquire(
            &self.inner.in_flight,
            InFlightKey::Draft(conversation_id.clone()),
        ) else {
            return Ok(ToolOutcome::Busy);
        };

        let result = self
            .inner
            .gateway
            .complete(&action_prompt(action, &source))
            .await;
        let outcome = match result {
            Ok(text) if !text.trim().is_empty() => ToolOutcome::Applied(text.trim().to_string()),
            Ok(_) => {
                tracing::debug!(conversation = %conversation_id, %action, "empty rewrite, source kept");
                ToolOutcome::Applied(source)
            }
            Err(error) => {
                tracing::warn!(conversation = %conversation_id, %action, %error, "rewrite failed");
                ToolOutcome::Fallback(FALLBACK_APOLOGY.to_string())
            }
        };
        let (ToolOutcome::Applied(text) | ToolOutcome::Fallback(text)) = &outcome else {
            return Ok(outcome);
        };

        self.store
            .lock()
            .set_draft(conversation_id, Some(text.clone()))?;
        self.emit(ChatEvent::DraftChanged {
            conversation_id: conversation_id.clone(),
            draft: Some(text.clone()),
        });
        Ok(outcome)
    }

    /// Runs `action` over a message and attaches the result as an annotation.
    ///
    /// An empty answer annotates with the message text itself; a gateway
    /// failure annotates with [`FALLBACK_APOLOGY`].
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] if the conversation or message
    /// is unknown.
    pub async fn annotate_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        action: AiAction,
    ) -> Result<ToolOutcome, ControllerError> {
        let source = {
            let store = self.store.lock();
            let conversation = store
                .conversation(conversation_id)
                .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.clone()))?;
            conversation
                .messages
                .iter()
                .find(|m| &m.id == message_id)
                .map(|m| m.text.clone())
                .ok_or_else(|| StoreError::MessageNotFound {
                    conversation: conversation_id.clone(),
                    message: message_id.clone(),
                })?
        };
        let Some(_ticket) = InFlightTicket::acquire(
            &self.inner.in_flight,
            InFlightKey::Annotation(conversation_id.clone(), message_id.clone()),
        ) else {
            return Ok(ToolOutcome::Busy);
        };

        let outcome = match self
            .inner
            .gateway
            .complete(&action_prompt(action, &source))
            .await
        {
            Ok(text) if !text.trim().is_empty() => ToolOutcome::Applied(text.trim().to_string()),
            Ok(_) => ToolOutcome::Applied(source),
            Err(error) => {
                tracing::warn!(conversation = %conversation_id, %message_id, %action, %error, "annotation failed");
                ToolOutcome::Fallback(FALLBACK_APOLOGY.to_string())
            }
        };
        let (ToolOutcome::Applied(text) | ToolOutcome::Fallback(text)) = &outcome else {
            return Ok(outcome);
        };

        let annotation = Annotation {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
            action,
            text: text.clone(),
        };
        self.inner.annotations.lock().insert(
            (conversation_id.clone(), message_id.clone()),
            annotation.clone(),
        );
        self.emit(ChatEvent::AnnotationReady(annotation));
        Ok(outcome)
    }

    /// The annotation attached to a message, if any.
    #[must_use]
    pub fn annotation(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Option<Annotation> {
        self.inner
            .annotations
            .lock()
            .get(&(conversation_id.clone(), message_id.clone()))
            .cloned()
    }

    /// Removes a message's annotation. Returns whether one was present.
    pub fn dismiss_annotation(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> bool {
        self.inner
            .annotations
            .lock()
            .remove(&(conversation_id.clone(), message_id.clone()))
            .is_some()
    }

    /// Summarizes the whole conversation into a new assistant message.
    ///
    /// Every call appends a fresh message; earlier summaries are never
    /// replaced. A gateway failure appends [`SUMMARY_UNAVAILABLE`] instead.
    /// Returns `None` when there is nothing to summarize or a summary is
    /// already being produced.
    ///
    /// The summary becomes the last message, so smart replies are cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] for an unknown conversation.
    pub async fn summarize_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<MessageId>, ControllerError> {
        let transcript = {
            let store = self.store.lock();
            let conversation = store
                .conversation(conversation_id)
                .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.clone()))?;
            conversation
                .messages
                .iter()
                .map(|m| format!("{}: {}", store.display_name(&m.sender_id), m.text))
                .collect::<Vec<_>>()
                .join("\n")
        };
        if transcript.is_empty() {
            return Ok(None);
        }
        let Some(_ticket) = InFlightTicket::acquire(
            &self.inner.in_flight,
            InFlightKey::Summary(conversation_id.clone()),
        ) else {
            return Ok(None);
        };

        let summary = match self.inner.gateway.summarize(&transcript).await {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => {
                tracing::debug!(conversation = %conversation_id, "empty summary");
                SUMMARY_EMPTY.to_string()
            }
            Err(error) => {
                tracing::warn!(conversation = %conversation_id, %error, "summary failed");
                SUMMARY_UNAVAILABLE.to_string()
            }
        };

        let message = Message::new(
            MessageId::new(),
            self.inner.settings.assistant.clone(),
            format!("{SUMMARY_HEADER}\n\n{summary}"),
        )
        .with_ai_origin(MessageStatus::Read);
        let message_id = message.id.clone();
        self.store
            .lock()
            .append_or_replace(conversation_id, message.clone())?;
        tracing::info!(conversation = %conversation_id, %message_id, "summary appended");
        self.emit(ChatEvent::MessageUpserted {
            conversation_id: conversation_id.clone(),
            message,
        });
        self.set_suggestions(conversation_id, Vec::new());
        Ok(Some(message_id))
    }
}
