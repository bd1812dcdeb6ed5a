//! Conversation controller for `VexChat`.
//!
//! Contains the [`ConversationController`] which orchestrates the send
//! pipeline (validate -> append -> reorder -> AI reply), reconciles
//! streamed AI replies into a single growing message, and runs the
//! assistant side effects: smart replies, draft tools, message
//! annotations, and conversation summaries.
//!
//! Every store mutation happens synchronously under the store lock;
//! gateway calls run between mutations and never hold it. AI gateway
//! failures are logged and swallowed here: callers only observe the
//! absence of a result.

pub mod reply;
pub mod smart_reply;
pub mod tools;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use vexchat_proto::assist::{Role, Turn};
use vexchat_proto::conversation::ConversationId;
use vexchat_proto::message::{Message, MessageId, ValidationError, validate_text};
use vexchat_proto::reaction::{Reaction, ReactionChange};
use vexchat_proto::user::UserId;

use crate::gateway::AiGateway;
use crate::store::{SharedStore, StoreError, Upsert};

pub use reply::{PendingReply, ReplyOutcome, StreamReconciler};
pub use tools::{
    Annotation, FALLBACK_APOLOGY, SUMMARY_EMPTY, SUMMARY_HEADER, SUMMARY_UNAVAILABLE, ToolOutcome,
};

use reply::ActiveReply;
use tools::InFlightKey;

/// Errors surfaced by controller operations.
///
/// Gateway failures never appear here; see the module docs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// The target conversation or message does not exist.
    #[error(transparent)]
    NotFound(#[from] StoreError),

    /// Outgoing text failed validation.
    #[error("invalid message: {0}")]
    Validation(#[from] ValidationError),
}

/// Tuning knobs for the controller.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Longest wait for a reply stream to open or yield its next chunk.
    pub stream_timeout: Duration,
    /// Number of trailing messages used as smart-reply context.
    pub smart_reply_window: usize,
    /// Number of smart replies requested.
    pub smart_reply_count: usize,
    /// User that authors conversation summaries.
    pub assistant: UserId,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            stream_timeout: Duration::from_secs(30),
            smart_reply_window: 10,
            smart_reply_count: 3,
            assistant: UserId::from("gemini"),
        }
    }
}

/// Events emitted by the [`ConversationController`] for UI notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A message was appended or replaced in place.
    MessageUpserted {
        /// Conversation holding the message.
        conversation_id: ConversationId,
        /// The message as stored.
        message: Message,
    },
    /// A message's reactions changed.
    ReactionsChanged {
        /// Conversation holding the message.
        conversation_id: ConversationId,
        /// The reacted-to message.
        message_id: MessageId,
        /// Reactions after the change.
        reactions: Vec<Reaction>,
    },
    /// The peer-typing indicator changed.
    TypingChanged {
        /// Affected conversation.
        conversation_id: ConversationId,
        /// New indicator value.
        is_typing: bool,
    },
    /// The conversation moved to the front of the list.
    ConversationMoved {
        /// Conversation that moved.
        conversation_id: ConversationId,
    },
    /// The smart-reply suggestions changed.
    SmartRepliesChanged {
        /// Affected conversation.
        conversation_id: ConversationId,
        /// Current suggestions (empty when cleared).
        replies: Vec<String>,
    },
    /// The compose-box draft was replaced by the controller.
    DraftChanged {
        /// Affected conversation.
        conversation_id: ConversationId,
        /// New draft, `None` when cleared.
        draft: Option<String>,
    },
    /// A message annotation finished.
    AnnotationReady(Annotation),
    /// A streamed AI reply ended; the typing indicator is already cleared.
    ReplyFinished {
        /// Conversation the reply was written into.
        conversation_id: ConversationId,
        /// How the reply ended.
        outcome: ReplyOutcome,
    },
}

/// Result of committing a local message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Committed {
    /// Empty or whitespace-only text; nothing changed.
    Ignored,
    /// The message was stored.
    Sent {
        /// Id of the new message.
        message_id: MessageId,
        /// AI reply to run next, when the peer is AI-capable.
        pending_reply: Option<PendingReply>,
    },
}

/// Result of [`ConversationController::send_user_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty or whitespace-only text; nothing changed.
    Ignored,
    /// The message was stored; `reply` is set when an AI reply ran.
    Sent {
        /// Id of the new message.
        message_id: MessageId,
        /// How the AI reply ended, if one was started.
        reply: Option<ReplyOutcome>,
    },
}

/// State shared by every controller handle.
struct Inner<G> {
    gateway: Arc<G>,
    settings: ControllerSettings,
    event_tx: mpsc::Sender<ChatEvent>,
    /// Active reply per conversation.
    replies: Arc<Mutex<HashMap<ConversationId, ActiveReply>>>,
    next_generation: AtomicU64,
    /// Latest smart replies per conversation.
    suggestions: Mutex<HashMap<ConversationId, Vec<String>>>,
    /// Visible annotations keyed by the annotated message.
    annotations: Mutex<HashMap<(ConversationId, MessageId), Annotation>>,
    /// Tool invocations currently awaiting the gateway.
    in_flight: Arc<Mutex<HashSet<InFlightKey>>>,
}

/// Orchestrates sends, AI replies, and assistant tools over a [`SharedStore`].
///
/// Cloning is cheap and every clone drives the same state, so flows can
/// be spawned onto the runtime with their own handle.
pub struct ConversationController<G: AiGateway> {
    store: SharedStore,
    inner: Arc<Inner<G>>,
}

impl<G: AiGateway> Clone for ConversationController<G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: AiGateway> ConversationController<G> {
    /// Creates a controller and the receiving end of its event channel.
    ///
    /// `event_buffer` bounds the channel; events that do not fit are dropped.
    pub fn new(
        store: SharedStore,
        gateway: Arc<G>,
        settings: ControllerSettings,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (event_tx, event_rx) = mpsc::channel(event_buffer.max(1));
        let inner = Inner {
            gateway,
            settings,
            event_tx,
            replies: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            suggestions: Mutex::new(HashMap::new()),
            annotations: Mutex::new(HashMap::new()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        };
        (
            Self {
                store,
                inner: Arc::new(inner),
            },
            event_rx,
        )
    }

    /// The store this controller mutates.
    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The controller settings.
    #[must_use]
    pub fn settings(&self) -> &ControllerSettings {
        &self.inner.settings
    }

    /// Validates and stores a local message.
    ///
    /// The message is appended and the conversation moved to the front
    /// before this returns, so it is never ordered behind an AI reply.
    /// Suggestions and the draft are cleared. When the peer is
    /// AI-capable, the returned [`PendingReply`] carries the transcript
    /// as it was before the new message.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] for an unknown conversation and
    /// [`ControllerError::Validation`] for oversized text.
    pub fn commit_local_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<Committed, ControllerError> {
        match validate_text(text) {
            Ok(()) => {}
            Err(ValidationError::Empty) => return Ok(Committed::Ignored),
            Err(err) => return Err(err.into()),
        }

        let (message, pending_reply, had_draft) = {
            let mut store = self.store.lock();
            let local = store.local_user().clone();
            let conversation = store
                .conversation(conversation_id)
                .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.clone()))?;
            let history: Vec<Turn> = conversation
                .messages
                .iter()
                .map(|m| {
                    let role = if m.sender_id == local {
                        Role::User
                    } else {
                        Role::Model
                    };
                    Turn::new(role, m.text.clone())
                })
                .collect();
            let had_draft = conversation.draft.is_some();
            let responder = store.ai_peer(conversation_id).map(|u| u.id.clone());

            let message = Message::new(MessageId::new(), local, text);
            store.append_or_replace(conversation_id, message.clone())?;
            store.reorder_to_front(conversation_id)?;
            store.set_draft(conversation_id, None)?;

            let pending_reply = responder.map(|responder| PendingReply {
                conversation_id: conversation_id.clone(),
                responder,
                history,
                prompt: text.to_string(),
            });
            (message, pending_reply, had_draft)
        };

        tracing::debug!(
            conversation = %conversation_id,
            message_id = %message.id,
            ai_reply = pending_reply.is_some(),
            "local message committed"
        );

        let message_id = message.id.clone();
        self.emit(ChatEvent::MessageUpserted {
            conversation_id: conversation_id.clone(),
            message,
        });
        self.emit(ChatEvent::ConversationMoved {
            conversation_id: conversation_id.clone(),
        });
        if had_draft {
            self.emit(ChatEvent::DraftChanged {
                conversation_id: conversation_id.clone(),
                draft: None,
            });
        }
        self.set_suggestions(conversation_id, Vec::new());

        Ok(Committed::Sent {
            message_id,
            pending_reply,
        })
    }

    /// Commits a local message, then runs the AI reply if one is due.
    ///
    /// # Errors
    ///
    /// Same as [`commit_local_message`](Self::commit_local_message).
    pub async fn send_user_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<SendOutcome, ControllerError> {
        match self.commit_local_message(conversation_id, text)? {
            Committed::Ignored => Ok(SendOutcome::Ignored),
            Committed::Sent {
                message_id,
                pending_reply,
            } => {
                let reply = match pending_reply {
                    Some(pending) => Some(self.stream_reply(pending).await),
                    None => None,
                };
                Ok(SendOutcome::Sent { message_id, reply })
            }
        }
    }

    /// Stores a message that arrived from a peer.
    ///
    /// A new id bumps the unread counter; a known id replaces the message in
    /// place. Suggestions computed for the previous last message are cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] for an unknown conversation.
    pub fn receive_message(
        &self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Result<Upsert, ControllerError> {
        let upsert = {
            let mut store = self.store.lock();
            let from_local = &message.sender_id == store.local_user();
            let upsert = store.append_or_replace(conversation_id, message.clone())?;
            if upsert == Upsert::Appended && !from_local {
                store.bump_unread(conversation_id)?;
            }
            upsert
        };
        tracing::debug!(
            conversation = %conversation_id,
            message_id = %message.id,
            ?upsert,
            "message received"
        );
        self.emit(ChatEvent::MessageUpserted {
            conversation_id: conversation_id.clone(),
            message,
        });
        if upsert == Upsert::Appended {
            self.set_suggestions(conversation_id, Vec::new());
        }
        Ok(upsert)
    }

    /// Toggles the local user's `emoji` reaction on a message.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] if the conversation or message
    /// is unknown.
    pub fn react(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<ReactionChange, ControllerError> {
        let (change, reactions) =
            self.store
                .lock()
                .set_reaction(conversation_id, message_id, emoji)?;
        tracing::debug!(conversation = %conversation_id, %message_id, emoji, ?change, "reaction toggled");
        self.emit(ChatEvent::ReactionsChanged {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
            reactions,
        });
        Ok(change)
    }

    /// Marks a conversation as being viewed: resets its unread counter.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] for an unknown conversation.
    pub fn open_conversation(&self, conversation_id: &ConversationId) -> Result<(), ControllerError> {
        self.store.lock().clear_unread(conversation_id)?;
        Ok(())
    }

    /// Stops reconciling the conversation's in-flight AI reply, if any.
    ///
    /// Text already written stays in the store; the typing indicator is
    /// cleared once the reply task observes the cancellation.
    pub fn leave_conversation(&self, conversation_id: &ConversationId) {
        if let Some(active) = self.inner.replies.lock().get(conversation_id) {
            tracing::debug!(conversation = %conversation_id, "cancelling in-flight reply");
            active.token.cancel();
        }
    }

    /// Records the compose-box text typed by the user. Emits no event.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] for an unknown conversation.
    pub fn set_draft(
        &self,
        conversation_id: &ConversationId,
        draft: &str,
    ) -> Result<(), ControllerError> {
        self.store
            .lock()
            .set_draft(conversation_id, Some(draft.to_string()))?;
        Ok(())
    }

    /// Whether any tool call is awaiting the gateway.
    #[must_use]
    pub fn has_pending_tools(&self) -> bool {
        !self.inner.in_flight.lock().is_empty()
    }

    /// Whether an AI reply is currently streaming into the conversation.
    #[must_use]
    pub fn is_replying(&self, conversation_id: &ConversationId) -> bool {
        self.inner.replies.lock().contains_key(conversation_id)
    }

    fn emit(&self, event: ChatEvent) {
        emit(&self.inner.event_tx, event);
    }
}

/// Best-effort event delivery: a full or closed channel drops the event.
fn emit(event_tx: &mpsc::Sender<ChatEvent>, event: ChatEvent) {
    if let Err(err) = event_tx.try_send(event) {
        tracing::trace!(error = %err, "chat event dropped");
    }
}
