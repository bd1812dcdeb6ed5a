//! Streaming AI replies.
//!
//! One reply owns one [`StreamReconciler`]: chunks are concatenated onto a
//! running buffer and the *full* text so far is upserted under a single
//! lazily allocated message id, so observers only ever see one message
//! that grows monotonically.
//!
//! At most one reply streams into a conversation at a time. Starting a new
//! one cancels the previous reply's token; the superseded reply stops
//! writing and leaves the typing indicator to its successor.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vexchat_proto::assist::Turn;
use vexchat_proto::conversation::ConversationId;
use vexchat_proto::message::{Message, MessageId, MessageStatus, Timestamp};
use vexchat_proto::user::UserId;

use super::{ChatEvent, ConversationController, emit};
use crate::gateway::{AiGateway, GatewayError};
use crate::store::SharedStore;

/// An AI reply that is due after a local send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    /// Conversation to reply into.
    pub conversation_id: ConversationId,
    /// The AI participant that authors the reply.
    pub responder: UserId,
    /// Role-tagged transcript preceding `prompt`.
    pub history: Vec<Turn>,
    /// The local message being answered.
    pub prompt: String,
}

/// How a streamed reply ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The stream ended normally. `message_id` is `None` if it produced no text.
    Completed {
        message_id: Option<MessageId>,
        text: String,
    },
    /// The gateway failed; any partial text stays visible.
    Failed {
        message_id: Option<MessageId>,
        error: GatewayError,
    },
    /// The stream did not open or went silent for longer than the timeout.
    TimedOut { message_id: Option<MessageId> },
    /// The reply was superseded or the user left the conversation.
    Cancelled { message_id: Option<MessageId> },
}

impl ReplyOutcome {
    /// Id of the reply message, if any text was written.
    #[must_use]
    pub const fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::Completed { message_id, .. }
            | Self::Failed { message_id, .. }
            | Self::TimedOut { message_id }
            | Self::Cancelled { message_id } => message_id.as_ref(),
        }
    }
}

/// Accumulates streamed chunks into one logical message.
#[derive(Debug)]
pub struct StreamReconciler {
    responder: UserId,
    message_id: Option<MessageId>,
    started_at: Option<Timestamp>,
    text: String,
}

impl StreamReconciler {
    /// Creates an empty reconciler for replies authored by `responder`.
    #[must_use]
    pub const fn new(responder: UserId) -> Self {
        Self {
            responder,
            message_id: None,
            started_at: None,
            text: String::new(),
        }
    }

    /// Appends `chunk` and returns the full message to upsert.
    ///
    /// The id and timestamp are fixed by the first non-empty chunk. Empty
    /// chunks change nothing and return `None`.
    pub fn push(&mut self, chunk: &str) -> Option<Message> {
        if chunk.is_empty() {
            return None;
        }
        self.text.push_str(chunk);
        let id = self.message_id.get_or_insert_with(MessageId::new).clone();
        let started_at = *self.started_at.get_or_insert_with(Timestamp::now);

        let mut message = Message::new(id, self.responder.clone(), self.text.clone())
            .with_ai_origin(MessageStatus::Read);
        message.timestamp = started_at;
        Some(message)
    }

    /// The reply message id, once the first chunk arrived.
    #[must_use]
    pub const fn message_id(&self) -> Option<&MessageId> {
        self.message_id.as_ref()
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Registration of the reply currently streaming into a conversation.
#[derive(Debug)]
pub(super) struct ActiveReply {
    pub(super) token: CancellationToken,
    generation: u64,
}

/// Holds the typing indicator on for the lifetime of one reply.
///
/// Dropping the guard clears the indicator and unregisters the reply,
/// unless a newer reply has taken over the conversation.
struct TypingGuard {
    store: SharedStore,
    event_tx: mpsc::Sender<ChatEvent>,
    replies: Arc<Mutex<HashMap<ConversationId, ActiveReply>>>,
    conversation_id: ConversationId,
    generation: u64,
}

impl TypingGuard {
    fn engage(
        store: SharedStore,
        event_tx: mpsc::Sender<ChatEvent>,
        replies: Arc<Mutex<HashMap<ConversationId, ActiveReply>>>,
        conversation_id: ConversationId,
        generation: u64,
    ) -> Self {
        if store.lock().set_typing(&conversation_id, true).is_ok() {
            emit(
                &event_tx,
                ChatEvent::TypingChanged {
                    conversation_id: conversation_id.clone(),
                    is_typing: true,
                },
            );
        }
        Self {
            store,
            event_tx,
            replies,
            conversation_id,
            generation,
        }
    }
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        {
            let mut replies = self.replies.lock();
            let current = replies
                .get(&self.conversation_id)
                .is_some_and(|active| active.generation == self.generation);
            if !current {
                return;
            }
            replies.remove(&self.conversation_id);
        }
        if self
            .store
            .lock()
            .set_typing(&self.conversation_id, false)
            .is_ok()
        {
            emit(
                &self.event_tx,
                ChatEvent::TypingChanged {
                    conversation_id: self.conversation_id.clone(),
                    is_typing: false,
                },
            );
        }
    }
}

impl<G: AiGateway> ConversationController<G> {
    /// Streams the AI reply for a committed message into the store.
    ///
    /// Sets the typing indicator, opens the gateway stream with the
    /// captured transcript, and upserts the accumulated text after every
    /// chunk. The indicator is cleared on every exit path before
    /// [`ChatEvent::ReplyFinished`] is emitted. Gateway errors and
    /// timeouts end the reply with whatever text was already written.
    pub async fn stream_reply(&self, pending: PendingReply) -> ReplyOutcome {
        let conversation_id = pending.conversation_id.clone();
        let (token, generation) = self.begin_reply(&conversation_id);
        let typing = TypingGuard::engage(
            Arc::clone(&self.store),
            self.inner.event_tx.clone(),
            Arc::clone(&self.inner.replies),
            conversation_id.clone(),
            generation,
        );

        let mut reconciler = StreamReconciler::new(pending.responder.clone());
        let outcome = self.pump(&pending, &token, &mut reconciler).await;
        drop(typing);

        match &outcome {
            ReplyOutcome::Completed { text, .. } => {
                tracing::info!(conversation = %conversation_id, len = text.len(), "AI reply completed");
            }
            ReplyOutcome::Failed { error, .. } => {
                tracing::warn!(conversation = %conversation_id, %error, "AI reply failed");
            }
            ReplyOutcome::TimedOut { .. } => {
                tracing::warn!(conversation = %conversation_id, "AI reply stream timed out");
            }
            ReplyOutcome::Cancelled { .. } => {
                tracing::debug!(conversation = %conversation_id, "AI reply cancelled");
            }
        }

        self.emit(ChatEvent::ReplyFinished {
            conversation_id,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Registers a new reply, cancelling the one it supersedes.
    fn begin_reply(&self, conversation_id: &ConversationId) -> (CancellationToken, u64) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let previous = self.inner.replies.lock().insert(
            conversation_id.clone(),
            ActiveReply {
                token: token.clone(),
                generation,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(conversation = %conversation_id, "superseding in-flight reply");
            previous.token.cancel();
        }
        (token, generation)
    }

    async fn pump(
        &self,
        pending: &PendingReply,
        token: &CancellationToken,
        reconciler: &mut StreamReconciler,
    ) -> ReplyOutcome {
        let timeout = self.inner.settings.stream_timeout;

        let opened = tokio::select! {
            biased;
            () = token.cancelled() => return ReplyOutcome::Cancelled { message_id: None },
            opened = tokio::time::timeout(
                timeout,
                self.inner.gateway.chat_stream(&pending.history, &pending.prompt),
            ) => opened,
        };
        let mut chunks = match opened {
            Ok(Ok(chunks)) => chunks,
            Ok(Err(error)) => {
                return ReplyOutcome::Failed {
                    message_id: None,
                    error,
                };
            }
            Err(_) => return ReplyOutcome::TimedOut { message_id: None },
        };

        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => {
                    return ReplyOutcome::Cancelled {
                        message_id: reconciler.message_id().cloned(),
                    };
                }
                next = tokio::time::timeout(timeout, chunks.next()) => next,
            };
            match next {
                Ok(Some(Ok(chunk))) => {
                    if let Some(message) = reconciler.push(&chunk) {
                        self.upsert_reply(&pending.conversation_id, message);
                    }
                }
                Ok(Some(Err(error))) => {
                    return ReplyOutcome::Failed {
                        message_id: reconciler.message_id().cloned(),
                        error,
                    };
                }
                Ok(None) => {
                    return ReplyOutcome::Completed {
                        message_id: reconciler.message_id().cloned(),
                        text: reconciler.text().to_string(),
                    };
                }
                Err(_) => {
                    return ReplyOutcome::TimedOut {
                        message_id: reconciler.message_id().cloned(),
                    };
                }
            }
        }
    }

    /// Writes one reconciled snapshot, keeping reactions added mid-stream.
    fn upsert_reply(&self, conversation_id: &ConversationId, mut message: Message) {
        let result = {
            let mut store = self.store.lock();
            if let Some(existing) = store
                .conversation(conversation_id)
                .and_then(|c| c.messages.iter().find(|m| m.id == message.id))
            {
                message.reactions.clone_from(&existing.reactions);
            }
            store.append_or_replace(conversation_id, message.clone())
        };
        match result {
            Ok(_) => self.emit(ChatEvent::MessageUpserted {
                conversation_id: conversation_id.clone(),
                message,
            }),
            Err(err) => tracing::debug!(error = %err, "dropping reply chunk"),
        }
    }
}
