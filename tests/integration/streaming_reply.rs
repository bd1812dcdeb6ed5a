//! Integration tests for streamed AI replies.
//!
//! Verifies that:
//! 1. Chunks are reconciled into one message whose text grows monotonically.
//! 2. Failures, timeouts, and cancellation keep partial text and always
//!    clear the typing indicator.
//! 3. A newer reply supersedes an older one in the same conversation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use vexchat::controller::{
    ChatEvent, Committed, ControllerSettings, ConversationController, PendingReply, ReplyOutcome,
};
use vexchat::gateway::GatewayError;
use vexchat::gateway::scripted::{ScriptedGateway, StreamScript};
use vexchat::seed::default_seed;

use vexchat_proto::conversation::ConversationId;
use vexchat_proto::message::MessageId;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Controller = ConversationController<ScriptedGateway>;

fn setup_with(
    gateway: ScriptedGateway,
    stream_timeout: Duration,
) -> (Controller, mpsc::Receiver<ChatEvent>, Arc<ScriptedGateway>) {
    let gateway = Arc::new(gateway);
    let settings = ControllerSettings {
        stream_timeout,
        ..ControllerSettings::default()
    };
    let (controller, events) = ConversationController::new(
        default_seed().into_store().into_shared(),
        Arc::clone(&gateway),
        settings,
        256,
    );
    (controller, events, gateway)
}

fn setup() -> (Controller, mpsc::Receiver<ChatEvent>, Arc<ScriptedGateway>) {
    setup_with(ScriptedGateway::new(), Duration::from_secs(30))
}

fn c1() -> ConversationId {
    ConversationId::from("c1")
}

/// Commits `text` to the assistant conversation and returns the due reply.
fn commit(controller: &Controller, text: &str) -> PendingReply {
    match controller.commit_local_message(&c1(), text).unwrap() {
        Committed::Sent {
            pending_reply: Some(pending),
            ..
        } => pending,
        other => panic!("expected a pending reply, got {other:?}"),
    }
}

fn drain(rx: &mut mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Waits for the first AI-authored upsert in `events`.
async fn next_ai_upsert(events: &mut mpsc::Receiver<ChatEvent>) -> MessageId {
    loop {
        match events.recv().await {
            Some(ChatEvent::MessageUpserted { message, .. }) if message.ai_generated => {
                return message.id;
            }
            Some(_) => {}
            None => panic!("event channel closed"),
        }
    }
}

fn is_typing(controller: &Controller) -> bool {
    controller.store().lock().conversation(&c1()).unwrap().is_typing
}

fn message_count(controller: &Controller) -> usize {
    controller
        .store()
        .lock()
        .conversation(&c1())
        .unwrap()
        .messages
        .len()
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chunks_grow_one_message() {
    let (controller, mut events, gateway) = setup();
    gateway.push_stream(StreamScript::chunks(["Hel", "lo wo", "rld"]));
    let pending = commit(&controller, "Say hello");
    drain(&mut events);

    let outcome = controller.stream_reply(pending).await;
    let ReplyOutcome::Completed {
        message_id: Some(reply_id),
        text,
    } = outcome.clone()
    else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(text, "Hello world");

    let upserts: Vec<(MessageId, String)> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            ChatEvent::MessageUpserted { message, .. } => Some((message.id, message.text)),
            _ => None,
        })
        .collect();
    assert_eq!(
        upserts,
        vec![
            (reply_id.clone(), "Hel".to_string()),
            (reply_id.clone(), "Hello wo".to_string()),
            (reply_id.clone(), "Hello world".to_string()),
        ]
    );

    let store = controller.store().lock();
    let conv = store.conversation(&c1()).unwrap();
    let replies: Vec<_> = conv.messages.iter().filter(|m| m.id == reply_id).collect();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, "Hello world");
    assert!(!conv.is_typing);
}

#[tokio::test]
async fn empty_stream_writes_nothing() {
    let (controller, mut events, gateway) = setup();
    gateway.push_stream(StreamScript::chunks(["", ""]));
    let pending = commit(&controller, "anything?");
    let before = message_count(&controller);
    drain(&mut events);

    let outcome = controller.stream_reply(pending).await;
    assert_eq!(
        outcome,
        ReplyOutcome::Completed {
            message_id: None,
            text: String::new()
        }
    );
    assert_eq!(message_count(&controller), before);
    assert!(!is_typing(&controller));
}

#[tokio::test(start_paused = true)]
async fn reactions_added_mid_stream_survive_later_chunks() {
    let gateway = ScriptedGateway::new().with_chunk_delay(Duration::from_secs(1));
    let (controller, mut events, gateway) = setup_with(gateway, Duration::from_secs(30));
    gateway.push_stream(StreamScript::chunks(["first", " second"]));
    let pending = commit(&controller, "go");

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.stream_reply(pending).await })
    };
    let reply_id = next_ai_upsert(&mut events).await;
    controller.react(&c1(), &reply_id, "👍").unwrap();
    let outcome = task.await.unwrap();
    assert!(matches!(outcome, ReplyOutcome::Completed { ref text, .. } if text == "first second"));

    let store = controller.store().lock();
    let reply = store
        .conversation(&c1())
        .unwrap()
        .messages
        .iter()
        .find(|m| m.id == reply_id)
        .cloned()
        .unwrap();
    assert_eq!(reply.text, "first second");
    assert_eq!(reply.reactions.len(), 1);
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mid_stream_error_keeps_partial_text() {
    let (controller, _events, gateway) = setup();
    gateway.push_stream(StreamScript::FailAfter {
        chunks: vec!["Partial an".into(), "swer".into()],
        error: GatewayError::Transport("connection reset".into()),
    });
    let pending = commit(&controller, "question");

    let outcome = controller.stream_reply(pending).await;
    let ReplyOutcome::Failed {
        message_id: Some(reply_id),
        error,
    } = outcome.clone()
    else {
        panic!("expected failure with partial text, got {outcome:?}");
    };
    assert_eq!(error, GatewayError::Transport("connection reset".into()));

    let store = controller.store().lock();
    let conv = store.conversation(&c1()).unwrap();
    let last = conv.last_message().unwrap();
    assert_eq!(last.id, reply_id);
    assert_eq!(last.text, "Partial answer");
    assert!(!conv.is_typing);
}

#[tokio::test]
async fn refused_stream_leaves_only_user_message() {
    let (controller, mut events, gateway) = setup();
    gateway.push_stream(StreamScript::RefuseToOpen(GatewayError::Http {
        status: 503,
        body: "overloaded".into(),
    }));
    let pending = commit(&controller, "hello?");
    let before = message_count(&controller);

    let outcome = controller.stream_reply(pending).await;
    assert!(matches!(
        outcome,
        ReplyOutcome::Failed {
            message_id: None,
            ..
        }
    ));
    assert_eq!(message_count(&controller), before);
    assert!(!is_typing(&controller));
    assert!(!controller.is_replying(&c1()));

    let finished = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, ChatEvent::ReplyFinished { .. }))
        .count();
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn unavailable_gateway_fails_and_clears_typing() {
    // Nothing queued: the scripted gateway reports itself unavailable.
    let (controller, _events, _gateway) = setup();
    let pending = commit(&controller, "hi");
    let outcome = controller.stream_reply(pending).await;
    assert!(matches!(
        outcome,
        ReplyOutcome::Failed {
            error: GatewayError::Unavailable(_),
            ..
        }
    ));
    assert!(!is_typing(&controller));
}

#[tokio::test(start_paused = true)]
async fn silent_stream_times_out() {
    let (controller, _events, gateway) = setup_with(ScriptedGateway::new(), Duration::from_secs(5));
    gateway.push_stream(StreamScript::StallAfter(vec!["Hel".into()]));
    let pending = commit(&controller, "hello");

    let outcome = controller.stream_reply(pending).await;
    let ReplyOutcome::TimedOut {
        message_id: Some(reply_id),
    } = outcome.clone()
    else {
        panic!("expected timeout after first chunk, got {outcome:?}");
    };

    let store = controller.store().lock();
    let conv = store.conversation(&c1()).unwrap();
    assert_eq!(conv.last_message().unwrap().id, reply_id);
    assert_eq!(conv.last_message().unwrap().text, "Hel");
    assert!(!conv.is_typing);
}

#[tokio::test(start_paused = true)]
async fn slow_open_times_out() {
    let gateway = ScriptedGateway::new().with_latency(Duration::from_secs(60));
    let (controller, _events, gateway) = setup_with(gateway, Duration::from_secs(5));
    gateway.push_stream(StreamScript::chunks(["never seen"]));
    let pending = commit(&controller, "hello");

    let outcome = controller.stream_reply(pending).await;
    assert_eq!(outcome, ReplyOutcome::TimedOut { message_id: None });
    assert!(!is_typing(&controller));
}

#[tokio::test(start_paused = true)]
async fn slow_chunks_within_timeout_complete() {
    let gateway = ScriptedGateway::new().with_chunk_delay(Duration::from_secs(4));
    let (controller, _events, gateway) = setup_with(gateway, Duration::from_secs(5));
    gateway.push_stream(StreamScript::chunks(["a", "b", "c"]));
    let pending = commit(&controller, "slowly");

    let outcome = controller.stream_reply(pending).await;
    assert!(matches!(outcome, ReplyOutcome::Completed { ref text, .. } if text == "abc"));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leaving_conversation_cancels_reply() {
    let (controller, mut events, gateway) = setup();
    gateway.push_stream(StreamScript::StallAfter(vec!["Partial".into()]));
    let pending = commit(&controller, "tell me a story");

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.stream_reply(pending).await })
    };
    let reply_id = next_ai_upsert(&mut events).await;
    assert!(is_typing(&controller));
    assert!(controller.is_replying(&c1()));

    controller.leave_conversation(&c1());
    let outcome = task.await.unwrap();
    assert_eq!(
        outcome,
        ReplyOutcome::Cancelled {
            message_id: Some(reply_id)
        }
    );
    assert!(!is_typing(&controller));
    assert!(!controller.is_replying(&c1()));
    assert_eq!(
        controller
            .store()
            .lock()
            .conversation(&c1())
            .unwrap()
            .last_message()
            .unwrap()
            .text,
        "Partial"
    );
}

#[tokio::test]
async fn newer_reply_supersedes_older() {
    let (controller, mut events, gateway) = setup();
    gateway.push_stream(StreamScript::StallAfter(vec!["old".into()]));
    gateway.push_stream(StreamScript::chunks(["new"]));

    let first = commit(&controller, "first");
    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.stream_reply(first).await })
    };
    let old_id = next_ai_upsert(&mut events).await;

    let second = commit(&controller, "second");
    let outcome = controller.stream_reply(second).await;
    assert!(matches!(outcome, ReplyOutcome::Completed { ref text, .. } if text == "new"));

    let superseded = task.await.unwrap();
    assert_eq!(
        superseded,
        ReplyOutcome::Cancelled {
            message_id: Some(old_id)
        }
    );
    assert!(!is_typing(&controller));
    assert!(!controller.is_replying(&c1()));

    let texts: Vec<String> = controller
        .store()
        .lock()
        .conversation(&c1())
        .unwrap()
        .messages
        .iter()
        .map(|m| m.text.clone())
        .collect();
    assert_eq!(&texts[1..], ["first", "old", "second", "new"]);
}
