//! Integration tests for the assistant tools: draft rewriting, message
//! annotations, and conversation summaries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use vexchat::controller::{
    ChatEvent, ControllerError, ControllerSettings, ConversationController, FALLBACK_APOLOGY,
    SUMMARY_EMPTY, SUMMARY_HEADER, SUMMARY_UNAVAILABLE, ToolOutcome,
};
use vexchat::gateway::GatewayError;
use vexchat::gateway::scripted::{RecordedCall, ScriptedGateway};
use vexchat::seed::default_seed;

use vexchat_proto::assist::AiAction;
use vexchat_proto::conversation::ConversationId;
use vexchat_proto::message::{MessageId, MessageStatus};
use vexchat_proto::user::UserId;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Controller = ConversationController<ScriptedGateway>;

fn setup_with(gateway: ScriptedGateway) -> (Controller, mpsc::Receiver<ChatEvent>, Arc<ScriptedGateway>) {
    let gateway = Arc::new(gateway);
    let (controller, events) = ConversationController::new(
        default_seed().into_store().into_shared(),
        Arc::clone(&gateway),
        ControllerSettings::default(),
        256,
    );
    (controller, events, gateway)
}

fn setup() -> (Controller, mpsc::Receiver<ChatEvent>, Arc<ScriptedGateway>) {
    setup_with(ScriptedGateway::new())
}

fn c2() -> ConversationId {
    ConversationId::from("c2")
}

fn draft(controller: &Controller, id: &ConversationId) -> Option<String> {
    controller.store().lock().conversation(id).unwrap().draft.clone()
}

fn drain(rx: &mut mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---------------------------------------------------------------------------
// Draft tools
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rewrite_replaces_draft() {
    let (controller, mut events, gateway) = setup();
    controller.set_draft(&c2(), "plz fix this").unwrap();
    gateway.push_completion(Ok("  Please fix this.\n".into()));

    let outcome = controller
        .transform_draft(&c2(), AiAction::FixGrammar)
        .await
        .unwrap();
    assert_eq!(outcome, ToolOutcome::Applied("Please fix this.".into()));
    assert_eq!(draft(&controller, &c2()).as_deref(), Some("Please fix this."));
    assert_eq!(
        drain(&mut events),
        vec![ChatEvent::DraftChanged {
            conversation_id: c2(),
            draft: Some("Please fix this.".into()),
        }]
    );

    let calls = gateway.calls();
    let [RecordedCall::Complete(prompt)] = calls.as_slice() else {
        panic!("expected one completion call, got {calls:?}");
    };
    assert!(prompt.contains("plz fix this"));
}

#[tokio::test]
async fn failed_rewrite_puts_apology_in_draft() {
    let (controller, mut events, gateway) = setup();
    controller.set_draft(&c2(), "plz fix this").unwrap();
    gateway.push_completion(Err(GatewayError::Timeout));

    let outcome = controller
        .transform_draft(&c2(), AiAction::RewriteProfessional)
        .await
        .unwrap();
    assert_eq!(outcome, ToolOutcome::Fallback(FALLBACK_APOLOGY.into()));
    assert_eq!(draft(&controller, &c2()).as_deref(), Some(FALLBACK_APOLOGY));
    assert_eq!(
        drain(&mut events),
        vec![ChatEvent::DraftChanged {
            conversation_id: c2(),
            draft: Some(FALLBACK_APOLOGY.into()),
        }]
    );
}

#[tokio::test]
async fn blank_rewrite_keeps_source_text() {
    let (controller, _events, gateway) = setup();
    controller.set_draft(&c2(), "hey").unwrap();
    gateway.push_completion(Ok("   ".into()));

    let outcome = controller
        .transform_draft(&c2(), AiAction::RewriteFriendly)
        .await
        .unwrap();
    assert_eq!(outcome, ToolOutcome::Applied("hey".into()));
    assert_eq!(draft(&controller, &c2()).as_deref(), Some("hey"));
}

#[tokio::test]
async fn empty_draft_is_skipped() {
    let (controller, _events, gateway) = setup();
    controller.set_draft(&c2(), "   ").unwrap();
    let outcome = controller
        .transform_draft(&c2(), AiAction::TranslateEn)
        .await
        .unwrap();
    assert_eq!(outcome, ToolOutcome::Skipped);
    assert!(gateway.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_rewrite_is_busy() {
    let gateway = ScriptedGateway::new().with_latency(Duration::from_secs(3));
    let (controller, _events, gateway) = setup_with(gateway);
    controller.set_draft(&c2(), "plz fix this").unwrap();
    gateway.push_completion(Ok("Please fix this.".into()));

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.transform_draft(&c2(), AiAction::FixGrammar).await })
    };
    while gateway.calls().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(controller.has_pending_tools());

    let second = controller
        .transform_draft(&c2(), AiAction::FixGrammar)
        .await
        .unwrap();
    assert_eq!(second, ToolOutcome::Busy);

    let first = task.await.unwrap().unwrap();
    assert_eq!(first, ToolOutcome::Applied("Please fix this.".into()));
    assert!(!controller.has_pending_tools());
    assert_eq!(gateway.calls().len(), 1);
}

// ---------------------------------------------------------------------------
// Message annotations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn annotation_is_attached_to_message() {
    let (controller, mut events, gateway) = setup();
    let m = MessageId::from("m2-3");
    gateway.push_completion(Ok("Alice asks you to bring the files.".into()));

    let outcome = controller
        .annotate_message(&c2(), &m, AiAction::Explain)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ToolOutcome::Applied("Alice asks you to bring the files.".into())
    );

    let annotation = controller.annotation(&c2(), &m).unwrap();
    assert_eq!(annotation.action, AiAction::Explain);
    assert_eq!(annotation.text, "Alice asks you to bring the files.");
    assert_eq!(
        drain(&mut events),
        vec![ChatEvent::AnnotationReady(annotation)]
    );

    // The message itself is untouched.
    let store = controller.store().lock();
    assert_eq!(
        store.conversation(&c2()).unwrap().messages[2].text,
        "Great. Can you bring the project files?"
    );
}

#[tokio::test]
async fn failed_annotation_shows_apology() {
    let (controller, _events, _gateway) = setup();
    let m = MessageId::from("m2-1");

    let outcome = controller
        .annotate_message(&c2(), &m, AiAction::TranslateEn)
        .await
        .unwrap();
    assert_eq!(outcome, ToolOutcome::Fallback(FALLBACK_APOLOGY.into()));
    assert_eq!(
        controller.annotation(&c2(), &m).unwrap().text,
        FALLBACK_APOLOGY
    );
}

#[tokio::test]
async fn blank_annotation_falls_back_to_source_text() {
    let (controller, _events, gateway) = setup();
    let m = MessageId::from("m2-2");
    gateway.push_completion(Ok(String::new()));

    let outcome = controller
        .annotate_message(&c2(), &m, AiAction::TranslateEn)
        .await
        .unwrap();
    assert_eq!(outcome, ToolOutcome::Applied("Yes, absolutely.".into()));
}

#[tokio::test]
async fn dismiss_removes_annotation() {
    let (controller, _events, gateway) = setup();
    let m = MessageId::from("m2-3");
    gateway.push_completion(Ok("short".into()));
    controller
        .annotate_message(&c2(), &m, AiAction::Summarize)
        .await
        .unwrap();

    assert!(controller.dismiss_annotation(&c2(), &m));
    assert!(controller.annotation(&c2(), &m).is_none());
    assert!(!controller.dismiss_annotation(&c2(), &m));
}

#[tokio::test]
async fn annotating_unknown_message_is_not_found() {
    let (controller, _events, gateway) = setup();
    let err = controller
        .annotate_message(&c2(), &MessageId::from("ghost"), AiAction::Explain)
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::NotFound(_)));
    assert!(gateway.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Conversation summaries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn summary_appends_assistant_message() {
    let (controller, _events, gateway) = setup();
    gateway.push_summary(Ok("Meeting tomorrow; bring the files.".into()));
    gateway.push_summary(Ok("Still the meeting.".into()));

    let first = controller.summarize_conversation(&c2()).await.unwrap().unwrap();
    let second = controller.summarize_conversation(&c2()).await.unwrap().unwrap();
    assert_ne!(first, second);

    let store = controller.store().lock();
    let conv = store.conversation(&c2()).unwrap();
    assert_eq!(conv.messages.len(), 5);
    let summary = &conv.messages[3];
    assert_eq!(summary.id, first);
    assert_eq!(
        summary.text,
        format!("{SUMMARY_HEADER}\n\nMeeting tomorrow; bring the files.")
    );
    assert_eq!(summary.sender_id, UserId::from("gemini"));
    assert!(summary.ai_generated);
    assert_eq!(summary.status, MessageStatus::Read);
    drop(store);

    let calls = gateway.calls();
    let RecordedCall::Summarize(transcript) = &calls[0] else {
        panic!("expected a summarize call");
    };
    assert_eq!(
        transcript,
        "Alice Williams: Hey, are we still on for the meeting tomorrow?\n\
         You: Yes, absolutely.\n\
         Alice Williams: Great. Can you bring the project files?"
    );
}

#[tokio::test]
async fn failed_summary_appends_unavailable_notice() {
    let (controller, _events, gateway) = setup();
    gateway.push_summary(Err(GatewayError::Http {
        status: 500,
        body: "boom".into(),
    }));

    let id = controller.summarize_conversation(&c2()).await.unwrap().unwrap();
    let store = controller.store().lock();
    let conv = store.conversation(&c2()).unwrap();
    assert_eq!(conv.messages.len(), 4);
    let last = conv.last_message().unwrap();
    assert_eq!(last.id, id);
    assert_eq!(last.text, format!("{SUMMARY_HEADER}\n\n{SUMMARY_UNAVAILABLE}"));
    assert!(last.ai_generated);
}

#[tokio::test]
async fn blank_summary_appends_placeholder() {
    let (controller, _events, gateway) = setup();
    gateway.push_summary(Ok("  ".into()));

    controller.summarize_conversation(&c2()).await.unwrap();
    let store = controller.store().lock();
    let last = store.conversation(&c2()).unwrap().last_message().unwrap().clone();
    assert_eq!(last.text, format!("{SUMMARY_HEADER}\n\n{SUMMARY_EMPTY}"));
}

#[tokio::test]
async fn summary_of_unknown_conversation_is_not_found() {
    let (controller, _events, _gateway) = setup();
    assert!(
        controller
            .summarize_conversation(&ConversationId::from("missing"))
            .await
            .is_err()
    );
}
