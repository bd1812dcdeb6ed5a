//! Integration tests for smart-reply suggestions.
//!
//! Verifies that:
//! 1. Suggestions are requested only when a human peer spoke last.
//! 2. Gateway output is trimmed, filtered, and capped.
//! 3. Failures clear suggestions and stale results are discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use vexchat::controller::{ChatEvent, ControllerSettings, ConversationController};
use vexchat::gateway::GatewayError;
use vexchat::gateway::scripted::{RecordedCall, ScriptedGateway};
use vexchat::seed::default_seed;

use vexchat_proto::conversation::ConversationId;
use vexchat_proto::message::{Message, MessageId};
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

fn suggestion_events(rx: &mut mpsc::Receiver<ChatEvent>) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ChatEvent::SmartRepliesChanged { replies, .. } = event {
            out.push(replies);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn human_peer_gets_normalized_suggestions() {
    let (controller, mut events, gateway) = setup();
    gateway.push_structured(Ok(vec![
        " Sure, I'll bring them ".into(),
        String::new(),
        "Which files?".into(),
        "   ".into(),
        "On my way".into(),
        "One too many".into(),
    ]));

    let replies = controller.refresh_smart_replies(&c2()).await.unwrap();
    assert_eq!(replies, ["Sure, I'll bring them", "Which files?", "On my way"]);
    assert_eq!(controller.smart_replies(&c2()), replies);
    assert_eq!(suggestion_events(&mut events), vec![replies]);

    let calls = gateway.calls();
    let [RecordedCall::Structured(prompt)] = calls.as_slice() else {
        panic!("expected one structured call, got {calls:?}");
    };
    assert!(prompt.contains("Alice Williams: Hey, are we still on for the meeting tomorrow?"));
    assert!(prompt.contains("Me: Yes, absolutely."));
    assert!(prompt.contains("Alice Williams: Great. Can you bring the project files?"));
}

#[tokio::test]
async fn assistant_conversation_never_calls_gateway() {
    let (controller, mut events, gateway) = setup();
    let replies = controller
        .refresh_smart_replies(&ConversationId::from("c1"))
        .await
        .unwrap();
    assert!(replies.is_empty());
    assert!(gateway.calls().is_empty());
    assert!(suggestion_events(&mut events).is_empty());
}

#[tokio::test]
async fn local_last_message_clears_without_calling_gateway() {
    let (controller, mut events, gateway) = setup();
    gateway.push_structured(Ok(vec!["Sure".into()]));
    controller.refresh_smart_replies(&c2()).await.unwrap();
    assert_eq!(gateway.calls().len(), 1);

    // Sending clears the suggestions immediately.
    controller.commit_local_message(&c2(), "Will do").unwrap();
    assert!(controller.smart_replies(&c2()).is_empty());

    let replies = controller.refresh_smart_replies(&c2()).await.unwrap();
    assert!(replies.is_empty());
    assert_eq!(gateway.calls().len(), 1);
    assert_eq!(
        suggestion_events(&mut events),
        vec![vec!["Sure".to_string()], Vec::new()]
    );
}

#[tokio::test]
async fn gateway_failure_clears_suggestions() {
    let (controller, _events, gateway) = setup();
    gateway.push_structured(Ok(vec!["Sure".into()]));
    gateway.push_structured(Err(GatewayError::Rejected("quota".into())));

    controller.refresh_smart_replies(&c2()).await.unwrap();
    assert_eq!(controller.smart_replies(&c2()), ["Sure"]);

    let replies = controller.refresh_smart_replies(&c2()).await.unwrap();
    assert!(replies.is_empty());
    assert!(controller.smart_replies(&c2()).is_empty());
}

#[tokio::test]
async fn empty_structured_answer_means_no_suggestions() {
    let (controller, mut events, gateway) = setup();
    gateway.push_structured(Ok(Vec::new()));
    let replies = controller.refresh_smart_replies(&c2()).await.unwrap();
    assert!(replies.is_empty());
    assert!(suggestion_events(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_result_is_discarded() {
    let gateway = ScriptedGateway::new().with_latency(Duration::from_secs(2));
    let (controller, _events, gateway) = setup_with(gateway);
    gateway.push_structured(Ok(vec!["Stale".into()]));

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.refresh_smart_replies(&c2()).await })
    };
    while gateway.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    controller
        .receive_message(
            &c2(),
            Message::new(MessageId::from("late"), UserId::from("u2"), "Also the slides"),
        )
        .unwrap();

    let replies = task.await.unwrap().unwrap();
    assert!(replies.is_empty());
    assert!(controller.smart_replies(&c2()).is_empty());
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let (controller, _events, _gateway) = setup();
    assert!(
        controller
            .refresh_smart_replies(&ConversationId::from("missing"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn window_limits_context() {
    let gateway = Arc::new(ScriptedGateway::new());
    let settings = ControllerSettings {
        smart_reply_window: 1,
        smart_reply_count: 1,
        ..ControllerSettings::default()
    };
    let (controller, _events) = ConversationController::new(
        default_seed().into_store().into_shared(),
        Arc::clone(&gateway),
        settings,
        16,
    );
    gateway.push_structured(Ok(vec!["A".into(), "B".into()]));

    let replies = controller.refresh_smart_replies(&c2()).await.unwrap();
    assert_eq!(replies, ["A"]);

    let calls = gateway.calls();
    let [RecordedCall::Structured(prompt)] = calls.as_slice() else {
        panic!("expected one structured call");
    };
    assert!(!prompt.contains("Me: Yes, absolutely."));
    assert!(prompt.contains("Great. Can you bring the project files?"));
}

#[tokio::test]
async fn summary_clears_suggestions() {
    let (controller, mut events, gateway) = setup();
    gateway.push_structured(Ok(vec!["Sure".into(), "Ok".into(), "Later".into()]));
    gateway.push_summary(Ok("Meeting tomorrow.".into()));

    controller.refresh_smart_replies(&c2()).await.unwrap();
    assert_eq!(controller.smart_replies(&c2()), ["Sure", "Ok", "Later"]);

    controller.summarize_conversation(&c2()).await.unwrap();
    {
        let store = controller.store().lock();
        let last = store.conversation(&c2()).unwrap().last_message().unwrap().clone();
        assert!(last.ai_generated);
    }
    assert!(controller.smart_replies(&c2()).is_empty());
    assert_eq!(
        suggestion_events(&mut events),
        vec![
            vec!["Sure".to_string(), "Ok".to_string(), "Later".to_string()],
            Vec::new(),
        ]
    );

    // An AI-authored last message never triggers new suggestions.
    let replies = controller.refresh_smart_replies(&c2()).await.unwrap();
    assert!(replies.is_empty());
    assert_eq!(gateway.calls().len(), 2);
}
