//! `VexChat` terminal client.
//!
//! Launches the TUI over a seeded conversation store and talks to the
//! Gemini API for AI replies and assistant tools. Configuration via CLI
//! flags, environment variables, or config file
//! (`~/.config/vexchat/config.toml`).
//!
//! ```bash
//! GEMINI_API_KEY=... cargo run --bin vexchat
//!
//! # Custom conversations and model
//! cargo run --bin vexchat -- --seed-file chats.toml --model gemini-2.5-flash
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use vexchat::app::{App, AppCommand};
use vexchat::config::{CliArgs, ClientConfig};
use vexchat::controller::{ChatEvent, Committed, ConversationController};
use vexchat::gateway::gemini::GeminiGateway;
use vexchat::seed::{self, Seed};
use vexchat::ui;
use vexchat_proto::conversation::ConversationId;

type Controller = ConversationController<GeminiGateway>;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Initialize logging before terminal setup (logs go to file, not stdout).
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(model = %config.gateway.model, "vexchat starting");

    let seed = load_seed(&config).map_err(io::Error::other)?;
    let assistant = seed.assistant.id.clone();
    let store = seed.into_store().into_shared();

    let gateway = GeminiGateway::new(&config.gateway).map_err(io::Error::other)?;
    if !gateway.has_credentials() {
        tracing::warn!("no Gemini API key configured; assistant features will be unavailable");
    }
    let (controller, events) = ConversationController::new(
        store,
        Arc::new(gateway),
        config.to_controller_settings(assistant),
        config.event_buffer,
    );

    // Set up terminal.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app.
    let result = run_app(&mut terminal, &controller, events, &config);

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("vexchat exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, since ratatui owns the terminal).
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("vexchat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

fn load_seed(config: &ClientConfig) -> Result<Seed, seed::SeedError> {
    match &config.seed_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading seed file");
            seed::load_seed_file(path)
        }
        None => Ok(seed::default_seed()),
    }
}

/// Main application loop.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    controller: &Controller,
    mut events: mpsc::Receiver<ChatEvent>,
    config: &ClientConfig,
) -> io::Result<()> {
    let mut app = App::new(&controller.store().lock())
        .with_timestamp_format(config.timestamp_format.clone());
    if let Some(id) = app.selected_conversation.clone() {
        open(controller, &id);
    }

    loop {
        // Step 1: Draw the UI frame.
        {
            let store = controller.store().lock();
            terminal.draw(|frame| ui::draw(frame, &app, &store))?;
        }

        // Step 2: Drain all pending controller events (non-blocking).
        drain_events(&mut app, controller, &mut events);
        app.tools_pending = controller.has_pending_tools();

        // Step 3: Poll for terminal input events.
        if event::poll(config.poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            let command = app.handle_key_event(key, &controller.store().lock());
            if let Some(command) = command {
                execute_command(&app, controller, command);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Drain all pending [`ChatEvent`]s and apply them to the app.
fn drain_events(app: &mut App, controller: &Controller, events: &mut mpsc::Receiver<ChatEvent>) {
    while let Ok(event) = events.try_recv() {
        if let ChatEvent::MessageUpserted {
            conversation_id,
            message,
        } = &event
        {
            let viewing = app.selected_conversation.as_ref() == Some(conversation_id);
            let from_peer =
                &message.sender_id != controller.store().lock().local_user() && !message.ai_generated;
            if viewing && from_peer {
                open(controller, conversation_id);
            }
        }
        let store = controller.store().lock();
        app.apply_event(&event, &store);
    }
}

/// Run an [`AppCommand`] against the controller.
///
/// Store mutations complete before this returns; gateway work is spawned.
fn execute_command(app: &App, controller: &Controller, command: AppCommand) {
    match command {
        AppCommand::Send {
            conversation_id,
            text,
        } => match controller.commit_local_message(&conversation_id, &text) {
            Ok(Committed::Sent {
                pending_reply: Some(pending),
                ..
            }) => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    controller.stream_reply(pending).await;
                });
            }
            Ok(Committed::Sent { .. } | Committed::Ignored) => {}
            Err(e) => tracing::warn!(conversation = %conversation_id, error = %e, "send rejected"),
        },
        AppCommand::DraftEdited {
            conversation_id,
            text,
        } => {
            if let Err(e) = controller.set_draft(&conversation_id, &text) {
                tracing::debug!(error = %e, "draft not saved");
            }
        }
        AppCommand::SelectConversation { previous, next } => {
            if let Some(previous) = previous {
                controller.leave_conversation(&previous);
            }
            open(controller, &next);
        }
        AppCommand::TransformDraft {
            conversation_id,
            action,
        } => {
            // The store draft must match what is on screen before rewriting.
            if let Err(e) = controller.set_draft(&conversation_id, &app.input) {
                tracing::debug!(error = %e, "draft not saved");
            }
            let controller = controller.clone();
            tokio::spawn(async move {
                if let Err(e) = controller.transform_draft(&conversation_id, action).await {
                    tracing::debug!(error = %e, "draft tool not run");
                }
            });
        }
        AppCommand::AnnotateMessage {
            conversation_id,
            message_id,
            action,
        } => {
            let controller = controller.clone();
            tokio::spawn(async move {
                if let Err(e) = controller
                    .annotate_message(&conversation_id, &message_id, action)
                    .await
                {
                    tracing::debug!(error = %e, "message tool not run");
                }
            });
        }
        AppCommand::DismissAnnotation {
            conversation_id,
            message_id,
        } => {
            controller.dismiss_annotation(&conversation_id, &message_id);
        }
        AppCommand::React {
            conversation_id,
            message_id,
            emoji,
        } => {
            if let Err(e) = controller.react(&conversation_id, &message_id, &emoji) {
                tracing::debug!(error = %e, "reaction not applied");
            }
        }
        AppCommand::Summarize { conversation_id } => {
            let controller = controller.clone();
            tokio::spawn(async move {
                if let Err(e) = controller.summarize_conversation(&conversation_id).await {
                    tracing::debug!(error = %e, "summary not run");
                }
            });
        }
    }
}

/// Mark a conversation as viewed and refresh its smart replies.
fn open(controller: &Controller, conversation_id: &ConversationId) {
    if let Err(e) = controller.open_conversation(conversation_id) {
        tracing::debug!(error = %e, "cannot open conversation");
        return;
    }
    let controller = controller.clone();
    let conversation_id = conversation_id.clone();
    tokio::spawn(async move {
        if let Err(e) = controller.refresh_smart_replies(&conversation_id).await {
            tracing::debug!(error = %e, "smart replies not refreshed");
        }
    });
}
