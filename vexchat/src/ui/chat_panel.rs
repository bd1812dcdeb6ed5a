//! Chat panel rendering (header + message list + compose box).

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use vexchat_proto::conversation::Conversation;
use vexchat_proto::message::Message;

use super::{format_timestamp, theme};
use crate::app::{App, PanelFocus};
use crate::store::MessageStore;

/// Render the chat panel for the selected conversation.
pub fn render(frame: &mut Frame, area: Rect, app: &App, store: &MessageStore) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let conversation = app
        .selected_conversation
        .as_ref()
        .and_then(|id| store.conversation(id));

    render_messages(frame, chunks[0], app, store, conversation);
    render_input(frame, chunks[1], app);
}

/// Panel title: peer name plus presence or typing state.
fn header<'a>(conversation: &'a Conversation, store: &MessageStore) -> Line<'a> {
    let Some(peer) = conversation.peer(store.local_user()) else {
        return Line::from("Chat");
    };
    let (state, color) = if conversation.is_typing {
        ("typing...", theme::AGENT)
    } else if peer.is_online {
        ("online", theme::ONLINE)
    } else {
        ("last seen recently", theme::OFFLINE)
    };
    let mut spans = vec![Span::styled(peer.name.as_str(), theme::bold())];
    if peer.is_agent {
        spans.push(Span::styled(" ✦", theme::normal().fg(theme::AGENT)));
    }
    spans.push(Span::raw(" · "));
    spans.push(Span::styled(state, theme::normal().fg(color)));
    Line::from(spans)
}

/// Render the message list.
fn render_messages(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    store: &MessageStore,
    conversation: Option<&Conversation>,
) {
    let is_focused = app.focus == PanelFocus::Chat;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::border(is_focused));

    let Some(conversation) = conversation else {
        let empty = Paragraph::new(Line::from(Span::styled(
            "Select a conversation",
            theme::dimmed(),
        )))
        .block(block.title("Chat"));
        frame.render_widget(empty, area);
        return;
    };

    let items: Vec<ListItem> = conversation
        .messages
        .iter()
        .map(|msg| ListItem::new(message_lines(msg, conversation, app, store)))
        .collect();

    let highlight = if is_focused {
        theme::normal().add_modifier(Modifier::REVERSED)
    } else {
        theme::normal()
    };
    let list = List::new(items)
        .block(block.title(header(conversation, store)))
        .highlight_style(highlight);

    // Selecting the highlighted message keeps it scrolled into view.
    let mut state = ListState::default().with_selected(Some(app.selected_message));
    frame.render_stateful_widget(list, area, &mut state);
}

/// Lines for one message: text, reactions, and annotation.
fn message_lines<'a>(
    msg: &'a Message,
    conversation: &Conversation,
    app: &App,
    store: &'a MessageStore,
) -> Vec<Line<'a>> {
    let is_local = &msg.sender_id == store.local_user();
    let sender = if is_local {
        "You"
    } else {
        store.display_name(&msg.sender_id)
    };
    let text_style = if msg.ai_generated {
        theme::ai_text()
    } else {
        theme::normal()
    };

    let mut lines = Vec::new();
    for (i, text_line) in msg.text.lines().enumerate() {
        let mut spans = Vec::new();
        if i == 0 {
            spans.push(Span::styled(
                format_timestamp(msg.timestamp, &app.timestamp_format),
                theme::timestamp(),
            ));
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                sender,
                theme::bold().fg(theme::sender_color(sender)),
            ));
            if msg.ai_generated {
                spans.push(Span::styled(" ✦", theme::normal().fg(theme::AGENT)));
            }
            spans.push(Span::raw(": "));
        } else {
            spans.push(Span::raw("    "));
        }
        spans.push(Span::styled(text_line, text_style));
        lines.push(Line::from(spans));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(sender, theme::dimmed())));
    }
    if is_local && let Some(last) = lines.last_mut() {
        last.push_span(Span::raw(" "));
        last.push_span(Span::styled(msg.status.symbol(), theme::dimmed()));
    }

    if !msg.reactions.is_empty() {
        let mut spans = vec![Span::raw("    ")];
        for reaction in &msg.reactions {
            spans.push(Span::styled(
                format!("{} {} ", reaction.emoji, reaction.count),
                theme::reaction(reaction.self_reacted),
            ));
        }
        lines.push(Line::from(spans));
    }

    if let Some(annotation) = app
        .annotations
        .get(&(conversation.id.clone(), msg.id.clone()))
    {
        lines.push(Line::from(vec![
            Span::raw("    ┃ "),
            Span::styled(format!("{}:", annotation.action.label()), theme::bold()),
        ]));
        for text_line in annotation.text.lines() {
            lines.push(Line::from(vec![
                Span::raw("    ┃ "),
                Span::styled(text_line.to_string(), theme::annotation()),
            ]));
        }
    }

    lines
}

/// Render the compose box.
fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let is_focused = app.focus == PanelFocus::Input;

    let mut display_text = app.input.clone();
    if is_focused {
        let at = display_text
            .char_indices()
            .nth(app.cursor_position)
            .map_or(display_text.len(), |(i, _)| i);
        display_text.insert(at, '█');
    }

    let input_line = if display_text.is_empty() && !is_focused {
        Line::from(Span::styled("Type a message...", theme::dimmed()))
    } else {
        Line::from(Span::styled(display_text, theme::normal()))
    };

    let title = if app.tools_pending {
        "Message ✦"
    } else {
        "Message"
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(theme::border(is_focused));

    frame.render_widget(Paragraph::new(input_line).block(block), area);
}
