//! Sidebar rendering: search box and conversation list.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use vexchat_proto::conversation::Conversation;

use super::{format_timestamp, theme};
use crate::app::{App, PanelFocus};
use crate::store::MessageStore;

const PREVIEW_CHARS: usize = 24;

/// Render the sidebar with the search box and conversation list.
pub fn render(frame: &mut Frame, area: Rect, app: &App, store: &MessageStore) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    render_search(frame, chunks[0], app);
    render_list(frame, chunks[1], app, store);
}

fn render_search(frame: &mut Frame, area: Rect, app: &App) {
    let is_focused = app.focus == PanelFocus::Search;
    let line = if app.search_query.is_empty() && !is_focused {
        Line::from(Span::styled("Search (Ctrl+F)", theme::dimmed()))
    } else {
        let mut text = app.search_query.clone();
        if is_focused {
            text.push('█');
        }
        Line::from(Span::styled(text, theme::normal()))
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::border(is_focused));
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_list(frame: &mut Frame, area: Rect, app: &App, store: &MessageStore) {
    let is_focused = app.focus == PanelFocus::Sidebar;

    let items: Vec<ListItem> = app
        .visible
        .iter()
        .filter_map(|id| store.conversation(id))
        .map(|conv| {
            let is_selected = app.selected_conversation.as_ref() == Some(&conv.id);
            let style = if is_selected && is_focused {
                theme::selected()
            } else if is_selected {
                theme::highlighted()
            } else {
                theme::normal()
            };
            ListItem::new(entry_lines(conv, app, store)).style(style)
        })
        .collect();

    let title = if app.search_query.trim().is_empty() {
        "Conversations".to_string()
    } else {
        format!("Conversations ({})", app.visible.len())
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(theme::border(is_focused));

    frame.render_widget(List::new(items).block(block), area);
}

/// Two lines per conversation: name row and preview row.
fn entry_lines<'a>(conv: &'a Conversation, app: &App, store: &MessageStore) -> Vec<Line<'a>> {
    let peer = conv.peer(store.local_user());
    let name = peer.map_or("Unknown", |p| p.name.as_str());

    let mut header = vec![Span::raw(name)];
    if peer.is_some_and(|p| p.is_agent) {
        header.push(Span::styled(" ✦", theme::normal().fg(theme::AGENT)));
    }
    if let Some(last) = conv.last_message() {
        header.push(Span::raw("  "));
        header.push(Span::styled(
            format_timestamp(last.timestamp, &app.timestamp_format),
            theme::timestamp(),
        ));
    }
    if conv.unread_count > 0 {
        header.push(Span::raw(" "));
        header.push(Span::styled(
            format!(" {} ", conv.unread_count),
            theme::unread_badge(),
        ));
    }

    let preview = if conv.is_typing {
        Span::styled("  Typing…", theme::normal().fg(theme::AGENT))
    } else {
        Span::styled(format!("  {}", preview(conv)), theme::dimmed())
    };

    vec![Line::from(header), Line::from(preview)]
}

/// Single-line preview of the last message.
fn preview(conv: &Conversation) -> String {
    let Some(last) = conv.last_message() else {
        return "No messages".to_string();
    };
    let flat = last.text.replace('\n', " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let mut cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        cut.push('…');
        cut
    } else {
        flat
    }
}
