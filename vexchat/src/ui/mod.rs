//! Terminal UI rendering.
//!
//! Rendering is a pure function of [`App`] and the [`MessageStore`]; the
//! caller holds the store lock for the duration of one frame.

pub mod chat_panel;
pub mod sidebar;
pub mod status_bar;
pub mod theme;

use chrono::{Local, TimeZone};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, Clear, List, ListItem, ListState},
};

use vexchat_proto::message::Timestamp;

use crate::app::{App, DRAFT_TOOLS, MESSAGE_TOOLS, Menu, REACTIONS};
use crate::store::MessageStore;

/// Main draw function for the entire UI.
pub fn draw(frame: &mut Frame, app: &App, store: &MessageStore) {
    // Create main layout with status bar at bottom
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(28), // Sidebar
            Constraint::Percentage(72), // Chat
        ])
        .split(main_chunks[0]);

    sidebar::render(frame, content_chunks[0], app, store);
    chat_panel::render(frame, content_chunks[1], app, store);
    status_bar::render(frame, main_chunks[1], app);

    if let Some(menu) = app.menu {
        render_menu(frame, content_chunks[1], menu);
    }
}

/// Render the open popup menu centered over `area`.
fn render_menu(frame: &mut Frame, area: Rect, menu: Menu) {
    let (title, entries): (&str, Vec<String>) = match menu {
        Menu::DraftTools { .. } => (
            "Draft tools",
            DRAFT_TOOLS.iter().map(|a| a.label().to_string()).collect(),
        ),
        Menu::MessageTools { .. } => (
            "Message tools",
            MESSAGE_TOOLS.iter().map(|a| a.label().to_string()).collect(),
        ),
        Menu::Reactions { .. } => (
            "React",
            REACTIONS.iter().map(|e| (*e).to_string()).collect(),
        ),
    };

    let width = entries
        .iter()
        .map(|e| e.chars().count())
        .max()
        .unwrap_or(0)
        .max(title.len())
        + 6;
    let height = entries.len() + 2;
    let popup = centered(
        area,
        u16::try_from(width).unwrap_or(u16::MAX),
        u16::try_from(height).unwrap_or(u16::MAX),
    );

    let items: Vec<ListItem> = entries
        .into_iter()
        .map(|e| ListItem::new(Line::from(format!(" {e} "))))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(theme::highlighted()),
        )
        .highlight_style(theme::selected());
    let mut state = ListState::default().with_selected(Some(menu.selected()));

    frame.render_widget(Clear, popup);
    frame.render_stateful_widget(list, popup, &mut state);
}

/// A `width` x `height` rectangle centered in `area`, clamped to fit.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Format a message timestamp in local time with a chrono format string.
#[must_use]
pub fn format_timestamp(timestamp: Timestamp, format: &str) -> String {
    let ms = timestamp.as_millis();
    let secs = (ms / 1000).cast_signed();
    let nsecs = u32::try_from((ms % 1000) * 1_000_000).unwrap_or(0);
    match Local.timestamp_opt(secs, nsecs) {
        chrono::LocalResult::Single(dt) => dt.format(format).to_string(),
        _ => "??:??".to_string(),
    }
}
