//! Theme and styling constants for the TUI.

use ratatui::style::{Color, Modifier, Style};

/// Primary foreground color.
pub const FG_PRIMARY: Color = Color::White;

/// Secondary foreground color (dimmed text).
pub const FG_SECONDARY: Color = Color::Gray;

/// Highlight color for focused elements.
pub const HIGHLIGHT: Color = Color::Cyan;

/// Online indicator color.
pub const ONLINE: Color = Color::Green;

/// Warning color (pending tools, unread badges).
pub const WARNING: Color = Color::Yellow;

/// Offline indicator color.
pub const OFFLINE: Color = Color::DarkGray;

/// Assistant accent color (sparkle marker, AI text).
pub const AGENT: Color = Color::LightMagenta;

/// Color for sender names in chat.
pub const SENDER_COLORS: [Color; 12] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::LightCyan,
    Color::LightGreen,
    Color::LightYellow,
    Color::LightBlue,
    Color::LightRed,
    Color::Rgb(255, 165, 0),
    Color::Rgb(180, 120, 255),
];

/// Normal text style.
#[must_use]
pub fn normal() -> Style {
    Style::default().fg(FG_PRIMARY)
}

/// Dimmed text style (timestamps, metadata).
#[must_use]
pub fn dimmed() -> Style {
    Style::default().fg(FG_SECONDARY)
}

/// Bold text style.
#[must_use]
pub fn bold() -> Style {
    Style::default().fg(FG_PRIMARY).add_modifier(Modifier::BOLD)
}

/// Highlighted text style (focused panel borders).
#[must_use]
pub fn highlighted() -> Style {
    Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD)
}

/// Selected item style (in lists).
#[must_use]
pub fn selected() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

/// Border style for a panel depending on focus.
#[must_use]
pub fn border(focused: bool) -> Style {
    if focused { highlighted() } else { normal() }
}

/// Get a color for a sender based on their name.
#[must_use]
pub fn sender_color(name: &str) -> Color {
    let hash = name.bytes().fold(0u32, |acc, b| {
        acc.wrapping_mul(31).wrapping_add(u32::from(b))
    });
    SENDER_COLORS[(hash as usize) % SENDER_COLORS.len()]
}

/// Style for AI-authored text (italic, agent accent).
#[must_use]
pub fn ai_text() -> Style {
    Style::default().fg(AGENT).add_modifier(Modifier::ITALIC)
}

/// Style for annotation boxes under a message.
#[must_use]
pub fn annotation() -> Style {
    Style::default()
        .fg(Color::Rgb(100, 140, 180))
        .add_modifier(Modifier::ITALIC)
}

/// Style for timestamps (dark gray).
#[must_use]
pub fn timestamp() -> Style {
    Style::default().fg(Color::Rgb(120, 120, 120))
}

/// Style for the status bar background (dark background with white foreground).
#[must_use]
pub fn status_bar_bg() -> Style {
    Style::default().fg(Color::White).bg(Color::Rgb(30, 30, 50))
}

/// Style for reaction chips; the local user's own reactions stand out.
#[must_use]
pub fn reaction(self_reacted: bool) -> Style {
    if self_reacted {
        Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD)
    } else {
        dimmed()
    }
}

/// Style for unread count badges (bold yellow on dark background).
#[must_use]
pub fn unread_badge() -> Style {
    Style::default()
        .fg(WARNING)
        .bg(Color::Rgb(30, 30, 50))
        .add_modifier(Modifier::BOLD)
}
