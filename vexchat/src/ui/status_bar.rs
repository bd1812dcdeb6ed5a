//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, PanelFocus};

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let help_text = if app.menu.is_some() {
        "↑↓: choose | Enter: apply | Esc: close"
    } else {
        match app.focus {
            PanelFocus::Input => {
                "Enter: send | Ctrl+T: tools | Ctrl+S: summarize | Tab: switch panel | Esc: quit"
            }
            PanelFocus::Sidebar => "↑↓/jk: select | Ctrl+F: search | Tab: switch panel | Esc: quit",
            PanelFocus::Chat => "↑↓/jk: select | Enter: tools | r: react | x: dismiss | Tab: switch panel",
            PanelFocus::Search => "type to filter | Enter: select | Esc: back",
        }
    };

    let mut spans = vec![
        Span::styled(concat!("VexChat v", env!("CARGO_PKG_VERSION")), theme::bold()),
        Span::raw(" | "),
    ];

    if app.tools_pending {
        spans.push(Span::styled("✦ thinking…", theme::normal().fg(theme::WARNING)));
        spans.push(Span::raw(" | "));
    }

    let replies = app.current_smart_replies();
    if !replies.is_empty() {
        for (i, reply) in replies.iter().enumerate() {
            spans.push(Span::styled(format!("Alt+{}", i + 1), theme::dimmed()));
            spans.push(Span::styled(
                format!(" {reply}  "),
                theme::normal().fg(theme::AGENT),
            ));
        }
        spans.push(Span::raw("| "));
    }

    spans.push(Span::styled(help_text, theme::dimmed()));

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
