//! Application state and event handling.
//!
//! [`App`] holds UI-only state (focus, compose buffer, selection, open
//! menus). Conversation data lives in the [`MessageStore`]; key handling
//! reads it and returns an [`AppCommand`] for the caller to execute on the
//! controller. Controller events are folded back in with
//! [`App::apply_event`].

use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use vexchat_proto::assist::AiAction;
use vexchat_proto::conversation::ConversationId;
use vexchat_proto::message::MessageId;

use crate::controller::{Annotation, ChatEvent};
use crate::store::MessageStore;

/// Emoji offered by the reaction picker.
pub const REACTIONS: [&str; 6] = ["👍", "❤️", "😂", "😮", "😢", "🔥"];

/// Tools offered for the compose box.
pub const DRAFT_TOOLS: [AiAction; 4] = [
    AiAction::RewriteProfessional,
    AiAction::RewriteFriendly,
    AiAction::FixGrammar,
    AiAction::TranslateEn,
];

/// Tools offered for a single message.
pub const MESSAGE_TOOLS: [AiAction; 3] =
    [AiAction::TranslateEn, AiAction::Explain, AiAction::Summarize];

/// Which panel is currently focused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    /// Input box is focused (default).
    Input,
    /// Sidebar conversation list is focused.
    Sidebar,
    /// Chat message list is focused.
    Chat,
    /// Sidebar search box is focused.
    Search,
}

/// A popup menu; only one is open at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    /// Draft tools for the compose box.
    DraftTools { selected: usize },
    /// Tools for the selected message.
    MessageTools { selected: usize },
    /// Emoji picker for the selected message.
    Reactions { selected: usize },
}

impl Menu {
    /// Number of entries in this menu.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::DraftTools { .. } => DRAFT_TOOLS.len(),
            Self::MessageTools { .. } => MESSAGE_TOOLS.len(),
            Self::Reactions { .. } => REACTIONS.len(),
        }
    }

    /// Index of the highlighted entry.
    #[must_use]
    pub const fn selected(&self) -> usize {
        match self {
            Self::DraftTools { selected }
            | Self::MessageTools { selected }
            | Self::Reactions { selected } => *selected,
        }
    }

    const fn select(&mut self, index: usize) {
        match self {
            Self::DraftTools { selected }
            | Self::MessageTools { selected }
            | Self::Reactions { selected } => *selected = index,
        }
    }
}

/// Work requested by a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Send `text` as a local message.
    Send {
        conversation_id: ConversationId,
        text: String,
    },
    /// The compose buffer changed.
    DraftEdited {
        conversation_id: ConversationId,
        text: String,
    },
    /// The selection moved between conversations.
    SelectConversation {
        previous: Option<ConversationId>,
        next: ConversationId,
    },
    /// Rewrite the draft with a tool.
    TransformDraft {
        conversation_id: ConversationId,
        action: AiAction,
    },
    /// Run a tool over one message.
    AnnotateMessage {
        conversation_id: ConversationId,
        message_id: MessageId,
        action: AiAction,
    },
    /// Close a message's annotation.
    DismissAnnotation {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    /// Toggle a reaction.
    React {
        conversation_id: ConversationId,
        message_id: MessageId,
        emoji: String,
    },
    /// Summarize the conversation.
    Summarize { conversation_id: ConversationId },
}

/// Main application state.
pub struct App {
    /// Current text input.
    pub input: String,
    /// Cursor position in input (character index).
    pub cursor_position: usize,
    /// Which panel is focused.
    pub focus: PanelFocus,
    /// Sidebar search text.
    pub search_query: String,
    /// Conversations currently listed, in sidebar order.
    pub visible: Vec<ConversationId>,
    /// The open conversation.
    pub selected_conversation: Option<ConversationId>,
    /// Index of the highlighted message in the open conversation.
    pub selected_message: usize,
    /// Open popup menu, if any.
    pub menu: Option<Menu>,
    /// Latest smart replies per conversation.
    pub smart_replies: HashMap<ConversationId, Vec<String>>,
    /// Visible annotations keyed by message.
    pub annotations: HashMap<(ConversationId, MessageId), Annotation>,
    /// Whether a tool call is awaiting the assistant.
    pub tools_pending: bool,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
    /// Whether the app should quit.
    pub should_quit: bool,
}

impl App {
    /// Create a new application showing the first conversation in `store`.
    #[must_use]
    pub fn new(store: &MessageStore) -> Self {
        let mut app = Self {
            input: String::new(),
            cursor_position: 0,
            focus: PanelFocus::Input,
            search_query: String::new(),
            visible: Vec::new(),
            selected_conversation: None,
            selected_message: 0,
            menu: None,
            smart_replies: HashMap::new(),
            annotations: HashMap::new(),
            tools_pending: false,
            timestamp_format: "%H:%M".to_string(),
            should_quit: false,
        };
        app.sync(store);
        app
    }

    /// Set the timestamp display format.
    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// Refresh the sidebar listing from the store.
    ///
    /// Keeps the current selection even when the search hides it; selects
    /// the first listed conversation when nothing is selected yet.
    pub fn sync(&mut self, store: &MessageStore) {
        self.visible = store
            .search(&self.search_query)
            .into_iter()
            .map(|c| c.id.clone())
            .collect();
        let selection_valid = self
            .selected_conversation
            .as_ref()
            .is_some_and(|id| store.conversation(id).is_some());
        if !selection_valid {
            self.selected_conversation = self.visible.first().cloned();
            self.restore_draft(store);
            self.select_last_message(store);
        }
    }

    /// Smart replies for the open conversation.
    #[must_use]
    pub fn current_smart_replies(&self) -> &[String] {
        self.selected_conversation
            .as_ref()
            .and_then(|id| self.smart_replies.get(id))
            .map_or(&[], Vec::as_slice)
    }

    /// Fold a controller event into UI state.
    pub fn apply_event(&mut self, event: &ChatEvent, store: &MessageStore) {
        match event {
            ChatEvent::SmartRepliesChanged {
                conversation_id,
                replies,
            } => {
                if replies.is_empty() {
                    self.smart_replies.remove(conversation_id);
                } else {
                    self.smart_replies
                        .insert(conversation_id.clone(), replies.clone());
                }
            }
            ChatEvent::DraftChanged {
                conversation_id,
                draft,
            } => {
                if self.selected_conversation.as_ref() == Some(conversation_id) {
                    self.set_input(draft.clone().unwrap_or_default());
                }
            }
            ChatEvent::AnnotationReady(annotation) => {
                self.annotations.insert(
                    (
                        annotation.conversation_id.clone(),
                        annotation.message_id.clone(),
                    ),
                    annotation.clone(),
                );
            }
            ChatEvent::MessageUpserted {
                conversation_id, ..
            } => {
                if self.selected_conversation.as_ref() == Some(conversation_id)
                    && self.focus != PanelFocus::Chat
                {
                    self.select_last_message(store);
                }
            }
            ChatEvent::ConversationMoved { .. } => self.sync(store),
            ChatEvent::ReactionsChanged { .. }
            | ChatEvent::TypingChanged { .. }
            | ChatEvent::ReplyFinished { .. } => {}
        }
    }

    /// Handle a key event.
    pub fn handle_key_event(&mut self, key: KeyEvent, store: &MessageStore) -> Option<AppCommand> {
        // Global shortcuts
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return None;
            }
            (KeyCode::Esc, _) => {
                if self.menu.take().is_some() {
                    return None;
                }
                if self.focus == PanelFocus::Search {
                    self.focus = PanelFocus::Input;
                } else {
                    self.should_quit = true;
                }
                return None;
            }
            _ if self.menu.is_some() => return self.handle_menu_key(key, store),
            (KeyCode::Tab, KeyModifiers::SHIFT) | (KeyCode::BackTab, _) => {
                self.cycle_focus_backward();
                return None;
            }
            (KeyCode::Tab, _) => {
                self.cycle_focus_forward();
                return None;
            }
            (KeyCode::Char('f'), KeyModifiers::CONTROL) => {
                self.focus = PanelFocus::Search;
                return None;
            }
            (KeyCode::Char('s'), KeyModifiers::CONTROL) => {
                return self
                    .selected_conversation
                    .clone()
                    .map(|conversation_id| AppCommand::Summarize { conversation_id });
            }
            (KeyCode::Char('t'), KeyModifiers::CONTROL) => {
                if !self.input.trim().is_empty() {
                    self.menu = Some(Menu::DraftTools { selected: 0 });
                }
                return None;
            }
            (KeyCode::Char(digit @ '1'..='9'), KeyModifiers::ALT) => {
                return self.use_smart_reply(digit);
            }
            _ => {}
        }

        // Focus-specific shortcuts
        match self.focus {
            PanelFocus::Input => self.handle_input_key(key),
            PanelFocus::Sidebar => self.handle_sidebar_key(key, store),
            PanelFocus::Chat => self.handle_chat_key(key, store),
            PanelFocus::Search => self.handle_search_key(key, store),
        }
    }

    /// Handle key event when input is focused.
    fn handle_input_key(&mut self, key: KeyEvent) -> Option<AppCommand> {
        match key.code {
            KeyCode::Enter => return self.submit_message(),
            KeyCode::Char(c) => self.enter_char(c),
            KeyCode::Backspace => self.delete_char(),
            KeyCode::Left => self.move_cursor_left(),
            KeyCode::Right => self.move_cursor_right(),
            KeyCode::Home => self.cursor_position = 0,
            KeyCode::End => self.cursor_position = self.input.chars().count(),
            _ => return None,
        }
        if matches!(key.code, KeyCode::Char(_) | KeyCode::Backspace) {
            return self.draft_edited();
        }
        None
    }

    /// Handle key event when sidebar is focused.
    fn handle_sidebar_key(&mut self, key: KeyEvent, store: &MessageStore) -> Option<AppCommand> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.step_conversation(-1, store),
            KeyCode::Down | KeyCode::Char('j') => self.step_conversation(1, store),
            KeyCode::Enter => {
                self.focus = PanelFocus::Input;
                None
            }
            _ => None,
        }
    }

    /// Handle key event when chat is focused.
    fn handle_chat_key(&mut self, key: KeyEvent, store: &MessageStore) -> Option<AppCommand> {
        let count = self.message_count(store);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_message = self.selected_message.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_message + 1 < count {
                    self.selected_message += 1;
                }
            }
            KeyCode::Enter if count > 0 => {
                self.menu = Some(Menu::MessageTools { selected: 0 });
            }
            KeyCode::Char('r') if count > 0 => {
                self.menu = Some(Menu::Reactions { selected: 0 });
            }
            KeyCode::Char('x') => {
                let (conversation_id, message_id) = self.selected_message_id(store)?;
                self.annotations
                    .remove(&(conversation_id.clone(), message_id.clone()))?;
                return Some(AppCommand::DismissAnnotation {
                    conversation_id,
                    message_id,
                });
            }
            _ => {}
        }
        None
    }

    /// Handle key event when the search box is focused.
    fn handle_search_key(&mut self, key: KeyEvent, store: &MessageStore) -> Option<AppCommand> {
        match key.code {
            KeyCode::Char(c) => self.search_query.push(c),
            KeyCode::Backspace => {
                self.search_query.pop();
            }
            KeyCode::Enter | KeyCode::Down => {
                self.focus = PanelFocus::Sidebar;
                let first = self.visible.first().cloned()?;
                return self.select_conversation(first, store);
            }
            _ => return None,
        }
        self.sync(store);
        None
    }

    /// Handle key event while a menu is open.
    fn handle_menu_key(&mut self, key: KeyEvent, store: &MessageStore) -> Option<AppCommand> {
        let mut menu = self.menu?;
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                menu.select(menu.selected().saturating_sub(1));
            }
            KeyCode::Down | KeyCode::Char('j') => {
                menu.select((menu.selected() + 1).min(menu.len() - 1));
            }
            KeyCode::Enter => {
                self.menu = None;
                return self.activate(menu, store);
            }
            _ => {}
        }
        self.menu = Some(menu);
        None
    }

    /// Execute the highlighted menu entry.
    fn activate(&self, menu: Menu, store: &MessageStore) -> Option<AppCommand> {
        match menu {
            Menu::DraftTools { selected } => Some(AppCommand::TransformDraft {
                conversation_id: self.selected_conversation.clone()?,
                action: DRAFT_TOOLS[selected],
            }),
            Menu::MessageTools { selected } => {
                let (conversation_id, message_id) = self.selected_message_id(store)?;
                Some(AppCommand::AnnotateMessage {
                    conversation_id,
                    message_id,
                    action: MESSAGE_TOOLS[selected],
                })
            }
            Menu::Reactions { selected } => {
                let (conversation_id, message_id) = self.selected_message_id(store)?;
                Some(AppCommand::React {
                    conversation_id,
                    message_id,
                    emoji: REACTIONS[selected].to_string(),
                })
            }
        }
    }

    /// Cycle focus forward: Input -> Sidebar -> Chat -> Input.
    const fn cycle_focus_forward(&mut self) {
        self.focus = match self.focus {
            PanelFocus::Input => PanelFocus::Sidebar,
            PanelFocus::Sidebar | PanelFocus::Search => PanelFocus::Chat,
            PanelFocus::Chat => PanelFocus::Input,
        };
    }

    /// Cycle focus backward: Input -> Chat -> Sidebar -> Input.
    const fn cycle_focus_backward(&mut self) {
        self.focus = match self.focus {
            PanelFocus::Input => PanelFocus::Chat,
            PanelFocus::Chat => PanelFocus::Sidebar,
            PanelFocus::Sidebar | PanelFocus::Search => PanelFocus::Input,
        };
    }

    /// Submit the current input as a message.
    fn submit_message(&mut self) -> Option<AppCommand> {
        if self.input.trim().is_empty() {
            return None;
        }
        let conversation_id = self.selected_conversation.clone()?;
        let text = std::mem::take(&mut self.input);
        self.cursor_position = 0;
        Some(AppCommand::Send {
            conversation_id,
            text,
        })
    }

    /// Send the n-th smart reply (1-based digit).
    fn use_smart_reply(&mut self, digit: char) -> Option<AppCommand> {
        let index = usize::try_from(digit.to_digit(10)?).ok()?;
        let text = self.current_smart_replies().get(index.checked_sub(1)?)?.clone();
        let conversation_id = self.selected_conversation.clone()?;
        Some(AppCommand::Send {
            conversation_id,
            text,
        })
    }

    fn draft_edited(&self) -> Option<AppCommand> {
        Some(AppCommand::DraftEdited {
            conversation_id: self.selected_conversation.clone()?,
            text: self.input.clone(),
        })
    }

    fn step_conversation(&mut self, delta: isize, store: &MessageStore) -> Option<AppCommand> {
        if self.visible.is_empty() {
            return None;
        }
        let current = self
            .selected_conversation
            .as_ref()
            .and_then(|id| self.visible.iter().position(|v| v == id));
        let next = match current {
            Some(index) => index
                .saturating_add_signed(delta)
                .min(self.visible.len() - 1),
            None => 0,
        };
        let next = self.visible[next].clone();
        self.select_conversation(next, store)
    }

    fn select_conversation(
        &mut self,
        next: ConversationId,
        store: &MessageStore,
    ) -> Option<AppCommand> {
        if self.selected_conversation.as_ref() == Some(&next) {
            return None;
        }
        let previous = self.selected_conversation.replace(next.clone());
        self.menu = None;
        self.restore_draft(store);
        self.select_last_message(store);
        Some(AppCommand::SelectConversation { previous, next })
    }

    fn restore_draft(&mut self, store: &MessageStore) {
        let draft = self
            .selected_conversation
            .as_ref()
            .and_then(|id| store.conversation(id))
            .and_then(|c| c.draft.clone())
            .unwrap_or_default();
        self.set_input(draft);
    }

    fn set_input(&mut self, text: String) {
        self.cursor_position = text.chars().count();
        self.input = text;
    }

    fn message_count(&self, store: &MessageStore) -> usize {
        self.selected_conversation
            .as_ref()
            .and_then(|id| store.conversation(id))
            .map_or(0, |c| c.messages.len())
    }

    fn select_last_message(&mut self, store: &MessageStore) {
        self.selected_message = self.message_count(store).saturating_sub(1);
    }

    /// The highlighted message of the open conversation.
    #[must_use]
    pub fn selected_message_id(&self, store: &MessageStore) -> Option<(ConversationId, MessageId)> {
        let conversation_id = self.selected_conversation.clone()?;
        let message = store
            .conversation(&conversation_id)?
            .messages
            .get(self.selected_message)?;
        Some((conversation_id, message.id.clone()))
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.input
            .char_indices()
            .nth(chars)
            .map_or(self.input.len(), |(i, _)| i)
    }

    /// Insert a character at the cursor position.
    fn enter_char(&mut self, c: char) {
        let at = self.byte_offset(self.cursor_position);
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            let at = self.byte_offset(self.cursor_position - 1);
            self.input.remove(at);
            self.cursor_position -= 1;
        }
    }

    /// Move cursor left.
    const fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right.
    fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }
}
