//! Conversation data model shared by the `VexChat` store, controller, and UI.

pub mod assist;
pub mod conversation;
pub mod message;
pub mod reaction;
pub mod user;
