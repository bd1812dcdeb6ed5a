//! Startup conversations.
//!
//! The built-in set mirrors a fresh install: a chat with the assistant and
//! three human contacts. A TOML seed file can replace it:
//!
//! ```toml
//! [local_user]
//! id = "me"
//! name = "You"
//!
//! [assistant]
//! id = "gemini"
//! name = "Gemini"
//!
//! [[users]]
//! id = "u2"
//! name = "Alice Williams"
//!
//! [[conversations]]
//! id = "c2"
//! peer = "u2"
//! unread = 1
//!
//! [[conversations.messages]]
//! id = "m2-1"
//! sender = "u2"
//! text = "Hey, are we still on for the meeting tomorrow?"
//! minutes_ago = 120
//! ```
//!
//! Message times are given relative to load time.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use vexchat_proto::conversation::{Conversation, ConversationId};
use vexchat_proto::message::{Message, MessageId, MessageStatus, Timestamp};
use vexchat_proto::user::{User, UserId};

use crate::store::MessageStore;

/// Errors that can occur when loading a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// Failed to read the seed file.
    #[error("failed to read seed file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML seed.
    #[error("failed to parse seed file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A conversation refers to a user that is not declared.
    #[error("conversation {conversation} refers to unknown user {user}")]
    UnknownUser {
        /// Conversation containing the reference.
        conversation: String,
        /// The undeclared user id.
        user: String,
    },

    /// Two conversations share an id.
    #[error("duplicate conversation id {0}")]
    DuplicateConversation(String),

    /// Two messages in one conversation share an id.
    #[error("duplicate message id {message} in conversation {conversation}")]
    DuplicateMessage {
        /// Conversation containing the duplicates.
        conversation: String,
        /// The repeated message id.
        message: String,
    },
}

/// Users and conversations to load at startup.
#[derive(Debug, Clone)]
pub struct Seed {
    /// The person using this client.
    pub local_user: User,
    /// The AI assistant; authors conversation summaries.
    pub assistant: User,
    /// Conversations in initial list order.
    pub conversations: Vec<Conversation>,
}

impl Seed {
    /// Builds a store holding the seeded users and conversations.
    #[must_use]
    pub fn into_store(self) -> MessageStore {
        let mut store = MessageStore::new(self.local_user);
        store.register_user(self.assistant);
        for conversation in self.conversations {
            store.insert_conversation(conversation);
        }
        store
    }
}

fn local_user() -> User {
    User::new("me", "You").with_avatar("https://picsum.photos/id/64/200/200")
}

fn assistant() -> User {
    User::new("gemini", "Gemini")
        .with_avatar("https://picsum.photos/id/532/200/200")
        .agent()
}

/// The built-in startup conversations.
#[must_use]
pub fn default_seed() -> Seed {
    let now = Timestamp::now();
    let me = local_user();
    let gemini = assistant();
    let alice = User::new("u2", "Alice Williams").with_avatar("https://picsum.photos/id/65/200/200");
    let bob = User::new("u3", "Bob Smith")
        .with_avatar("https://picsum.photos/id/91/200/200")
        .online(false);
    let team = User::new("u4", "Team Alpha")
        .with_avatar("https://picsum.photos/id/180/200/200")
        .online(false);

    let msg = |id: &str, sender: &User, text: &str, minutes_ago: u64| {
        let mut message = Message::new(MessageId::from(id), sender.id.clone(), text);
        message.timestamp = now.minutes_before(minutes_ago);
        message.status = MessageStatus::Read;
        message
    };
    let chat = |id: &str, peer: &User, messages: Vec<Message>, unread: u32| {
        let mut conversation =
            Conversation::new(ConversationId::from(id), vec![me.clone(), peer.clone()]);
        conversation.messages = messages;
        conversation.unread_count = unread;
        conversation
    };

    let conversations = vec![
        chat(
            "c1",
            &gemini,
            vec![msg(
                "m1",
                &gemini,
                "Hello! I am Gemini. I can help you write better messages, answer questions, \
                 or just chat. How can I help you today?",
                60,
            )],
            0,
        ),
        chat(
            "c2",
            &alice,
            vec![
                msg("m2-1", &alice, "Hey, are we still on for the meeting tomorrow?", 120),
                msg("m2-2", &me, "Yes, absolutely.", 115),
                msg("m2-3", &alice, "Great. Can you bring the project files?", 5),
            ],
            1,
        ),
        chat(
            "c3",
            &bob,
            vec![msg("m3-1", &bob, "Did you see the game last night?", 60 * 24)],
            0,
        ),
        chat(
            "c4",
            &team,
            vec![msg(
                "m4-1",
                &team,
                "Please review the attached documents by EOD.",
                60 * 48,
            )],
            0,
        ),
    ];

    Seed {
        local_user: me,
        assistant: gemini,
        conversations,
    }
}

// ---------------------------------------------------------------------------
// TOML seed file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedFile {
    local_user: Option<SeedUser>,
    assistant: Option<SeedUser>,
    #[serde(default)]
    users: Vec<SeedUser>,
    #[serde(default)]
    conversations: Vec<SeedConversation>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedUser {
    id: String,
    name: String,
    #[serde(default)]
    avatar: String,
    #[serde(default = "default_online")]
    online: bool,
}

const fn default_online() -> bool {
    true
}

impl SeedUser {
    fn into_user(self) -> User {
        User::new(self.id, self.name)
            .with_avatar(self.avatar)
            .online(self.online)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedConversation {
    id: String,
    peer: String,
    #[serde(default)]
    unread: u32,
    #[serde(default)]
    messages: Vec<SeedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedMessage {
    id: String,
    sender: String,
    text: String,
    #[serde(default)]
    minutes_ago: u64,
}

/// Reads and validates a TOML seed file.
///
/// # Errors
///
/// Returns [`SeedError`] if the file cannot be read, is not valid TOML, or
/// refers to undeclared users or repeats ids.
pub fn load_seed_file(path: &Path) -> Result<Seed, SeedError> {
    let contents = std::fs::read_to_string(path).map_err(|e| SeedError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_seed(&contents, Timestamp::now())
}

/// Parses a TOML seed, resolving `minutes_ago` against `now`.
///
/// # Errors
///
/// Returns [`SeedError`] if the TOML is invalid or inconsistent.
pub fn parse_seed(contents: &str, now: Timestamp) -> Result<Seed, SeedError> {
    let file: SeedFile = toml::from_str(contents)?;
    let local = file.local_user.map_or_else(local_user, SeedUser::into_user);
    let assistant = file
        .assistant
        .map_or_else(assistant, |u| u.into_user().agent());

    let mut users: HashMap<String, User> = HashMap::new();
    for user in [&local, &assistant] {
        users.insert(user.id.as_str().to_string(), user.clone());
    }
    for user in file.users {
        users.insert(user.id.clone(), user.into_user());
    }

    let mut seen = HashSet::new();
    let mut conversations = Vec::with_capacity(file.conversations.len());
    for conv in file.conversations {
        if !seen.insert(conv.id.clone()) {
            return Err(SeedError::DuplicateConversation(conv.id));
        }
        let unknown = |user: &str| SeedError::UnknownUser {
            conversation: conv.id.clone(),
            user: user.to_string(),
        };
        let peer = users.get(&conv.peer).ok_or_else(|| unknown(&conv.peer))?;

        let mut message_ids = HashSet::new();
        let mut messages = Vec::with_capacity(conv.messages.len());
        for m in conv.messages {
            if m.sender != local.id.as_str() && m.sender != peer.id.as_str() {
                return Err(unknown(&m.sender));
            }
            if !message_ids.insert(m.id.clone()) {
                return Err(SeedError::DuplicateMessage {
                    conversation: conv.id.clone(),
                    message: m.id,
                });
            }
            let mut message = Message::new(
                MessageId::from(m.id),
                UserId::new(m.sender),
                m.text,
            );
            message.timestamp = now.minutes_before(m.minutes_ago);
            message.status = MessageStatus::Read;
            messages.push(message);
        }

        let mut conversation = Conversation::new(
            ConversationId::new(conv.id.clone()),
            vec![local.clone(), peer.clone()],
        );
        conversation.messages = messages;
        conversation.unread_count = conv.unread;
        conversations.push(conversation);
    }

    Ok(Seed {
        local_user: local,
        assistant,
        conversations,
    })
}
