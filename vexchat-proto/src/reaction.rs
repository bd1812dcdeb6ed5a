//! Per-emoji reaction aggregates and the local user's toggle.
//!
//! Invariants maintained by [`toggle_reaction`]:
//! - at most one [`Reaction`] per distinct emoji;
//! - every retained entry has `count >= 1` (an entry that would drop to
//!   zero is removed, never kept);
//! - toggling the same emoji twice restores the previous entries (an entry
//!   that was removed and re-added moves to the end).

use serde::{Deserialize, Serialize};

/// Aggregate reaction for one emoji on one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Emoji key, e.g. `"👍"`.
    pub emoji: String,
    /// Number of users who reacted with this emoji.
    pub count: u32,
    /// Whether the local user is among them.
    pub self_reacted: bool,
}

/// What a toggle did to the reaction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionChange {
    /// A new entry was created with count 1.
    Added,
    /// An existing entry's count went up by one.
    Incremented,
    /// An existing entry's count went down by one.
    Decremented,
    /// The local user's reaction was the last one; the entry was removed.
    Removed,
}

/// Toggles the local user's reaction for `emoji`.
///
/// If the local user already reacted with this emoji, the count is
/// decremented and the flag cleared (removing the entry when the count
/// reaches zero). Otherwise the count is incremented, creating the entry if
/// absent, and the flag set.
pub fn toggle_reaction(reactions: &mut Vec<Reaction>, emoji: &str) -> ReactionChange {
    let Some(index) = reactions.iter().position(|r| r.emoji == emoji) else {
        reactions.push(Reaction {
            emoji: emoji.to_string(),
            count: 1,
            self_reacted: true,
        });
        return ReactionChange::Added;
    };

    let reaction = &mut reactions[index];
    if reaction.self_reacted {
        reaction.count = reaction.count.saturating_sub(1);
        reaction.self_reacted = false;
        if reaction.count == 0 {
            reactions.remove(index);
            return ReactionChange::Removed;
        }
        ReactionChange::Decremented
    } else {
        reaction.count = reaction.count.saturating_add(1);
        reaction.self_reacted = true;
        ReactionChange::Incremented
    }
}
