//! Property-based tests for reaction toggling.
//!
//! Uses proptest to verify, for any starting reaction list and any toggle
//! sequence:
//! 1. At most one entry exists per emoji.
//! 2. Every entry has a count of at least one.
//! 3. Toggling the same emoji twice restores the same entries.

use std::collections::HashSet;

use proptest::prelude::*;
use vexchat_proto::reaction::{Reaction, toggle_reaction};

const EMOJI: [&str; 6] = ["👍", "❤️", "😂", "😮", "😢", "🔥"];

/// Strategy for one emoji from the picker set.
fn arb_emoji() -> impl Strategy<Value = &'static str> {
    prop::sample::select(EMOJI.to_vec())
}

/// Strategy for a well-formed reaction list: distinct emoji, counts >= 1,
/// and `self_reacted` only on entries the local user could have added.
fn arb_reactions() -> impl Strategy<Value = Vec<Reaction>> {
    prop::collection::vec((arb_emoji(), 1u32..50, any::<bool>()), 0..6).prop_map(|entries| {
        let mut seen = HashSet::new();
        entries
            .into_iter()
            .filter(|(emoji, _, _)| seen.insert(*emoji))
            .map(|(emoji, count, self_reacted)| Reaction {
                emoji: emoji.to_string(),
                count,
                self_reacted,
            })
            .collect()
    })
}

fn assert_well_formed(reactions: &[Reaction]) -> Result<(), TestCaseError> {
    let distinct: HashSet<_> = reactions.iter().map(|r| r.emoji.as_str()).collect();
    prop_assert_eq!(distinct.len(), reactions.len());
    for reaction in reactions {
        prop_assert!(reaction.count >= 1, "zero-count entry kept: {:?}", reaction);
    }
    Ok(())
}

proptest! {
    /// Any toggle sequence keeps the list well formed.
    #[test]
    fn toggles_keep_invariants(
        start in arb_reactions(),
        toggles in prop::collection::vec(arb_emoji(), 0..40),
    ) {
        let mut reactions = start;
        for emoji in toggles {
            toggle_reaction(&mut reactions, emoji);
            assert_well_formed(&reactions)?;
        }
    }

    /// Toggling the same emoji twice restores the same entries. A removed
    /// and re-added entry moves to the end, so order is not compared.
    #[test]
    fn double_toggle_restores(start in arb_reactions(), emoji in arb_emoji()) {
        let mut reactions = start.clone();
        toggle_reaction(&mut reactions, emoji);
        toggle_reaction(&mut reactions, emoji);
        let mut expected = start;
        expected.sort_by(|a, b| a.emoji.cmp(&b.emoji));
        reactions.sort_by(|a, b| a.emoji.cmp(&b.emoji));
        prop_assert_eq!(reactions, expected);
    }

    /// A toggle changes the count of its emoji by exactly one.
    #[test]
    fn toggle_moves_count_by_one(start in arb_reactions(), emoji in arb_emoji()) {
        let count_of = |list: &[Reaction]| {
            list.iter().find(|r| r.emoji == emoji).map_or(0, |r| i64::from(r.count))
        };
        let before = count_of(&start);
        let was_self = start.iter().any(|r| r.emoji == emoji && r.self_reacted);
        let mut reactions = start;
        toggle_reaction(&mut reactions, emoji);
        let expected = if was_self { before - 1 } else { before + 1 };
        prop_assert_eq!(count_of(&reactions), expected);
    }
}
