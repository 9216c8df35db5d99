//! Property-based test generators using proptest.
//!
//! Items are generated by replaying random edit scripts, so every generated
//! sync satisfies the counter and history invariants.

use crate::fixtures::minutes;
use chrono::{DateTime, Utc};
use feedsync_protocol::{History, Item, SyncMetadata};
use proptest::prelude::*;

/// Authors used by the generators. A small pool makes collisions likely.
pub const AUTHORS: [&str; 4] = ["kzu", "vga", "dcl", "mgf"];

/// Strategy for generating authors.
pub fn author_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(AUTHORS.to_vec()).prop_map(str::to_owned)
}

/// Strategy for generating timestamps within one day of the fixture epoch.
pub fn when_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..24 * 60).prop_map(minutes)
}

/// Strategy for an author and a timestamp, at least one of them present.
pub fn stamp_strategy() -> impl Strategy<Value = (Option<String>, Option<DateTime<Utc>>)> {
    (
        prop::option::of(author_strategy()),
        prop::option::of(when_strategy()),
    )
        .prop_filter("history needs by or when", |(by, when)| {
            by.is_some() || when.is_some()
        })
}

/// Strategy for generating valid history entries.
pub fn history_strategy() -> impl Strategy<Value = History> {
    (stamp_strategy(), 1u32..100).prop_map(|((by, when), sequence)| {
        History::new(by, when, sequence).expect("Invalid generated history")
    })
}

/// Strategy for generating item ids.
pub fn id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("item-[a-z0-9]{1,8}").expect("Invalid regex")
}

/// One edit applied to an item.
#[derive(Debug, Clone)]
pub struct EditStep {
    /// Author of the edit.
    pub by: Option<String>,
    /// Time of the edit.
    pub when: Option<DateTime<Utc>>,
    /// Whether the edit deletes the item.
    pub delete: bool,
}

impl EditStep {
    /// Applies the step, returning the edited item.
    pub fn apply(&self, item: &Item) -> Item {
        let by = self.by.as_deref();
        let edited = if self.delete {
            item.delete(by, self.when)
        } else {
            let body = format!("{}@{}", by.unwrap_or("anonymous"), item.sync().updates() + 1);
            item.edit(item.title().to_string(), item.summary().to_string(), body, by, self.when)
        };
        edited.expect("Failed to apply edit step")
    }
}

/// Strategy for generating edit steps. Deletions are rare.
pub fn edit_step_strategy() -> impl Strategy<Value = EditStep> {
    (stamp_strategy(), prop::bool::weighted(0.15))
        .prop_map(|((by, when), delete)| EditStep { by, when, delete })
}

/// Strategy for generating an edit script.
pub fn edit_script_strategy(max_steps: usize) -> impl Strategy<Value = Vec<EditStep>> {
    prop::collection::vec(edit_step_strategy(), 0..=max_steps)
}

/// Applies every step of `script` in order.
pub fn replay(item: &Item, script: &[EditStep]) -> Item {
    script
        .iter()
        .fold(item.clone(), |current, step| step.apply(&current))
}

/// Strategy for generating items with a random edit history.
pub fn item_strategy() -> impl Strategy<Value = Item> {
    (
        id_strategy(),
        prop::string::string_regex("[A-Za-z ]{0,16}").expect("Invalid regex"),
        stamp_strategy(),
        edit_script_strategy(6),
    )
        .prop_map(|(id, title, (by, when), script)| {
            let created = Item::create(id, title, "", "v0", by.as_deref(), when)
                .expect("Failed to create item");
            replay(&created, &script)
        })
}

/// Strategy for generating valid sync metadata.
pub fn sync_strategy() -> impl Strategy<Value = SyncMetadata> {
    item_strategy().prop_map(|item| item.sync().clone())
}

/// Strategy for two versions of one item that diverged from a common base.
///
/// Each branch has at least one edit.
pub fn divergent_strategy() -> impl Strategy<Value = (Item, Item)> {
    (
        item_strategy(),
        prop::collection::vec(edit_step_strategy(), 1..4),
        prop::collection::vec(edit_step_strategy(), 1..4),
    )
        .prop_map(|(base, left, right)| (replay(&base, &left), replay(&base, &right)))
}

/// Strategy for edits made on one replica, all attributed to `by`.
pub fn branch_strategy(by: &'static str, max_steps: usize) -> impl Strategy<Value = Vec<EditStep>> {
    prop::collection::vec(
        (prop::option::of(when_strategy()), prop::bool::weighted(0.15)),
        1..=max_steps,
    )
    .prop_map(move |steps| {
        steps
            .into_iter()
            .map(|(when, delete)| EditStep {
                by: Some(by.to_string()),
                when,
                delete,
            })
            .collect()
    })
}

/// Like [`divergent_strategy`], but each replica attributes its edits to
/// its own author, as replicas do in practice.
///
/// Without that, two replicas can produce different versions with the same
/// author and sequence, which no merge order can tell apart.
pub fn replica_divergent_strategy() -> impl Strategy<Value = (Item, Item)> {
    (
        item_strategy(),
        branch_strategy("laptop", 3),
        branch_strategy("phone", 3),
    )
        .prop_map(|(base, left, right)| (replay(&base, &left), replay(&base, &right)))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
