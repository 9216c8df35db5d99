//! Benchmark utilities.
//!
//! Inputs are deterministic so runs stay comparable.

use feedsync_protocol::Item;
use feedsync_storage::{MemoryRepository, Repository};
use feedsync_testkit::fixtures::minutes;
use std::sync::Arc;

/// An item created by `kzu` and then edited `edits` times in turn by
/// `kzu` and `vga`.
pub fn edited_item(id: &str, edits: u32) -> Item {
    let mut item = Item::create(id, "title", "", "v0", Some("kzu"), Some(minutes(0)))
        .expect("Failed to create item");
    for step in 1..=edits {
        let by = if step % 2 == 0 { "kzu" } else { "vga" };
        item = item
            .edit(
                "title",
                "",
                format!("v{step}"),
                Some(by),
                Some(minutes(i64::from(step))),
            )
            .expect("Failed to edit item");
    }
    item
}

/// Two versions of one item edited concurrently after `depth` shared edits.
pub fn divergent_pair(id: &str, depth: u32) -> (Item, Item) {
    let base = edited_item(id, depth);
    let at = minutes(i64::from(depth) + 1);
    let left = base
        .edit("title", "", "left", Some("kzu"), Some(at))
        .expect("Failed to edit item");
    let right = base
        .edit("title", "", "right", Some("vga"), Some(at))
        .expect("Failed to edit item");
    (left, right)
}

/// A repository holding `count` items with `edits` edits each.
pub fn populated_repository(
    name: &str,
    author: &str,
    count: usize,
    edits: u32,
) -> Arc<MemoryRepository> {
    let repo = MemoryRepository::new(name, author);
    for index in 0..count {
        repo.add(edited_item(&format!("{name}-{index}"), edits))
            .expect("Failed to add item");
    }
    Arc::new(repo)
}
