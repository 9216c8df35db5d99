//! Test fixtures and replica helpers.
//!
//! Provides fixed timestamps and pairs of in-memory replicas wired to a
//! sync engine.

use chrono::{DateTime, Duration, TimeZone, Utc};
use feedsync_engine::{SyncConfig, SyncCycleResult, SyncEngine, SyncEngineBuilder, SyncResult};
use feedsync_protocol::Item;
use feedsync_storage::{MemoryRepository, Repository};
use std::sync::Arc;

/// The reference instant of every fixture: 2024-01-01T00:00:00Z.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// `n` minutes after [`t0`].
pub fn minutes(n: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(n)
}

/// Creates an item with fixed content.
pub fn item(id: &str, by: &str, when: DateTime<Utc>) -> Item {
    Item::create(id, "title", "summary", "body", Some(by), Some(when))
        .expect("Failed to create item")
}

/// Two in-memory replicas, `left` edited by "kzu" and `right` by "vga"
/// unless built otherwise.
pub struct ReplicaPair {
    /// The left (local) replica.
    pub left: Arc<MemoryRepository>,
    /// The right (remote) replica.
    pub right: Arc<MemoryRepository>,
}

impl ReplicaPair {
    /// Two empty replicas.
    pub fn new() -> Self {
        Self::with_authors("kzu", "vga")
    }

    /// Two empty replicas with the given authors.
    pub fn with_authors(left: &str, right: &str) -> Self {
        Self {
            left: Arc::new(MemoryRepository::new("left", left)),
            right: Arc::new(MemoryRepository::new("right", right)),
        }
    }

    /// Two empty replicas; the right one merges natively.
    pub fn with_native_right() -> Self {
        Self {
            left: Arc::new(MemoryRepository::new("left", "kzu")),
            right: Arc::new(MemoryRepository::new("right", "vga").with_native_merge()),
        }
    }

    /// Both replicas hold `id`, created by "kzu" at [`t0`]; left then edits
    /// it as "kzu" one minute later and right as "vga" two minutes later.
    pub fn concurrent_edit(id: &str) -> Self {
        let pair = Self::new();
        let base = item(id, "kzu", t0());
        let mine = base
            .edit("title", "summary", "kzu", Some("kzu"), Some(minutes(1)))
            .expect("Failed to edit item");
        let theirs = base
            .edit("title", "summary", "vga", Some("vga"), Some(minutes(2)))
            .expect("Failed to edit item");
        pair.left.add(mine).expect("Failed to add item");
        pair.right.add(theirs).expect("Failed to add item");
        pair
    }

    /// Adds the same item to both replicas.
    pub fn share(&self, item: Item) {
        self.left.add(item.clone()).expect("Failed to add item");
        self.right.add(item).expect("Failed to add item");
    }

    /// An engine builder over both replicas.
    pub fn builder(&self) -> SyncEngineBuilder {
        SyncEngine::builder()
            .left(self.left.clone())
            .right(self.right.clone())
    }

    /// An engine over both replicas with the given configuration.
    pub fn engine(&self, config: SyncConfig) -> SyncEngine {
        self.builder()
            .config(config)
            .build()
            .expect("Failed to build engine")
    }

    /// Runs one default bidirectional round.
    ///
    /// # Errors
    ///
    /// Returns whatever the round fails with.
    pub fn synchronize(&self) -> SyncResult<SyncCycleResult> {
        self.engine(SyncConfig::default()).synchronize()
    }

    /// Fetches an item from both replicas.
    pub fn both(&self, id: &str) -> (Option<Item>, Option<Item>) {
        (
            self.left.get(id).expect("Failed to read left"),
            self.right.get(id).expect("Failed to read right"),
        )
    }
}

impl Default for ReplicaPair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_offsets_from_t0() {
        assert_eq!(minutes(0), t0());
        assert_eq!((minutes(90) - t0()).num_minutes(), 90);
    }

    #[test]
    fn concurrent_edit_diverges() {
        let pair = ReplicaPair::concurrent_edit("a");
        let (left, right) = pair.both("a");
        let (left, right) = (left.unwrap(), right.unwrap());
        assert_eq!(left.sync().updates(), right.sync().updates());
        assert_ne!(left.sync(), right.sync());
    }
}
