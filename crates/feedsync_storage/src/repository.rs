//! Repository contract definition.

use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use feedsync_protocol::{timestamp, Item};

/// A repository that resolves a whole incoming batch by itself.
///
/// Its algorithm is opaque to the engine. It must leave the repository
/// holding the merged items and return the items that ended up in
/// conflict.
pub trait NativeMerge: Send + Sync {
    /// Merges `items` into the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if any item fails to merge. Items merged before the
    /// failure stay written.
    fn merge_batch(&self, items: Vec<Item>) -> StorageResult<Vec<Item>>;
}

/// How a repository takes incoming items.
///
/// Decided once per repository; the engine matches on it instead of
/// checking a flag.
pub enum Capability<'a> {
    /// Items are merged one by one by the engine.
    Simple,
    /// The repository merges batches itself.
    Merge(&'a dyn NativeMerge),
}

/// A store of shared items that can take part in synchronization.
///
/// Repositories take `&self` and provide their own interior locking, since
/// the engine may call them repeatedly and out of order across both
/// directions of a round.
///
/// # Invariants
///
/// - `get` returns `None` for unknown ids, never an error
/// - enumeration is finite and can be repeated
/// - deleted items stay enumerable as tombstones so deletions propagate
///
/// # Implementors
///
/// - [`super::MemoryRepository`] - in-memory, optionally merge-capable
pub trait Repository: Send + Sync {
    /// Human readable name, for diagnostics only.
    fn friendly_name(&self) -> &str;

    /// How the repository takes incoming items.
    fn capability(&self) -> Capability<'_> {
        Capability::Simple
    }

    /// Returns true if the repository merges batches itself.
    fn supports_merge(&self) -> bool {
        matches!(self.capability(), Capability::Merge(_))
    }

    /// Merges a batch through the repository's own algorithm.
    ///
    /// Returns the items left in conflict.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotSupported`] for a simple repository.
    fn merge(&self, items: Vec<Item>) -> StorageResult<Vec<Item>> {
        match self.capability() {
            Capability::Merge(native) => native.merge_batch(items),
            Capability::Simple => Err(StorageError::not_supported(format!(
                "repository {} does not merge natively",
                self.friendly_name()
            ))),
        }
    }

    /// Looks up an item by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn get(&self, id: &str) -> StorageResult<Option<Item>>;

    /// Enumerates every item, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn get_all(&self) -> StorageResult<Vec<Item>>;

    /// Enumerates items changed at or after `since`.
    ///
    /// Items whose topmost history entry has no timestamp cannot be shown to
    /// be older, so they are always included.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn get_all_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<Item>> {
        let since = timestamp::normalize(since);
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|item| {
                item.sync()
                    .last_update()
                    .and_then(|top| top.when())
                    .map_or(true, |when| when >= since)
            })
            .collect())
    }

    /// Enumerates the items that carry conflicts.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn get_conflicts(&self) -> StorageResult<Vec<Item>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(Item::has_conflicts)
            .collect())
    }

    /// Inserts a new item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be stored.
    fn add(&self, item: Item) -> StorageResult<()>;

    /// Deletes an item by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotSupported`] if the repository cannot
    /// delete, or another error if the write fails.
    fn delete(&self, id: &str) -> StorageResult<()>;

    /// Replaces the stored version of an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be stored.
    fn update(&self, item: Item) -> StorageResult<()>;

    /// Replaces the stored version of an item, optionally resolving its
    /// conflicts first, and returns what was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution or the write fails.
    fn update_resolving(&self, item: Item, resolve_conflicts: bool) -> StorageResult<Item>;
}
