//! In-memory repository.

use crate::error::{StorageError, StorageResult};
use crate::repository::{Capability, NativeMerge, Repository};
use bytes::Bytes;
use feedsync_protocol::{merge, resolve_conflicts, timestamp, Item, MergeOperation};
use parking_lot::RwLock;
use tracing::{debug, info};

/// An in-memory repository.
///
/// Items are kept in insertion order. Every stored item carries its content
/// fingerprint as sync tag, so content changed through
/// [`MemoryRepository::write_content`] without a sync update is noticed on
/// the next read and recorded as an update by the repository's author.
///
/// # Thread Safety
///
/// The repository is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use feedsync_protocol::Item;
/// use feedsync_storage::{MemoryRepository, Repository};
///
/// let repo = MemoryRepository::new("laptop", "kzu");
/// let item = Item::create("note-1", "Groceries", "", "milk", Some("kzu"), None).unwrap();
/// repo.add(item).unwrap();
/// assert!(repo.get("note-1").unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct MemoryRepository {
    name: String,
    author: String,
    native_merge: bool,
    items: RwLock<Vec<Item>>,
}

impl MemoryRepository {
    /// Creates an empty repository whose local edits are attributed to
    /// `author`.
    #[must_use]
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: author.into(),
            native_merge: false,
            items: RwLock::new(Vec::new()),
        }
    }

    /// Creates a repository holding `items`.
    ///
    /// Items without a tag are stamped as they are; items whose tag does not
    /// match their content are picked up as local edits on the first read.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] if two items share an id.
    pub fn from_items(
        name: impl Into<String>,
        author: impl Into<String>,
        items: impl IntoIterator<Item = Item>,
    ) -> StorageResult<Self> {
        let repo = Self::new(name, author);
        {
            let mut stored = repo.items.write();
            for item in items {
                if position(&stored, item.id()).is_some() {
                    return Err(StorageError::invalid_argument(format!(
                        "duplicate item id {}",
                        item.id()
                    )));
                }
                let item = if item.sync().tag().is_some() {
                    item
                } else {
                    stamp(item)
                };
                stored.push(item);
            }
        }
        Ok(repo)
    }

    /// Makes the repository merge incoming batches itself.
    #[must_use]
    pub fn with_native_merge(mut self) -> Self {
        self.native_merge = true;
        self
    }

    /// The author recorded for edits made through this repository.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Number of stored items, tombstones included.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Changes the content of a stored item without touching its sync.
    ///
    /// This is how an application edits items outside of synchronization.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] for an unknown id.
    pub fn write_content(
        &self,
        id: &str,
        title: impl Into<String>,
        summary: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> StorageResult<()> {
        let mut items = self.items.write();
        let index = position(&items, id)
            .ok_or_else(|| StorageError::invalid_argument(format!("unknown item {id}")))?;
        let item = items[index].clone();
        items[index] = item.with_content(title, summary, payload);
        Ok(())
    }

    /// Records an update for every item whose content no longer matches its
    /// tag.
    fn refresh(&self) -> StorageResult<()> {
        let mut items = self.items.write();
        for item in items.iter_mut() {
            let stale = item
                .sync()
                .tag()
                .is_some_and(|tag| tag != item.fingerprint());
            if stale {
                let updated = item.update(Some(&self.author), Some(timestamp::now()))?;
                info!(
                    repository = %self.name,
                    id = %item.id(),
                    "detected local edit"
                );
                *item = stamp(updated);
            }
        }
        Ok(())
    }

    fn store(&self, item: Item) {
        let item = stamp(item);
        let mut items = self.items.write();
        match position(&items, item.id()) {
            Some(index) => items[index] = item,
            None => items.push(item),
        }
    }
}

impl Repository for MemoryRepository {
    fn friendly_name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability<'_> {
        if self.native_merge {
            Capability::Merge(self)
        } else {
            Capability::Simple
        }
    }

    fn get(&self, id: &str) -> StorageResult<Option<Item>> {
        self.refresh()?;
        let items = self.items.read();
        Ok(position(&items, id).map(|index| items[index].clone()))
    }

    fn get_all(&self) -> StorageResult<Vec<Item>> {
        self.refresh()?;
        Ok(self.items.read().clone())
    }

    fn add(&self, item: Item) -> StorageResult<()> {
        let item = stamp(item);
        let mut items = self.items.write();
        if position(&items, item.id()).is_some() {
            return Err(StorageError::invalid_argument(format!(
                "item {} already exists in {}",
                item.id(),
                self.name
            )));
        }
        debug!(repository = %self.name, id = %item.id(), "add");
        items.push(item);
        Ok(())
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        self.refresh()?;
        let mut items = self.items.write();
        let Some(index) = position(&items, id) else {
            return Ok(());
        };
        if items[index].sync().deleted() {
            return Ok(());
        }
        let tombstone = items[index].delete(Some(&self.author), Some(timestamp::now()))?;
        debug!(repository = %self.name, id = %id, "delete");
        items[index] = stamp(tombstone);
        Ok(())
    }

    fn update(&self, item: Item) -> StorageResult<()> {
        debug!(
            repository = %self.name,
            id = %item.id(),
            updates = item.sync().updates(),
            "update"
        );
        self.store(item);
        Ok(())
    }

    fn update_resolving(&self, item: Item, resolve: bool) -> StorageResult<Item> {
        let item = if resolve {
            let deleted = item.sync().deleted();
            resolve_conflicts(&item, Some(&self.author), Some(timestamp::now()), deleted)?
        } else {
            item
        };
        let item = stamp(item);
        self.update(item.clone())?;
        Ok(item)
    }
}

impl NativeMerge for MemoryRepository {
    fn merge_batch(&self, items: Vec<Item>) -> StorageResult<Vec<Item>> {
        debug!(repository = %self.name, count = items.len(), "native merge");
        let mut conflicts = Vec::new();
        for incoming in items {
            let local = self.get(incoming.id())?;
            let result = merge(local.as_ref(), &incoming)?;
            match (result.operation, result.proposed) {
                (MergeOperation::None, _) | (_, None) => {
                    if let Some(local) = local.filter(Item::has_conflicts) {
                        conflicts.push(local);
                    }
                }
                (_, Some(proposed)) => {
                    if proposed.has_conflicts() {
                        conflicts.push(proposed.clone());
                    }
                    self.store(proposed);
                }
            }
        }
        Ok(conflicts)
    }
}

fn position(items: &[Item], id: &str) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

fn stamp(item: Item) -> Item {
    let tag = item.fingerprint();
    let sync = item.sync().clone().with_tag(Some(tag));
    item.with_sync(sync)
}
