//! Shared items: content paired with sync metadata.

use crate::error::ProtocolResult;
use crate::sync::SyncMetadata;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A shared item.
///
/// The payload is opaque to the protocol; it is only compared for equality.
/// The item's identifier is the identifier of its [`SyncMetadata`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    payload: Bytes,
    sync: SyncMetadata,
}

impl Item {
    /// Pairs content with existing sync metadata.
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        payload: impl Into<Bytes>,
        sync: SyncMetadata,
    ) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            payload: payload.into(),
            sync,
        }
    }

    /// An item with no content, used for deleted items.
    pub fn tombstone(sync: SyncMetadata) -> Self {
        Self::new(String::new(), String::new(), Bytes::new(), sync)
    }

    /// Creates a new item with fresh sync metadata.
    ///
    /// # Errors
    ///
    /// Fails like [`SyncMetadata::create`].
    pub fn create(
        id: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        payload: impl Into<Bytes>,
        by: Option<&str>,
        when: Option<DateTime<Utc>>,
    ) -> ProtocolResult<Self> {
        let sync = SyncMetadata::create(id, by, when)?;
        Ok(Self::new(title, summary, payload, sync))
    }

    /// Returns a copy with an update recorded, keeping the content.
    ///
    /// # Errors
    ///
    /// Fails like [`SyncMetadata::update`].
    pub fn update(&self, by: Option<&str>, when: Option<DateTime<Utc>>) -> ProtocolResult<Self> {
        let sync = self.sync.update(by, when)?;
        Ok(self.clone().with_sync(sync))
    }

    /// Returns a copy with new content and an update recorded.
    ///
    /// # Errors
    ///
    /// Fails like [`SyncMetadata::update`].
    pub fn edit(
        &self,
        title: impl Into<String>,
        summary: impl Into<String>,
        payload: impl Into<Bytes>,
        by: Option<&str>,
        when: Option<DateTime<Utc>>,
    ) -> ProtocolResult<Self> {
        let sync = self.sync.update(by, when)?;
        Ok(Self::new(title, summary, payload, sync))
    }

    /// Returns a tombstone with a deletion recorded.
    ///
    /// # Errors
    ///
    /// Fails like [`SyncMetadata::delete`].
    pub fn delete(&self, by: Option<&str>, when: Option<DateTime<Utc>>) -> ProtocolResult<Self> {
        let sync = self.sync.delete(by, when)?;
        Ok(Self::tombstone(sync))
    }

    /// The item identifier.
    pub fn id(&self) -> &str {
        self.sync.id()
    }

    /// Title of the item.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Summary of the item.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Opaque application payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Sync metadata.
    pub fn sync(&self) -> &SyncMetadata {
        &self.sync
    }

    /// Returns true if the item has recorded conflicts.
    pub fn has_conflicts(&self) -> bool {
        self.sync.has_conflicts()
    }

    /// Returns a copy with the sync metadata replaced.
    #[must_use]
    pub fn with_sync(mut self, sync: SyncMetadata) -> Self {
        self.sync = sync;
        self
    }

    /// Returns a copy with the content replaced and the sync untouched.
    #[must_use]
    pub fn with_content(
        mut self,
        title: impl Into<String>,
        summary: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        self.title = title.into();
        self.summary = summary.into();
        self.payload = payload.into();
        self
    }

    /// Returns a copy whose sync carries no conflicts.
    #[must_use]
    pub fn without_conflicts(self) -> Self {
        let sync = self.sync.clone().without_conflicts();
        self.with_sync(sync)
    }

    /// SHA-256 over title, summary and payload, hex encoded.
    ///
    /// Storage adapters keep this in [`SyncMetadata::tag`] to notice content that
    /// changed without a matching sync update.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.summary.as_bytes());
        hasher.update([0u8]);
        hasher.update(&self.payload);
        format!("{:x}", hasher.finalize())
    }

    pub(crate) fn sync_mut(&mut self) -> &mut SyncMetadata {
        &mut self.sync
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.sync == other.sync
            && self.title == other.title
            && self.summary == other.summary
            && self.payload == other.payload
    }
}

impl Eq for Item {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_edit() {
        let item = Item::create("note-1", "Groceries", "", "milk", Some("kzu"), None).unwrap();
        assert_eq!(item.id(), "note-1");
        assert_eq!(item.sync().updates(), 1);

        let edited = item
            .edit("Groceries", "", "milk, eggs", Some("kzu"), None)
            .unwrap();
        assert_eq!(edited.sync().updates(), 2);
        assert_eq!(edited.payload().as_ref(), b"milk, eggs");
        assert_eq!(item.payload().as_ref(), b"milk");
    }

    #[test]
    fn delete_produces_tombstone() {
        let item = Item::create("note-1", "Groceries", "list", "milk", Some("kzu"), None).unwrap();
        let deleted = item.delete(Some("kzu"), None).unwrap();

        assert!(deleted.sync().deleted());
        assert!(deleted.title().is_empty());
        assert!(deleted.payload().is_empty());
        assert_eq!(deleted.sync().updates(), 2);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let item = Item::create("note-1", "a", "b", "c", Some("kzu"), None).unwrap();
        let same = item.update(Some("vga"), None).unwrap();
        let changed = item.clone().with_content("a", "b", "d");
        let shifted = item.clone().with_content("ab", "", "c");

        assert_eq!(item.fingerprint(), same.fingerprint());
        assert_ne!(item.fingerprint(), changed.fingerprint());
        assert_ne!(item.fingerprint(), shifted.fingerprint());
        assert_eq!(item.fingerprint().len(), 64);
    }

    #[test]
    fn equality_uses_content_and_sync() {
        let item = Item::create("note-1", "a", "b", "c", Some("kzu"), None).unwrap();
        assert_eq!(item, item.clone());
        assert_ne!(item, item.clone().with_content("a", "b", "x"));
        assert_ne!(item, item.update(Some("kzu"), None).unwrap());
    }

    #[test]
    fn json_roundtrip() {
        let item = Item::create("note-1", "a", "b", "c", Some("kzu"), None).unwrap();
        let json = serde_json::to_string(&item).unwrap();
        let decoded: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, item);
    }
}
