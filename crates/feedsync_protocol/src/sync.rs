//! Per-item synchronization metadata.

use crate::error::{ProtocolError, ProtocolResult};
use crate::history::History;
use crate::item::Item;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Version state of one shared item.
///
/// `SyncMetadata` values are copy-on-write: [`SyncMetadata::update`], [`SyncMetadata::delete`] and
/// the other transitions return a new value and never touch `self`, so the
/// merge algorithm can always compare a "before" with an "after".
///
/// # Invariants
///
/// - `id` is assigned once and never changes
/// - `updates` equals the sequence of the topmost history entry whenever
///   history is non-empty
/// - every transition increments `updates` by exactly one
///
/// # Equality
///
/// Two syncs are equal when `id`, `updates`, `deleted`, `no_conflicts` and the
/// topmost history entry are equal. Older history, the conflict list and the
/// tag are not compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawSync")]
pub struct SyncMetadata {
    id: String,
    updates: u32,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    no_conflicts: bool,
    history: Vec<History>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    conflicts: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

impl SyncMetadata {
    /// Creates the metadata for a brand new item.
    ///
    /// The result has `updates == 1` and exactly one history entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] if `id` is empty or if
    /// neither `by` nor `when` is given.
    pub fn create(
        id: impl Into<String>,
        by: Option<&str>,
        when: Option<DateTime<Utc>>,
    ) -> ProtocolResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProtocolError::invalid_argument("sync id must not be empty"));
        }
        let entry = History::new(by, when, 1)?;
        Ok(Self {
            id,
            updates: 1,
            deleted: false,
            no_conflicts: false,
            history: vec![entry],
            conflicts: Vec::new(),
            tag: None,
        })
    }

    /// Rebuilds a sync from its stored parts, checking the invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] for an empty id and
    /// [`ProtocolError::InvalidState`] if `updates` disagrees with the
    /// topmost history entry.
    pub fn from_parts(
        id: impl Into<String>,
        updates: u32,
        deleted: bool,
        no_conflicts: bool,
        history: Vec<History>,
        conflicts: Vec<Item>,
    ) -> ProtocolResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProtocolError::invalid_argument("sync id must not be empty"));
        }
        match history.first() {
            Some(top) if top.sequence() != updates => {
                return Err(ProtocolError::invalid_state(format!(
                    "sync {id}: updates {updates} does not match topmost sequence {}",
                    top.sequence()
                )));
            }
            None if updates != 0 => {
                return Err(ProtocolError::invalid_state(format!(
                    "sync {id}: {updates} updates recorded without history"
                )));
            }
            _ => {}
        }
        Ok(Self {
            id,
            updates,
            deleted,
            no_conflicts,
            history,
            conflicts,
            tag: None,
        })
    }

    /// The stable item identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of recorded transitions.
    pub fn updates(&self) -> u32 {
        self.updates
    }

    /// Whether the item is deleted (a tombstone).
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    /// Whether new conflicts should stop being recorded for this item.
    pub fn no_conflicts(&self) -> bool {
        self.no_conflicts
    }

    /// History entries, newest first.
    pub fn history(&self) -> &[History] {
        &self.history
    }

    /// The topmost (most recent) history entry.
    pub fn last_update(&self) -> Option<&History> {
        self.history.first()
    }

    /// Versions that lost a merge but were kept for manual resolution.
    pub fn conflicts(&self) -> &[Item] {
        &self.conflicts
    }

    /// Returns true if at least one conflict is recorded.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Content fingerprint supplied by the owning storage adapter.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Returns a copy carrying the given tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    /// Returns a copy with the "no more conflicts" flag set as given.
    #[must_use]
    pub fn with_no_conflicts(mut self, no_conflicts: bool) -> Self {
        self.no_conflicts = no_conflicts;
        self
    }

    /// Returns a copy with the conflict list replaced.
    #[must_use]
    pub fn with_conflicts(mut self, conflicts: Vec<Item>) -> Self {
        self.conflicts = conflicts;
        self
    }

    /// Returns a copy with an empty conflict list.
    #[must_use]
    pub fn without_conflicts(self) -> Self {
        self.with_conflicts(Vec::new())
    }

    /// Records an update by `by` at `when`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] if neither `by` nor `when`
    /// is given.
    pub fn update(&self, by: Option<&str>, when: Option<DateTime<Utc>>) -> ProtocolResult<Self> {
        self.update_with(by, when, self.deleted)
    }

    /// Records a deletion by `by` at `when`.
    ///
    /// # Errors
    ///
    /// Same as [`SyncMetadata::update`].
    pub fn delete(&self, by: Option<&str>, when: Option<DateTime<Utc>>) -> ProtocolResult<Self> {
        self.update_with(by, when, true)
    }

    /// Records a transition, setting `deleted` explicitly.
    ///
    /// The conflict list and tag are carried over unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] if neither `by` nor `when`
    /// is given, and [`ProtocolError::InvalidState`] if the counter would
    /// overflow.
    pub fn update_with(
        &self,
        by: Option<&str>,
        when: Option<DateTime<Utc>>,
        deleted: bool,
    ) -> ProtocolResult<Self> {
        let updates = self.updates.checked_add(1).ok_or_else(|| {
            ProtocolError::invalid_state(format!("sync {}: update counter overflow", self.id))
        })?;
        let entry = History::new(by, when, updates)?;

        let mut next = self.clone();
        next.updates = updates;
        next.deleted = deleted;
        next.history.insert(0, entry);
        Ok(next)
    }

    /// Returns a copy with `entry` inserted right below the topmost entry.
    ///
    /// The topmost entry keeps describing the latest accepted edit. Only
    /// conflict resolution records history this way.
    #[must_use]
    pub fn add_conflict_history(&self, entry: History) -> Self {
        let mut next = self.clone();
        let at = next.history.len().min(1);
        next.history.insert(at, entry);
        next
    }

    /// Compacts the history to one entry per author.
    ///
    /// For each non-empty author only the entry with the highest sequence
    /// survives. Anonymous entries are always kept and the topmost entry is
    /// never touched. Surviving entries keep their relative order.
    #[must_use]
    pub fn sparse_purge(&self) -> Self {
        let mut keep_index: HashMap<&str, (u32, usize)> = HashMap::new();
        for (index, entry) in self.history.iter().enumerate() {
            let Some(by) = entry.by() else { continue };
            match keep_index.get(by) {
                Some((sequence, _)) if *sequence >= entry.sequence() => {}
                _ => {
                    keep_index.insert(by, (entry.sequence(), index));
                }
            }
        }
        if let Some(by) = self.history.first().and_then(History::by) {
            keep_index.insert(by, (self.updates, 0));
        }

        let history = self
            .history
            .iter()
            .enumerate()
            .filter(|(index, entry)| match entry.by() {
                None => true,
                Some(by) => keep_index.get(by).map(|(_, kept)| kept) == Some(index),
            })
            .map(|(_, entry)| entry.clone())
            .collect();

        let mut next = self.clone();
        next.history = history;
        next
    }

    pub(crate) fn push_conflict(&mut self, item: Item) {
        self.conflicts.push(item);
    }
}

/// Stored form of sync metadata, validated through
/// [`SyncMetadata::from_parts`].
#[derive(Deserialize)]
struct RawSync {
    id: String,
    updates: u32,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    no_conflicts: bool,
    #[serde(default)]
    history: Vec<History>,
    #[serde(default)]
    conflicts: Vec<Item>,
    #[serde(default)]
    tag: Option<String>,
}

impl TryFrom<RawSync> for SyncMetadata {
    type Error = ProtocolError;

    fn try_from(raw: RawSync) -> ProtocolResult<Self> {
        let sync = SyncMetadata::from_parts(
            raw.id,
            raw.updates,
            raw.deleted,
            raw.no_conflicts,
            raw.history,
            raw.conflicts,
        )?;
        Ok(sync.with_tag(raw.tag))
    }
}

impl PartialEq for SyncMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.updates == other.updates
            && self.deleted == other.deleted
            && self.no_conflicts == other.no_conflicts
            && self.last_update() == other.last_update()
    }
}

impl Eq for SyncMetadata {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn create_has_single_entry() {
        let sync = SyncMetadata::create("item-1", Some("kzu"), Some(at(0))).unwrap();
        assert_eq!(sync.updates(), 1);
        assert_eq!(sync.history().len(), 1);
        assert_eq!(sync.last_update().unwrap().sequence(), 1);
        assert!(!sync.deleted());
        assert!(!sync.has_conflicts());
    }

    #[test]
    fn create_validates_arguments() {
        assert!(matches!(
            SyncMetadata::create("", Some("kzu"), None),
            Err(ProtocolError::InvalidArgument(_))
        ));
        assert!(matches!(
            SyncMetadata::create("item-1", None, None),
            Err(ProtocolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn update_is_copy_on_write() {
        let original = SyncMetadata::create("item-1", Some("kzu"), Some(at(0))).unwrap();
        let updated = original.update(Some("vga"), Some(at(1))).unwrap();

        assert_eq!(original.updates(), 1);
        assert_eq!(original.history().len(), 1);
        assert_eq!(updated.updates(), 2);
        assert_eq!(updated.history().len(), 2);
        assert_eq!(updated.last_update().unwrap().by(), Some("vga"));
        assert_eq!(updated.last_update().unwrap().sequence(), 2);
    }

    #[test]
    fn delete_sets_flag_and_increments() {
        let sync = SyncMetadata::create("item-1", Some("kzu"), None).unwrap();
        let deleted = sync.delete(Some("kzu"), None).unwrap();
        assert!(deleted.deleted());
        assert_eq!(deleted.updates(), 2);

        // An update after a delete keeps the item deleted.
        let touched = deleted.update(Some("kzu"), None).unwrap();
        assert!(touched.deleted());
        assert_eq!(touched.updates(), 3);
    }

    #[test]
    fn equality_ignores_older_history_and_conflicts() {
        let base = SyncMetadata::create("item-1", Some("kzu"), Some(at(0))).unwrap();
        let a = base.update(Some("kzu"), Some(at(1))).unwrap();
        let b = SyncMetadata::from_parts(
            "item-1",
            2,
            false,
            false,
            vec![a.history()[0].clone()],
            Vec::new(),
        )
        .unwrap()
        .with_tag(Some("other".into()));

        assert_eq!(a, b);
        assert_ne!(a, a.delete(Some("kzu"), Some(at(2))).unwrap());
        assert_ne!(a, a.clone().with_no_conflicts(true));
    }

    #[test]
    fn from_parts_checks_updates_against_history() {
        let entry = History::new(Some("kzu"), None, 3).unwrap();
        let err = SyncMetadata::from_parts("item-1", 2, false, false, vec![entry], Vec::new());
        assert!(matches!(err, Err(ProtocolError::InvalidState(_))));
    }

    #[test]
    fn add_conflict_history_inserts_below_top() {
        let sync = SyncMetadata::create("item-1", Some("kzu"), None)
            .unwrap()
            .update(Some("kzu"), None)
            .unwrap();
        let entry = History::new(Some("vga"), None, 2).unwrap();
        let merged = sync.add_conflict_history(entry.clone());

        assert_eq!(merged.history().len(), 3);
        assert_eq!(merged.history()[0], sync.history()[0]);
        assert_eq!(merged.history()[1], entry);
        assert_eq!(merged.updates(), sync.updates());
    }

    #[test]
    fn sparse_purge_keeps_latest_per_author() {
        let sync = SyncMetadata::create("item-1", Some("kzu"), Some(at(0)))
            .unwrap()
            .update(Some("vga"), Some(at(1)))
            .unwrap()
            .update(None, Some(at(2)))
            .unwrap()
            .update(Some("kzu"), Some(at(3)))
            .unwrap()
            .update(Some("vga"), Some(at(4)))
            .unwrap()
            .update(None, Some(at(5)))
            .unwrap();

        let purged = sync.sparse_purge();
        let summary: Vec<(Option<&str>, u32)> = purged
            .history()
            .iter()
            .map(|h| (h.by(), h.sequence()))
            .collect();

        assert_eq!(
            summary,
            vec![(None, 6), (Some("vga"), 5), (Some("kzu"), 4), (None, 3)]
        );
        assert_eq!(purged, sync);
    }

    #[test]
    fn sparse_purge_preserves_topmost() {
        let sync = SyncMetadata::create("item-1", Some("kzu"), None)
            .unwrap()
            .update(Some("kzu"), None)
            .unwrap()
            .update(Some("kzu"), None)
            .unwrap();
        let purged = sync.sparse_purge();
        assert_eq!(purged.history().len(), 1);
        assert_eq!(purged.last_update(), sync.last_update());
    }

    #[test]
    fn json_roundtrip_keeps_tag_and_history() {
        let sync = SyncMetadata::create("item-1", Some("kzu"), Some(at(0)))
            .unwrap()
            .update(Some("vga"), Some(at(1)))
            .unwrap()
            .with_tag(Some("abc".into()));
        let decoded: SyncMetadata =
            serde_json::from_str(&serde_json::to_string(&sync).unwrap()).unwrap();

        assert_eq!(decoded, sync);
        assert_eq!(decoded.history(), sync.history());
        assert_eq!(decoded.tag(), Some("abc"));
    }

    #[test]
    fn json_rejects_broken_invariants() {
        let cases = [
            // empty id
            r#"{"id":"","updates":1,"history":[{"by":"kzu","sequence":1}]}"#,
            // entry with neither author nor timestamp
            r#"{"id":"a","updates":0,"history":[{"by":null,"when":null,"sequence":0}]}"#,
            // counter disagrees with the topmost entry
            r#"{"id":"a","updates":7,"history":[{"by":"kzu","sequence":1}]}"#,
            // updates without any history
            r#"{"id":"a","updates":7,"history":[]}"#,
        ];
        for json in cases {
            assert!(
                serde_json::from_str::<SyncMetadata>(json).is_err(),
                "accepted {json}"
            );
        }
    }
}

