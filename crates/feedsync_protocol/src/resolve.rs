//! Manual conflict resolution.

use crate::error::ProtocolResult;
use crate::item::Item;
use chrono::{DateTime, Utc};

/// Folds the recorded conflicts of `item` back into its history.
///
/// Each conflict contributes at most one history entry: the first of its
/// entries not yet subsumed by the resolved history, inserted right below
/// the topmost entry. That is enough to prove the conflict is covered, so it
/// will be discarded by later merges. A final update (or deletion when
/// `delete` is set) by `by` at `when` is then recorded on top.
///
/// The input is left untouched.
///
/// # Errors
///
/// Fails like [`crate::SyncMetadata::update`] when neither `by` nor `when` is given.
pub fn resolve_conflicts(
    item: &Item,
    by: Option<&str>,
    when: Option<DateTime<Utc>>,
    delete: bool,
) -> ProtocolResult<Item> {
    let mut sync = item.sync().clone().without_conflicts();

    for conflict in item.sync().conflicts() {
        let uncovered = conflict.sync().history().iter().find(|entry| {
            !sync
                .history()
                .iter()
                .any(|existing| entry.is_subsumed_by(existing))
        });
        if let Some(entry) = uncovered {
            sync = sync.add_conflict_history(entry.clone());
        }
    }

    let sync = sync.update_with(by, when, delete)?;
    if delete {
        Ok(Item::tombstone(sync))
    } else {
        Ok(item.clone().with_sync(sync))
    }
}
