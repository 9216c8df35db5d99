//! Merge behavior and winner picking.
//!
//! [`merge`] combines the local version of an item with an incoming one and
//! proposes the result. It is pure: the caller persists whatever it returns.
//!
//! ## Algorithm
//!
//! 1. No local version: the incoming item is added as is, with its
//!    conflicts flattened.
//! 2. Both sides are flattened into candidate lists: the item itself
//!    followed by each of its conflicts, all with their conflict lists
//!    cleared.
//! 3. Local candidates subsumed by any incoming candidate are dropped, and
//!    incoming candidates subsumed by any local candidate are dropped. Both
//!    checks see the full opposite list. When a local and an incoming
//!    candidate subsume each other they are the same version: the local copy
//!    survives and the incoming copy is dropped. The rest survive, and a
//!    running winner is picked among them.
//! 4. Unless the winner refuses conflicts, every other survivor is attached
//!    to it as a conflict.
//! 5. A result whose sync equals the local sync and has no conflicts is
//!    collapsed to "nothing to do", which makes repeated merges idempotent.

use crate::error::{ProtocolError, ProtocolResult};
use crate::item::Item;
use std::cmp::Ordering;

/// What applying a merge result does to the local repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeOperation {
    /// The item did not exist locally.
    Added,
    /// The local item is replaced by a newer version.
    Updated,
    /// The local item is replaced by a tombstone.
    Deleted,
    /// The proposed item carries unresolved conflicts.
    Conflict,
    /// Nothing changes.
    None,
}

impl MergeOperation {
    /// Returns true if the local repository has to be written.
    pub fn is_write(&self) -> bool {
        !matches!(self, MergeOperation::None)
    }
}

/// Outcome of merging one incoming item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// The operation to apply.
    pub operation: MergeOperation,
    /// The item to persist, absent when nothing changes.
    pub proposed: Option<Item>,
    /// The local item the merge started from.
    pub original: Option<Item>,
}

impl MergeResult {
    fn unchanged(original: Option<Item>) -> Self {
        Self {
            operation: MergeOperation::None,
            proposed: None,
            original,
        }
    }

    /// Returns true if the proposed item carries conflicts.
    pub fn has_conflicts(&self) -> bool {
        self.proposed.as_ref().is_some_and(Item::has_conflicts)
    }
}

/// Merges an incoming item into the local state.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidState`] if `incoming`, or `local` when
/// present, has no history.
pub fn merge(local: Option<&Item>, incoming: &Item) -> ProtocolResult<MergeResult> {
    require_history(incoming)?;
    if let Some(local) = local {
        require_history(local)?;
        if local.id() != incoming.id() {
            return Err(ProtocolError::invalid_argument(format!(
                "cannot merge item {} into item {}",
                incoming.id(),
                local.id()
            )));
        }
    }

    let Some(local) = local else {
        return Ok(MergeResult {
            operation: MergeOperation::Added,
            proposed: Some(added(incoming)),
            original: None,
        });
    };

    // Both passes test against the complete opposite side. Two copies of the
    // same version subsume each other; the local copy is the one kept.
    let local_candidates = flatten(local);
    let incoming_candidates = flatten(incoming);
    let local_survivors: Vec<Item> = local_candidates
        .iter()
        .filter(|candidate| {
            !incoming_candidates.iter().any(|other| {
                is_subsumed_by(candidate, other) && !is_subsumed_by(other, candidate)
            })
        })
        .cloned()
        .collect();
    let incoming_survivors: Vec<Item> = incoming_candidates
        .into_iter()
        .filter(|candidate| {
            !local_candidates
                .iter()
                .any(|other| is_subsumed_by(candidate, other))
        })
        .collect();

    let mut survivors = local_survivors;
    survivors.extend(incoming_survivors);

    let Some(winner) = settle(survivors) else {
        return Ok(MergeResult::unchanged(Some(local.clone())));
    };

    let operation = if winner.has_conflicts() {
        MergeOperation::Conflict
    } else if winner.sync().deleted() {
        MergeOperation::Deleted
    } else {
        MergeOperation::Updated
    };

    if operation != MergeOperation::Conflict && winner.sync() == local.sync() {
        return Ok(MergeResult::unchanged(Some(local.clone())));
    }

    Ok(MergeResult {
        operation,
        proposed: Some(winner),
        original: Some(local.clone()),
    })
}

/// Picks the winner among the survivors and attaches the rest as conflicts.
fn settle(survivors: Vec<Item>) -> Option<Item> {
    let mut winner: Option<&Item> = None;
    for candidate in &survivors {
        winner = Some(match winner {
            None => candidate,
            Some(current) => pick_winner(current, candidate),
        });
    }
    let mut winner = winner?.clone();

    if !winner.sync().no_conflicts() {
        for candidate in survivors {
            if candidate == winner || winner.sync().conflicts().contains(&candidate) {
                continue;
            }
            winner.sync_mut().push_conflict(candidate);
        }
    }
    Some(winner)
}

/// The incoming item as the new local version, its conflicts flattened.
fn added(incoming: &Item) -> Item {
    let mut proposed = incoming.clone().without_conflicts();
    for conflict in flatten(incoming).into_iter().skip(1) {
        if conflict == proposed || proposed.sync().conflicts().contains(&conflict) {
            continue;
        }
        proposed.sync_mut().push_conflict(conflict);
    }
    proposed
}

/// The item itself followed by its conflicts, all without conflict lists.
fn flatten(item: &Item) -> Vec<Item> {
    std::iter::once(item.clone().without_conflicts())
        .chain(
            item.sync()
                .conflicts()
                .iter()
                .map(|conflict| conflict.clone().without_conflicts()),
        )
        .collect()
}

fn require_history(item: &Item) -> ProtocolResult<()> {
    if item.sync().history().is_empty() {
        return Err(ProtocolError::invalid_state(format!(
            "item {} has no history",
            item.id()
        )));
    }
    Ok(())
}

/// Returns true if the topmost history entry of `item` is subsumed by any
/// history entry of `other`.
pub fn is_subsumed_by(item: &Item, other: &Item) -> bool {
    let Some(top) = item.sync().last_update() else {
        return false;
    };
    other
        .sync()
        .history()
        .iter()
        .any(|entry| top.is_subsumed_by(entry))
}

/// Orders two versions of the same item; the greater one wins.
///
/// Higher `updates` wins. On a tie, the topmost entry with a timestamp beats
/// one without, and the later timestamp wins. If that ties too, an author
/// beats no author and the lexically greater author wins. Versions that
/// still tie are ordered by the deleted flag, the no-conflicts flag and the
/// content fingerprint, so only identical versions compare equal.
pub fn compare_versions(a: &Item, b: &Item) -> Ordering {
    let rank = |item: &Item| {
        let top = item.sync().last_update();
        (
            item.sync().updates(),
            top.and_then(|h| h.when()),
            top.and_then(|h| h.by().map(str::to_owned)),
        )
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.sync().deleted().cmp(&b.sync().deleted()))
        .then_with(|| a.sync().no_conflicts().cmp(&b.sync().no_conflicts()))
        .then_with(|| a.fingerprint().cmp(&b.fingerprint()))
}

/// Picks the winner between the current winner and a challenger.
///
/// The outcome does not depend on argument order; of two identical versions
/// `current` is kept.
pub fn pick_winner<'a>(current: &'a Item, challenger: &'a Item) -> &'a Item {
    match compare_versions(challenger, current) {
        Ordering::Greater => challenger,
        Ordering::Less | Ordering::Equal => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncMetadata;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap()
    }

    fn created() -> Item {
        Item::create("item-1", "title", "", "v0", Some("kzu"), Some(at(0))).unwrap()
    }

    #[test]
    fn merge_without_local_adds() {
        let incoming = created();
        let result = merge(None, &incoming).unwrap();
        assert_eq!(result.operation, MergeOperation::Added);
        assert_eq!(result.proposed, Some(incoming));
        assert!(result.original.is_none());
    }

    #[test]
    fn merge_with_itself_is_noop() {
        let item = created().update(Some("kzu"), Some(at(1))).unwrap();
        let result = merge(Some(&item), &item.clone()).unwrap();
        assert_eq!(result.operation, MergeOperation::None);
        assert!(result.proposed.is_none());
    }

    #[test]
    fn newer_incoming_updates() {
        let local = created();
        let incoming = local
            .edit("title", "", "v1", Some("kzu"), Some(at(1)))
            .unwrap();
        let result = merge(Some(&local), &incoming).unwrap();
        assert_eq!(result.operation, MergeOperation::Updated);
        assert_eq!(result.proposed, Some(incoming));
    }

    #[test]
    fn older_incoming_is_ignored() {
        let incoming = created();
        let local = incoming
            .edit("title", "", "v1", Some("kzu"), Some(at(1)))
            .unwrap();
        let result = merge(Some(&local), &incoming).unwrap();
        assert_eq!(result.operation, MergeOperation::None);
    }

    #[test]
    fn incoming_tombstone_deletes() {
        let local = created();
        let incoming = local.delete(Some("vga"), Some(at(1))).unwrap();
        let result = merge(Some(&local), &incoming).unwrap();
        assert_eq!(result.operation, MergeOperation::Deleted);
        assert!(result.proposed.unwrap().sync().deleted());
    }

    #[test]
    fn concurrent_edits_conflict() {
        let base = created();
        let local = base.edit("title", "", "kzu", Some("kzu"), Some(at(1))).unwrap();
        let remote = base.edit("title", "", "vga", Some("vga"), Some(at(2))).unwrap();

        let result = merge(Some(&local), &remote).unwrap();
        assert_eq!(result.operation, MergeOperation::Conflict);

        let proposed = result.proposed.unwrap();
        assert_eq!(proposed.sync().last_update().unwrap().by(), Some("vga"));
        assert_eq!(proposed.sync().conflicts().len(), 1);
        assert_eq!(proposed.sync().conflicts()[0], local);
    }

    #[test]
    fn conflict_is_stable_when_echoed_back() {
        let base = created();
        let local = base.edit("title", "", "kzu", Some("kzu"), Some(at(1))).unwrap();
        let remote = base.edit("title", "", "vga", Some("vga"), Some(at(2))).unwrap();
        let merged = merge(Some(&local), &remote).unwrap().proposed.unwrap();

        // The remote side receives the merged item back.
        let echoed = merge(Some(&remote), &merged).unwrap();
        assert_eq!(echoed.operation, MergeOperation::Conflict);
        let proposed = echoed.proposed.unwrap();
        assert_eq!(proposed.sync(), merged.sync());
        assert_eq!(proposed.sync().conflicts(), merged.sync().conflicts());

        // And merging it again locally changes nothing but the conflict stays.
        let again = merge(Some(&merged), &proposed).unwrap();
        assert_eq!(again.operation, MergeOperation::Conflict);
        assert_eq!(again.proposed.unwrap().sync().conflicts().len(), 1);
    }

    #[test]
    fn no_conflicts_flag_discards_losers() {
        let base = created();
        let local = base.edit("title", "", "kzu", Some("kzu"), Some(at(1))).unwrap();
        let remote_sync = base
            .sync()
            .update(Some("vga"), Some(at(2)))
            .unwrap()
            .with_no_conflicts(true);
        let remote = Item::new("title", "", "vga", remote_sync);

        let result = merge(Some(&local), &remote).unwrap();
        assert_eq!(result.operation, MergeOperation::Updated);
        assert!(!result.proposed.unwrap().has_conflicts());
    }

    #[test]
    fn merge_without_local_flattens_conflicts() {
        let base = created();
        let loser = base.edit("title", "", "kzu", Some("kzu"), Some(at(1))).unwrap();
        let winner = base.edit("title", "", "vga", Some("vga"), Some(at(2))).unwrap();
        let nested_loser = loser
            .clone()
            .with_sync(loser.sync().clone().with_conflicts(vec![loser.clone()]));
        let incoming = winner
            .clone()
            .with_sync(winner.sync().clone().with_conflicts(vec![nested_loser]));

        let result = merge(None, &incoming).unwrap();
        assert_eq!(result.operation, MergeOperation::Added);
        let proposed = result.proposed.unwrap();
        assert_eq!(proposed.sync(), winner.sync());
        assert_eq!(proposed.sync().conflicts().len(), 1);
        assert!(!proposed.sync().conflicts()[0].has_conflicts());
    }

    #[test]
    fn missing_history_is_invalid_state() {
        let empty = Item::new(
            "t",
            "",
            "",
            SyncMetadata::from_parts("item-1", 0, false, false, Vec::new(), Vec::new()).unwrap(),
        );
        let valid = created();

        assert!(matches!(
            merge(None, &empty),
            Err(ProtocolError::InvalidState(_))
        ));
        assert!(matches!(
            merge(Some(&empty), &valid),
            Err(ProtocolError::InvalidState(_))
        ));
    }

    #[test]
    fn winner_prefers_updates_then_when_then_by() {
        let base = created();
        let two = base.update(Some("aaa"), Some(at(1))).unwrap();
        let three = two.update(Some("aaa"), Some(at(1))).unwrap();
        assert_eq!(pick_winner(&two, &three), &three);
        assert_eq!(pick_winner(&three, &two), &three);

        let early = base.update(Some("zzz"), Some(at(1))).unwrap();
        let late = base.update(Some("aaa"), Some(at(2))).unwrap();
        assert_eq!(pick_winner(&early, &late), &late);
        assert_eq!(pick_winner(&late, &early), &late);

        let undated = base.update(Some("zzz"), None).unwrap();
        assert_eq!(pick_winner(&undated, &early), &early);

        let kzu = base.update(Some("kzu"), Some(at(3))).unwrap();
        let vga = base.update(Some("vga"), Some(at(3))).unwrap();
        assert_eq!(pick_winner(&kzu, &vga), &vga);
        assert_eq!(pick_winner(&vga, &kzu), &vga);

        let anonymous = base.update(None, Some(at(3))).unwrap();
        assert_eq!(pick_winner(&anonymous, &kzu), &kzu);
    }

    #[test]
    fn winner_is_symmetric_for_same_stamp() {
        let base = created();
        let milk = base.edit("title", "", "milk", Some("kzu"), Some(at(1))).unwrap();
        let eggs = base.edit("title", "", "eggs", Some("kzu"), Some(at(1))).unwrap();
        assert_eq!(pick_winner(&milk, &eggs), pick_winner(&eggs, &milk));

        let deleted = base.delete(Some("kzu"), Some(at(1))).unwrap();
        assert_eq!(pick_winner(&milk, &deleted), &deleted);
        assert_eq!(pick_winner(&deleted, &milk), &deleted);
    }

    #[test]
    fn crossed_lineages_with_same_top_change_nothing() {
        let base = created();
        let vga = base.edit("title", "", "vga", Some("vga"), Some(at(1))).unwrap();
        let local = vga.edit("title", "", "local", Some("kzu"), Some(at(2))).unwrap();

        let other = base
            .edit("title", "", "k2", Some("kzu"), Some(at(1)))
            .unwrap()
            .edit("title", "", "k3", Some("kzu"), Some(at(3)))
            .unwrap();
        let incoming = other
            .clone()
            .with_sync(other.sync().clone().with_conflicts(vec![vga]));

        let result = merge(Some(&local), &incoming).unwrap();
        assert_eq!(result.operation, MergeOperation::None);
        assert!(result.proposed.is_none());
    }

    #[test]
    fn incoming_conflict_known_to_replaced_local_is_dropped() {
        let base = created();
        let vga = base.edit("title", "", "vga", Some("vga"), Some(at(1))).unwrap();
        let local = vga.edit("title", "", "kzu", Some("kzu"), Some(at(2))).unwrap();
        let newer = local.edit("title", "", "dcl", Some("dcl"), Some(at(3))).unwrap();
        let incoming = newer
            .clone()
            .with_sync(newer.sync().clone().with_conflicts(vec![vga]));

        let result = merge(Some(&local), &incoming).unwrap();
        assert_eq!(result.operation, MergeOperation::Updated);
        let proposed = result.proposed.unwrap();
        assert_eq!(proposed.sync(), newer.sync());
        assert!(!proposed.has_conflicts());
    }

    #[test]
    fn merge_without_local_keeps_incoming_as_winner() {
        let base = created();
        let incoming = base.edit("title", "", "mine", Some("kzu"), Some(at(1))).unwrap();
        let bigger = base
            .edit("title", "", "x", Some("vga"), Some(at(1)))
            .unwrap()
            .update(Some("vga"), Some(at(2)))
            .unwrap();
        let incoming = incoming
            .clone()
            .with_sync(incoming.sync().clone().with_conflicts(vec![bigger.clone()]));

        let result = merge(None, &incoming).unwrap();
        assert_eq!(result.operation, MergeOperation::Added);
        let proposed = result.proposed.unwrap();
        assert_eq!(proposed.payload().as_ref(), b"mine");
        assert_eq!(proposed.sync(), incoming.sync());
        assert_eq!(proposed.sync().conflicts(), &[bigger]);
    }
}

