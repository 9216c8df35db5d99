//! One-way import of items into a repository.
//!
//! This is the merge step of a round for repositories without native merge
//! support: every incoming item is merged against the local version and the
//! resulting operation is written back.

use crate::error::{SyncError, SyncResult};
use crate::state::SyncEvent;
use feedsync_protocol::{merge, Item, MergeOperation, MergeResult};
use feedsync_storage::Repository;
use tracing::{debug, info};

/// Inspects, and may alter, a batch of merge results before they are
/// written.
pub type MergePreview = dyn Fn(Vec<MergeResult>) -> Vec<MergeResult> + Send + Sync;

/// Computes the merge results for `items` without writing anything.
///
/// # Errors
///
/// Returns an error if a local item cannot be read or an item fails to
/// merge.
pub fn preview_import(repo: &dyn Repository, items: &[Item]) -> SyncResult<Vec<MergeResult>> {
    items
        .iter()
        .map(|incoming| {
            let local = repo.get(incoming.id())?;
            Ok(merge(local.as_ref(), incoming)?)
        })
        .collect()
}

/// Merges `items` into `repo` and returns the items left in conflict.
///
/// With a `preview`, the whole batch is merged first and the preview decides
/// what gets written. Without one, items are merged and written one at a
/// time in the order given.
///
/// # Errors
///
/// The first failing item aborts the import. Items written before it stay
/// written.
pub fn import(
    repo: &dyn Repository,
    items: Vec<Item>,
    preview: Option<&MergePreview>,
) -> SyncResult<Vec<Item>> {
    import_observed(repo, items, preview, &mut |_| {})
}

pub(crate) fn import_observed(
    repo: &dyn Repository,
    items: Vec<Item>,
    preview: Option<&MergePreview>,
    observer: &mut dyn FnMut(&SyncEvent),
) -> SyncResult<Vec<Item>> {
    let mut conflicts = Vec::new();
    match preview {
        Some(preview) => {
            let results = preview(preview_import(repo, &items)?);
            for result in results {
                apply(repo, result, &mut conflicts, observer)?;
            }
        }
        None => {
            for incoming in items {
                let local = repo.get(incoming.id())?;
                let result = merge(local.as_ref(), &incoming)?;
                apply(repo, result, &mut conflicts, observer)?;
            }
        }
    }
    Ok(conflicts)
}

/// Writes one merge result and collects the item if it is in conflict.
fn apply(
    repo: &dyn Repository,
    result: MergeResult,
    conflicts: &mut Vec<Item>,
    observer: &mut dyn FnMut(&SyncEvent),
) -> SyncResult<()> {
    let MergeResult {
        operation,
        proposed,
        original,
    } = result;

    let proposed = match (operation, proposed) {
        (MergeOperation::None, _) => {
            // Nothing to write, but an unresolved conflict is still reported.
            if let Some(original) = original.filter(Item::has_conflicts) {
                conflicts.push(original);
            }
            return Ok(());
        }
        (_, None) => {
            return Err(SyncError::invalid_state(format!(
                "{operation:?} merge result without a proposed item"
            )));
        }
        (_, Some(proposed)) => proposed,
    };

    let id = proposed.id().to_string();
    match operation {
        MergeOperation::Added => repo.add(proposed.clone())?,
        MergeOperation::Updated | MergeOperation::Conflict => repo.update(proposed.clone())?,
        MergeOperation::Deleted => {
            repo.update(proposed.clone())?;
            repo.delete(&id)?;
        }
        MergeOperation::None => {}
    }
    debug!(
        repository = %repo.friendly_name(),
        id = %id,
        ?operation,
        "applied merge"
    );
    observer(&SyncEvent::ItemMerged {
        id: id.clone(),
        operation,
    });

    if proposed.has_conflicts() {
        info!(
            repository = %repo.friendly_name(),
            id = %id,
            conflicts = proposed.sync().conflicts().len(),
            "item in conflict"
        );
        observer(&SyncEvent::Conflict { id });
        conflicts.push(proposed);
    }
    Ok(())
}
