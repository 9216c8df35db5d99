//! Purge command implementation.

use crate::error::CliResult;
use crate::snapshot;
use feedsync_storage::Repository;
use std::path::Path;
use tracing::info;

/// Purge statistics.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PurgeStats {
    /// Items whose history was shortened.
    pub items_purged: usize,
    /// History entries dropped across all items.
    pub entries_removed: usize,
}

/// Drops redundant history entries from every item of the replica at `path`.
///
/// Entries are only dropped when an entry by the same author with a higher
/// sequence remains, so merges keep their outcome.
pub fn purge(path: &Path, dry_run: bool) -> CliResult<PurgeStats> {
    let repo = snapshot::load(path)?;
    let mut stats = PurgeStats::default();

    for item in repo.get_all()? {
        let purged = item.sync().sparse_purge();
        let removed = item.sync().history().len() - purged.history().len();
        if removed == 0 {
            continue;
        }
        stats.items_purged += 1;
        stats.entries_removed += removed;
        if !dry_run {
            repo.update(item.with_sync(purged))?;
        }
    }

    if !dry_run && stats.items_purged > 0 {
        snapshot::save(path, &repo)?;
    }
    info!(
        items = stats.items_purged,
        entries = stats.entries_removed,
        dry_run,
        "purge finished"
    );
    Ok(stats)
}

/// Runs the purge command.
pub fn run(path: &Path, dry_run: bool) -> CliResult<()> {
    let stats = purge(path, dry_run)?;
    if dry_run {
        println!("Dry run, nothing written");
    }
    println!(
        "Purged {} history entries from {} items",
        stats.entries_removed, stats.items_purged
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedsync_protocol::Item;
    use feedsync_storage::MemoryRepository;

    fn edited_snapshot(path: &Path) {
        let item = Item::create("a", "t", "", "v0", Some("kzu"), None)
            .unwrap()
            .edit("t", "", "v1", Some("kzu"), None)
            .unwrap()
            .edit("t", "", "v2", Some("kzu"), None)
            .unwrap();
        let repo = MemoryRepository::from_items("laptop", "kzu", vec![item]).unwrap();
        snapshot::save(path, &repo).unwrap();
    }

    #[test]
    fn purge_drops_superseded_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laptop.json");
        edited_snapshot(&path);

        let stats = purge(&path, false).unwrap();
        assert_eq!(
            stats,
            PurgeStats {
                items_purged: 1,
                entries_removed: 2
            }
        );

        let item = snapshot::load(&path).unwrap().get("a").unwrap().unwrap();
        assert_eq!(item.sync().history().len(), 1);
        assert_eq!(item.sync().updates(), 3);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laptop.json");
        edited_snapshot(&path);

        assert_eq!(purge(&path, true).unwrap().entries_removed, 2);
        let item = snapshot::load(&path).unwrap().get("a").unwrap().unwrap();
        assert_eq!(item.sync().history().len(), 3);
    }
}
