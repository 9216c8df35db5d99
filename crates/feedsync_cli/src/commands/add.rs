//! Add command implementation.

use crate::error::CliResult;
use crate::snapshot;
use feedsync_protocol::{timestamp, Item};
use feedsync_storage::Repository;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Creates a new item in the replica at `path` and returns its id.
///
/// The file is created when missing, in which case `by` is required and
/// becomes the replica's author. Without `by` the replica's author is used.
pub fn add(
    path: &Path,
    title: &str,
    summary: &str,
    payload: Option<&str>,
    by: Option<&str>,
) -> CliResult<String> {
    let repo = snapshot::load_or_create(path, by)?;
    let by = by.unwrap_or(repo.author()).to_string();

    let id = Uuid::new_v4().to_string();
    let item = Item::create(
        id.clone(),
        title,
        summary,
        payload.unwrap_or_default().to_string(),
        Some(&by),
        Some(timestamp::now()),
    )?;
    repo.add(item)?;
    snapshot::save(path, &repo)?;

    info!(id = %id, by = %by, "item added");
    Ok(id)
}

/// Runs the add command.
pub fn run(
    path: &Path,
    title: &str,
    summary: &str,
    payload: Option<&str>,
    by: Option<&str>,
) -> CliResult<()> {
    let id = add(path, title, summary, payload, by)?;
    println!("{id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_creates_snapshot_and_item() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laptop.json");

        let id = add(&path, "Groceries", "", Some("milk"), Some("kzu")).unwrap();
        let repo = snapshot::load(&path).unwrap();
        let item = repo.get(&id).unwrap().unwrap();

        assert_eq!(item.title(), "Groceries");
        assert_eq!(item.payload().as_ref(), b"milk");
        assert_eq!(item.sync().last_update().unwrap().by(), Some("kzu"));
        assert_eq!(repo.author(), "kzu");
    }

    #[test]
    fn add_defaults_to_replica_author() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laptop.json");
        add(&path, "first", "", None, Some("kzu")).unwrap();

        let id = add(&path, "second", "", None, None).unwrap();
        let repo = snapshot::load(&path).unwrap();
        let item = repo.get(&id).unwrap().unwrap();
        assert_eq!(item.sync().last_update().unwrap().by(), Some("kzu"));
        assert_eq!(repo.len(), 2);
    }
}
