//! Resolve command implementation.

use crate::error::{CliError, CliResult};
use crate::snapshot;
use feedsync_protocol::{resolve_conflicts, timestamp, Item};
use feedsync_storage::Repository;
use std::path::Path;
use tracing::info;

/// Resolves the conflicts of item `id`, keeping the winning version.
///
/// With `delete` the resolution deletes the item instead.
pub fn resolve(path: &Path, id: &str, delete: bool) -> CliResult<Item> {
    let repo = snapshot::load(path)?;
    let item = repo
        .get(id)?
        .ok_or_else(|| CliError::NotFound(id.to_string()))?;
    if !item.has_conflicts() {
        return Err(CliError::InvalidArgument(format!("item {id} has no conflicts")));
    }

    let resolved = if delete {
        let resolved =
            resolve_conflicts(&item, Some(repo.author()), Some(timestamp::now()), true)?;
        repo.update(resolved.clone())?;
        resolved
    } else {
        repo.update_resolving(item, true)?
    };
    snapshot::save(path, &repo)?;

    info!(id = %id, deleted = delete, "conflicts resolved");
    Ok(resolved)
}

/// Runs the resolve command.
pub fn run(path: &Path, id: &str, delete: bool) -> CliResult<()> {
    let resolved = resolve(path, id, delete)?;
    println!(
        "Resolved {} at update {}{}",
        resolved.id(),
        resolved.sync().updates(),
        if delete { " (deleted)" } else { "" }
    );
    Ok(())
}
