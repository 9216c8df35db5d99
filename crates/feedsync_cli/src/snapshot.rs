//! Replica snapshots stored as JSON files.
//!
//! A snapshot holds the replica's name, the author its local edits are
//! attributed to, and every item including tombstones.

use crate::error::{CliError, CliResult};
use feedsync_protocol::Item;
use feedsync_storage::{MemoryRepository, Repository};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// On-disk form of a replica.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// Replica name.
    pub name: String,
    /// Author of local edits.
    pub author: String,
    /// Stored items, tombstones included.
    #[serde(default)]
    pub items: Vec<Item>,
}

/// Loads a snapshot into an in-memory repository.
pub fn load(path: &Path) -> CliResult<MemoryRepository> {
    let text = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
    let snapshot: Snapshot = serde_json::from_str(&text)?;
    debug!(path = %path.display(), items = snapshot.items.len(), "loaded snapshot");
    Ok(MemoryRepository::from_items(
        snapshot.name,
        snapshot.author,
        snapshot.items,
    )?)
}

/// Loads a snapshot, or creates an empty repository named after the file.
pub fn load_or_create(path: &Path, author: Option<&str>) -> CliResult<MemoryRepository> {
    if path.exists() {
        return load(path);
    }
    let author = author.ok_or_else(|| {
        CliError::InvalidArgument(format!(
            "{} does not exist; an author is required to create it",
            path.display()
        ))
    })?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "replica".to_string());
    Ok(MemoryRepository::new(name, author))
}

/// Writes a repository back to its snapshot file.
pub fn save(path: &Path, repo: &MemoryRepository) -> CliResult<()> {
    let snapshot = Snapshot {
        name: repo.friendly_name().to_string(),
        author: repo.author().to_string(),
        items: repo.get_all()?,
    };
    let text = serde_json::to_string_pretty(&snapshot)?;
    fs::write(path, text).map_err(|e| CliError::io(path, e))?;
    debug!(path = %path.display(), items = snapshot.items.len(), "saved snapshot");
    Ok(())
}
