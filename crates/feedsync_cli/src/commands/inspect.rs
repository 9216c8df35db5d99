//! Inspect command implementation.

use crate::error::CliResult;
use crate::snapshot;
use clap::ValueEnum;
use feedsync_protocol::{timestamp, Item};
use feedsync_storage::Repository;
use serde::Serialize;
use std::path::Path;

/// Output format of reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable text.
    Text,
    /// Pretty printed JSON.
    Json,
}

/// Replica inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Replica name.
    pub name: String,
    /// Author of local edits.
    pub author: String,
    /// Number of live items.
    pub live_count: usize,
    /// Number of tombstones.
    pub tombstone_count: usize,
    /// Number of items in conflict.
    pub conflict_count: usize,
    /// Per-item summaries.
    pub items: Vec<ItemSummary>,
}

/// Summary of one item.
#[derive(Debug, Serialize)]
pub struct ItemSummary {
    /// Item id.
    pub id: String,
    /// Item title.
    pub title: String,
    /// Update counter.
    pub updates: u32,
    /// Whether the item is a tombstone.
    pub deleted: bool,
    /// Number of recorded conflicts.
    pub conflicts: usize,
    /// Author of the latest edit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_by: Option<String>,
    /// Time of the latest edit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_when: Option<String>,
}

impl ItemSummary {
    pub(crate) fn of(item: &Item) -> Self {
        let top = item.sync().last_update();
        Self {
            id: item.id().to_string(),
            title: item.title().to_string(),
            updates: item.sync().updates(),
            deleted: item.sync().deleted(),
            conflicts: item.sync().conflicts().len(),
            last_by: top.and_then(|h| h.by()).map(str::to_owned),
            last_when: top.and_then(|h| h.when()).map(|w| timestamp::format(&w)),
        }
    }

    pub(crate) fn describe(&self) -> String {
        let by = self.last_by.as_deref().unwrap_or("-");
        let when = self.last_when.as_deref().unwrap_or("-");
        format!("{} v{} by {} at {}", self.id, self.updates, by, when)
    }
}

/// Collects the inspection result of the replica at `path`.
pub fn inspect(path: &Path) -> CliResult<InspectResult> {
    let repo = snapshot::load(path)?;
    let items: Vec<ItemSummary> = repo.get_all()?.iter().map(ItemSummary::of).collect();

    Ok(InspectResult {
        name: repo.friendly_name().to_string(),
        author: repo.author().to_string(),
        live_count: items.iter().filter(|i| !i.deleted).count(),
        tombstone_count: items.iter().filter(|i| i.deleted).count(),
        conflict_count: items.iter().filter(|i| i.conflicts > 0).count(),
        items,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: OutputFormat) -> CliResult<()> {
    let result = inspect(path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text(&result),
    }
    Ok(())
}

fn print_text(result: &InspectResult) {
    println!("Replica {} (author {})", result.name, result.author);
    println!();
    println!("  Live items: {}", result.live_count);
    println!("  Tombstones: {}", result.tombstone_count);
    println!("  Conflicts:  {}", result.conflict_count);

    if !result.items.is_empty() {
        println!();
        for item in &result.items {
            let mut flags = Vec::new();
            if item.deleted {
                flags.push("deleted".to_string());
            }
            if item.conflicts > 0 {
                flags.push(format!("{} conflicts", item.conflicts));
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!("  {} \"{}\"{}", item.describe(), item.title, flags);
        }
    }
}
