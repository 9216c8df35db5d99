//! Conflicts command implementation.

use crate::commands::inspect::{ItemSummary, OutputFormat};
use crate::error::CliResult;
use crate::snapshot;
use feedsync_storage::Repository;
use serde::Serialize;
use std::path::Path;

/// An item in conflict together with the versions it lost against.
#[derive(Debug, Serialize)]
pub struct ConflictReport {
    /// The winning version.
    pub winner: ItemSummary,
    /// The recorded losing versions.
    pub losers: Vec<ItemSummary>,
}

/// Lists the items of the replica at `path` that carry conflicts.
pub fn conflicts(path: &Path) -> CliResult<Vec<ConflictReport>> {
    let repo = snapshot::load(path)?;
    Ok(repo
        .get_conflicts()?
        .iter()
        .map(|item| ConflictReport {
            winner: ItemSummary::of(item),
            losers: item.sync().conflicts().iter().map(ItemSummary::of).collect(),
        })
        .collect())
}

/// Runs the conflicts command.
pub fn run(path: &Path, format: OutputFormat) -> CliResult<()> {
    let reports = conflicts(path)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("No conflicts");
        return Ok(());
    }
    for report in &reports {
        println!("{}", report.winner.describe());
        for loser in &report.losers {
            println!("  lost: {}", loser.describe());
        }
    }
    Ok(())
}
