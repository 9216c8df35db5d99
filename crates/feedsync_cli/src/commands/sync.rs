//! Sync command implementation.

use crate::error::CliResult;
use crate::snapshot;
use clap::ValueEnum;
use feedsync_engine::{SyncConfig, SyncCycleResult, SyncDirection, SyncEngine};
use feedsync_protocol::timestamp;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Direction of a sync run on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    /// Merge both ways.
    SendReceive,
    /// Only merge the left replica into the right one.
    Send,
    /// Only merge the right replica into the left one.
    Receive,
}

impl From<Direction> for SyncDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::SendReceive => SyncDirection::SendReceive,
            Direction::Send => SyncDirection::SendOnly,
            Direction::Receive => SyncDirection::ReceiveOnly,
        }
    }
}

/// Synchronizes the replicas at `left` and `right` and writes both back.
///
/// `since` is an RFC 3339 instant; only items changed at or after it are
/// exchanged.
pub fn sync(
    left: &Path,
    right: &Path,
    since: Option<&str>,
    direction: Direction,
) -> CliResult<SyncCycleResult> {
    let mut config = SyncConfig::new().with_direction(direction.into());
    if let Some(since) = since {
        config = config.with_since(timestamp::parse(since)?);
    }

    let left_repo = Arc::new(snapshot::load(left)?);
    let right_repo = Arc::new(snapshot::load(right)?);
    let engine = SyncEngine::builder()
        .left(left_repo.clone())
        .right(right_repo.clone())
        .config(config)
        .build()?;

    let result = engine.synchronize()?;
    snapshot::save(left, &left_repo)?;
    snapshot::save(right, &right_repo)?;

    info!(
        left = %left.display(),
        right = %right.display(),
        sent = result.sent,
        received = result.received,
        "sync finished"
    );
    Ok(result)
}

/// Runs the sync command.
pub fn run(left: &Path, right: &Path, since: Option<&str>, direction: Direction) -> CliResult<()> {
    let result = sync(left, right, since, direction)?;
    println!(
        "Received {} items, sent {} items in {:?}",
        result.received, result.sent, result.duration
    );

    let conflicts = result.conflicts();
    if !conflicts.is_empty() {
        println!("{} items in conflict:", conflicts.len());
        for item in &conflicts {
            println!("  {}", item.id());
        }
    }
    Ok(())
}
