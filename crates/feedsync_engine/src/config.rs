//! Configuration for the sync engine.

use chrono::{DateTime, Utc};

/// Which directions a round exchanges items in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncDirection {
    /// Pull right into left, then push left into right.
    #[default]
    SendReceive,
    /// Only merge right into left.
    ReceiveOnly,
    /// Only merge left into right.
    SendOnly,
}

impl SyncDirection {
    /// Returns true if the round merges right into left.
    pub fn receives(&self) -> bool {
        matches!(self, SyncDirection::SendReceive | SyncDirection::ReceiveOnly)
    }

    /// Returns true if the round merges left into right.
    pub fn sends(&self) -> bool {
        matches!(self, SyncDirection::SendReceive | SyncDirection::SendOnly)
    }
}

/// Which conflicts a round reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictScope {
    /// Conflicts from both sides, deduplicated by id.
    #[default]
    Both,
    /// Only the conflicts left in the right repository.
    RightOnly,
}

/// Configuration for sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Directions to exchange items in.
    pub direction: SyncDirection,
    /// Only enumerate items changed at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Conflicts reported by [`crate::SyncCycleResult::conflicts`].
    pub conflict_scope: ConflictScope,
}

impl SyncConfig {
    /// Creates the default configuration: full bidirectional rounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the direction.
    pub fn with_direction(mut self, direction: SyncDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the watermark for incremental rounds.
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Sets which conflicts are reported.
    pub fn with_conflict_scope(mut self, scope: ConflictScope) -> Self {
        self.conflict_scope = scope;
        self
    }
}
