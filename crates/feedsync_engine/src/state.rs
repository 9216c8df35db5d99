//! Sync engine state machine.

use crate::config::{ConflictScope, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::import::{import_observed, MergePreview};
use chrono::{DateTime, Utc};
use feedsync_protocol::{timestamp, Item, MergeOperation, MergeResult};
use feedsync_storage::{Capability, Repository};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Decides whether an item is exchanged in one direction.
pub type ItemFilter = dyn Fn(&Item) -> bool + Send + Sync;

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, not syncing.
    Idle,
    /// Engine is enumerating the right repository.
    PullingRight,
    /// Engine is merging right's items into the left repository.
    MergingIntoLeft,
    /// Engine is enumerating the left repository.
    PushingLeft,
    /// Engine is merging left's items into the right repository.
    MergingIntoRight,
    /// The last round failed.
    Error,
}

impl SyncState {
    /// Returns true if the engine is in the middle of a round.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::PullingRight
                | SyncState::MergingIntoLeft
                | SyncState::PushingLeft
                | SyncState::MergingIntoRight
        )
    }

    /// Returns true if the engine can start a new round.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Error)
    }
}

/// Progress notifications raised during a round.
///
/// They are informational only; a round behaves the same whether or not
/// anyone listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// An item of the left repository is about to be merged into the right.
    ItemSent {
        /// Item id.
        id: String,
    },
    /// An item of the right repository is about to be merged into the left.
    ItemReceived {
        /// Item id.
        id: String,
    },
    /// A merge result was written.
    ItemMerged {
        /// Item id.
        id: String,
        /// The operation that was applied.
        operation: MergeOperation,
    },
    /// An item was left in conflict.
    Conflict {
        /// Item id.
        id: String,
    },
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of rounds completed.
    pub cycles_completed: u64,
    /// Total number of items sent to the right repository.
    pub items_sent: u64,
    /// Total number of items received from the right repository.
    pub items_received: u64,
    /// Total number of conflicts reported.
    pub conflicts_encountered: u64,
    /// Start of the last successful round, usable as the next watermark.
    pub last_sync: Option<DateTime<Utc>>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of a sync round.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    /// Number of items merged into the right repository.
    pub sent: u64,
    /// Number of items merged into the left repository.
    pub received: u64,
    /// Items left in conflict in the left repository.
    pub left_conflicts: Vec<Item>,
    /// Items left in conflict in the right repository.
    pub right_conflicts: Vec<Item>,
    /// Which conflicts [`SyncCycleResult::conflicts`] reports.
    pub scope: ConflictScope,
    /// Duration of the round.
    pub duration: Duration,
}

impl SyncCycleResult {
    fn empty(scope: ConflictScope) -> Self {
        Self {
            sent: 0,
            received: 0,
            left_conflicts: Vec::new(),
            right_conflicts: Vec::new(),
            scope,
            duration: Duration::ZERO,
        }
    }

    /// The conflicts of the round.
    ///
    /// Right side first; with [`ConflictScope::Both`] left items whose id
    /// was already reported by the right side are skipped.
    pub fn conflicts(&self) -> Vec<Item> {
        let mut seen = HashSet::new();
        let left: &[Item] = match self.scope {
            ConflictScope::Both => &self.left_conflicts,
            ConflictScope::RightOnly => &[],
        };
        self.right_conflicts
            .iter()
            .chain(left)
            .filter(|item| seen.insert(item.id().to_string()))
            .cloned()
            .collect()
    }
}

/// Synchronizes two repositories.
///
/// A round pulls the items of `right` (optionally filtered and limited to a
/// watermark) and merges them into `left`, then does the same from `left`
/// into `right`. Once both directions ran, both repositories hold the same
/// winner and the same conflicts for every exchanged item.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use feedsync_engine::SyncEngine;
/// use feedsync_protocol::Item;
/// use feedsync_storage::{MemoryRepository, Repository};
///
/// let left = Arc::new(MemoryRepository::new("laptop", "kzu"));
/// let right = Arc::new(MemoryRepository::new("phone", "vga"));
/// right
///     .add(Item::create("note-1", "Groceries", "", "milk", Some("vga"), None).unwrap())
///     .unwrap();
///
/// let engine = SyncEngine::builder()
///     .left(left.clone())
///     .right(right.clone())
///     .build()
///     .unwrap();
/// let result = engine.synchronize().unwrap();
///
/// assert_eq!(result.received, 1);
/// assert!(left.get("note-1").unwrap().is_some());
/// ```
pub struct SyncEngine {
    left: Arc<dyn Repository>,
    right: Arc<dyn Repository>,
    config: SyncConfig,
    send_filter: Option<Box<ItemFilter>>,
    receive_filter: Option<Box<ItemFilter>>,
    merge_preview: Option<Box<MergePreview>>,
    state: RwLock<SyncState>,
    transitions: RwLock<Vec<SyncState>>,
    stats: RwLock<SyncStats>,
}

impl SyncEngine {
    /// Starts building an engine.
    pub fn builder() -> SyncEngineBuilder {
        SyncEngineBuilder::default()
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// States entered during the current or last round, in order.
    pub fn transitions(&self) -> Vec<SyncState> {
        self.transitions.read().clone()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Start of the last successful round.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.stats.read().last_sync
    }

    /// Sets the state.
    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
        self.transitions.write().push(state);
    }

    /// Runs one round using the configured watermark.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidStateTransition`] if a round is already
    /// running, or the first repository or merge error, which aborts the
    /// round.
    pub fn synchronize(&self) -> SyncResult<SyncCycleResult> {
        self.run(self.config.since, &mut |_| {})
    }

    /// Runs one round enumerating only items changed at or after `since`.
    ///
    /// # Errors
    ///
    /// Same as [`SyncEngine::synchronize`].
    pub fn synchronize_since(&self, since: DateTime<Utc>) -> SyncResult<SyncCycleResult> {
        self.run(Some(since), &mut |_| {})
    }

    /// Runs one round, reporting progress to `progress`.
    ///
    /// # Errors
    ///
    /// Same as [`SyncEngine::synchronize`].
    pub fn synchronize_with_progress(
        &self,
        progress: &mut dyn FnMut(&SyncEvent),
    ) -> SyncResult<SyncCycleResult> {
        self.run(self.config.since, progress)
    }

    fn run(
        &self,
        since: Option<DateTime<Utc>>,
        progress: &mut dyn FnMut(&SyncEvent),
    ) -> SyncResult<SyncCycleResult> {
        {
            let mut state = self.state.write();
            if !state.can_start_sync() {
                return Err(SyncError::InvalidStateTransition {
                    from: format!("{:?}", *state),
                    to: "sync".into(),
                });
            }
            // Claim the engine before releasing the lock.
            *state = if self.config.direction.receives() {
                SyncState::PullingRight
            } else {
                SyncState::PushingLeft
            };
            *self.transitions.write() = vec![SyncState::Idle];
        }

        let start = Instant::now();
        let started_at = timestamp::now();
        info!(
            left = %self.left.friendly_name(),
            right = %self.right.friendly_name(),
            direction = ?self.config.direction,
            since = ?since,
            "sync round started"
        );

        let mut result = SyncCycleResult::empty(self.config.conflict_scope);
        if let Err(e) = self.run_phases(since, progress, &mut result) {
            self.handle_error(&e);
            return Err(e);
        }

        result.duration = start.elapsed();
        self.set_state(SyncState::Idle);

        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.items_sent += result.sent;
            stats.items_received += result.received;
            stats.conflicts_encountered += result.conflicts().len() as u64;
            stats.last_sync = Some(started_at);
            stats.last_error = None;
        }

        info!(
            sent = result.sent,
            received = result.received,
            conflicts = result.conflicts().len(),
            duration_ms = result.duration.as_millis() as u64,
            "sync round finished"
        );
        Ok(result)
    }

    fn run_phases(
        &self,
        since: Option<DateTime<Utc>>,
        progress: &mut dyn FnMut(&SyncEvent),
        result: &mut SyncCycleResult,
    ) -> SyncResult<()> {
        if self.config.direction.receives() {
            self.set_state(SyncState::PullingRight);
            let incoming = enumerate(self.right.as_ref(), since, self.receive_filter.as_deref())?;
            result.received = incoming.len() as u64;
            for item in &incoming {
                progress(&SyncEvent::ItemReceived {
                    id: item.id().to_string(),
                });
            }

            self.set_state(SyncState::MergingIntoLeft);
            result.left_conflicts = self.merge_into(self.left.as_ref(), incoming, progress)?;
        }

        if self.config.direction.sends() {
            self.set_state(SyncState::PushingLeft);
            let outgoing = enumerate(self.left.as_ref(), since, self.send_filter.as_deref())?;
            result.sent = outgoing.len() as u64;
            for item in &outgoing {
                progress(&SyncEvent::ItemSent {
                    id: item.id().to_string(),
                });
            }

            self.set_state(SyncState::MergingIntoRight);
            result.right_conflicts = self.merge_into(self.right.as_ref(), outgoing, progress)?;
        }
        Ok(())
    }

    /// Merges a batch into `target` and returns the items left in conflict.
    fn merge_into(
        &self,
        target: &dyn Repository,
        items: Vec<Item>,
        progress: &mut dyn FnMut(&SyncEvent),
    ) -> SyncResult<Vec<Item>> {
        debug!(
            repository = %target.friendly_name(),
            count = items.len(),
            "merging batch"
        );
        match target.capability() {
            Capability::Merge(native) => {
                debug!(repository = %target.friendly_name(), "delegating to native merge");
                let conflicts = native.merge_batch(items)?;
                for item in &conflicts {
                    progress(&SyncEvent::Conflict {
                        id: item.id().to_string(),
                    });
                }
                Ok(conflicts)
            }
            Capability::Simple => {
                import_observed(target, items, self.merge_preview.as_deref(), progress)
            }
        }
    }

    /// Handles an error by updating state and stats.
    fn handle_error(&self, error: &SyncError) {
        warn!(error = %error, state = ?self.state(), "sync round failed");
        self.set_state(SyncState::Error);
        self.stats.write().last_error = Some(error.to_string());
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("left", &self.left.friendly_name())
            .field("right", &self.right.friendly_name())
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Enumerates `repo`, honoring the watermark and the direction's filter.
fn enumerate(
    repo: &dyn Repository,
    since: Option<DateTime<Utc>>,
    filter: Option<&ItemFilter>,
) -> SyncResult<Vec<Item>> {
    let items = match since {
        Some(since) => repo.get_all_since(since)?,
        None => repo.get_all()?,
    };
    Ok(match filter {
        Some(filter) => items.into_iter().filter(|item| filter(item)).collect(),
        None => items,
    })
}

/// Builder for [`SyncEngine`].
#[derive(Default)]
pub struct SyncEngineBuilder {
    left: Option<Arc<dyn Repository>>,
    right: Option<Arc<dyn Repository>>,
    config: SyncConfig,
    send_filter: Option<Box<ItemFilter>>,
    receive_filter: Option<Box<ItemFilter>>,
    merge_preview: Option<Box<MergePreview>>,
}

impl SyncEngineBuilder {
    /// Sets the left (local) repository.
    pub fn left(mut self, repo: Arc<dyn Repository>) -> Self {
        self.left = Some(repo);
        self
    }

    /// Sets the right (remote) repository.
    pub fn right(mut self, repo: Arc<dyn Repository>) -> Self {
        self.right = Some(repo);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Only items accepted by `filter` are sent from left to right.
    pub fn send_filter(mut self, filter: impl Fn(&Item) -> bool + Send + Sync + 'static) -> Self {
        self.send_filter = Some(Box::new(filter));
        self
    }

    /// Only items accepted by `filter` are received from right into left.
    pub fn receive_filter(
        mut self,
        filter: impl Fn(&Item) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.receive_filter = Some(Box::new(filter));
        self
    }

    /// Installs a preview that sees each batch of merge results before it is
    /// written. Repositories with native merge bypass it.
    pub fn merge_preview(
        mut self,
        preview: impl Fn(Vec<MergeResult>) -> Vec<MergeResult> + Send + Sync + 'static,
    ) -> Self {
        self.merge_preview = Some(Box::new(preview));
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidArgument`] if either repository is
    /// missing.
    pub fn build(self) -> SyncResult<SyncEngine> {
        let left = self
            .left
            .ok_or_else(|| SyncError::invalid_argument("left repository is required"))?;
        let right = self
            .right
            .ok_or_else(|| SyncError::invalid_argument("right repository is required"))?;
        Ok(SyncEngine {
            left,
            right,
            config: self.config,
            send_filter: self.send_filter,
            receive_filter: self.receive_filter,
            merge_preview: self.merge_preview,
            state: RwLock::new(SyncState::Idle),
            transitions: RwLock::new(Vec::new()),
            stats: RwLock::new(SyncStats::default()),
        })
    }
}
