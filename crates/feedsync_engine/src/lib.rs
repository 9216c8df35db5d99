//! # FeedSync Sync Engine
//!
//! Bidirectional synchronization of two repositories.
//!
//! This crate provides:
//! - The round state machine (idle → pulling right → merging into left →
//!   pushing left → merging into right → idle)
//! - Per-direction item filters and a merge preview hook
//! - Incremental rounds from a "since" watermark
//! - Progress events and cumulative statistics
//! - One-way [`import`] and [`preview_import`] helpers
//!
//! ## Architecture
//!
//! A round first merges the items of the right repository into the left one,
//! then the left repository's items into the right one. Repositories with
//! native merge support receive whole batches; for all others every item
//! goes through [`feedsync_protocol::merge`] and the resulting operation is
//! written back.
//!
//! ## Key Invariants
//!
//! - After a bidirectional round both sides agree on every exchanged item
//! - Merging is order independent, so the two directions may run in either
//!   order
//! - Any error aborts the round; writes already made are kept
//! - Progress events never influence the outcome

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod import;
mod state;

pub use config::{ConflictScope, SyncConfig, SyncDirection};
pub use error::{SyncError, SyncResult};
pub use import::{import, preview_import, MergePreview};
pub use state::{
    ItemFilter, SyncCycleResult, SyncEngine, SyncEngineBuilder, SyncEvent, SyncState, SyncStats,
};
