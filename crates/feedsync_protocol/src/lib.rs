//! # FeedSync Protocol
//!
//! Item sync metadata and the merge algorithms of the FeedSync sharing
//! protocol.
//!
//! This crate provides:
//! - [`History`] entries and the subsumption check
//! - [`SyncMetadata`] with its copy-on-write transitions and sparse purge
//! - [`Item`], content paired with its sync metadata
//! - [`merge`] with deterministic winner picking
//! - [`resolve_conflicts`] for manual conflict resolution
//! - CBOR wire encoding in [`wire`]
//! - timestamp normalization in [`timestamp`]
//!
//! This is a pure crate with no I/O operations. Every function can be called
//! from any thread without locking.
//!
//! ## Example
//!
//! ```rust
//! use feedsync_protocol::{merge, Item, MergeOperation};
//!
//! let base = Item::create("note-1", "Groceries", "", "milk", Some("kzu"), None).unwrap();
//! let mine = base.edit("Groceries", "", "milk, eggs", Some("kzu"), None).unwrap();
//! let theirs = base.edit("Groceries", "", "milk, bread", Some("vga"), None).unwrap();
//!
//! let result = merge(Some(&mine), &theirs).unwrap();
//! assert_eq!(result.operation, MergeOperation::Conflict);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod history;
mod item;
mod merge;
mod resolve;
mod sync;
pub mod timestamp;
pub mod wire;

pub use error::{ProtocolError, ProtocolResult};
pub use history::{subsumes, History};
pub use item::Item;
pub use merge::{
    compare_versions, is_subsumed_by, merge, pick_winner, MergeOperation, MergeResult,
};
pub use resolve::resolve_conflicts;
pub use sync::SyncMetadata;
