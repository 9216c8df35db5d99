//! # FeedSync Storage
//!
//! The repository contract synchronization runs against, and an in-memory
//! repository.
//!
//! ## Design Principles
//!
//! - Repositories take `&self` and lock internally
//! - Absence is `None`, never an error
//! - Deleted items stay enumerable as tombstones
//! - Native merge support is a [`Capability`] decided per repository
//!
//! ## Example
//!
//! ```rust
//! use feedsync_protocol::Item;
//! use feedsync_storage::{MemoryRepository, Repository};
//!
//! let repo = MemoryRepository::new("laptop", "kzu");
//! let item = Item::create("note-1", "Groceries", "", "milk", Some("kzu"), None).unwrap();
//! repo.add(item).unwrap();
//! repo.delete("note-1").unwrap();
//!
//! let tombstone = repo.get("note-1").unwrap().unwrap();
//! assert!(tombstone.sync().deleted());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod repository;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryRepository;
pub use repository::{Capability, NativeMerge, Repository};
