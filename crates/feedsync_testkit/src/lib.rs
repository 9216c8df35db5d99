//! # FeedSync Testkit
//!
//! Test utilities for FeedSync.
//!
//! This crate provides:
//! - Fixed timestamps and replica pair fixtures
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use feedsync_testkit::prelude::*;
//!
//! let pair = ReplicaPair::concurrent_edit("note-1");
//! let result = pair.synchronize().unwrap();
//! assert_eq!(result.conflicts().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
