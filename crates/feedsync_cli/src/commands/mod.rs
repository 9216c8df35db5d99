//! CLI command implementations.

pub mod add;
pub mod conflicts;
pub mod inspect;
pub mod purge;
pub mod resolve;
pub mod sync;
