//! Duplicate removal and per-extension organization of a single, flat
//! directory.
//!
//! [`scan::scan_directory`] groups the directory's files by size,
//! [`resolver::resolve`] narrows those groups with partial and full SHA‑256
//! digests until every file is either unique or a duplicate, and
//! [`organize::organize`] moves each file into the directory named by its
//! label.

pub mod digest;
pub mod error;
pub mod grouping;
pub mod organize;
pub mod resolver;
pub mod scan;
pub mod tree;

pub use error::Error;
