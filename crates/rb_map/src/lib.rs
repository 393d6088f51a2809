//! In-memory ordered map backed by a red-black tree.
//!
//! - Keys are unique and totally ordered; lookup, insertion and deletion are
//!   O(log n) worst case.
//! - `insert` overwrites on a duplicate key and returns the old value.
//! - `find`, `update` and `delete` report `EmptyTree` / `KeyNotFound`
//!   through [`Error`] instead of panicking.
//!
//! Single-threaded by design: the map has no interior mutability and callers
//! needing shared access must serialize it externally.

mod error;
mod tree;

pub use error::Error;
pub use tree::RbTreeMap;
