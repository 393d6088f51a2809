use std::error::Error as StdError;
use std::fmt;

/// Failure modes of the map operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The operation requires at least one node.
    EmptyTree,
    /// The search descent reached an absent child without a match.
    KeyNotFound,
    /// A fixup met a structurally impossible configuration. This reports a
    /// defect in the tree itself, not caller misuse.
    InvariantViolation,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::EmptyTree => "the tree has no nodes",
            Error::KeyNotFound => "key is not present in the tree",
            Error::InvariantViolation => "red-black structure is inconsistent",
        };
        f.write_str(msg)
    }
}

impl StdError for Error {}
