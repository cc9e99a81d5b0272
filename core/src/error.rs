//! Error types shared across the sync core
//!
//! All fallible operations in this crate return [`Result`]. The core never
//! retries and never swallows an error; everything propagates to the caller.
//! Protocol-level errors ([`OtError::RevisionOutOfRange`],
//! [`OtError::NoPendingOperation`]) mean the session is beyond repair and
//! should be terminated by the embedder. [`OtError::UndoEmpty`] and
//! [`OtError::RedoEmpty`] are user-facing and non-fatal.

use std::fmt;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, OtError>;

/// Error type for all sync core operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtError {
    /// An operation was applied, composed or transformed against an input of
    /// the wrong length
    LengthMismatch { expected: usize, actual: usize },

    /// An operation violated a structural invariant during construction or
    /// deserialization (non-positive count, empty insert)
    MalformedOperation(String),

    /// A client claimed a revision the server has never reached
    RevisionOutOfRange { revision: u64, current: u64 },

    /// An acknowledgment arrived while no operation was in flight
    NoPendingOperation,

    /// Undo requested with an empty undo stack
    UndoEmpty,

    /// Redo requested with an empty redo stack
    RedoEmpty,
}

impl fmt::Display for OtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtError::LengthMismatch { expected, actual } => {
                write!(
                    f,
                    "operation expects a document of length {}, got {}",
                    expected, actual
                )
            }
            OtError::MalformedOperation(msg) => {
                write!(f, "malformed operation: {}", msg)
            }
            OtError::RevisionOutOfRange { revision, current } => {
                write!(
                    f,
                    "revision {} out of range (server is at {})",
                    revision, current
                )
            }
            OtError::NoPendingOperation => {
                write!(f, "received acknowledgment with no operation in flight")
            }
            OtError::UndoEmpty => write!(f, "nothing to undo"),
            OtError::RedoEmpty => write!(f, "nothing to redo"),
        }
    }
}

impl std::error::Error for OtError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = OtError::LengthMismatch {
            expected: 5,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "operation expects a document of length 5, got 3"
        );

        let err = OtError::RevisionOutOfRange {
            revision: 9,
            current: 4,
        };
        assert_eq!(err.to_string(), "revision 9 out of range (server is at 4)");
    }
}
