//! Cursor and selection positions, and how they move through operations
//!
//! A [`Range`] is an anchor/head pair of character indices; a cursor is a
//! range whose two ends coincide. A [`Selection`] is an ordered list of
//! ranges (multi-cursor editors produce more than one). Selections are
//! ephemeral state: they ride along with operations on the wire and are
//! rewritten, never merged, when concurrent edits land.

use crate::operation::{OpComponent, TextOperation};
use serde::{Deserialize, Serialize};

/// A contiguous span of the document between `anchor` and `head`
///
/// `head` is the side the cursor moves with; `anchor` is where the selection
/// started. `head` may be less than `anchor` (selecting backwards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub anchor: u32,
    pub head: u32,
}

impl Range {
    /// Create a range spanning `anchor..head`
    pub fn new(anchor: u32, head: u32) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed range (a cursor) at `position`
    pub fn cursor(position: u32) -> Self {
        Self {
            anchor: position,
            head: position,
        }
    }

    /// True if the range selects nothing (it is a cursor)
    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Move this range through an operation
    ///
    /// Both ends are transformed independently; a cursor stays a cursor. An
    /// insert exactly at a position pushes it right, matching the tie-break
    /// of [`TextOperation::transform`]. A position inside a deleted span
    /// clamps to the start of the deletion.
    pub fn transform(&self, operation: &TextOperation) -> Range {
        let anchor = transform_index(self.anchor, operation);
        let head = if self.head == self.anchor {
            anchor
        } else {
            transform_index(self.head, operation)
        };
        Range { anchor, head }
    }
}

/// Map a position in the operation's base document to the corresponding
/// position in its target document.
fn transform_index(index: u32, operation: &TextOperation) -> u32 {
    // `remaining` tracks how far ahead of the walk the position still is;
    // once it goes negative the position has been passed and later
    // components cannot affect it.
    let mut remaining = index as i64;
    let mut new_index = index as i64;
    let mut components = operation.components().iter().peekable();
    while let Some(component) = components.next() {
        match component {
            OpComponent::Retain(n) => remaining -= *n as i64,
            OpComponent::Insert(s) => new_index += s.chars().count() as i64,
            OpComponent::Delete(n) => {
                new_index -= (*n as i64).min(remaining);
                remaining -= *n as i64;
                // The canonical form puts a delete ahead of an insert at the
                // same boundary. A position consumed by the delete sits
                // exactly on that boundary, so the insert still pushes it;
                // without this, positions would move differently through
                // `a.compose(b)` than through `a` then `b`.
                if remaining < 0 {
                    if let Some(OpComponent::Insert(s)) = components.peek() {
                        new_index += s.chars().count() as i64;
                    }
                }
            }
        }
        if remaining < 0 {
            break;
        }
    }
    new_index as u32
}

/// An ordered list of ranges
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub ranges: Vec<Range>,
}

impl Selection {
    /// Create a selection from ranges
    pub fn new(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }

    /// Create a single-cursor selection at `position`
    pub fn cursor(position: u32) -> Self {
        Self {
            ranges: vec![Range::cursor(position)],
        }
    }

    /// True if any range selects at least one character
    pub fn something_selected(&self) -> bool {
        self.ranges.iter().any(|range| !range.is_empty())
    }

    /// Move every range through an operation
    pub fn transform(&self, operation: &TextOperation) -> Selection {
        Selection {
            ranges: self
                .ranges
                .iter()
                .map(|range| range.transform(operation))
                .collect(),
        }
    }

    /// Combine with a selection made afterwards: the later one wins
    ///
    /// Selections are ephemeral, so unlike operations there is nothing to
    /// merge; the most recent cursor state is the whole truth.
    pub fn compose(&self, other: &Selection) -> Selection {
        other.clone()
    }

    /// Compare two selections ignoring range order
    pub fn equals(&self, other: &Selection) -> bool {
        if self.ranges.len() != other.ranges.len() {
            return false;
        }
        let mut left = self.ranges.clone();
        let mut right = other.ranges.clone();
        left.sort_by_key(|range| (range.anchor, range.head));
        right.sort_by_key(|range| (range.anchor, range.head));
        left == right
    }
}

// Older peers send a bare array of ranges instead of the wrapped object;
// accept both on input, always emit the wrapped form.
impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Wrapped { ranges: Vec<Range> },
            Bare(Vec<Range>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Wrapped { ranges } => Selection { ranges },
            Repr::Bare(ranges) => Selection { ranges },
        })
    }
}
