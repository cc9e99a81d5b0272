//! TextOperation: the operation algebra at the heart of the sync core
//!
//! An operation is an ordered run of components, each of which retains,
//! inserts or deletes a span of characters. Operations are immutable values
//! once built; the algebra provides:
//!
//! - **apply**: run an operation against a document
//! - **compose**: merge two consecutive operations into one
//! - **transform**: rewrite two concurrent operations against each other (TP1)
//! - **invert**: produce the operation that undoes this one
//!
//! All lengths are counted in `char`s, not bytes.
//!
//! # Example
//!
//! ```rust
//! use textsync_core::TextOperation;
//!
//! let mut op = TextOperation::new();
//! op.retain(6);
//! op.delete(5);
//! op.insert("there");
//!
//! assert_eq!(op.apply("hello world").unwrap(), "hello there");
//! ```

use crate::error::{OtError, Result};
use ropey::Rope;
use serde::de::Error as _;
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single atomic component of an operation
///
/// The compact wire form (positive integer / negative integer / string) is a
/// serialization detail; in memory components are always this tagged variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpComponent {
    /// Skip the next `n` characters of the input
    Retain(u32),

    /// Insert the literal string at the current position
    Insert(String),

    /// Remove the next `n` characters of the input
    Delete(u32),
}

impl fmt::Display for OpComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpComponent::Retain(n) => write!(f, "retain {}", n),
            OpComponent::Insert(s) => write!(f, "insert '{}'", s),
            OpComponent::Delete(n) => write!(f, "delete {}", n),
        }
    }
}

/// A sequence of components describing one edit to a document
///
/// Invariants maintained by the builder methods:
///
/// - `base_len` is the exact length (in chars) of documents the operation
///   applies to; `target_len` is the length it produces.
/// - No two adjacent components share a kind, and an insert adjacent to a
///   delete at the same boundary always follows it (delete-before-insert
///   canonical order). Equal edits therefore compare equal with `==`.
///
/// # Example
///
/// ```rust
/// use textsync_core::TextOperation;
///
/// let mut op = TextOperation::new();
/// op.insert("Hello, ");
/// op.retain(5);
///
/// assert_eq!(op.base_len(), 5);
/// assert_eq!(op.target_len(), 12);
/// assert_eq!(op.apply("world").unwrap(), "Hello, world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextOperation {
    ops: Vec<OpComponent>,
    base_len: usize,
    target_len: usize,
}

impl TextOperation {
    /// Create an empty operation
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an operation from raw components, validating each one
    ///
    /// Unlike the builder methods, which silently ignore empty appends, this
    /// rejects zero-length counts and empty insert strings. It is the entry
    /// point used by deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`OtError::MalformedOperation`] on a non-positive count or an
    /// empty insert.
    pub fn try_from_components<I>(components: I) -> Result<Self>
    where
        I: IntoIterator<Item = OpComponent>,
    {
        let mut operation = TextOperation::new();
        for component in components {
            match component {
                OpComponent::Retain(0) => {
                    return Err(OtError::MalformedOperation(
                        "retain count must be positive".to_string(),
                    ))
                }
                OpComponent::Delete(0) => {
                    return Err(OtError::MalformedOperation(
                        "delete count must be positive".to_string(),
                    ))
                }
                OpComponent::Insert(s) if s.is_empty() => {
                    return Err(OtError::MalformedOperation(
                        "insert string must be non-empty".to_string(),
                    ))
                }
                OpComponent::Retain(n) => operation.retain(n),
                OpComponent::Insert(s) => operation.insert(&s),
                OpComponent::Delete(n) => operation.delete(n),
            }
        }
        Ok(operation)
    }

    /// Skip the next `n` characters. `retain(0)` is a no-op.
    pub fn retain(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        self.base_len += n as usize;
        self.target_len += n as usize;
        if let Some(OpComponent::Retain(last)) = self.ops.last_mut() {
            *last += n;
        } else {
            self.ops.push(OpComponent::Retain(n));
        }
    }

    /// Insert `s` at the current position. Empty strings are no-ops.
    pub fn insert(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        self.target_len += s.chars().count();
        if let Some(OpComponent::Insert(last)) = self.ops.last_mut() {
            last.push_str(s);
        } else {
            // Adjacent delete stays ahead of the insert, so no reordering is
            // needed here; see `delete` for the other direction.
            self.ops.push(OpComponent::Insert(s.to_string()));
        }
    }

    /// Remove the next `n` characters. `delete(0)` is a no-op.
    pub fn delete(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        self.base_len += n as usize;
        let new_last = match self.ops.as_mut_slice() {
            [.., OpComponent::Delete(last)] => {
                *last += n;
                return;
            }
            // Canonical order puts the delete ahead of an insert at the same
            // boundary; merge with the delete sitting in front of it.
            [.., OpComponent::Delete(before), OpComponent::Insert(_)] => {
                *before += n;
                return;
            }
            [.., last @ OpComponent::Insert(_)] => {
                std::mem::replace(last, OpComponent::Delete(n))
            }
            _ => OpComponent::Delete(n),
        };
        self.ops.push(new_last);
    }

    /// Length (in chars) of documents this operation applies to
    pub fn base_len(&self) -> usize {
        self.base_len
    }

    /// Length (in chars) of the document this operation produces
    pub fn target_len(&self) -> usize {
        self.target_len
    }

    /// The components of this operation, in order
    pub fn components(&self) -> &[OpComponent] {
        &self.ops
    }

    /// True if applying this operation to any valid document is the identity
    pub fn is_noop(&self) -> bool {
        matches!(self.ops.as_slice(), [] | [OpComponent::Retain(_)])
    }

    /// Apply this operation to a document, producing the edited document
    ///
    /// # Errors
    ///
    /// Returns [`OtError::LengthMismatch`] unless `document` is exactly
    /// `base_len` chars long.
    pub fn apply(&self, document: &str) -> Result<String> {
        let len = document.chars().count();
        if len != self.base_len {
            return Err(OtError::LengthMismatch {
                expected: self.base_len,
                actual: len,
            });
        }
        let mut output = String::with_capacity(document.len());
        let mut chars = document.chars();
        for component in &self.ops {
            match component {
                OpComponent::Retain(n) => {
                    output.extend(chars.by_ref().take(*n as usize));
                }
                OpComponent::Insert(s) => output.push_str(s),
                OpComponent::Delete(n) => {
                    chars.by_ref().nth(*n as usize - 1);
                }
            }
        }
        Ok(output)
    }

    /// Apply this operation to a rope in place
    ///
    /// Same semantics as [`apply`](Self::apply); used by the server so the
    /// authoritative document never needs to be re-allocated wholesale.
    pub fn apply_to_rope(&self, rope: &mut Rope) -> Result<()> {
        let len = rope.len_chars();
        if len != self.base_len {
            return Err(OtError::LengthMismatch {
                expected: self.base_len,
                actual: len,
            });
        }
        let mut position = 0usize;
        for component in &self.ops {
            match component {
                OpComponent::Retain(n) => position += *n as usize,
                OpComponent::Insert(s) => {
                    rope.insert(position, s);
                    position += s.chars().count();
                }
                OpComponent::Delete(n) => {
                    rope.remove(position..position + *n as usize);
                }
            }
        }
        Ok(())
    }

    /// Compute the operation that undoes this one
    ///
    /// `document` must be the document this operation applies to (the deleted
    /// characters are read back out of it). The result satisfies
    /// `invert(op, d).apply(&op.apply(d)?)? == d`.
    pub fn invert(&self, document: &str) -> Self {
        let mut inverse = TextOperation::new();
        let mut chars = document.chars();
        for component in &self.ops {
            match component {
                OpComponent::Retain(n) => {
                    inverse.retain(*n);
                    chars.by_ref().nth(*n as usize - 1);
                }
                OpComponent::Insert(s) => {
                    inverse.delete(s.chars().count() as u32);
                }
                OpComponent::Delete(n) => {
                    let deleted: String = chars.by_ref().take(*n as usize).collect();
                    inverse.insert(&deleted);
                }
            }
        }
        inverse
    }

    /// Merge this operation with a consecutive one into a single operation
    ///
    /// For every document `d` of length `base_len`,
    /// `self.compose(other)?.apply(d) == other.apply(&self.apply(d)?)`.
    ///
    /// # Errors
    ///
    /// Returns [`OtError::LengthMismatch`] unless `other` applies to the
    /// output of `self`.
    pub fn compose(&self, other: &Self) -> Result<Self> {
        if self.target_len != other.base_len {
            return Err(OtError::LengthMismatch {
                expected: self.target_len,
                actual: other.base_len,
            });
        }

        let mut composed = TextOperation::new();
        let mut iter_a = self.ops.iter().cloned();
        let mut iter_b = other.ops.iter().cloned();
        let mut cur_a = iter_a.next();
        let mut cur_b = iter_b.next();

        loop {
            match (&cur_a, &cur_b) {
                (None, None) => break,

                // Deletes on the left side happen regardless of what the
                // right side does afterwards.
                (Some(OpComponent::Delete(n)), _) => {
                    composed.delete(*n);
                    cur_a = iter_a.next();
                }

                // Inserts on the right side land in the final document as-is.
                (_, Some(OpComponent::Insert(s))) => {
                    composed.insert(s);
                    cur_b = iter_b.next();
                }

                (None, _) | (_, None) => {
                    return Err(OtError::LengthMismatch {
                        expected: self.target_len,
                        actual: other.base_len,
                    });
                }

                (Some(OpComponent::Retain(a)), Some(OpComponent::Retain(b))) => {
                    let (a, b) = (*a, *b);
                    composed.retain(a.min(b));
                    match a.cmp(&b) {
                        Ordering::Less => {
                            cur_b = Some(OpComponent::Retain(b - a));
                            cur_a = iter_a.next();
                        }
                        Ordering::Equal => {
                            cur_a = iter_a.next();
                            cur_b = iter_b.next();
                        }
                        Ordering::Greater => {
                            cur_a = Some(OpComponent::Retain(a - b));
                            cur_b = iter_b.next();
                        }
                    }
                }

                (Some(OpComponent::Insert(s)), Some(OpComponent::Delete(b))) => {
                    let (a, b) = (s.chars().count() as u32, *b);
                    // The right side deletes what the left side inserted.
                    match a.cmp(&b) {
                        Ordering::Less => {
                            cur_b = Some(OpComponent::Delete(b - a));
                            cur_a = iter_a.next();
                        }
                        Ordering::Equal => {
                            cur_a = iter_a.next();
                            cur_b = iter_b.next();
                        }
                        Ordering::Greater => {
                            cur_a = Some(OpComponent::Insert(
                                s.chars().skip(b as usize).collect(),
                            ));
                            cur_b = iter_b.next();
                        }
                    }
                }

                (Some(OpComponent::Insert(s)), Some(OpComponent::Retain(b))) => {
                    let (a, b) = (s.chars().count() as u32, *b);
                    match a.cmp(&b) {
                        Ordering::Less => {
                            composed.insert(s);
                            cur_b = Some(OpComponent::Retain(b - a));
                            cur_a = iter_a.next();
                        }
                        Ordering::Equal => {
                            composed.insert(s);
                            cur_a = iter_a.next();
                            cur_b = iter_b.next();
                        }
                        Ordering::Greater => {
                            let kept: String = s.chars().take(b as usize).collect();
                            let rest: String = s.chars().skip(b as usize).collect();
                            composed.insert(&kept);
                            cur_a = Some(OpComponent::Insert(rest));
                            cur_b = iter_b.next();
                        }
                    }
                }

                (Some(OpComponent::Retain(a)), Some(OpComponent::Delete(b))) => {
                    let (a, b) = (*a, *b);
                    composed.delete(a.min(b));
                    match a.cmp(&b) {
                        Ordering::Less => {
                            cur_b = Some(OpComponent::Delete(b - a));
                            cur_a = iter_a.next();
                        }
                        Ordering::Equal => {
                            cur_a = iter_a.next();
                            cur_b = iter_b.next();
                        }
                        Ordering::Greater => {
                            cur_a = Some(OpComponent::Retain(a - b));
                            cur_b = iter_b.next();
                        }
                    }
                }
            }
        }

        Ok(composed)
    }

    /// Rewrite two concurrent operations against each other
    ///
    /// Produces `(a', b')` such that `a.compose(b') == b.compose(a')` — the
    /// TP1 convergence property. Both inputs must apply to the same document.
    ///
    /// Tie-break: when both operations insert at the same position, the
    /// insert of `self` (the first argument) ends up first. Every caller in
    /// this crate relies on that orientation: the server transforms
    /// `incoming.transform(historical)` and the client transforms
    /// `outstanding.transform(server_op)`.
    ///
    /// # Errors
    ///
    /// Returns [`OtError::LengthMismatch`] unless both operations have the
    /// same base length.
    pub fn transform(&self, other: &Self) -> Result<(Self, Self)> {
        if self.base_len != other.base_len {
            return Err(OtError::LengthMismatch {
                expected: self.base_len,
                actual: other.base_len,
            });
        }

        let mut a_prime = TextOperation::new();
        let mut b_prime = TextOperation::new();
        let mut iter_a = self.ops.iter().cloned();
        let mut iter_b = other.ops.iter().cloned();
        let mut cur_a = iter_a.next();
        let mut cur_b = iter_b.next();

        loop {
            match (&cur_a, &cur_b) {
                (None, None) => break,

                // Coincident inserts: the first argument wins the position.
                (Some(OpComponent::Insert(s)), _) => {
                    a_prime.insert(s);
                    b_prime.retain(s.chars().count() as u32);
                    cur_a = iter_a.next();
                }

                (_, Some(OpComponent::Insert(s))) => {
                    a_prime.retain(s.chars().count() as u32);
                    b_prime.insert(s);
                    cur_b = iter_b.next();
                }

                (None, _) | (_, None) => {
                    return Err(OtError::LengthMismatch {
                        expected: self.base_len,
                        actual: other.base_len,
                    });
                }

                (Some(OpComponent::Retain(a)), Some(OpComponent::Retain(b))) => {
                    let (a, b) = (*a, *b);
                    let min = a.min(b);
                    a_prime.retain(min);
                    b_prime.retain(min);
                    match a.cmp(&b) {
                        Ordering::Less => {
                            cur_b = Some(OpComponent::Retain(b - a));
                            cur_a = iter_a.next();
                        }
                        Ordering::Equal => {
                            cur_a = iter_a.next();
                            cur_b = iter_b.next();
                        }
                        Ordering::Greater => {
                            cur_a = Some(OpComponent::Retain(a - b));
                            cur_b = iter_b.next();
                        }
                    }
                }

                // Both delete the same span: the characters are already gone,
                // neither transformed operation mentions them.
                (Some(OpComponent::Delete(a)), Some(OpComponent::Delete(b))) => {
                    let (a, b) = (*a, *b);
                    match a.cmp(&b) {
                        Ordering::Less => {
                            cur_b = Some(OpComponent::Delete(b - a));
                            cur_a = iter_a.next();
                        }
                        Ordering::Equal => {
                            cur_a = iter_a.next();
                            cur_b = iter_b.next();
                        }
                        Ordering::Greater => {
                            cur_a = Some(OpComponent::Delete(a - b));
                            cur_b = iter_b.next();
                        }
                    }
                }

                (Some(OpComponent::Delete(a)), Some(OpComponent::Retain(b))) => {
                    let (a, b) = (*a, *b);
                    a_prime.delete(a.min(b));
                    match a.cmp(&b) {
                        Ordering::Less => {
                            cur_b = Some(OpComponent::Retain(b - a));
                            cur_a = iter_a.next();
                        }
                        Ordering::Equal => {
                            cur_a = iter_a.next();
                            cur_b = iter_b.next();
                        }
                        Ordering::Greater => {
                            cur_a = Some(OpComponent::Delete(a - b));
                            cur_b = iter_b.next();
                        }
                    }
                }

                (Some(OpComponent::Retain(a)), Some(OpComponent::Delete(b))) => {
                    let (a, b) = (*a, *b);
                    b_prime.delete(a.min(b));
                    match a.cmp(&b) {
                        Ordering::Less => {
                            cur_b = Some(OpComponent::Delete(b - a));
                            cur_a = iter_a.next();
                        }
                        Ordering::Equal => {
                            cur_a = iter_a.next();
                            cur_b = iter_b.next();
                        }
                        Ordering::Greater => {
                            cur_a = Some(OpComponent::Retain(a - b));
                            cur_b = iter_b.next();
                        }
                    }
                }
            }
        }

        Ok((a_prime, b_prime))
    }

    /// Whether a following operation should merge with this one into a
    /// single undo item
    ///
    /// True for a typing run: an insert that continues directly where this
    /// operation's insert ended, or a delete at the same spot (delete key) or
    /// directly before it (backspace). Embedders use this to drive the
    /// `compose` flag of [`UndoManager::add`](crate::UndoManager::add).
    pub fn should_be_composed_with(&self, other: &Self) -> bool {
        if self.is_noop() || other.is_noop() {
            return true;
        }
        let (start_a, start_b) = (self.start_index(), other.start_index());
        let (simple_a, simple_b) = match (self.simple_op(), other.simple_op()) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        match (simple_a, simple_b) {
            (OpComponent::Insert(a), OpComponent::Insert(_)) => {
                start_a + a.chars().count() == start_b
            }
            (OpComponent::Delete(_), OpComponent::Delete(b)) => {
                start_b + *b as usize == start_a || start_a == start_b
            }
            _ => false,
        }
    }

    /// The same merge decision, made on inverted operations
    ///
    /// Used when deciding whether two consecutive redo items belong
    /// together.
    pub fn should_be_composed_with_inverted(&self, other: &Self) -> bool {
        if self.is_noop() || other.is_noop() {
            return true;
        }
        let (start_a, start_b) = (self.start_index(), other.start_index());
        let (simple_a, simple_b) = match (self.simple_op(), other.simple_op()) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        match (simple_a, simple_b) {
            (OpComponent::Insert(a), OpComponent::Insert(_)) => {
                start_a + a.chars().count() == start_b || start_a == start_b
            }
            (OpComponent::Delete(_), OpComponent::Delete(b)) => {
                start_b + *b as usize == start_a
            }
            _ => false,
        }
    }

    // A "simple" operation touches one contiguous span: its components are a
    // single insert or delete, optionally padded by retains.
    fn simple_op(&self) -> Option<&OpComponent> {
        match self.ops.as_slice() {
            [op] => Some(op),
            [OpComponent::Retain(_), op] => Some(op),
            [op, OpComponent::Retain(_)] => Some(op),
            [OpComponent::Retain(_), op, OpComponent::Retain(_)] => Some(op),
            _ => None,
        }
    }

    fn start_index(&self) -> usize {
        match self.ops.first() {
            Some(OpComponent::Retain(n)) => *n as usize,
            _ => 0,
        }
    }
}

impl fmt::Display for TextOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.ops.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

// Wire form: {"ops": [...]} where a positive integer is a retain, a negative
// integer a delete and a string an insert. Parse -> serialize is the
// identity on canonical input because deserialization rebuilds through the
// builder.

struct WireOps<'a>(&'a [OpComponent]);

impl Serialize for WireOps<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for component in self.0 {
            match component {
                OpComponent::Retain(n) => seq.serialize_element(&(*n as i64))?,
                OpComponent::Delete(n) => seq.serialize_element(&-(*n as i64))?,
                OpComponent::Insert(s) => seq.serialize_element(s)?,
            }
        }
        seq.end()
    }
}

impl Serialize for TextOperation {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("TextOperation", 1)?;
        state.serialize_field("ops", &WireOps(&self.ops))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for TextOperation {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireComponent {
            Count(i64),
            Text(String),
        }

        #[derive(Deserialize)]
        struct Helper {
            ops: Vec<WireComponent>,
        }

        let helper = Helper::deserialize(deserializer)?;
        let components = helper
            .ops
            .into_iter()
            .map(|component| match component {
                WireComponent::Count(n) if n > 0 => u32::try_from(n)
                    .map(OpComponent::Retain)
                    .map_err(|_| D::Error::custom("retain count out of range")),
                WireComponent::Count(n) if n < 0 => u32::try_from(n.unsigned_abs())
                    .map(OpComponent::Delete)
                    .map_err(|_| D::Error::custom("delete count out of range")),
                WireComponent::Count(_) => Err(D::Error::custom(
                    OtError::MalformedOperation("zero-length component".to_string()),
                )),
                WireComponent::Text(s) => Ok(OpComponent::Insert(s)),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        TextOperation::try_from_components(components).map_err(D::Error::custom)
    }
}
