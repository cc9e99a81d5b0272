//! Undo/redo stacks that survive concurrent editing
//!
//! The manager stores inverses of user edits. Undoing pops an inverse,
//! applies it, and pushes *its* inverse onto the redo stack; redo is the
//! mirror image. When a remote operation lands, both stacks are rewritten
//! with [`UndoManager::transform`] so that every stored inverse still undoes
//! the right thing in the new document.

use crate::error::{OtError, Result};
use crate::operation::TextOperation;

const DEFAULT_MAX_ITEMS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UndoState {
    Normal,
    Undoing,
    Redoing,
}

/// Bounded undo/redo stacks of inverse operations
///
/// # Example
///
/// ```rust
/// use textsync_core::{TextOperation, UndoManager};
///
/// let mut doc = "hello".to_string();
/// let mut undo = UndoManager::new();
///
/// // the user deletes "llo"
/// let mut edit = TextOperation::new();
/// edit.retain(2);
/// edit.delete(3);
/// undo.add(edit.invert(&doc), false);
/// doc = edit.apply(&doc).unwrap();
/// assert_eq!(doc, "he");
///
/// undo.perform_undo(|inverse| {
///     let restored = inverse.apply(&doc).unwrap();
///     let redo = inverse.invert(&doc);
///     doc = restored;
///     redo
/// }).unwrap();
/// assert_eq!(doc, "hello");
/// assert!(undo.can_redo());
/// ```
#[derive(Debug)]
pub struct UndoManager {
    undo_stack: Vec<TextOperation>,
    redo_stack: Vec<TextOperation>,
    state: UndoState,
    dont_compose: bool,
    max_items: usize,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoManager {
    /// Create a manager holding up to 50 undo items
    pub fn new() -> Self {
        Self::with_max_items(DEFAULT_MAX_ITEMS)
    }

    /// Create a manager holding up to `max_items` undo items
    ///
    /// The undo stack drops its oldest entry on overflow; the redo stack is
    /// cleared by every fresh edit, so it never outgrows the undo stack.
    pub fn with_max_items(max_items: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            state: UndoState::Normal,
            dont_compose: false,
            max_items,
        }
    }

    /// Record the inverse of an edit
    ///
    /// Called with the inverse of a user edit after that edit was applied.
    /// With `compose` set, the inverse merges into the top undo item instead
    /// of forming a new one, so a typing run undoes as a unit; the first
    /// `add` after an undo/redo ignores the flag (the item boundary must
    /// survive).
    ///
    /// When called from inside [`perform_undo`](Self::perform_undo) /
    /// [`perform_redo`](Self::perform_redo), the operation lands on the
    /// opposite stack instead.
    pub fn add(&mut self, operation: TextOperation, compose: bool) {
        match self.state {
            UndoState::Undoing => {
                self.redo_stack.push(operation);
                self.dont_compose = true;
            }
            UndoState::Redoing => {
                self.undo_stack.push(operation);
                self.dont_compose = true;
            }
            UndoState::Normal => {
                match self.undo_stack.pop() {
                    // the new inverse aggregates into the top item:
                    // inverse of (older edit, then newer edit)
                    Some(top) if !self.dont_compose && compose => {
                        match operation.compose(&top) {
                            Ok(combined) => self.undo_stack.push(combined),
                            Err(_) => {
                                self.undo_stack.push(top);
                                self.push_trimmed(operation);
                            }
                        }
                    }
                    Some(top) => {
                        self.undo_stack.push(top);
                        self.push_trimmed(operation);
                    }
                    None => self.push_trimmed(operation),
                }
                self.dont_compose = false;
                self.redo_stack.clear();
            }
        }
    }

    /// Rewrite both stacks so they stay valid after `operation` happened
    ///
    /// Walks each stack from the top down, transforming every entry against
    /// the operation and threading the transformed operation through to the
    /// entries below. Entries that cancel out entirely are dropped.
    ///
    /// # Errors
    ///
    /// [`OtError::LengthMismatch`] if the stacks and the operation disagree
    /// about document lengths; the stacks are left untouched in that case.
    pub fn transform(&mut self, operation: &TextOperation) -> Result<()> {
        let undo_stack = transform_stack(&self.undo_stack, operation.clone())?;
        let redo_stack = transform_stack(&self.redo_stack, operation.clone())?;
        self.undo_stack = undo_stack;
        self.redo_stack = redo_stack;
        Ok(())
    }

    /// Pop the top undo item and hand it to `apply`
    ///
    /// `apply` applies the inverse to the document and returns the inverse
    /// of what it applied; that return value is recorded on the redo stack.
    ///
    /// # Errors
    ///
    /// [`OtError::UndoEmpty`] if there is nothing to undo. The manager is
    /// left in its normal state.
    pub fn perform_undo<F>(&mut self, apply: F) -> Result<()>
    where
        F: FnOnce(TextOperation) -> TextOperation,
    {
        let operation = self.undo_stack.pop().ok_or(OtError::UndoEmpty)?;
        self.state = UndoState::Undoing;
        let inverse = apply(operation);
        self.add(inverse, false);
        self.state = UndoState::Normal;
        Ok(())
    }

    /// Pop the top redo item and hand it to `apply`
    ///
    /// Mirror image of [`perform_undo`](Self::perform_undo).
    ///
    /// # Errors
    ///
    /// [`OtError::RedoEmpty`] if there is nothing to redo.
    pub fn perform_redo<F>(&mut self, apply: F) -> Result<()>
    where
        F: FnOnce(TextOperation) -> TextOperation,
    {
        let operation = self.redo_stack.pop().ok_or(OtError::RedoEmpty)?;
        self.state = UndoState::Redoing;
        let inverse = apply(operation);
        self.add(inverse, false);
        self.state = UndoState::Normal;
        Ok(())
    }

    /// True if the undo stack is non-empty
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// True if the redo stack is non-empty
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// True while inside a [`perform_undo`](Self::perform_undo) callback
    pub fn is_undoing(&self) -> bool {
        self.state == UndoState::Undoing
    }

    /// True while inside a [`perform_redo`](Self::perform_redo) callback
    pub fn is_redoing(&self) -> bool {
        self.state == UndoState::Redoing
    }

    fn push_trimmed(&mut self, operation: TextOperation) {
        self.undo_stack.push(operation);
        if self.undo_stack.len() > self.max_items {
            self.undo_stack.remove(0);
        }
    }
}

fn transform_stack(
    stack: &[TextOperation],
    mut operation: TextOperation,
) -> Result<Vec<TextOperation>> {
    let mut transformed = Vec::with_capacity(stack.len());
    for entry in stack.iter().rev() {
        let (entry, next) = entry.transform(&operation)?;
        operation = next;
        if !entry.is_noop() {
            transformed.push(entry);
        }
    }
    transformed.reverse();
    Ok(transformed)
}
