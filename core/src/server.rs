//! Server coordinator: linearizes concurrent operations into one history
//!
//! The server owns the authoritative document and an append-only operation
//! log. An incoming operation references the revision its author had seen;
//! everything appended since is transformed into it before it is applied.
//! Broadcasting the result to the other clients (and acking the origin) is
//! the caller's job; `receive_operation` itself is deterministic in its
//! inputs and history.

use crate::error::{OtError, Result};
use crate::operation::TextOperation;
use ropey::Rope;
use tracing::{debug, warn};

// A client this far behind the head of history is probably failing to keep
// up with the broadcast stream.
const LAGGING_CLIENT_THRESHOLD: usize = 50;

/// Authoritative document plus the linearized operation history
#[derive(Debug, Clone, Default)]
pub struct Server {
    document: Rope,
    operations: Vec<TextOperation>,
}

impl Server {
    /// Create a server with an empty document and history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a server seeded with existing content
    ///
    /// The seed is revision zero; history starts empty.
    pub fn with_document(text: &str) -> Self {
        Self {
            document: Rope::from_str(text),
            operations: Vec::new(),
        }
    }

    /// Accept an operation a client made against `revision`
    ///
    /// Transforms the operation against every operation appended since that
    /// revision, applies it, appends it to history, and returns it. The
    /// returned operation is what the caller broadcasts to the other
    /// clients.
    ///
    /// # Errors
    ///
    /// [`OtError::RevisionOutOfRange`] if the client claims a revision from
    /// the future; [`OtError::LengthMismatch`] if the operation does not fit
    /// the document it claims to edit. Both are fatal for the session.
    pub fn receive_operation(
        &mut self,
        revision: u64,
        operation: TextOperation,
    ) -> Result<TextOperation> {
        let current = self.operations.len() as u64;
        if revision > current {
            return Err(OtError::RevisionOutOfRange { revision, current });
        }

        // Operations the sending client had not seen when it made this edit.
        let concurrent = &self.operations[revision as usize..];
        if concurrent.len() > LAGGING_CLIENT_THRESHOLD {
            warn!(
                behind = concurrent.len(),
                "client is far behind the head of history"
            );
        }
        debug!(
            revision,
            concurrent = concurrent.len(),
            "receiving operation"
        );

        let mut operation = operation;
        for historical in concurrent {
            operation = operation.transform(historical)?.0;
        }

        operation.apply_to_rope(&mut self.document)?;
        self.operations.push(operation.clone());
        Ok(operation)
    }

    /// The current document
    pub fn document(&self) -> String {
        self.document.to_string()
    }

    /// Length of the current document in chars
    pub fn len(&self) -> usize {
        self.document.len_chars()
    }

    /// True if the document is empty
    pub fn is_empty(&self) -> bool {
        self.document.len_chars() == 0
    }

    /// The current revision: number of operations accepted so far
    pub fn revision(&self) -> u64 {
        self.operations.len() as u64
    }

    /// The linearized history, oldest first
    pub fn operations(&self) -> &[TextOperation] {
        &self.operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_op(prefix_len: u32, text: &str, suffix_len: u32) -> TextOperation {
        let mut op = TextOperation::new();
        op.retain(prefix_len);
        op.insert(text);
        op.retain(suffix_len);
        op
    }

    #[test]
    fn test_sequential_operations_apply_directly() {
        let mut server = Server::new();

        let returned = server.receive_operation(0, insert_op(0, "hi", 0)).unwrap();
        assert_eq!(returned, insert_op(0, "hi", 0));
        assert_eq!(server.document(), "hi");
        assert_eq!(server.revision(), 1);

        server.receive_operation(1, insert_op(2, "!", 0)).unwrap();
        assert_eq!(server.document(), "hi!");
        assert_eq!(server.revision(), 2);
    }

    #[test]
    fn test_concurrent_operation_is_transformed() {
        // X inserts "hi" at revision 0; Y, still at revision 0, inserts
        // "yo". Y's operation arrives second, so it is transformed against
        // X's: the incoming operation is the first transform argument, so
        // Y's insert keeps position 0.
        let mut server = Server::new();

        server.receive_operation(0, insert_op(0, "hi", 0)).unwrap();
        let transformed = server.receive_operation(0, insert_op(0, "yo", 0)).unwrap();

        assert_eq!(server.document(), "yohi");
        assert_eq!(transformed, insert_op(0, "yo", 2));
    }

    #[test]
    fn test_revision_from_the_future_is_rejected() {
        let mut server = Server::new();
        assert_eq!(
            server.receive_operation(1, insert_op(0, "x", 0)),
            Err(OtError::RevisionOutOfRange {
                revision: 1,
                current: 0
            })
        );
        assert_eq!(server.revision(), 0);
    }

    #[test]
    fn test_misfit_operation_is_rejected_without_side_effects() {
        let mut server = Server::with_document("abc");
        let err = server.receive_operation(0, insert_op(9, "x", 0));
        assert!(matches!(err, Err(OtError::LengthMismatch { .. })));
        assert_eq!(server.document(), "abc");
        assert_eq!(server.revision(), 0);
    }

    #[test]
    fn test_history_replay_reproduces_document() {
        let mut server = Server::new();
        server.receive_operation(0, insert_op(0, "hello", 0)).unwrap();
        server.receive_operation(1, insert_op(5, " world", 0)).unwrap();
        server.receive_operation(0, insert_op(0, "say: ", 0)).unwrap();

        let mut replayed = String::new();
        for operation in server.operations() {
            replayed = operation.apply(&replayed).unwrap();
        }
        assert_eq!(replayed, server.document());
    }

    #[test]
    fn test_every_appended_operation_fits_the_document() {
        let mut server = Server::new();
        server.receive_operation(0, insert_op(0, "abc", 0)).unwrap();
        server.receive_operation(0, insert_op(0, "xyz", 0)).unwrap();
        let mut len = 0usize;
        for operation in server.operations() {
            assert_eq!(operation.base_len(), len);
            len = operation.target_len();
        }
        assert_eq!(len, server.len());
    }
}
