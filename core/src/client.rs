//! Client protocol state machine
//!
//! The client mediates between a local editor and the authoritative server.
//! At most one operation is ever in flight; edits made while waiting for the
//! acknowledgment are composed into a single buffer, so a reconnect never
//! has more than one operation to resend.
//!
//! State transitions:
//!
//! ```text
//!                 apply_client          apply_client
//! Synchronized ----------------> AwaitingConfirm ----------------> AwaitingWithBuffer
//!      ^                            |       ^                           |
//!      |        server_ack          |       |       server_ack          |
//!      +----------------------------+       +---------------------------+
//! ```
//!
//! `apply_server` keeps the current state but rewrites the outstanding
//! operation (and buffer) against the incoming server operation.

use crate::error::{OtError, Result};
use crate::operation::TextOperation;
use crate::selection::Selection;
use tracing::debug;

/// The embedder-provided boundary of the client
///
/// `send_operation` hands a frame to the network layer; `apply_operation`
/// applies a server operation to the locally rendered document. Both are
/// invoked from inside a state transition and must not call back into the
/// [`Client`]; an embedder that needs to react must queue the event and
/// process it after the transition returns.
pub trait ClientIo {
    /// Transmit an operation based on `revision` to the server
    fn send_operation(&mut self, revision: u64, operation: &TextOperation);

    /// Apply a (transformed) server operation to the local document
    fn apply_operation(&mut self, operation: &TextOperation);
}

/// Synchronization state of a client
///
/// The set of states is closed; there is deliberately no trait here.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientState {
    /// The local document matches the last server revision
    Synchronized,

    /// One operation is in flight, awaiting the server's acknowledgment
    AwaitingConfirm { outstanding: TextOperation },

    /// One operation is in flight and local edits have piled up behind it
    AwaitingWithBuffer {
        outstanding: TextOperation,
        buffer: TextOperation,
    },
}

/// Client side of the synchronization protocol
///
/// # Example
///
/// ```rust
/// use textsync_core::{Client, ClientIo, TextOperation};
///
/// struct Recorder(Vec<(u64, TextOperation)>);
///
/// impl ClientIo for Recorder {
///     fn send_operation(&mut self, revision: u64, operation: &TextOperation) {
///         self.0.push((revision, operation.clone()));
///     }
///     fn apply_operation(&mut self, _operation: &TextOperation) {}
/// }
///
/// let mut io = Recorder(Vec::new());
/// let mut client = Client::new(0);
///
/// let mut op = TextOperation::new();
/// op.insert("hi");
/// client.apply_client(&mut io, op).unwrap();
/// assert_eq!(io.0.len(), 1);
///
/// client.server_ack(&mut io).unwrap();
/// assert!(client.is_synchronized());
/// ```
#[derive(Debug)]
pub struct Client {
    revision: u64,
    state: ClientState,
}

impl Client {
    /// Create a client that has observed `revision` server operations
    pub fn new(revision: u64) -> Self {
        Self {
            revision,
            state: ClientState::Synchronized,
        }
    }

    /// Number of server operations this client has observed
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Current protocol state
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// True if no operation is in flight
    pub fn is_synchronized(&self) -> bool {
        matches!(self.state, ClientState::Synchronized)
    }

    /// True if an operation is in flight
    pub fn is_awaiting(&self) -> bool {
        !self.is_synchronized()
    }

    /// Register an edit made locally
    ///
    /// In `Synchronized` the operation goes out immediately; while another
    /// operation is in flight it is buffered, composing with any edits
    /// already waiting.
    pub fn apply_client(&mut self, io: &mut dyn ClientIo, operation: TextOperation) -> Result<()> {
        let state = std::mem::replace(&mut self.state, ClientState::Synchronized);
        self.state = match state {
            ClientState::Synchronized => {
                io.send_operation(self.revision, &operation);
                ClientState::AwaitingConfirm {
                    outstanding: operation,
                }
            }
            ClientState::AwaitingConfirm { outstanding } => ClientState::AwaitingWithBuffer {
                outstanding,
                buffer: operation,
            },
            ClientState::AwaitingWithBuffer {
                outstanding,
                buffer,
            } => ClientState::AwaitingWithBuffer {
                outstanding,
                buffer: buffer.compose(&operation)?,
            },
        };
        Ok(())
    }

    /// Receive an operation another client made, already linearized by the
    /// server
    ///
    /// The in-flight operation and buffer are rewritten against it, and the
    /// rewritten server operation is handed to `io.apply_operation`.
    pub fn apply_server(&mut self, io: &mut dyn ClientIo, operation: TextOperation) -> Result<()> {
        self.revision += 1;
        debug!(revision = self.revision, "applying server operation");
        let state = std::mem::replace(&mut self.state, ClientState::Synchronized);
        self.state = match state {
            ClientState::Synchronized => {
                io.apply_operation(&operation);
                ClientState::Synchronized
            }
            ClientState::AwaitingConfirm { outstanding } => {
                let (outstanding, server_op) = outstanding.transform(&operation)?;
                io.apply_operation(&server_op);
                ClientState::AwaitingConfirm { outstanding }
            }
            ClientState::AwaitingWithBuffer {
                outstanding,
                buffer,
            } => {
                let (outstanding, server_op) = outstanding.transform(&operation)?;
                let (buffer, server_op) = buffer.transform(&server_op)?;
                io.apply_operation(&server_op);
                ClientState::AwaitingWithBuffer {
                    outstanding,
                    buffer,
                }
            }
        };
        Ok(())
    }

    /// Receive the server's acknowledgment of the in-flight operation
    ///
    /// # Errors
    ///
    /// Returns [`OtError::NoPendingOperation`] if nothing is in flight; the
    /// session's event stream is corrupt and the session should end.
    pub fn server_ack(&mut self, io: &mut dyn ClientIo) -> Result<()> {
        let state = std::mem::replace(&mut self.state, ClientState::Synchronized);
        self.state = match state {
            ClientState::Synchronized => return Err(OtError::NoPendingOperation),
            ClientState::AwaitingConfirm { .. } => {
                self.revision += 1;
                ClientState::Synchronized
            }
            ClientState::AwaitingWithBuffer { buffer, .. } => {
                // The acknowledged operation is now part of the server
                // history, so the buffer goes out against the incremented
                // revision.
                self.revision += 1;
                io.send_operation(self.revision, &buffer);
                ClientState::AwaitingConfirm {
                    outstanding: buffer,
                }
            }
        };
        debug!(revision = self.revision, "server acknowledged operation");
        Ok(())
    }

    /// Resend the in-flight operation after a reconnect
    ///
    /// No-op when synchronized. The server is expected to deduplicate
    /// resends (by client and revision) outside this crate.
    pub fn server_reconnect(&mut self, io: &mut dyn ClientIo) {
        match &self.state {
            ClientState::Synchronized => {}
            ClientState::AwaitingConfirm { outstanding }
            | ClientState::AwaitingWithBuffer { outstanding, .. } => {
                debug!(revision = self.revision, "resending outstanding operation");
                io.send_operation(self.revision, outstanding);
            }
        }
    }

    /// Map a selection in the local document to the document the server
    /// will have once the in-flight edits are acknowledged
    pub fn transform_selection(&self, selection: &Selection) -> Selection {
        match &self.state {
            ClientState::Synchronized => selection.clone(),
            ClientState::AwaitingConfirm { outstanding } => selection.transform(outstanding),
            ClientState::AwaitingWithBuffer {
                outstanding,
                buffer,
            } => selection.transform(outstanding).transform(buffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Range;

    #[derive(Default)]
    struct FakeIo {
        sent: Vec<(u64, TextOperation)>,
        applied: Vec<TextOperation>,
    }

    impl ClientIo for FakeIo {
        fn send_operation(&mut self, revision: u64, operation: &TextOperation) {
            self.sent.push((revision, operation.clone()));
        }

        fn apply_operation(&mut self, operation: &TextOperation) {
            self.applied.push(operation.clone());
        }
    }

    fn insert_op(prefix_len: u32, text: &str, suffix_len: u32) -> TextOperation {
        let mut op = TextOperation::new();
        op.retain(prefix_len);
        op.insert(text);
        op.retain(suffix_len);
        op
    }

    #[test]
    fn test_synchronized_edit_is_sent_immediately() {
        let mut io = FakeIo::default();
        let mut client = Client::new(3);

        client.apply_client(&mut io, insert_op(0, "a", 0)).unwrap();

        assert_eq!(io.sent.len(), 1);
        assert_eq!(io.sent[0].0, 3);
        assert!(matches!(
            client.state(),
            ClientState::AwaitingConfirm { .. }
        ));
    }

    #[test]
    fn test_edits_buffer_and_compose_while_awaiting() {
        let mut io = FakeIo::default();
        let mut client = Client::new(0);

        client.apply_client(&mut io, insert_op(0, "a", 0)).unwrap();
        client.apply_client(&mut io, insert_op(1, "b", 0)).unwrap();
        client.apply_client(&mut io, insert_op(2, "c", 0)).unwrap();

        // only the first operation went out
        assert_eq!(io.sent.len(), 1);
        match client.state() {
            ClientState::AwaitingWithBuffer { buffer, .. } => {
                // "b" then "c" composed into a single buffered operation
                assert_eq!(buffer.apply("a").unwrap(), "abc");
            }
            state => panic!("unexpected state: {:?}", state),
        }
    }

    #[test]
    fn test_server_op_while_synchronized_is_applied() {
        let mut io = FakeIo::default();
        let mut client = Client::new(0);

        client.apply_server(&mut io, insert_op(0, "x", 0)).unwrap();

        assert_eq!(io.applied.len(), 1);
        assert_eq!(client.revision(), 1);
        assert!(client.is_synchronized());
    }

    #[test]
    fn test_ack_without_pending_operation_is_an_error() {
        let mut io = FakeIo::default();
        let mut client = Client::new(0);

        assert_eq!(client.server_ack(&mut io), Err(OtError::NoPendingOperation));
        assert!(client.is_synchronized());
    }

    #[test]
    fn test_full_round_trip_with_buffer() {
        // local doc "ab", rev 7; edit A inserts "A" at 0, edit B inserts "B"
        // at 1; remote op C inserts "C" at the end
        let mut io = FakeIo::default();
        let mut client = Client::new(7);

        let a = insert_op(0, "A", 2);
        let b = insert_op(1, "B", 2);
        let c = insert_op(2, "C", 0);

        client.apply_client(&mut io, a.clone()).unwrap();
        client.apply_client(&mut io, b.clone()).unwrap();
        assert_eq!(io.sent, vec![(7, a.clone())]);

        client.apply_server(&mut io, c).unwrap();
        assert_eq!(client.revision(), 8);
        assert_eq!(io.applied.len(), 1);

        // local doc is "ABab"; the rewritten C must append at its end
        assert_eq!(io.applied[0].apply("ABab").unwrap(), "ABabC");

        // ack of A: buffer goes out against the revision including A
        client.server_ack(&mut io).unwrap();
        assert_eq!(client.revision(), 9);
        assert_eq!(io.sent.len(), 2);
        assert_eq!(io.sent[1].0, 9);
        assert!(matches!(
            client.state(),
            ClientState::AwaitingConfirm { .. }
        ));

        // ack of the buffer
        client.server_ack(&mut io).unwrap();
        assert_eq!(client.revision(), 10);
        assert!(client.is_synchronized());
    }

    #[test]
    fn test_reconnect_resends_outstanding_only() {
        let mut io = FakeIo::default();
        let mut client = Client::new(2);

        client.server_reconnect(&mut io);
        assert!(io.sent.is_empty());

        let a = insert_op(0, "a", 0);
        client.apply_client(&mut io, a.clone()).unwrap();
        client.apply_client(&mut io, insert_op(1, "b", 0)).unwrap();

        client.server_reconnect(&mut io);
        assert_eq!(io.sent.len(), 2);
        assert_eq!(io.sent[1], (2, a));
    }

    #[test]
    fn test_transform_selection_through_pending_edits() {
        let mut io = FakeIo::default();
        let mut client = Client::new(0);

        let selection = Selection::new(vec![Range::cursor(0)]);
        assert_eq!(client.transform_selection(&selection), selection);

        // outstanding inserts "xy" at 0, buffer inserts "z" at 0
        client.apply_client(&mut io, insert_op(0, "xy", 0)).unwrap();
        client.apply_client(&mut io, insert_op(0, "z", 2)).unwrap();

        let transformed = client.transform_selection(&Selection::cursor(0));
        assert_eq!(transformed, Selection::cursor(3));
    }
}
