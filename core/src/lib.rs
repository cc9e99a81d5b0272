//! textsync-core - Synchronization core for collaborative text editing
//!
//! This is the transport-agnostic heart of a real-time collaborative
//! editor, built on operational transformation. It implements:
//! - The operation algebra (apply, compose, transform, invert)
//! - The client protocol state machine
//! - The server coordinator linearizing concurrent operations
//! - Undo/redo stacks that stay correct under concurrent edits
//! - Cursor/selection transformation
//!
//! Everything outside stays outside: transport, editor bindings,
//! persistence and presence talk to the core only through
//! [`ClientIo`] and [`Server::receive_operation`].
//!
//! # Examples
//!
//! ```rust
//! use textsync_core::{Server, TextOperation};
//!
//! let mut server = Server::new();
//!
//! let mut hello = TextOperation::new();
//! hello.insert("hello");
//! server.receive_operation(0, hello).unwrap();
//!
//! // a second client, still at revision 0, edits concurrently
//! let mut shout = TextOperation::new();
//! shout.insert("!");
//! server.receive_operation(0, shout).unwrap();
//!
//! assert_eq!(server.document(), "!hello");
//! ```

pub mod client;
pub mod error;
pub mod operation;
pub mod protocol;
pub mod selection;
pub mod server;
pub mod undo;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-exports for convenience
pub use client::{Client, ClientIo, ClientState};
pub use error::{OtError, Result};
pub use operation::{OpComponent, TextOperation};
pub use protocol::{ClientFrame, ServerFrame};
pub use selection::{Range, Selection};
pub use server::Server;
pub use undo::UndoManager;

/// Client identifier type
pub type ClientId = String;
