//! WASM bindings for textsync-core
//!
//! This module provides JavaScript-friendly bindings for the sync core, so
//! browser clients run the same algebra and server logic as native peers.

pub mod bindings;
pub mod utils;

// Re-export main types
pub use bindings::{WasmServer, WasmTextOperation};
