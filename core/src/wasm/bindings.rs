//! JavaScript bindings for textsync-core types
//!
//! Operations cross the boundary as their compact JSON encoding
//! (`{"ops": [1, -2, "abc"]}`), so the JavaScript side never needs a
//! parallel implementation of the component model.

use crate::operation::TextOperation;
use crate::server::Server;
use wasm_bindgen::prelude::*;

fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// JavaScript-friendly wrapper for TextOperation
#[wasm_bindgen]
pub struct WasmTextOperation {
    inner: TextOperation,
}

#[wasm_bindgen]
impl WasmTextOperation {
    /// Create an empty operation
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            inner: TextOperation::new(),
        }
    }

    /// Parse an operation from its JSON encoding
    #[wasm_bindgen(js_name = fromJSON)]
    pub fn from_json(json: String) -> Result<WasmTextOperation, JsValue> {
        let inner: TextOperation = serde_json::from_str(&json)
            .map_err(|e| JsValue::from_str(&format!("Invalid operation: {}", e)))?;
        Ok(Self { inner })
    }

    /// Encode this operation as JSON
    #[wasm_bindgen(js_name = toJSON)]
    pub fn to_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner).map_err(to_js_error)
    }

    /// Append a retain component
    pub fn retain(&mut self, n: u32) {
        self.inner.retain(n);
    }

    /// Append an insert component
    pub fn insert(&mut self, s: String) {
        self.inner.insert(&s);
    }

    /// Append a delete component
    pub fn delete(&mut self, n: u32) {
        self.inner.delete(n);
    }

    /// Length of documents this operation applies to
    #[wasm_bindgen(js_name = baseLength)]
    pub fn base_length(&self) -> usize {
        self.inner.base_len()
    }

    /// Length of the document this operation produces
    #[wasm_bindgen(js_name = targetLength)]
    pub fn target_length(&self) -> usize {
        self.inner.target_len()
    }

    /// True if applying this operation changes nothing
    #[wasm_bindgen(js_name = isNoop)]
    pub fn is_noop(&self) -> bool {
        self.inner.is_noop()
    }

    /// Apply this operation to a document
    pub fn apply(&self, document: String) -> Result<String, JsValue> {
        self.inner.apply(&document).map_err(to_js_error)
    }

    /// Compute the operation undoing this one against `document`
    pub fn invert(&self, document: String) -> WasmTextOperation {
        Self {
            inner: self.inner.invert(&document),
        }
    }

    /// Merge with a consecutive operation
    pub fn compose(&self, other: &WasmTextOperation) -> Result<WasmTextOperation, JsValue> {
        let inner = self.inner.compose(&other.inner).map_err(to_js_error)?;
        Ok(Self { inner })
    }

    /// Transform against a concurrent operation; returns `[aPrime, bPrime]`
    /// as JSON
    pub fn transform(&self, other: &WasmTextOperation) -> Result<String, JsValue> {
        let pair = self.inner.transform(&other.inner).map_err(to_js_error)?;
        serde_json::to_string(&pair).map_err(to_js_error)
    }
}

impl Default for WasmTextOperation {
    fn default() -> Self {
        Self::new()
    }
}

/// JavaScript-friendly wrapper for Server
#[wasm_bindgen]
pub struct WasmServer {
    inner: Server,
}

#[wasm_bindgen]
impl WasmServer {
    /// Create a server seeded with `document`
    #[wasm_bindgen(constructor)]
    pub fn new(document: String) -> Self {
        Self {
            inner: Server::with_document(&document),
        }
    }

    /// Accept an operation (JSON-encoded) made against `revision`; returns
    /// the transformed operation as JSON, ready to broadcast
    #[wasm_bindgen(js_name = receiveOperation)]
    pub fn receive_operation(
        &mut self,
        revision: u64,
        operation_json: String,
    ) -> Result<String, JsValue> {
        let operation: TextOperation = serde_json::from_str(&operation_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid operation: {}", e)))?;
        let transformed = self
            .inner
            .receive_operation(revision, operation)
            .map_err(to_js_error)?;
        serde_json::to_string(&transformed).map_err(to_js_error)
    }

    /// Get the current document
    pub fn document(&self) -> String {
        self.inner.document()
    }

    /// Get the current revision
    pub fn revision(&self) -> u64 {
        self.inner.revision()
    }
}
