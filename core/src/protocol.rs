//! Wire frames exchanged between client and server
//!
//! The transport itself (WebSocket, HTTP, anything that delivers frames in
//! order) lives outside this crate; these types pin down the JSON shapes it
//! carries. Operations use their compact component encoding, selections ride
//! along optionally, and server frames are tagged by `kind`.

use crate::operation::TextOperation;
use crate::selection::Selection;
use crate::ClientId;
use serde::{Deserialize, Serialize};

/// Frame a client sends to the server
///
/// `revision` is the number of server operations the client had observed
/// when it produced `operation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub revision: u64,
    pub operation: TextOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
}

/// Frame the server sends to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ServerFrame {
    /// The client's own operation was accepted and appended
    Ack,

    /// Another client's operation, already transformed against history
    Op {
        operation: TextOperation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selection: Option<Selection>,
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Range;

    fn sample_operation() -> TextOperation {
        let mut op = TextOperation::new();
        op.retain(3);
        op.insert("hi");
        op
    }

    #[test]
    fn test_client_frame_omits_missing_selection() {
        let frame = ClientFrame {
            revision: 4,
            operation: sample_operation(),
            selection: None,
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"revision":4,"operation":{"ops":[3,"hi"]}}"#
        );
    }

    #[test]
    fn test_client_frame_round_trip_with_selection() {
        let frame = ClientFrame {
            revision: 0,
            operation: sample_operation(),
            selection: Some(Selection::new(vec![Range::new(0, 5)])),
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: ClientFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_ack_frame_shape() {
        assert_eq!(
            serde_json::to_string(&ServerFrame::Ack).unwrap(),
            r#"{"kind":"ack"}"#
        );
        let back: ServerFrame = serde_json::from_str(r#"{"kind":"ack"}"#).unwrap();
        assert_eq!(back, ServerFrame::Ack);
    }

    #[test]
    fn test_op_frame_uses_client_id_spelling() {
        let frame = ServerFrame::Op {
            operation: sample_operation(),
            selection: None,
            client_id: "client-7".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"op","operation":{"ops":[3,"hi"]},"clientId":"client-7"}"#
        );
        let back: ServerFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_op_frame_accepts_legacy_bare_selection() {
        let json = r#"{"kind":"op","operation":{"ops":[1]},"selection":[{"anchor":0,"head":1}],"clientId":"c"}"#;
        let back: ServerFrame = serde_json::from_str(json).unwrap();
        match back {
            ServerFrame::Op { selection, .. } => {
                assert_eq!(
                    selection,
                    Some(Selection::new(vec![Range::new(0, 1)]))
                );
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}
