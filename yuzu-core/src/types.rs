//! Wire message types exchanged between a Yuzu server and its clients.
//!
//! The wire protocol has four shapes, all JSON objects tagged by a `type`
//! field: the client's `complete` request, and the server's `complete`,
//! `patch` and `patch-batch` replies. Unknown message types on the client
//! side MUST be ignored without error, so `ServerMessage` carries a
//! catch-all `Unknown` variant rather than failing to deserialize.

use crate::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single path-addressed change to the state tree.
///
/// Absence of a value (e.g. a deleted keyed entry) is represented as
/// `Value::Null`, matching the lossy JSON encoding of the "absent"
/// sentinel documented for the tree (a present `null` and an absent key
/// are not distinguishable once they have crossed the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub path: Path,
    pub value: Value,
}

impl Patch {
    pub fn new(path: Path, value: Value) -> Self {
        Patch { path, value }
    }

    /// A patch at the root path, replacing the whole tree.
    pub fn root(value: Value) -> Self {
        Patch {
            path: Path::root(),
            value,
        }
    }
}

/// Messages a client may send to the server.
///
/// The protocol defines exactly one: a request for the full state. There
/// is no client-to-server mutation message — the state stream is one-way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "complete")]
    Complete,
}

/// Messages a server may send to a client.
///
/// `Unknown` absorbs any `type` this version does not recognize so that
/// forward-incompatible servers don't break older clients: the contract
/// requires unrecognized messages to be silently dropped, never to fail
/// decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "complete")]
    Complete { state: Value },
    #[serde(rename = "patch")]
    Patch { patch: Patch },
    #[serde(rename = "patch-batch")]
    PatchBatch { patches: Vec<Patch> },
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn complete(state: Value) -> Self {
        ServerMessage::Complete { state }
    }

    pub fn patch(patch: Patch) -> Self {
        ServerMessage::Patch { patch }
    }

    pub fn patch_batch(patches: Vec<Patch>) -> Self {
        ServerMessage::PatchBatch { patches }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ServerMessage::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_complete_round_trips() {
        let msg = ClientMessage::Complete;
        let encoded = serde_json::to_string(&msg).unwrap();
        assert_eq!(encoded, r#"{"type":"complete"}"#);
        let decoded: ClientMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn server_complete_carries_state() {
        let msg = ServerMessage::complete(json!({"count": 0}));
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn server_patch_matches_literal_scenario_one() {
        let msg = ServerMessage::patch(Patch::new(Path::new(["count"]), json!(5)));
        let encoded = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            encoded,
            r#"{"type":"patch","patch":{"path":["count"],"value":5}}"#
        );
    }

    #[test]
    fn server_patch_batch_preserves_order() {
        let patches = vec![
            Patch::new(Path::new(["count"]), json!(1)),
            Patch::new(Path::new(["value"]), json!(2)),
        ];
        let msg = ServerMessage::patch_batch(patches.clone());
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_str(&encoded).unwrap();
        match decoded {
            ServerMessage::PatchBatch { patches: got } => assert_eq!(got, patches),
            other => panic!("expected PatchBatch, got {other:?}"),
        }
    }

    #[test]
    fn unknown_message_type_decodes_without_error() {
        let decoded: ServerMessage =
            serde_json::from_str(r#"{"type":"ping","nonce":7}"#).unwrap();
        assert!(decoded.is_unknown());
    }

    #[test]
    fn absent_value_round_trips_as_null() {
        let patch = Patch::new(Path::new(["user", "nickname"]), Value::Null);
        let encoded = serde_json::to_string(&patch).unwrap();
        let decoded: Patch = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.value, Value::Null);
    }
}
