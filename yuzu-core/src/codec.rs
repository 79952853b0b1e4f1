//! Codec for wire message serialization and deserialization.
//!
//! Unlike the JSON-RPC wire, Yuzu messages are internally tagged by a
//! `type` field, so encoding and decoding reduce to a thin wrapper around
//! serde — the only real behavior here is that an unrecognized `type`
//! decodes to `ServerMessage::Unknown` rather than an error (§6: "Unknown
//! message types MUST be ignored without error").
//!
//! # Examples
//!
//! ```rust
//! use yuzu_core::{codec, ClientMessage};
//!
//! let json = codec::encode(&ClientMessage::Complete).unwrap();
//! let decoded: ClientMessage = codec::decode(&json).unwrap();
//! assert_eq!(decoded, ClientMessage::Complete);
//! ```

use crate::error::{Error, Result};
use crate::types::ServerMessage;
use serde::{de::DeserializeOwned, Serialize};

/// Serialize any wire message to its JSON string form.
pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    serde_json::to_string(message).map_err(Error::Serialization)
}

/// Deserialize a wire message from its JSON string form.
///
/// Generic over the message type so it works for both `ClientMessage`
/// (server-side receive) and `ServerMessage` (client-side receive).
pub fn decode<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(Error::Serialization)
}

/// Decode a server message, never failing on an unrecognized `type`.
///
/// Malformed JSON (not even a well-formed object) still surfaces as an
/// error — per §7, that case is logged at the call site and the message
/// discarded, but the failure must be observable there. A recognized
/// JSON object with an unrecognized `type` decodes to `Unknown` instead.
pub fn decode_server_message(data: &str) -> Result<ServerMessage> {
    decode(data)
}
