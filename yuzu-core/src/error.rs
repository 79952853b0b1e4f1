//! Error types for yuzu
//!
//! This module defines the single application-level error type shared by
//! `yuzu-server` and `yuzu-client`. There is no wire-visible error object:
//! the protocol has no error message shape (§6), so malformed messages are
//! logged and discarded rather than answered, and listener panics are
//! swallowed at the notification boundary rather than surfaced here.
//!
//! # Examples
//!
//! ```rust
//! use yuzu_core::Error;
//!
//! let error = Error::path_not_found(&["user", "profile", "name"], "profile");
//! assert!(error.to_string().contains("profile"));
//! ```

use thiserror::Error;

/// Result type for yuzu operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for yuzu operations.
///
/// Variants map directly onto the error taxonomy: construction
/// misconfiguration, path-not-found on a client read, malformed inbound
/// messages, auth rejection, transport failure, and I/O.
#[derive(Debug, Error)]
pub enum Error {
    /// A server or client was constructed with an invalid or incomplete
    /// configuration (no transport spec, external mode without
    /// `on_message`, etc).
    #[error("construction error: {0}")]
    Construction(String),

    /// `readPathExisting` failed because a segment along the path is
    /// missing from the local mirror.
    #[error("path not found: missing segment {segment:?} in path {path:?}")]
    PathNotFound { path: Vec<String>, segment: String },

    /// A message could not be serialized or deserialized. On the wire
    /// this is logged and the connection stays open; it never closes a
    /// connection by itself.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying WebSocket transport reported an error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// An I/O error occurred while binding or accepting connections.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The authentication hook rejected the upgrade, or threw while
    /// deciding.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The transport channel closed, expectedly or not.
    #[error("connection closed")]
    ConnectionClosed,

    /// Catch-all for conditions that should be unreachable given the
    /// crate's own invariants.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn construction(message: impl Into<String>) -> Self {
        Error::Construction(message.into())
    }

    pub fn path_not_found(path: &[impl AsRef<str>], segment: impl Into<String>) -> Self {
        Error::PathNotFound {
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
            segment: segment.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Error::Auth(message.into())
    }

    pub fn websocket(message: impl Into<String>) -> Self {
        Error::WebSocket(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}
