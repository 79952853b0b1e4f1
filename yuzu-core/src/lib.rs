//! Wire types and shared plumbing for Yuzu
//!
//! This crate provides the foundational pieces shared by `yuzu-server` and
//! `yuzu-client`:
//!
//! - **types**: the four wire message shapes (`ClientMessage`, `ServerMessage`,
//!   `Patch`) and the `Path` addressing type
//! - **codec**: encode/decode between those types and wire JSON
//! - **error**: the single application `Error` type used across both crates
//! - **observability**: OpenTelemetry integration for tracing, metrics and logs
//!
//! # Example
//!
//! ```rust
//! use yuzu_core::{codec, ClientMessage};
//!
//! let json = codec::encode(&ClientMessage::Complete).unwrap();
//! assert_eq!(json, r#"{"type":"complete"}"#);
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod path;
pub mod tree;
pub mod types;

pub use error::{Error, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use path::Path;
pub use types::{ClientMessage, Patch, ServerMessage};
