//! Yuzu - real-time JSON state tree synchronization
//!
//! This is the main convenience crate that re-exports the Yuzu sub-crates.
//! Use this crate if you want a single dependency that provides both server
//! and client functionality.
//!
//! # Architecture
//!
//! Yuzu is organized into modular crates:
//!
//! - **yuzu-core**: Wire message types, codec, error handling, observability
//! - **yuzu-server**: Mutation tracker, patch batcher, WebSocket session layer
//! - **yuzu-client**: Subscription registry, patch applier, reconnecting client
//!
//! # Quick Start - Server
//!
//! ```rust,no_run
//! use yuzu::YuzuServer;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = YuzuServer::builder()
//!         .server_config(8080)
//!         .build(json!({ "count": 0 }))
//!         .await?;
//!
//!     server.tracker().root().child("count").set(json!(1)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Client
//!
//! ```rust,no_run
//! use yuzu::YuzuClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = YuzuClient::builder("ws://localhost:8080/api/yuzu")
//!         .connect()
//!         .await?;
//!
//!     let _handle = client.subscribable().child("count").subscribe(|value, _path| {
//!         println!("count is now {value}");
//!     });
//!
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
// This allows users to access everything through `yuzu::` prefix
pub use yuzu_client as client;
pub use yuzu_core as core;
pub use yuzu_server as server;

// Convenience re-exports of the most commonly used types
// This avoids needing to write `yuzu::server::YuzuServer`
pub use yuzu_client::YuzuClient;
pub use yuzu_server::YuzuServer;
