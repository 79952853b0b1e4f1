//! Client library for Yuzu state synchronization
//!
//! This crate keeps a local mirror of a server's state tree in sync by
//! consuming the `complete`/`patch`/`patch-batch` wire protocol, and
//! lets callers observe it through path-addressed subscriptions.
//!
//! # Core pieces
//!
//! - **`YuzuClient`**: the session — connects, handshakes, and applies
//!   incoming patches to the local mirror.
//! - **`Mirror`**: the local copy of the tree, reached through a plain
//!   cursor or a subscribable one.
//! - **`SubscriptionRegistry`** / **`SubscriptionHandle`**: path-prefix
//!   subscription bookkeeping and idempotent teardown.
//! - **`TokenSource`**: fixed or callback-resolved connection tokens.
//! - **Auto-reconnect**: a fixed interval, not exponential backoff —
//!   see [`reconnect`] for why.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use yuzu_client::ClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("ws://localhost:8080/api/yuzu")
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

mod client;
mod client_builder;
mod connection_state;
mod metrics;
mod mirror;
mod reconnect;
mod subscription;
mod token;

pub use client::YuzuClient;
pub use client_builder::ClientBuilder;
pub use connection_state::ConnectionManager;
pub use metrics::ClientMetrics;
pub use mirror::{Mirror, PlainCursor, SubscribableCursor};
pub use reconnect::{PendingReconnect, DEFAULT_RECONNECT_TIMEOUT};
pub use subscription::{SubscriptionHandle, SubscriptionRegistry};
pub use token::TokenSource;
