//! Yuzu server: state tracking and patch distribution over WebSocket.
//!
//! This crate provides the server half of a Yuzu deployment (§4 of the
//! specification): a [`tracker::StateTracker`] that turns ordinary writes
//! into a patch stream, a [`batcher::PatchBatcher`] that coalesces that
//! stream on a configurable delay, and a session layer
//! ([`YuzuServer`]) that either owns a WebSocket listener directly or
//! hands the wire bytes to a host-supplied transport.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use yuzu_server::YuzuServer;
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

pub mod auth;
pub mod batcher;
pub mod builder;
pub mod connection;
pub mod metrics;
pub mod tracker;

use auth::AuthHook;
use connection::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tracker::StateTracker;
use yuzu_core::{codec, ClientMessage, Error, Result, ServerMessage};

pub use builder::ServerBuilder;
pub use metrics::ServerMetrics;

/// Identifies one currently-open endpoint, whether it is a WebSocket
/// connection the library owns or a host-tracked peer in external mode.
pub type ConnId = u64;

/// The set of currently-open endpoints, keyed by [`ConnId`] (§3: "a set of
/// currently-open transport endpoints").
pub type ConnectionRegistry = Arc<Mutex<HashMap<ConnId, Connection>>>;

/// Callback the host supplies in external transport mode (§4.6):
/// `on_message(message, client_id)`, with `client_id` present for a
/// targeted `complete` reply and absent for a broadcast patch/batch.
pub type OnMessage = Arc<dyn Fn(String, Option<ConnId>) + Send + Sync>;

/// How outgoing wire messages leave the server.
enum Sink {
    /// The library owns the WebSocket listener; connections hold their
    /// own sender half and subscribe to the shared broadcast channel
    /// directly (see `connection::handle_connection`).
    Transport { registry: ConnectionRegistry },
    /// The host owns the transport; every outgoing message, targeted or
    /// broadcast, goes through this callback instead.
    External(OnMessage),
}

/// The server half of a Yuzu deployment: owns the authoritative state
/// tree and distributes the patches it produces to every connected
/// client.
pub struct YuzuServer {
    tracker: StateTracker,
    patches: broadcast::Sender<ServerMessage>,
    sink: Sink,
    listener: Option<TcpListener>,
    path: Arc<str>,
    auth: Option<AuthHook>,
    metrics: Option<Arc<ServerMetrics>>,
    next_conn_id: AtomicU64,
}

impl YuzuServer {
    /// Start building a server. See [`ServerBuilder`] for the recognized
    /// options (§6).
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The mutation tracker: write through this to mutate the
    /// authoritative state and emit patches (§4.1).
    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// The local address the library bound to, if it owns the listener.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Run the server's own accept loop.
    ///
    /// In external transport mode there is nothing for the library to
    /// drive — the host owns accept/receive — so this resolves
    /// immediately after confirming the broadcast-forwarding task (spawned
    /// at construction) is alive.
    pub async fn run(&self) -> Result<()> {
        let listener = match &self.listener {
            Some(listener) => listener,
            None => {
                tracing::debug!("external transport mode: nothing to accept");
                return Ok(());
            }
        };

        loop {
            let (stream, peer) = listener.accept().await.map_err(Error::Io)?;
            let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
            let registry = match &self.sink {
                Sink::Transport { registry } => registry.clone(),
                Sink::External(_) => unreachable!("listener only exists in transport mode"),
            };
            let tracker = self.tracker.clone();
            let patches = self.patches.subscribe();
            let auth = self.auth.clone();
            let metrics = self.metrics.clone();
            let path = self.path.clone();
            tracing::debug!(%peer, conn_id, "accepted tcp connection");
            tokio::spawn(async move {
                if let Err(e) = connection::handle_connection(
                    stream, conn_id, path, tracker, patches, registry, auth, metrics,
                )
                .await
                {
                    tracing::error!(error = %e, conn_id, "connection task ended with an error");
                }
            });
        }
    }

    /// External-mode entry point (§4.6): call this with the wire bytes a
    /// host transport received from `client_id`.
    ///
    /// The only client-to-server message the protocol defines is
    /// `complete`; the reply is sent back through `on_message` targeted at
    /// `client_id`. A malformed message is logged and discarded, matching
    /// the default-transport behavior in `connection::handle_inbound`.
    pub async fn handle_client_message(
        &self,
        message: &str,
        client_id: Option<ConnId>,
    ) -> Result<()> {
        let decoded: ClientMessage = match codec::decode(message) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::error!(error = %e, "malformed inbound message, discarding");
                if let Some(m) = &self.metrics {
                    m.record_error("malformed_message");
                }
                return Ok(());
            }
        };

        match decoded {
            ClientMessage::Complete => {
                let state = self.tracker.snapshot().await;
                if let Some(m) = &self.metrics {
                    m.record_complete_request();
                }
                self.send_to(client_id, ServerMessage::complete(state)).await
            }
        }
    }

    async fn send_to(&self, client_id: Option<ConnId>, message: ServerMessage) -> Result<()> {
        match &self.sink {
            Sink::External(on_message) => {
                let text = codec::encode(&message)?;
                on_message(text, client_id);
                Ok(())
            }
            Sink::Transport { registry } => {
                let id = client_id.ok_or_else(|| {
                    Error::internal("targeted reply requested without a client id")
                })?;
                let registry = registry.lock().await;
                match registry.get(&id) {
                    Some(conn) => conn.send(&message),
                    None => Err(Error::ConnectionClosed),
                }
            }
        }
    }
}

/// Spawn the task that forwards every broadcast patch/batch through an
/// external transport's `on_message` callback (no `client_id`: this is
/// always a broadcast, never a targeted reply).
fn spawn_external_forwarder(mut patches: broadcast::Receiver<ServerMessage>, on_message: OnMessage) {
    tokio::spawn(async move {
        loop {
            match patches.recv().await {
                Ok(msg) => {
                    if let Ok(text) = codec::encode(&msg) {
                        on_message(text, None);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
