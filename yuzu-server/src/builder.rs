//! Fluent construction of a [`YuzuServer`] (§6: server constructor
//! configuration).
//!
//! At least one of `server_ref`, `server_config`, or `external_transport`
//! must be supplied, and external mode additionally requires
//! `on_message` — both are construction-misconfiguration errors (§7) if
//! missing.

use crate::auth::AuthHook;
use crate::metrics::ServerMetrics;
use crate::tracker::StateTracker;
use crate::{ConnectionRegistry, OnMessage, Sink, YuzuServer};
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use yuzu_core::{Error, ObservabilityConfig, Result};

const DEFAULT_PATH: &str = "/api/yuzu";
const BROADCAST_CAPACITY: usize = 1024;

enum TransportSpec {
    /// `serverRef`: a listener the host already bound, handed to us.
    Listener(TcpListener),
    /// `serverConfig.port`: bind a fresh listener ourselves.
    Port(u16),
    /// `externalTransport` + `onMessage`.
    External(OnMessage),
}

/// Builder for [`YuzuServer`].
pub struct ServerBuilder {
    transport: Option<TransportSpec>,
    path: String,
    batch_delay: Duration,
    auth: Option<AuthHook>,
    observability: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        ServerBuilder {
            transport: None,
            path: DEFAULT_PATH.to_string(),
            batch_delay: Duration::ZERO,
            auth: None,
            observability: None,
            service_name: None,
        }
    }

    /// `serverRef`: attach to a listener the host already bound.
    pub fn server_ref(mut self, listener: TcpListener) -> Self {
        self.transport = Some(TransportSpec::Listener(listener));
        self
    }

    /// `serverConfig.port`: bind a new listener to this port on construction.
    pub fn server_config(mut self, port: u16) -> Self {
        self.transport = Some(TransportSpec::Port(port));
        self
    }

    /// URL path prefix the WebSocket listens on (default `/api/yuzu`). A
    /// path without a leading slash has one prepended.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    /// Milliseconds the patch batcher coalesces over; 0 disables batching.
    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Connect-time authorization hook for the default WebSocket
    /// transport (§4.6). Rejecting returns `401 Unauthorized` from the
    /// upgrade.
    pub fn authenticate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&crate::auth::AuthInfo) -> bool + Send + Sync + 'static,
    {
        self.auth = Some(Arc::new(hook));
        self
    }

    /// External transport mode: the library creates no transport of its
    /// own and calls `on_message(message, client_id)` whenever it wants to
    /// send (§4.6).
    pub fn external_transport<F>(mut self, on_message: F) -> Self
    where
        F: Fn(String, Option<crate::ConnId>) + Send + Sync + 'static,
    {
        self.transport = Some(TransportSpec::External(Arc::new(on_message)));
        self
    }

    /// Enable OpenTelemetry observability with the supplied configuration.
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with defaults.
    pub fn with_default_observability(mut self) -> Self {
        self.observability = Some(ObservabilityConfig::default());
        self
    }

    /// Override the service name used for observability and metrics.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Construct the server, seeding its state tree with `initial`.
    pub async fn build(self, initial: serde_json::Value) -> Result<YuzuServer> {
        let transport = self
            .transport
            .ok_or_else(|| {
                Error::construction(
                    "no transport configured: supply server_ref, server_config, or external_transport",
                )
            })?;

        let metrics = if let Some(mut config) = self.observability {
            if let Some(name) = &self.service_name {
                config.service_name = name.clone();
            }
            yuzu_core::init_observability(config.clone())
                .map_err(|e| Error::internal(format!("failed to initialize observability: {e}")))?;
            Some(Arc::new(ServerMetrics::new(config.service_name)))
        } else {
            None
        };

        let (tracker, patch_rx) = StateTracker::new(initial);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let batcher = crate::batcher::PatchBatcher::new(self.batch_delay, patch_rx, broadcast_tx.clone());
        tokio::spawn(batcher.run());

        let (sink, listener) = match transport {
            TransportSpec::Listener(listener) => {
                let registry: ConnectionRegistry = Arc::new(Mutex::new(HashMap::new()));
                (Sink::Transport { registry }, Some(listener))
            }
            TransportSpec::Port(port) => {
                let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();
                let listener = TcpListener::bind(addr).await.map_err(Error::Io)?;
                tracing::info!(%addr, path = %self.path, "yuzu server listening");
                let registry: ConnectionRegistry = Arc::new(Mutex::new(HashMap::new()));
                (Sink::Transport { registry }, Some(listener))
            }
            TransportSpec::External(on_message) => {
                crate::spawn_external_forwarder(broadcast_tx.subscribe(), on_message.clone());
                (Sink::External(on_message), None)
            }
        };

        Ok(YuzuServer {
            tracker,
            patches: broadcast_tx,
            sink,
            listener,
            path: Arc::from(self.path.as_str()),
            auth: self.auth,
            metrics,
            next_conn_id: AtomicU64::new(0),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn building_without_any_transport_fails() {
        let result = ServerBuilder::new().build(json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn server_config_binds_a_listener() {
        let server = ServerBuilder::new()
            .server_config(0)
            .build(json!({"count": 0}))
            .await
            .unwrap();
        assert!(server.local_addr().is_some());
    }

    #[tokio::test]
    async fn external_transport_has_no_bound_listener() {
        let server = ServerBuilder::new()
            .external_transport(|_msg, _client_id| {})
            .build(json!({}))
            .await
            .unwrap();
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn path_without_leading_slash_gets_one_prepended() {
        let server = ServerBuilder::new()
            .server_config(0)
            .path("custom")
            .build(json!({}))
            .await
            .unwrap();
        assert_eq!(server.path.as_ref(), "/custom");
    }

    #[tokio::test]
    async fn default_path_is_api_yuzu() {
        let server = ServerBuilder::new()
            .server_config(0)
            .build(json!({}))
            .await
            .unwrap();
        assert_eq!(server.path.as_ref(), "/api/yuzu");
    }
}
