//! The client session (§4.5): opens/reconnects the transport, drives the
//! `complete` handshake, and dispatches incoming wire messages into the
//! local [`Mirror`](crate::mirror::Mirror).
//!
//! `YuzuClient` is cheaply cloneable (it is an `Arc` around its shared
//! state); every clone shares the same connection, mirror and
//! subscription registry, so it can be handed to any number of tasks.

use crate::connection_state::ConnectionManager;
use crate::mirror::{Mirror, PlainCursor, SubscribableCursor};
use crate::reconnect::PendingReconnect;
use crate::subscription::SubscriptionRegistry;
use crate::token::{address_with_token, TokenSource};
use crate::ClientMetrics;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use yuzu_core::{codec, ClientMessage, Error, Path, Result, ServerMessage};

/// Callback the host supplies in external transport mode (§4.6):
/// invoked whenever the client wants to send a wire message.
pub type OnMessage = Arc<dyn Fn(String) + Send + Sync>;

pub(crate) enum Transport {
    /// The library owns the WebSocket; `outbound` is the sender half of
    /// the current connection's write task, `None` when not connected.
    Default { outbound: Option<mpsc::UnboundedSender<Message>> },
    /// The host owns the transport (§4.6). `connect`/`disconnect`/
    /// `reconnect` are no-ops and `isConnected` stays `false`.
    External { on_message: OnMessage },
}

struct Inner {
    address: String,
    token: Option<TokenSource>,
    reconnect_timeout: Duration,
    mirror: Mirror,
    registry: Arc<SubscriptionRegistry>,
    connection: ConnectionManager,
    metrics: Option<Arc<ClientMetrics>>,
    transport: Mutex<Transport>,
    user_initiated: AtomicBool,
    pending_reconnect: StdMutex<Option<PendingReconnect>>,
}

/// The client half of a Yuzu deployment.
#[derive(Clone)]
pub struct YuzuClient(Arc<Inner>);

impl YuzuClient {
    pub(crate) fn new(
        address: String,
        token: Option<TokenSource>,
        reconnect_timeout: Duration,
        transport: Transport,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let mirror = Mirror::new(registry.clone());
        YuzuClient(Arc::new(Inner {
            address,
            token,
            reconnect_timeout,
            mirror,
            registry,
            connection: ConnectionManager::new(),
            metrics,
            transport: Mutex::new(transport),
            user_initiated: AtomicBool::new(false),
            pending_reconnect: StdMutex::new(None),
        }))
    }

    /// Start building a client. See [`crate::ClientBuilder`] for the
    /// recognized options (§6).
    pub fn builder(address: impl Into<String>) -> crate::ClientBuilder {
        crate::ClientBuilder::new(address)
    }

    /// Whether the transport is currently open (`isConnected`). Always
    /// `false` in external transport mode — that lifecycle belongs to
    /// the host (§4.6).
    pub fn is_connected(&self) -> bool {
        self.0.connection.is_connected()
    }

    /// A live view of connection status (`connected$`).
    pub fn connected_stream(&self) -> watch::Receiver<bool> {
        self.0.connection.subscribe()
    }

    /// A read-only cursor over the plain view of the local mirror.
    pub fn cursor(&self) -> PlainCursor {
        self.0.mirror.cursor()
    }

    /// A cursor over the subscribable projection (§4.4): every readable
    /// container carries `subscribe`.
    pub fn subscribable(&self) -> SubscribableCursor {
        self.0.mirror.subscribable()
    }

    /// Open the transport and send the initial `complete` request.
    ///
    /// In external transport mode there is no connection to open; it
    /// sends the `complete` request through `on_message` the same way a
    /// freshly-opened default transport would (§4.5: "on transport open:
    /// immediately send complete").
    pub async fn connect(&self) -> Result<()> {
        self.0.user_initiated.store(false, Ordering::SeqCst);
        self.do_connect().await
    }

    async fn do_connect(&self) -> Result<()> {
        let external = {
            let transport = self.0.transport.lock().await;
            match &*transport {
                Transport::External { on_message } => Some(on_message.clone()),
                Transport::Default { .. } => None,
            }
        };
        if let Some(on_message) = external {
            let text = codec::encode(&ClientMessage::Complete)?;
            on_message(text);
            return Ok(());
        }

        let token = match &self.0.token {
            Some(source) => Some(source.resolve().await?),
            None => None,
        };
        let address = match token {
            Some(t) => address_with_token(&self.0.address, &t),
            None => self.0.address.clone(),
        };

        tracing::info!(address = %address, "connecting");
        let (ws_stream, _response) = tokio_tungstenite::connect_async(address)
            .await
            .map_err(|e| Error::websocket(e.to_string()))?;
        let (mut sink, mut stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        {
            let mut transport = self.0.transport.lock().await;
            *transport = Transport::Default { outbound: Some(tx.clone()) };
        }
        self.0.connection.set_connected(true);
        if let Some(m) = &self.0.metrics {
            m.update_connection_state(2);
        }
        tracing::info!("connected");

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        let complete_request = codec::encode(&ClientMessage::Complete)?;
        let _ = tx.send(Message::Text(complete_request));

        let client = self.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let _ = client.handle_server_message(&text).await;
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("connection closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "transport error");
                        if let Some(m) = &client.0.metrics {
                            m.record_error("transport");
                        }
                        break;
                    }
                }
            }
            client.on_transport_closed().await;
        });

        Ok(())
    }

    /// External-mode entry point (§4.6): call this with the wire bytes a
    /// host transport received. Also used internally to dispatch the
    /// default transport's incoming frames.
    pub async fn handle_server_message(&self, message: &str) -> Result<()> {
        let decoded: ServerMessage = match codec::decode_server_message(message) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::error!(error = %e, "malformed server message, discarding");
                if let Some(m) = &self.0.metrics {
                    m.record_error("malformed_message");
                }
                return Ok(());
            }
        };

        match decoded {
            ServerMessage::Complete { state } => {
                self.0.mirror.replace(state).await;
                self.0.registry.notify_all(&self.0.mirror).await;
            }
            ServerMessage::Patch { patch } => {
                self.0.mirror.apply(&patch).await?;
                self.0.registry.notify_single(&self.0.mirror, &patch.path).await;
                if let Some(m) = &self.0.metrics {
                    m.record_patch();
                }
            }
            ServerMessage::PatchBatch { patches } => {
                let paths: Vec<Path> = patches.iter().map(|p| p.path.clone()).collect();
                for patch in &patches {
                    self.0.mirror.apply(patch).await?;
                }
                self.0.registry.notify_batch(&self.0.mirror, &paths).await;
                if let Some(m) = &self.0.metrics {
                    m.record_batch(patches.len() as u64);
                }
            }
            ServerMessage::Unknown => {
                tracing::debug!("ignoring unrecognized message type");
            }
        }
        Ok(())
    }

    async fn on_transport_closed(&self) {
        self.0.connection.set_connected(false);
        if let Some(m) = &self.0.metrics {
            m.update_connection_state(0);
        }
        {
            let mut transport = self.0.transport.lock().await;
            if let Transport::Default { outbound } = &mut *transport {
                *outbound = None;
            }
        }

        if self.0.user_initiated.swap(false, Ordering::SeqCst) {
            tracing::debug!("close was user-initiated, not scheduling a reconnect");
        } else {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&self) {
        let client = self.clone();
        let timer = PendingReconnect::schedule(self.0.reconnect_timeout, move || {
            let client = client.clone();
            tokio::spawn(async move {
                if let Some(m) = &client.0.metrics {
                    m.record_reconnection_attempt();
                }
                match client.do_connect().await {
                    Ok(()) => {
                        if let Some(m) = &client.0.metrics {
                            m.record_reconnection_success();
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "reconnect attempt failed, retrying");
                        client.schedule_reconnect();
                    }
                }
            });
        });
        *self.0.pending_reconnect.lock().unwrap() = Some(timer);
    }

    fn cancel_pending_reconnect(&self) {
        if let Some(timer) = self.0.pending_reconnect.lock().unwrap().take() {
            timer.cancel();
        }
    }

    /// Close the transport without scheduling a reconnect (§4.5). A
    /// no-op in external transport mode.
    pub async fn disconnect(&self) {
        self.0.user_initiated.store(true, Ordering::SeqCst);
        self.cancel_pending_reconnect();
        self.close_transport().await;
    }

    /// Close the current transport (if any) and open a fresh one,
    /// without going through the reconnect-timer path. A no-op in
    /// external transport mode: the lifecycle belongs to the host there
    /// (§4.6), so this must not re-send `complete` through `on_message`.
    pub async fn reconnect(&self) -> Result<()> {
        if self.is_external().await {
            return Ok(());
        }
        self.0.user_initiated.store(true, Ordering::SeqCst);
        self.cancel_pending_reconnect();
        self.close_transport().await;
        self.do_connect().await
    }

    async fn is_external(&self) -> bool {
        matches!(&*self.0.transport.lock().await, Transport::External { .. })
    }

    async fn close_transport(&self) {
        let outbound = {
            let mut transport = self.0.transport.lock().await;
            match &mut *transport {
                Transport::Default { outbound } => outbound.take(),
                Transport::External { .. } => None,
            }
        };
        drop(outbound);
        self.0.connection.set_connected(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport_external(on_message: OnMessage) -> Transport {
        Transport::External { on_message }
    }

    fn new_client(transport: Transport) -> YuzuClient {
        YuzuClient::new(
            "ws://localhost:0/api/yuzu".to_string(),
            None,
            Duration::from_millis(50),
            transport,
            None,
        )
    }

    #[tokio::test]
    async fn external_mode_connect_sends_a_complete_request() {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let client = new_client(transport_external(Arc::new(move |msg| {
            sent_clone.lock().unwrap().push(msg);
        })));

        client.connect().await.unwrap();

        let messages = sent.lock().unwrap().clone();
        assert_eq!(messages, vec![r#"{"type":"complete"}"#.to_string()]);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn complete_message_replaces_state_and_notifies_listeners() {
        let client = new_client(transport_external(Arc::new(|_msg| {})));
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let calls_clone = calls.clone();
        let _handle = client.subscribable().child("count").subscribe(move |value, path| {
            calls_clone.lock().unwrap().push((value, path));
        });

        client
            .handle_server_message(r#"{"type":"complete","state":{"count":42}}"#)
            .await
            .unwrap();

        assert_eq!(client.cursor().child("count").value().await, json!(42));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (json!(42), Path::root()));
    }

    #[tokio::test]
    async fn patch_message_is_applied_and_notified() {
        let client = new_client(transport_external(Arc::new(|_msg| {})));
        client
            .handle_server_message(r#"{"type":"complete","state":{"count":0}}"#)
            .await
            .unwrap();

        let calls = Arc::new(StdMutex::new(0usize));
        let calls_clone = calls.clone();
        let _handle = client.subscribable().child("count").subscribe(move |_v, _p| {
            *calls_clone.lock().unwrap() += 1;
        });

        client
            .handle_server_message(r#"{"type":"patch","patch":{"path":["count"],"value":5}}"#)
            .await
            .unwrap();

        assert_eq!(client.cursor().child("count").value().await, json!(5));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn patch_batch_applies_all_and_notifies_per_path() {
        let client = new_client(transport_external(Arc::new(|_msg| {})));
        client
            .handle_server_message(r#"{"type":"complete","state":{"a":0,"b":0}}"#)
            .await
            .unwrap();

        client
            .handle_server_message(
                r#"{"type":"patch-batch","patches":[{"path":["a"],"value":1},{"path":["b"],"value":2}]}"#,
            )
            .await
            .unwrap();

        assert_eq!(client.cursor().child("a").value().await, json!(1));
        assert_eq!(client.cursor().child("b").value().await, json!(2));
    }

    #[tokio::test]
    async fn unknown_message_type_is_ignored_without_error() {
        let client = new_client(transport_external(Arc::new(|_msg| {})));
        let result = client.handle_server_message(r#"{"type":"future-message"}"#).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn malformed_message_is_discarded_without_error() {
        let client = new_client(transport_external(Arc::new(|_msg| {})));
        let result = client.handle_server_message("not json").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn disconnect_and_reconnect_are_no_ops_under_external_transport() {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let sent_clone = sent.clone();
        let client = new_client(transport_external(Arc::new(move |msg| {
            sent_clone.lock().unwrap().push(msg);
        })));
        client.connect().await.unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);

        client.disconnect().await;
        assert!(!client.is_connected());
        assert_eq!(sent.lock().unwrap().len(), 1);

        client.reconnect().await.unwrap();
        assert!(!client.is_connected());
        assert_eq!(
            sent.lock().unwrap().len(),
            1,
            "reconnect() must not re-send complete through on_message in external mode"
        );
    }
}
