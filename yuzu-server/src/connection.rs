//! WebSocket connection management for the default transport.
//!
//! Each accepted connection spawns two tasks: a receive task that decodes
//! inbound `complete` requests and a send task that forwards outgoing
//! frames from a channel. The receive task also subscribes to the shared
//! patch broadcast so it can forward every `patch`/`patch-batch` message
//! the batcher produces, without blocking on a slow peer's receive loop.
//!
//! # Task model
//!
//! - **Send task**: drains an per-connection mpsc channel (targeted
//!   `complete` replies) and a shared broadcast receiver (patches), and
//!   writes both to the WebSocket.
//! - **Receive task**: reads inbound frames, decodes `complete` requests,
//!   and answers them on the per-connection channel.

use crate::auth::AuthInfo;
use crate::tracker::StateTracker;
use crate::{ConnId, ConnectionRegistry};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use yuzu_core::{codec, ClientMessage, Error, Result, ServerMessage};

/// Handle for a single open connection, letting other code send a
/// targeted message to exactly this endpoint.
#[derive(Clone)]
pub struct Connection {
    pub id: ConnId,
    tx: mpsc::UnboundedSender<Message>,
}

impl Connection {
    pub fn new(id: ConnId, tx: mpsc::UnboundedSender<Message>) -> Self {
        Connection { id, tx }
    }

    pub fn send(&self, message: &ServerMessage) -> Result<()> {
        let text = codec::encode(message)?;
        self.tx
            .send(Message::Text(text))
            .map_err(|_| Error::ConnectionClosed)
    }
}

/// Synchronous authorization hook invoked during the WebSocket upgrade.
///
/// Returning `false` rejects the upgrade with `401 Unauthorized`; the
/// source's asynchronous authenticate callback is not modeled directly
/// because `tokio-tungstenite`'s handshake callback runs synchronously —
/// see DESIGN.md for this Open Question resolution. Host code that needs
/// to await something (a database lookup, a remote token introspection
/// call) should resolve it ahead of time and have the hook consult a
/// cache.
pub type AuthHook = Arc<dyn Fn(&AuthInfo) -> bool + Send + Sync>;

/// Accept and service one TCP connection as a WebSocket endpoint.
#[tracing::instrument(skip(stream, tracker, patches, registry, auth, metrics), fields(conn_id = conn_id))]
pub async fn handle_connection(
    stream: TcpStream,
    conn_id: ConnId,
    path: Arc<str>,
    tracker: StateTracker,
    mut patches: broadcast::Receiver<ServerMessage>,
    registry: ConnectionRegistry,
    auth: Option<AuthHook>,
    metrics: Option<Arc<crate::ServerMetrics>>,
) -> Result<()> {
    let callback = |request: &Request, response: Response| {
        if request.uri().path() != path.as_ref() {
            let rejection = Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(None)
                .expect("building a 404 response cannot fail");
            return Err(rejection);
        }
        if let Some(hook) = &auth {
            let info = AuthInfo::from_request(request);
            if !hook(&info) {
                let rejection = Response::builder()
                    .status(StatusCode::UNAUTHORIZED)
                    .body(None)
                    .expect("building a 401 response cannot fail");
                return Err(rejection);
            }
        }
        Ok(response)
    };

    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .map_err(|e| Error::websocket(e.to_string()))?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn = Connection::new(conn_id, tx.clone());

    registry.lock().await.insert(conn_id, conn.clone());
    if let Some(m) = &metrics {
        let active = registry.lock().await.len() as i64;
        m.record_connection(active);
    }
    tracing::info!("connection accepted");

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                targeted = rx.recv() => {
                    match targeted {
                        Some(msg) => {
                            if ws_sender.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                broadcast_msg = patches.recv() => {
                    match broadcast_msg {
                        Ok(msg) => {
                            if let Ok(text) = codec::encode(&msg) {
                                if ws_sender.send(Message::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    let recv_tracker = tracker.clone();
    let recv_conn = conn.clone();
    let metrics_clone = metrics.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Err(e) = handle_inbound(&text, &recv_tracker, &recv_conn).await {
                        tracing::error!(error = %e, "malformed inbound message, discarding");
                        if let Some(m) = &metrics_clone {
                            m.record_error("malformed_message");
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("connection closed by client");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "transport error");
                    if let Some(m) = &metrics_clone {
                        m.record_error("transport");
                    }
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.lock().await.remove(&conn_id);
    if let Some(m) = &metrics {
        let active = registry.lock().await.len() as i64;
        m.record_disconnection(active);
    }
    tracing::info!("connection cleaned up");

    Ok(())
}

/// Handle one decoded inbound frame from a client.
///
/// `complete` is the only client-to-server message the protocol defines;
/// anything else that still decodes to a `ClientMessage` variant would be
/// a protocol extension this version doesn't know, so we treat decode
/// failure itself as the only "malformed message" case.
async fn handle_inbound(text: &str, tracker: &StateTracker, conn: &Connection) -> Result<()> {
    let message: ClientMessage = codec::decode(text)?;
    match message {
        ClientMessage::Complete => {
            let state = tracker.snapshot().await;
            conn.send(&ServerMessage::complete(state))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn complete_request_replies_with_current_snapshot() {
        let (tracker, _patches) = StateTracker::new(json!({"count": 42}));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new(1, tx);

        handle_inbound(r#"{"type":"complete"}"#, &tracker, &conn)
            .await
            .unwrap();

        let sent = rx.recv().await.unwrap();
        match sent {
            Message::Text(text) => {
                let decoded: ServerMessage = codec::decode(&text).unwrap();
                assert_eq!(decoded, ServerMessage::complete(json!({"count": 42})));
            }
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_inbound_message_is_an_error_not_a_panic() {
        let (tracker, _patches) = StateTracker::new(json!({}));
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Connection::new(1, tx);

        let result = handle_inbound("not json", &tracker, &conn).await;
        assert!(result.is_err());
    }
}
