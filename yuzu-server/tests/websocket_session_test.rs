//! End-to-end tests against the default WebSocket transport: handshake,
//! broadcast patches, and the auth hook.

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use yuzu_core::{Path, ServerMessage};
use yuzu_server::YuzuServer;

async fn connect(addr: std::net::SocketAddr, path: &str) -> tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
> {
    let url = format!("ws://{addr}{path}");
    let (ws, _response) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws
}

#[tokio::test]
async fn handshake_replies_with_current_snapshot() {
    let server = YuzuServer::builder()
        .server_config(0)
        .build(json!({"count": 42, "name": "test"}))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.run().await });

    let mut ws = connect(addr, "/api/yuzu").await;
    ws.send(Message::Text(r#"{"type":"complete"}"#.to_string()))
        .await
        .unwrap();

    let response = ws.next().await.unwrap().unwrap();
    let decoded: ServerMessage = match response {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    };
    assert_eq!(decoded, ServerMessage::complete(json!({"count": 42, "name": "test"})));
}

#[tokio::test]
async fn patches_broadcast_to_all_connected_clients() {
    let server = YuzuServer::builder()
        .server_config(0)
        .build(json!({"count": 0}))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let tracker = server.tracker().clone();
    tokio::spawn(async move { server.run().await });

    let mut a = connect(addr, "/api/yuzu").await;
    let mut b = connect(addr, "/api/yuzu").await;
    // Drain each connection's handshake round trip isn't required (no
    // auto-push), so both sockets are idle until the write below.
    tracker.root().child("count").set(json!(5)).await.unwrap();

    for ws in [&mut a, &mut b] {
        let msg = ws.next().await.unwrap().unwrap();
        let decoded: ServerMessage = match msg {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        };
        assert_eq!(
            decoded,
            ServerMessage::patch(yuzu_core::Patch::new(Path::new(["count"]), json!(5)))
        );
    }
}

#[tokio::test]
async fn connecting_to_an_unconfigured_path_is_rejected() {
    let server = YuzuServer::builder()
        .server_config(0)
        .path("/custom")
        .build(json!({}))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.run().await });

    let result = tokio_tungstenite::connect_async(format!("ws://{addr}/api/yuzu")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn auth_hook_rejects_the_upgrade() {
    let server = YuzuServer::builder()
        .server_config(0)
        .authenticate(|info| info.token() == Some("s3cret"))
        .build(json!({}))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.run().await });

    let rejected = tokio_tungstenite::connect_async(format!("ws://{addr}/api/yuzu")).await;
    assert!(rejected.is_err());

    let accepted =
        tokio_tungstenite::connect_async(format!("ws://{addr}/api/yuzu?token=s3cret")).await;
    assert!(accepted.is_ok());
}
