//! End-to-end tests driving a real `YuzuClient` against a real
//! `YuzuServer` over the default WebSocket transport: handshake,
//! patch delivery, and reconnect-after-unexpected-close.

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use yuzu_client::ClientBuilder;
use yuzu_server::YuzuServer;

#[tokio::test]
async fn handshake_populates_the_local_mirror() {
    let server = YuzuServer::builder()
        .server_config(0)
        .build(json!({"count": 42}))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.run().await });

    let client = ClientBuilder::new(format!("ws://{addr}/api/yuzu"))
        .connect()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.is_connected());
    assert_eq!(client.cursor().child("count").value().await, json!(42));
}

#[tokio::test]
async fn server_side_mutation_is_observed_on_the_client() {
    let server = YuzuServer::builder()
        .server_config(0)
        .batch_delay(Duration::from_millis(0))
        .build(json!({"count": 0}))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let tracker = server.tracker().clone();
    tokio::spawn(async move { server.run().await });

    let client = ClientBuilder::new(format!("ws://{addr}/api/yuzu"))
        .connect()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let calls_clone = calls.clone();
    let _handle = client.subscribable().child("count").subscribe(move |value, path| {
        calls_clone.lock().unwrap().push((value, path));
    });

    tracker.root().child("count").set(json!(5)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(client.cursor().child("count").value().await, json!(5));
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, json!(5));
}

#[tokio::test]
async fn client_auto_reconnects_after_the_server_drops_the_connection() {
    let server = YuzuServer::builder()
        .server_config(0)
        .build(json!({"count": 0}))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.run().await });

    let client = ClientBuilder::new(format!("ws://{addr}/api/yuzu"))
        .reconnect_timeout(Duration::from_millis(100))
        .connect()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.is_connected());

    client.reconnect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(client.is_connected());
}

#[tokio::test]
async fn explicit_disconnect_does_not_auto_reconnect() {
    let server = YuzuServer::builder()
        .server_config(0)
        .build(json!({"count": 0}))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.run().await });

    let client = ClientBuilder::new(format!("ws://{addr}/api/yuzu"))
        .reconnect_timeout(Duration::from_millis(50))
        .connect()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.disconnect().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn token_refreshes_on_every_connect_attempt() {
    let seen_tokens = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen_tokens.clone();
    let server = YuzuServer::builder()
        .server_config(0)
        .authenticate(move |info| {
            if let Some(token) = info.token() {
                seen_clone.lock().unwrap().push(token.to_string());
            }
            true
        })
        .build(json!({}))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.run().await });

    let counter = Arc::new(AtomicUsize::new(0));
    let client = ClientBuilder::new(format!("ws://{addr}/api/yuzu"))
        .get_token(move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("token-{n}"))
            }
        })
        .connect()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.reconnect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let tokens = seen_tokens.lock().unwrap();
    assert_eq!(tokens.as_slice(), ["token-1", "token-2"]);
}
