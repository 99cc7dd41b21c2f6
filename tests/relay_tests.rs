// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Relay bridge tests over a loopback socket
//!
//! These tests play the IDE client: they listen on an ephemeral port,
//! let the bridge dial in, and exchange JSON frames.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use sidecar::relay::{FnHandler, RelayBridge, RelayResponse};

const WAIT: Duration = Duration::from_secs(10);

struct Client {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> Self {
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    async fn send(&mut self, frame: &Value) {
        let mut raw = frame.to_string();
        raw.push('\n');
        self.writer.write_all(raw.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> RelayResponse {
        let mut line = String::new();
        timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(&line).unwrap()
    }
}

async fn connected_bridge(bridge: &RelayBridge, listener: &TcpListener) -> Client {
    let port = listener.local_addr().unwrap().port();
    bridge.connect(port).await;
    Client::accept(listener).await
}

#[tokio::test]
async fn test_exactly_one_response_per_id() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = RelayBridge::new();
    bridge
        .register_handler(Arc::new(FnHandler::new("echo", |cmd| async move {
            Ok(json!({ "echoed": cmd.field("value").cloned() }))
        })))
        .await;

    let mut client = connected_bridge(&bridge, &listener).await;

    client
        .send(&json!({"command": "echo", "id": "a", "value": 1}))
        .await;
    client
        .send(&json!({"command": "echo", "id": "b", "value": 2}))
        .await;

    let mut by_id: HashMap<String, RelayResponse> = HashMap::new();
    for _ in 0..2 {
        let response = client.recv().await;
        assert!(
            by_id.insert(response.id.clone(), response).is_none(),
            "duplicate response id"
        );
    }

    assert_eq!(by_id["a"].data.as_ref().unwrap()["echoed"], 1);
    assert_eq!(by_id["b"].data.as_ref().unwrap()["echoed"], 2);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_dispatch_order_short_circuits() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = RelayBridge::new();
    let later_calls = Arc::new(AtomicUsize::new(0));

    bridge
        .register_handler(Arc::new(FnHandler::new("work", |_| async {
            Ok(json!("first"))
        })))
        .await;
    let counter = Arc::clone(&later_calls);
    bridge
        .register_handler(Arc::new(FnHandler::new("work", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!("second")) }
        })))
        .await;

    let mut client = connected_bridge(&bridge, &listener).await;
    client.send(&json!({"command": "work", "id": "1"})).await;

    let response = client.recv().await;
    assert_eq!(response.data, Some(json!("first")));
    assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_unrecognized_command_gets_error_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = RelayBridge::new();

    let mut client = connected_bridge(&bridge, &listener).await;
    client
        .send(&json!({"command": "frobnicate", "id": "x"}))
        .await;

    let response = client.recv().await;
    assert_eq!(response.id, "x");
    assert!(response.error.unwrap().contains("Unhandled command"));
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_decode_error_does_not_reach_handlers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = RelayBridge::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    bridge
        .register_handler(Arc::new(FnHandler::new("any", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!(null)) }
        })))
        .await;

    let mut client = connected_bridge(&bridge, &listener).await;

    // command has the wrong type, but the id is salvageable
    client.send(&json!({"command": 42, "id": "bad"})).await;

    let response = client.recv().await;
    assert_eq!(response.id, "bad");
    assert!(response.error.unwrap().contains("malformed"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_handler_error_is_scoped_to_one_command() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = RelayBridge::new();
    bridge
        .register_handler(Arc::new(FnHandler::new("maybe", |cmd| async move {
            if cmd.field("fail").and_then(Value::as_bool) == Some(true) {
                Err(sidecar::SidecarError::InvalidInput("asked to".to_string()))
            } else {
                Ok(json!("ok"))
            }
        })))
        .await;

    let mut client = connected_bridge(&bridge, &listener).await;
    client
        .send(&json!({"command": "maybe", "id": "1", "fail": true}))
        .await;
    client
        .send(&json!({"command": "maybe", "id": "2", "fail": false}))
        .await;

    let mut by_id = HashMap::new();
    for _ in 0..2 {
        let response = client.recv().await;
        by_id.insert(response.id.clone(), response);
    }

    assert!(by_id["1"].is_error());
    assert_eq!(by_id["2"].data, Some(json!("ok")));
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_after_client_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = RelayBridge::new();
    bridge
        .register_handler(Arc::new(FnHandler::new("ping", |_| async {
            Ok(json!("pong"))
        })))
        .await;

    let mut client = connected_bridge(&bridge, &listener).await;
    client.send(&json!({"command": "ping", "id": "1"})).await;
    assert_eq!(client.recv().await.data, Some(json!("pong")));

    // Drop the connection; the bridge reconnects on its own
    drop(client);

    let mut client = Client::accept(&listener).await;
    client.send(&json!({"command": "ping", "id": "2"})).await;

    let response = client.recv().await;
    assert_eq!(response.id, "2");
    assert_eq!(response.data, Some(json!("pong")));
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_explicit_reconnect_with_old_socket_open() {
    // A second connect() while the first socket is still alive must tear
    // the old connection's writer down; every response lands on the new
    // connection, none on the abandoned one
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let bridge = RelayBridge::new();
    bridge
        .register_handler(Arc::new(FnHandler::new("ping", |_| async {
            Ok(json!("pong"))
        })))
        .await;

    bridge.connect(port).await;
    let _old = Client::accept(&listener).await;

    bridge.connect(port).await;
    let mut client = Client::accept(&listener).await;

    for i in 0..20 {
        client
            .send(&json!({"command": "ping", "id": format!("id-{}", i)}))
            .await;
    }

    let mut seen = std::collections::HashSet::new();
    for _ in 0..20 {
        let response = client.recv().await;
        assert_eq!(response.data, Some(json!("pong")));
        seen.insert(response.id);
    }
    assert_eq!(seen.len(), 20);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_response_produced_while_disconnected_is_redelivered() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = RelayBridge::new();
    bridge
        .register_handler(Arc::new(FnHandler::new("work", |_| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(json!("done"))
        })))
        .await;

    let mut client = connected_bridge(&bridge, &listener).await;
    client.send(&json!({"command": "work", "id": "w-1"})).await;

    // Drop the transport before the handler finishes; the response is
    // produced while disconnected, buffered, and flushed on reconnect
    drop(client);

    let mut client = Client::accept(&listener).await;
    let response = client.recv().await;
    assert_eq!(response.id, "w-1");
    assert_eq!(response.data, Some(json!("done")));
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_handlers_survive_reconnect() {
    // Registrations are process-lifetime: a handler added before the
    // first connection still answers on the second
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = RelayBridge::new();
    bridge
        .register_handler(Arc::new(FnHandler::new("ping", |_| async {
            Ok(json!("pong"))
        })))
        .await;

    let client = connected_bridge(&bridge, &listener).await;
    drop(client);

    let mut client = Client::accept(&listener).await;
    client.send(&json!({"command": "ping", "id": "9"})).await;
    assert_eq!(client.recv().await.data, Some(json!("pong")));
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_slow_handler_does_not_block_fast_one() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = RelayBridge::new();

    bridge
        .register_handler(Arc::new(FnHandler::new("slow", |_| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(json!("slow done"))
        })))
        .await;
    bridge
        .register_handler(Arc::new(FnHandler::new("fast", |_| async {
            Ok(json!("fast done"))
        })))
        .await;

    let mut client = connected_bridge(&bridge, &listener).await;
    client.send(&json!({"command": "slow", "id": "s"})).await;
    client.send(&json!({"command": "fast", "id": "f"})).await;

    // The fast command answers first even though it was sent second
    let first = client.recv().await;
    assert_eq!(first.id, "f");
    let second = client.recv().await;
    assert_eq!(second.id, "s");
    bridge.shutdown().await;
}
