//! End-to-end tests: the real router served on an ephemeral port, real
//! WebSocket clients, fixture order/profile/credential services.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use parley_backend::{build_router, AppState};
use parley_chats::{
    ChatError, ChatResult, CredentialVerifier, OrderDirectory, OrderRecord, OrderStatus,
    ProfileDirectory, ProfileSnapshot,
};
use parley_config::AppConfig;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

struct FixtureVerifier;

#[async_trait]
impl CredentialVerifier for FixtureVerifier {
    async fn verify(&self, token: &str) -> ChatResult<String> {
        token
            .strip_prefix("token-")
            .map(str::to_string)
            .ok_or_else(|| ChatError::auth("unknown token"))
    }
}

struct FixtureOrders {
    orders: HashMap<String, OrderRecord>,
}

#[async_trait]
impl OrderDirectory for FixtureOrders {
    async fn order(&self, order_id: &str) -> ChatResult<OrderRecord> {
        self.orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| ChatError::not_found("order", order_id))
    }
}

struct FixtureProfiles;

#[async_trait]
impl ProfileDirectory for FixtureProfiles {
    async fn profile(&self, participant_id: &str) -> ChatResult<ProfileSnapshot> {
        Ok(ProfileSnapshot {
            participant_id: participant_id.to_string(),
            display_name: format!("User {participant_id}"),
            avatar_url: None,
            rating: None,
        })
    }
}

fn assigned_order(order_id: &str, requester: &str, provider: &str) -> OrderRecord {
    OrderRecord {
        order_id: order_id.to_string(),
        requester_id: requester.to_string(),
        provider_id: Some(provider.to_string()),
        status: OrderStatus::Assigned,
    }
}

struct TestServer {
    addr: SocketAddr,
    _db_dir: TempDir,
}

impl TestServer {
    async fn spawn(orders: Vec<OrderRecord>) -> Self {
        Self::spawn_with_typing_ttl(orders, 5_000).await
    }

    async fn spawn_with_typing_ttl(orders: Vec<OrderRecord>, typing_ttl_ms: u64) -> Self {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("parley-e2e.db");

        let mut config = AppConfig::default();
        config.database.url = format!("sqlite:{}", db_path.display());
        config.database.max_connections = 5;
        config.chat.typing_ttl_ms = typing_ttl_ms;

        let pool = parley_database::initialize_database(&config.database)
            .await
            .expect("initialise database");

        let state = AppState::new(
            pool,
            &config,
            Arc::new(FixtureVerifier),
            Arc::new(FixtureOrders {
                orders: orders
                    .into_iter()
                    .map(|o| (o.order_id.clone(), o))
                    .collect(),
            }),
            Arc::new(FixtureProfiles),
        );

        let router = build_router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let addr = listener.local_addr().expect("listener address");

        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve router");
        });

        Self {
            addr,
            _db_dir: db_dir,
        }
    }

    async fn connect(&self, participant: &str) -> WsClient {
        let url = format!("ws://{}/ws?token=token-{participant}", self.addr);
        let (stream, _) = connect_async(&url).await.expect("websocket connect");

        let mut client = WsClient { stream };
        let hello = client.recv().await;
        assert_eq!(hello["type"], "hello");
        assert_eq!(hello["participant_id"], participant);
        client
    }
}

struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    async fn send(&mut self, value: Value) {
        self.stream
            .send(Message::Text(value.to_string()))
            .await
            .expect("send client event");
    }

    async fn recv(&mut self) -> Value {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("timed out waiting for server event")
                .expect("socket closed")
                .expect("websocket error");

            if let Message::Text(text) = message {
                return serde_json::from_str(&text).expect("parse server event");
            }
        }
    }

    /// Receive until an event of the given type arrives, discarding
    /// everything else.
    async fn recv_type(&mut self, event_type: &str) -> Value {
        loop {
            let event = self.recv().await;
            if event["type"] == event_type {
                return event;
            }
        }
    }

    /// Drain events until the socket goes quiet for `window`.
    async fn drain_for(&mut self, window: Duration) -> Vec<Value> {
        let mut events = Vec::new();
        loop {
            match tokio::time::timeout(window, self.stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    events.push(serde_json::from_str(&text).expect("parse server event"));
                }
                Ok(Some(Ok(_))) => {}
                _ => return events,
            }
        }
    }

    async fn join(&mut self, order_id: &str) -> String {
        self.send(json!({"type": "join_room", "order_id": order_id}))
            .await;
        let joined = self.recv_type("room_joined").await;
        joined["chat_id"].as_str().expect("chat_id").to_string()
    }

    async fn send_message(&mut self, order_id: &str, content: &str) -> Value {
        self.send(json!({"type": "send_message", "order_id": order_id, "content": content}))
            .await;
        self.recv_type("send_ack").await
    }

    async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let server = TestServer::spawn(Vec::new()).await;

    let body: Value = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .expect("health request")
        .json()
        .await
        .expect("health body");

    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn connection_without_valid_token_is_rejected() {
    let server = TestServer::spawn(Vec::new()).await;

    let url = format!("ws://{}/ws?token=garbage", server.addr);
    assert!(connect_async(&url).await.is_err());

    let url = format!("ws://{}/ws", server.addr);
    assert!(connect_async(&url).await.is_err());
}

#[tokio::test]
async fn both_parties_join_the_same_room() {
    let server = TestServer::spawn(vec![assigned_order("O42", "p1", "p2")]).await;

    let mut requester = server.connect("p1").await;
    let mut provider = server.connect("p2").await;

    let chat_a = requester.join("O42").await;
    let chat_b = provider.join("O42").await;

    assert_eq!(chat_a, chat_b);

    // Re-join returns the same chat.
    let chat_again = requester.join("O42").await;
    assert_eq!(chat_a, chat_again);
}

#[tokio::test]
async fn messages_flow_both_ways_and_history_reflects_them() {
    let server = TestServer::spawn(vec![assigned_order("O42", "p1", "p2")]).await;

    let mut requester = server.connect("p1").await;
    let mut provider = server.connect("p2").await;

    let chat_id = requester.join("O42").await;
    provider.join("O42").await;

    requester
        .send(json!({
            "type": "send_message",
            "order_id": "O42",
            "content": "Hello",
            "client_ref": "tmp-1"
        }))
        .await;

    let ack = requester.recv_type("send_ack").await;
    assert_eq!(ack["client_ref"], "tmp-1");
    assert_eq!(ack["message"]["content"], "Hello");
    assert_eq!(ack["message"]["seq"], 1);
    assert_eq!(ack["message"]["delivered"], true);

    let received = provider.recv_type("message_received").await;
    assert_eq!(received["message"]["content"], "Hello");
    assert_eq!(received["message"]["sender_id"], "p1");

    let ack = provider.send_message("O42", "Hi").await;
    assert_eq!(ack["message"]["seq"], 2);
    assert!(ack.get("client_ref").map_or(true, Value::is_null));

    requester
        .send(json!({"type": "fetch_history", "chat_id": chat_id}))
        .await;
    let history = requester.recv_type("history").await;

    let contents: Vec<&str> = history["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["Hello", "Hi"]);
    assert!(history["next_cursor"].is_null());
    assert_eq!(history["partner"]["participant_id"], "p2");
    assert_eq!(history["partner"]["display_name"], "User p2");
    assert_eq!(history["order"]["order_id"], "O42");
}

#[tokio::test]
async fn history_pages_union_to_the_full_log() {
    let server = TestServer::spawn(vec![assigned_order("O42", "p1", "p2")]).await;

    let mut requester = server.connect("p1").await;
    let chat_id = requester.join("O42").await;

    for i in 1..=15 {
        requester.send_message("O42", &format!("m{i}")).await;
    }

    requester
        .send(json!({"type": "fetch_history", "chat_id": chat_id, "limit": 10}))
        .await;
    let newest = requester.recv_type("history").await;
    let newest_seqs: Vec<i64> = newest["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(newest_seqs, (6..=15).collect::<Vec<i64>>());

    let cursor = newest["next_cursor"].as_i64().expect("older page exists");

    requester
        .send(json!({
            "type": "fetch_history",
            "chat_id": chat_id,
            "cursor": cursor,
            "limit": 10
        }))
        .await;
    let older = requester.recv_type("history").await;
    let older_seqs: Vec<i64> = older["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(older_seqs, (1..=5).collect::<Vec<i64>>());
    assert!(older["next_cursor"].is_null());
}

#[tokio::test]
async fn disconnect_mid_typing_stops_exactly_once_and_goes_offline() {
    let server =
        TestServer::spawn_with_typing_ttl(vec![assigned_order("O42", "p1", "p2")], 100).await;

    let mut requester = server.connect("p1").await;
    let mut provider = server.connect("p2").await;

    requester.join("O42").await;
    provider.join("O42").await;

    requester
        .send(json!({"type": "start_typing", "order_id": "O42"}))
        .await;

    let started = provider.recv_type("typing_started").await;
    assert_eq!(started["participant_id"], "p1");

    requester.close().await;

    let events = provider.drain_for(Duration::from_millis(600)).await;
    let stops = events
        .iter()
        .filter(|e| e["type"] == "typing_stopped")
        .count();
    let offline = events
        .iter()
        .filter(|e| e["type"] == "partner_offline")
        .count();

    assert_eq!(stops, 1, "expiry must fire exactly once: {events:?}");
    assert_eq!(offline, 1, "one offline notice for the last session: {events:?}");
}

#[tokio::test]
async fn second_device_defers_offline_notice() {
    let server = TestServer::spawn(vec![assigned_order("O42", "p1", "p2")]).await;

    let phone = {
        let mut client = server.connect("p1").await;
        client.join("O42").await;
        client
    };
    let mut laptop = server.connect("p1").await;
    laptop.join("O42").await;

    let mut provider = server.connect("p2").await;
    provider.join("O42").await;

    phone.close().await;
    let events = provider.drain_for(Duration::from_millis(300)).await;
    assert!(
        events.iter().all(|e| e["type"] != "partner_offline"),
        "p1 still has the laptop connected: {events:?}"
    );

    laptop.close().await;
    let offline = provider.recv_type("partner_offline").await;
    assert_eq!(offline["participant_id"], "p1");
}

#[tokio::test]
async fn mark_read_emits_receipt_to_the_sender() {
    let server = TestServer::spawn(vec![assigned_order("O42", "p1", "p2")]).await;

    let mut requester = server.connect("p1").await;
    let mut provider = server.connect("p2").await;

    requester.join("O42").await;
    requester.send_message("O42", "Hello").await;

    provider.join("O42").await;
    provider
        .send(json!({"type": "mark_read", "order_id": "O42"}))
        .await;

    let receipt = requester.recv_type("read_receipt").await;
    assert_eq!(receipt["reader_id"], "p2");

    provider
        .send(json!({"type": "list_conversations"}))
        .await;
    let conversations = provider.recv_type("conversations").await;
    let items = conversations["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["unread_count"], 0);
    assert_eq!(items[0]["last_message_preview"], "Hello");
    assert_eq!(items[0]["partner"]["participant_id"], "p1");
}

#[tokio::test]
async fn outsiders_and_unknown_orders_get_error_acks() {
    let server = TestServer::spawn(vec![assigned_order("O42", "p1", "p2")]).await;

    let mut requester = server.connect("p1").await;
    let chat_id = requester.join("O42").await;

    let mut intruder = server.connect("p3").await;

    intruder
        .send(json!({"type": "join_room", "order_id": "O42"}))
        .await;
    let error = intruder.recv_type("error").await;
    assert_eq!(error["code"], "permission_error");

    intruder
        .send(json!({"type": "fetch_history", "chat_id": chat_id}))
        .await;
    let error = intruder.recv_type("error").await;
    assert_eq!(error["code"], "permission_error");

    requester
        .send(json!({"type": "join_room", "order_id": "O404"}))
        .await;
    let error = requester.recv_type("error").await;
    assert_eq!(error["code"], "not_found");
}

#[tokio::test]
async fn malformed_events_and_pings_keep_the_connection_alive() {
    let server = TestServer::spawn(vec![assigned_order("O42", "p1", "p2")]).await;

    let mut client = server.connect("p1").await;

    client
        .stream
        .send(Message::Text("not json".to_string()))
        .await
        .expect("send garbage");
    let error = client.recv_type("error").await;
    assert_eq!(error["code"], "validation_error");

    client.send(json!({"type": "ping"})).await;
    let pong = client.recv_type("pong").await;
    assert_eq!(pong["type"], "pong");

    // The connection survived both.
    let chat_id = client.join("O42").await;
    assert!(!chat_id.is_empty());
}
