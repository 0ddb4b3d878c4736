#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

use relay_api::config::Config;
use relay_api::db::kv::MemoryStore;
use relay_api::models::chat_message::ChatMessage;
use relay_api::relay::broadcast::RoomBroadcaster;
use relay_api::relay::registry::ConnectionRegistry;
use relay_api::store::{MemoryMessageStore, MessageStore, StoreError};
use relay_api::AppState;

/// Shared secret the test "platform backend" presents when minting tickets.
pub const TEST_SECRET: &str = "relay-test-secret";

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Build an [`AppState`] backed by in-memory stores.
pub fn test_state_with_store(store: Arc<dyn MessageStore>) -> AppState {
    let config = Config {
        database_url: "postgres://unused-in-tests".to_string(),
        service_secret: TEST_SECRET.to_string(),
        port: 0,
        worker_id: 0,
    };

    let registry = Arc::new(ConnectionRegistry::new());
    let broadcast = RoomBroadcaster::new(registry.clone());

    AppState {
        store,
        kv: Arc::new(MemoryStore::new()),
        config: Arc::new(config),
        registry,
        broadcast,
    }
}

/// Start the full app on an ephemeral port. The server runs in the background.
pub async fn start_server() -> (SocketAddr, AppState) {
    start_server_with_store(Arc::new(MemoryMessageStore::new())).await
}

pub async fn start_server_with_store(store: Arc<dyn MessageStore>) -> (SocketAddr, AppState) {
    let state = test_state_with_store(store);
    let app = relay_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Mint a WS ticket through the internal HTTP endpoint.
pub async fn mint_ticket(addr: SocketAddr, user_id: &str, display_name: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/internal/v1/tickets"))
        .header("x-relay-secret", TEST_SECRET)
        .json(&serde_json::json!({ "user_id": user_id, "display_name": display_name }))
        .send()
        .await
        .expect("ticket request");

    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.expect("parse ticket response");
    body["ticket"]
        .as_str()
        .expect("ticket present")
        .to_string()
}

/// Connect to the relay WebSocket and IDENTIFY with the given ticket.
/// Returns the stream after asserting the READY frame.
pub async fn connect_and_identify(addr: SocketAddr, ticket: &str) -> WsStream {
    let url = format!("ws://{addr}/relay");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    let (mut write, mut read) = ws_stream.split();

    let identify = serde_json::json!({ "op": 2, "d": { "ticket": ticket } });
    write
        .send(tungstenite::Message::Text(identify.to_string().into()))
        .await
        .expect("send identify");

    let msg = time::timeout(Duration::from_secs(5), read.next())
        .await
        .expect("timeout waiting for READY")
        .expect("stream ended")
        .expect("ws read error");

    let text = msg.into_text().expect("not text");
    let ready: serde_json::Value = serde_json::from_str(&text).expect("parse READY");
    assert_eq!(ready["op"], 0, "READY should be op=0 (DISPATCH)");
    assert_eq!(ready["t"], "READY");
    assert!(ready["d"]["connection_id"]
        .as_str()
        .unwrap()
        .starts_with("conn_"));
    assert!(ready["d"]["heartbeat_interval"].as_u64().unwrap() > 0);

    read.reunite(write).expect("reunite")
}

/// Mint a ticket for the user and open an identified connection.
pub async fn identify_as(addr: SocketAddr, user_id: &str, display_name: &str) -> WsStream {
    let ticket = mint_ticket(addr, user_id, display_name).await;
    connect_and_identify(addr, &ticket).await
}

/// Send an op=0 action frame.
pub async fn send_action(ws: &mut WsStream, action: &str, data: serde_json::Value) {
    let frame = serde_json::json!({ "op": 0, "t": action, "d": data });
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send action");
}

/// Receive the next frame as JSON, failing the test after 5 seconds.
pub async fn recv_frame(ws: &mut WsStream) -> serde_json::Value {
    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout waiting for frame")
        .expect("stream ended")
        .expect("ws read error");

    let text = msg.into_text().expect("not text");
    serde_json::from_str(&text).expect("parse frame")
}

/// Assert that no frame arrives within the window.
pub async fn assert_silent(ws: &mut WsStream, millis: u64) {
    match time::timeout(Duration::from_millis(millis), ws.next()).await {
        Err(_elapsed) => {}
        Ok(None) => panic!("stream ended while expecting silence"),
        Ok(Some(Ok(msg))) => panic!("unexpected frame: {msg:?}"),
        Ok(Some(Err(e))) => panic!("ws error while expecting silence: {e}"),
    }
}

/// Read until the server closes the connection; returns the close code.
pub async fn expect_close(ws: &mut WsStream) -> Option<u16> {
    loop {
        match time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for close")
        {
            Some(Ok(tungstenite::Message::Close(frame))) => {
                return frame.map(|f| f.code.into());
            }
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}

// ---------------------------------------------------------------------------
// Failing store double — simulates an unavailable persistence backend
// ---------------------------------------------------------------------------

pub struct FailingMessageStore;

#[async_trait]
impl MessageStore for FailingMessageStore {
    async fn create_message(
        &self,
        _session_id: &str,
        _user_id: &str,
        _display_name: &str,
        _content: &str,
    ) -> Result<ChatMessage, StoreError> {
        Err(StoreError::Unavailable("injected failure".to_string()))
    }

    async fn list_messages(&self, _session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(Vec::new())
    }

    async fn soft_delete(&self, _message_id: i64, _deleted_by: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("injected failure".to_string()))
    }
}
