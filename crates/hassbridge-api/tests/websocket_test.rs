#![allow(clippy::unwrap_used)]
// Integration tests for the WebSocket channel against an in-process hub.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use hassbridge_api::{
    Credentials, EntityDelivery, Error, HubConnection, HubGateway, WsGateway,
};

// ── Fake hub ────────────────────────────────────────────────────────

type Received = Arc<Mutex<Vec<Value>>>;

async fn send(ws: &mut WebSocketStream<TcpStream>, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Option<Value> {
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Text(text)) => return Some(serde_json::from_str(&text).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

/// Accept one client, authenticate it against `"good"`, then answer commands.
async fn spawn_hub() -> (String, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received: Received = Arc::default();
    let log = Arc::clone(&received);

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        send(&mut ws, json!({ "type": "auth_required", "ha_version": "2026.1.0" })).await;
        let auth = next_json(&mut ws).await.unwrap();
        if auth["access_token"] != "good" {
            send(&mut ws, json!({ "type": "auth_invalid", "message": "Invalid access token" })).await;
            return;
        }
        send(&mut ws, json!({ "type": "auth_ok", "ha_version": "2026.1.0" })).await;

        while let Some(msg) = next_json(&mut ws).await {
            log.lock().unwrap().push(msg.clone());
            let id = msg["id"].clone();
            match msg["type"].as_str().unwrap_or_default() {
                "get_states" => {
                    let states = json!([{
                        "entity_id": "light.kitchen",
                        "state": "on",
                        "attributes": { "friendly_name": "Kitchen" },
                        "last_changed": "2026-01-01T00:00:00+00:00",
                        "last_updated": "2026-01-01T00:00:00+00:00",
                        "context": { "id": "c1" }
                    }]);
                    send(&mut ws, json!({ "id": id, "type": "result", "success": true, "result": states })).await;
                }
                "subscribe_entities" => {
                    send(&mut ws, json!({ "id": id, "type": "result", "success": true, "result": null })).await;
                    send(&mut ws, json!({ "id": id, "type": "event", "event": {
                        "a": { "light.kitchen": { "s": "on", "a": {}, "c": "c1", "lc": 1_767_225_600.0 } }
                    }}))
                    .await;
                    send(&mut ws, json!({ "id": id, "type": "event", "event": {
                        "c": { "light.kitchen": { "+": { "s": "off", "lc": 1_767_225_660.0 } } }
                    }}))
                    .await;
                }
                "call_service" if msg["domain"] == "light" => {
                    send(&mut ws, json!({ "id": id, "type": "result", "success": true, "result": { "context": {} } })).await;
                }
                "call_service" => {
                    send(&mut ws, json!({ "id": id, "type": "result", "success": false,
                        "error": { "code": "not_found", "message": "Service not found." } }))
                    .await;
                }
                "close_me" => {
                    let _ = ws.close(None).await;
                    return;
                }
                "ignore_me" => {}
                _ => {
                    send(&mut ws, json!({ "id": id, "type": "result", "success": true, "result": [] })).await;
                }
            }
        }
    });

    (format!("http://{addr}"), received)
}

fn creds(url: &str, token: &str) -> Credentials {
    Credentials::long_lived(url, SecretString::from(token.to_string())).unwrap()
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

// ── Handshake ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_token_is_authentication_error() {
    let (url, _) = spawn_hub().await;
    let result = WsGateway::default().open(&creds(&url, "bad")).await;

    match result {
        Err(Error::Authentication { message }) => assert_eq!(message, "Invalid access token"),
        Err(other) => panic!("expected Authentication error, got: {other:?}"),
        Ok(_) => panic!("expected Authentication error, got a connection"),
    }
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_states_decodes_records() {
    let (url, _) = spawn_hub().await;
    let conn = WsGateway::default().open(&creds(&url, "good")).await.unwrap();

    let states = conn.fetch_states().await.unwrap();

    assert_eq!(states.len(), 1);
    assert_eq!(states[0].entity_id, "light.kitchen");
    assert_eq!(states[0].friendly_name(), Some("Kitchen"));
}

#[tokio::test]
async fn test_call_service_sends_service_data() {
    let (url, received) = spawn_hub().await;
    let conn = WsGateway::default().open(&creds(&url, "good")).await.unwrap();

    let mut data = Map::new();
    data.insert("entity_id".into(), json!(["light.a", "light.b"]));
    conn.call_service("light", "turn_off", data).await.unwrap();

    let sent = received.lock().unwrap().last().cloned().unwrap();
    assert_eq!(sent["type"], "call_service");
    assert_eq!(sent["domain"], "light");
    assert_eq!(sent["service"], "turn_off");
    assert_eq!(sent["service_data"], json!({ "entity_id": ["light.a", "light.b"] }));
}

#[tokio::test]
async fn test_rejected_command_carries_hub_error() {
    let (url, _) = spawn_hub().await;
    let conn = WsGateway::default().open(&creds(&url, "good")).await.unwrap();

    let err = conn.call_service("nope", "nothing", Map::new()).await.unwrap_err();

    assert!(
        matches!(err, Error::HubRejected { ref code, .. } if code == "not_found"),
        "got: {err:?}"
    );
    assert!(err.to_string().contains("Service not found."), "got: {err}");
}

#[tokio::test]
async fn test_request_uses_named_command() {
    let (url, received) = spawn_hub().await;
    let conn = WsGateway::default().open(&creds(&url, "good")).await.unwrap();

    let rows = conn.request("config/area_registry/list", Map::new()).await.unwrap();

    assert_eq!(rows, json!([]));
    let sent = received.lock().unwrap().last().cloned().unwrap();
    assert_eq!(sent["type"], "config/area_registry/list");
    assert!(sent["id"].is_u64());
}

#[tokio::test]
async fn test_unanswered_command_times_out() {
    let (url, _) = spawn_hub().await;
    let conn = WsGateway::new(Duration::from_millis(200))
        .open(&creds(&url, "good"))
        .await
        .unwrap();

    let err = conn.request("ignore_me", Map::new()).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got: {err:?}");
    assert!(!conn.is_closed());
}

// ── Subscriptions ───────────────────────────────────────────────────

#[tokio::test]
async fn test_subscription_delivers_snapshot_then_patch() {
    let (url, _) = spawn_hub().await;
    let conn = WsGateway::default().open(&creds(&url, "good")).await.unwrap();

    let seen: Arc<Mutex<Vec<EntityDelivery>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let sub = conn
        .subscribe_entities(Arc::new(move |d| sink.lock().unwrap().push(d)))
        .await
        .unwrap();

    wait_until(|| seen.lock().unwrap().len() == 2).await;
    let seen = seen.lock().unwrap();
    match (&seen[0], &seen[1]) {
        (EntityDelivery::Snapshot(states), EntityDelivery::Patch(patch)) => {
            assert_eq!(states[0].state, "on");
            assert_eq!(patch.changed[0].state.as_deref(), Some("off"));
        }
        other => panic!("unexpected deliveries: {other:?}"),
    }
    assert!(sub.id() > 0);
}

// ── Closure ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_server_close_fails_pending_and_marks_closed() {
    let (url, _) = spawn_hub().await;
    let conn = WsGateway::default().open(&creds(&url, "good")).await.unwrap();

    let err = conn.request("close_me", Map::new()).await.unwrap_err();
    assert!(matches!(err, Error::WebSocketClosed { .. }), "got: {err:?}");

    wait_until(|| conn.is_closed()).await;
    let err = conn.fetch_states().await.unwrap_err();
    assert!(matches!(err, Error::WebSocketClosed { .. }), "got: {err:?}");
}
