//! End-to-end tests over a real TCP listener and real WebSocket clients.

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::test_helpers::test_app_state;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let app = crate::build_router(test_app_state().await);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, identity: &str) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/{}", addr, identity))
        .await
        .unwrap();
    ws
}

/// Read frames until one parses to JSON matching `pred`.
async fn recv_until(ws: &mut Client, pred: impl Fn(&Value) -> bool) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = ws.next().await.expect("stream ended").expect("ws error");
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if pred(&value) {
                    return value;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for frame")
}

fn is_status(value: &Value, online: &[&str]) -> bool {
    value["type"] == "STATUS" && value["onlineUsers"] == json!(online)
}

#[tokio::test]
async fn test_broadcast_then_presence_on_disconnect() {
    let addr = spawn_server().await;

    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    recv_until(&mut a, |v| is_status(v, &["A", "B"])).await;

    let frame = json!({"recipient": "Chat General", "message": "hi", "isGroup": false});
    a.send(Message::text(frame.to_string())).await.unwrap();

    let is_hi = |v: &Value| v["type"] == "CHAT" && v["message"] == "hi";
    let at_a = recv_until(&mut a, is_hi).await;
    let at_b = recv_until(&mut b, is_hi).await;
    assert_eq!(at_a, at_b);
    assert_eq!(at_b["sender"], "A");
    assert_eq!(at_b["recipient"], "Chat General");
    assert!(at_b["id"].is_i64());

    a.close(None).await.unwrap();
    recv_until(&mut b, |v| is_status(v, &["B"])).await;
}

#[tokio::test]
async fn test_reconnect_closes_previous_socket() {
    let addr = spawn_server().await;

    let mut first = connect(addr, "A").await;
    recv_until(&mut first, |v| is_status(v, &["A"])).await;

    let mut second = connect(addr, "A").await;

    let code = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match first.next().await {
                Some(Ok(Message::Close(Some(frame)))) => return Some(u16::from(frame.code)),
                Some(Ok(_)) => continue,
                _ => return None,
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(code, Some(chat_hub::CLOSE_REPLACED));

    // The successor keeps working after the old session tears down.
    let frame = json!({"recipient": "A", "message": "still here"});
    second.send(Message::text(frame.to_string())).await.unwrap();
    let got = recv_until(&mut second, |v| v["message"] == "still here").await;
    assert_eq!(got["sender"], "A");
}

#[tokio::test]
async fn test_blank_identity_is_rejected() {
    let addr = spawn_server().await;

    match tokio_tungstenite::connect_async(format!("ws://{}/ws/%20", addr)).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), 400),
        other => panic!("expected HTTP 400, got {:?}", other.map(|_| ())),
    }
}
