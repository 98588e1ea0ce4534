//! Loopback `WebSocket` round trips through the accept hook.
//!
//! Each test binds a real listener on an ephemeral port and talks to it
//! with a `tokio-tungstenite` client.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use airband_server::{AppState, serve};
use airband_session::Registry;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(Arc::new(Registry::default())));
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                serve(listener, state, "/ws", async move {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
            }
        });
        Self {
            addr,
            state,
            stop,
            task,
        }
    }

    async fn connect(&self) -> Client {
        let (client, _response) = tokio_tungstenite::connect_async(format!("ws://{}/ws", self.addr))
            .await
            .unwrap();
        client
    }

    async fn shutdown(self) {
        self.state.close_connections().await;
        self.stop.send(()).unwrap();
        tokio::time::timeout(WAIT, self.task).await.unwrap().unwrap();
    }
}

async fn send(client: &mut Client, frame: Value) {
    client.send(Message::text(frame.to_string())).await.unwrap();
}

async fn recv(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn device_and_dashboard_round_trip() {
    let server = TestServer::start().await;

    let mut dash = server.connect().await;
    send(&mut dash, json!({ "type": "dashboard" })).await;
    assert_eq!(recv(&mut dash).await, json!({ "type": "devices", "devices": [] }));

    let mut device = server.connect().await;
    send(&mut device, json!({ "type": "connect", "deviceId": "d1" })).await;
    let list = recv(&mut dash).await;
    assert_eq!(list["devices"][0]["id"], "d1");

    send(
        &mut device,
        json!({ "type": "heartbeat", "deviceId": "d1", "timestamp": 42 }),
    )
    .await;
    assert_eq!(
        recv(&mut device).await,
        json!({ "type": "heartbeat_ack", "deviceId": "d1", "timestamp": 42 })
    );
    assert_eq!(recv(&mut dash).await["devices"][0]["id"], "d1");

    device.close(None).await.unwrap();
    assert_eq!(recv(&mut dash).await, json!({ "type": "devices", "devices": [] }));

    server.shutdown().await;
}

#[tokio::test]
async fn malformed_frame_keeps_connection_open() {
    let server = TestServer::start().await;

    let mut device = server.connect().await;
    device.send(Message::text("not json")).await.unwrap();
    send(&mut device, json!({ "type": "mystery" })).await;
    send(&mut device, json!({ "type": "connect", "deviceId": "d1" })).await;
    send(
        &mut device,
        json!({ "type": "heartbeat", "deviceId": "d1", "timestamp": 7 }),
    )
    .await;
    assert_eq!(recv(&mut device).await["type"], "heartbeat_ack");

    server.shutdown().await;
}

#[tokio::test]
async fn strum_reaches_screen_over_the_wire() {
    let server = TestServer::start().await;

    let mut screen = server.connect().await;
    send(&mut screen, json!({ "type": "screen" })).await;
    let mut device = server.connect().await;
    send(&mut device, json!({ "type": "connect", "deviceId": "d1" })).await;

    // Registration is ordered per connection; wait for the screen slot to
    // be filled before strumming.
    while server.state.registry().stats().await.screens == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    send(
        &mut device,
        json!({ "type": "strum", "deviceId": "d1", "instrument": "guitar", "intensity": 0.7 }),
    )
    .await;

    assert_eq!(
        recv(&mut screen).await,
        json!({
            "type": "strum_event",
            "deviceId": "d1",
            "instrument": "guitar",
            "intensity": 0.7
        })
    );

    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_open_sockets() {
    let server = TestServer::start().await;

    let mut dash = server.connect().await;
    send(&mut dash, json!({ "type": "dashboard" })).await;
    let _ = recv(&mut dash).await;

    let state = Arc::clone(&server.state);
    tokio::time::timeout(WAIT, state.close_connections())
        .await
        .unwrap();

    let closed = loop {
        match tokio::time::timeout(WAIT, dash.next()).await.unwrap() {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break true,
            Some(Ok(_)) => {}
        }
    };
    assert!(closed);
    assert_eq!(state.registry().stats().await.dashboards, 0);
    assert_eq!(state.open_connections(), 0);

    server.shutdown().await;
}
