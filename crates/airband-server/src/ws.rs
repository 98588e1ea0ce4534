//! `WebSocket` accept hook.
//!
//! Every peer (device, dashboard or screen) connects to the same path.
//! The upgraded socket is split in two:
//!
//! - a writer task drains the connection's outbound channel into the
//!   socket and sends a Close frame once the channel is finished
//! - the reader loop feeds text frames to the [`EventRouter`] until the
//!   peer goes away or the server shuts down
//!
//! When the reader loop ends the session's disconnect path runs exactly
//! once. That drops the last outbound handle, which in turn lets the
//! writer finish.
//!
//! [`EventRouter`]: airband_session::EventRouter

use std::sync::Arc;

use airband_session::{OutboundReceiver, PeerConnection, Session};
use airband_types::ConnectionId;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` session.
///
/// # Route
///
/// `GET /ws` (configurable)
pub async fn ws_session(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let mut shutdown = state.subscribe_shutdown();
    let (connection, outbound) = PeerConnection::channel();
    let connection_id = connection.id();
    info!(%connection_id, "Peer connected");

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_frames(sink, outbound, connection_id));
    let mut session = Session::new(connection);

    // Shutdown may already be under way.
    if !*shutdown.borrow_and_update() {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!(%connection_id, "Server shutting down, closing connection");
                    break;
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            state.router().handle_text(&mut session, text.as_str()).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(%connection_id, "Peer closed the connection");
                            break;
                        }
                        Some(Ok(Message::Binary(_))) => {
                            debug!(%connection_id, "Ignoring binary frame");
                        }
                        Some(Ok(_)) => {
                            // Ping/pong are answered by the socket itself.
                        }
                        Some(Err(e)) => {
                            debug!(%connection_id, error = %e, "WebSocket error");
                            break;
                        }
                    }
                }
            }
        }
    }

    let role = session.role().to_string();
    state.router().disconnect(session).await;
    if let Err(e) = writer.await {
        warn!(%connection_id, error = %e, "Writer task ended abnormally");
    }
    info!(%connection_id, %role, "Peer disconnected");
}

/// Forward queued frames to the socket. Ends with a Close frame when every
/// outbound handle has been dropped, or early if the socket fails.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: OutboundReceiver,
    connection_id: ConnectionId,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(frame.to_string().into())).await {
            debug!(%connection_id, error = %e, "Send failed, stopping writer");
            return;
        }
    }
    if let Err(e) = sink.send(Message::Close(None)).await {
        debug!(%connection_id, error = %e, "Close frame not delivered");
    }
}
