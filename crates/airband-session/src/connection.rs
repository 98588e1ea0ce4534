//! Outbound handle for one peer connection.
//!
//! A [`PeerConnection`] pairs a [`ConnectionId`] with the sending half of a
//! bounded channel of pre-serialized text frames. The transport layer owns
//! the receiving half and drains it into the socket. Sending never waits:
//! a peer that stops reading fills its queue, and further frames for it
//! are refused with [`SessionError::OutboundFull`] until it catches up.

use std::sync::Arc;

use airband_types::{ConnectionId, ServerMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SessionError;

/// A serialized outbound text frame, shared between every target of a
/// broadcast.
pub type OutboundFrame = Arc<str>;

/// Receiving half handed to the transport's writer task.
pub type OutboundReceiver = mpsc::Receiver<OutboundFrame>;

/// Frames a single peer may have queued before sends to it are refused.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Writable handle to one connected peer.
///
/// Clones refer to the same connection; equality is by [`ConnectionId`].
#[derive(Debug, Clone)]
pub struct PeerConnection {
    id: ConnectionId,
    tx: mpsc::Sender<OutboundFrame>,
}

impl PeerConnection {
    /// Create a handle with a fresh id and the receiver its writer drains.
    pub fn channel() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }

    /// The connection's identity.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an already serialized frame without waiting.
    pub fn send_frame(&self, frame: OutboundFrame) -> Result<(), SessionError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::OutboundFull(self.id),
            TrySendError::Closed(_) => SessionError::ConnectionClosed(self.id),
        })
    }

    /// Serialize and queue a single message.
    pub fn send(&self, message: &ServerMessage) -> Result<(), SessionError> {
        let text = serde_json::to_string(message)?;
        self.send_frame(Arc::from(text))
    }
}

impl PartialEq for PeerConnection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerConnection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_serializes_into_the_channel() {
        let (conn, mut rx) = PeerConnection::channel();
        conn.send(&ServerMessage::HeartbeatEvent {
            device_id: String::from("d1"),
        })
        .unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(&*frame, r#"{"type":"heartbeat_event","deviceId":"d1"}"#);
    }

    #[test]
    fn send_fails_once_the_receiver_is_gone() {
        let (conn, rx) = PeerConnection::channel();
        drop(rx);
        let err = conn.send_frame(Arc::from("{}")).unwrap_err();
        assert!(matches!(err, SessionError::ConnectionClosed(id) if id == conn.id()));
    }

    #[test]
    fn stalled_reader_fills_the_queue() {
        let (conn, mut rx) = PeerConnection::channel();
        for _ in 0..OUTBOUND_CAPACITY {
            conn.send_frame(Arc::from("{}")).unwrap();
        }
        let err = conn.send_frame(Arc::from("{}")).unwrap_err();
        assert!(matches!(err, SessionError::OutboundFull(id) if id == conn.id()));

        // Draining one frame makes room for one more.
        rx.try_recv().unwrap();
        conn.send_frame(Arc::from("{}")).unwrap();
    }

    #[test]
    fn clones_compare_equal() {
        let (a, _rx_a) = PeerConnection::channel();
        let (b, _rx_b) = PeerConnection::channel();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
