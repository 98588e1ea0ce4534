//! Best-effort broadcast to a set of peer connections.
//!
//! The payload is serialized once and the resulting frame is shared by
//! every target. A failed delivery is logged and counted, never retried,
//! and never removes the target from its role set: removal only happens
//! when the transport reports the close.

use std::sync::Arc;

use airband_types::ServerMessage;
use tracing::{debug, error, warn};

use crate::connection::PeerConnection;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Targets whose channel accepted the frame.
    pub delivered: usize,
    /// Targets whose connection was closed or whose queue was full.
    pub failed: usize,
}

/// Send `payload` to every connection in `targets`.
pub fn broadcast_to_set<'a, I>(targets: I, payload: &ServerMessage) -> FanoutReport
where
    I: IntoIterator<Item = &'a PeerConnection>,
{
    let frame: Arc<str> = match serde_json::to_string(payload) {
        Ok(text) => Arc::from(text),
        Err(e) => {
            error!(error = %e, "Failed to serialize broadcast payload");
            return FanoutReport::default();
        }
    };

    let mut report = FanoutReport::default();
    for target in targets {
        match target.send_frame(Arc::clone(&frame)) {
            Ok(()) => report.delivered = report.delivered.saturating_add(1),
            Err(e) => {
                warn!(connection_id = %target.id(), error = %e, "Broadcast delivery failed");
                report.failed = report.failed.saturating_add(1);
            }
        }
    }

    debug!(
        delivered = report.delivered,
        failed = report.failed,
        "Broadcast complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> ServerMessage {
        ServerMessage::HeartbeatEvent {
            device_id: String::from("d1"),
        }
    }

    #[tokio::test]
    async fn every_target_gets_the_same_frame() {
        let (a, mut rx_a) = PeerConnection::channel();
        let (b, mut rx_b) = PeerConnection::channel();
        let report = broadcast_to_set([&a, &b], &event());
        assert_eq!(
            report,
            FanoutReport {
                delivered: 2,
                failed: 0
            }
        );
        let frame_a = rx_a.recv().await.unwrap();
        let frame_b = rx_b.recv().await.unwrap();
        assert!(Arc::ptr_eq(&frame_a, &frame_b));
    }

    #[tokio::test]
    async fn a_closed_target_does_not_stop_the_rest() {
        let (closed, rx_closed) = PeerConnection::channel();
        drop(rx_closed);
        let (open, mut rx_open) = PeerConnection::channel();

        let report = broadcast_to_set([&closed, &open], &event());
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert!(rx_open.recv().await.is_some());
    }

    #[test]
    fn empty_target_set_is_a_no_op() {
        let report = broadcast_to_set(std::iter::empty::<&PeerConnection>(), &event());
        assert_eq!(report, FanoutReport::default());
    }
}
