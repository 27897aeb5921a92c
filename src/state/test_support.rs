//! Fake endpoints for driving the hub and rooms in tests.

use crate::error::AdmissionError;
use crate::state::hub::HubHandle;
use crate::state::room::{Admission, ConnId, FrameSender, RoomHandle};
use duet_proto::Identity;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Stands in for a connection: the receiving half of its outbound queue.
pub(crate) struct TestEndpoint {
    pub conn_id: ConnId,
    pub identity: Identity,
    pub cancel: CancellationToken,
    pub rx: mpsc::Receiver<Arc<str>>,
    sender: Option<FrameSender>,
}

impl TestEndpoint {
    pub fn new(id: i64, name: &str) -> Self {
        Self::with_capacity(id, name, 64)
    }

    pub fn with_capacity(id: i64, name: &str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            conn_id: Uuid::new_v4(),
            identity: Identity::new(id, name),
            cancel: CancellationToken::new(),
            rx,
            sender: Some(tx),
        }
    }

    /// Hand the queue's only sender over; the room then owns it.
    pub fn sender(&mut self) -> FrameSender {
        self.sender.take().expect("sender already handed over")
    }

    pub fn admission(
        &mut self,
    ) -> (
        Admission,
        oneshot::Receiver<Result<RoomHandle, AdmissionError>>,
    ) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let admission = Admission {
            conn_id: self.conn_id,
            identity: self.identity.clone(),
            sender: self.sender(),
            cancel: self.cancel.clone(),
            reply_tx,
        };
        (admission, reply_rx)
    }

    /// Frames queued so far, without waiting.
    pub fn drain(&mut self) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&frame).expect("frame is JSON"));
        }
        frames
    }
}

/// Receive the next frame and check its `type`.
pub(crate) async fn expect_frame(
    rx: &mut mpsc::Receiver<Arc<str>>,
    kind: &str,
) -> serde_json::Value {
    let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
        .unwrap_or_else(|| panic!("queue closed waiting for {kind}"));
    let value: serde_json::Value = serde_json::from_str(&frame).expect("frame is JSON");
    assert_eq!(value["type"], kind, "unexpected frame: {value}");
    value
}

/// Poll the hub until it reports `rooms` live rooms.
pub(crate) async fn wait_for_rooms(hub: &HubHandle, rooms: usize) {
    for _ in 0..200 {
        if hub.stats().await.map(|s| s.rooms) == Some(rooms) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("hub never reached {rooms} rooms");
}
