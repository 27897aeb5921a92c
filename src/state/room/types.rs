use crate::error::AdmissionError;
use duet_proto::{Envelope, Identity, Seat};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Unique identifier for one WebSocket connection.
pub type ConnId = Uuid;

/// Outbound queue carrying encoded text frames to one endpoint.
pub type FrameSender = mpsc::Sender<Arc<str>>;

/// An endpoint asking to be seated in a room.
///
/// The room takes ownership of `sender`; once the member is dropped the
/// endpoint's outbound queue closes.
#[derive(Debug)]
pub struct Admission {
    pub conn_id: ConnId,
    pub identity: Identity,
    pub sender: FrameSender,
    pub cancel: CancellationToken,
    pub reply_tx: oneshot::Sender<Result<RoomHandle, AdmissionError>>,
}

impl Admission {
    /// Refuse this admission.
    pub fn reject(self, err: AdmissionError) {
        crate::metrics::record_admission_rejected(err.error_code());
        let _ = self.reply_tx.send(Err(err));
    }
}

/// Events that can be sent to a Room Actor.
#[derive(Debug)]
pub enum RoomEvent {
    /// Endpoint joining. `handle` is returned to it on success.
    Admit {
        admission: Admission,
        handle: RoomHandle,
    },
    /// A parsed envelope from a member. `raw` is the original text frame,
    /// relayed verbatim where the envelope is forwarded.
    Inbound {
        conn_id: ConnId,
        raw: Arc<str>,
        envelope: Envelope,
    },
    /// Endpoint gone.
    Leave { conn_id: ConnId },
}

/// A seated connection as the room sees it.
#[derive(Debug)]
pub struct Member {
    pub conn_id: ConnId,
    pub identity: Identity,
    pub seat: Seat,
    pub sender: FrameSender,
    pub cancel: CancellationToken,
}

impl Member {
    /// Queue a frame without waiting.
    ///
    /// A full queue drops the frame and cancels the endpoint, which then
    /// leaves like any other disconnect.
    pub fn deliver(&self, frame: Arc<str>) {
        match self.sender.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                crate::metrics::record_frame_dropped();
                warn!(conn = %self.conn_id, user = self.identity.id, "Send queue exceeded, disconnecting");
                self.cancel.cancel();
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Cheap, cloneable address of a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub session_id: Arc<str>,
    pub room_id: u64,
    pub(crate) tx: mpsc::Sender<RoomEvent>,
}

impl RoomHandle {
    /// Queue an inbound envelope, waiting for space in the room's queue.
    ///
    /// Returns `false` once the room has stopped.
    pub async fn submit(&self, conn_id: ConnId, raw: Arc<str>, envelope: Envelope) -> bool {
        self.tx
            .send(RoomEvent::Inbound {
                conn_id,
                raw,
                envelope,
            })
            .await
            .is_ok()
    }
}
