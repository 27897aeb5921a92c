//! Session hub: the registry of live rooms.
//!
//! The hub is a single task owning the `session id -> room` map. It creates
//! a room on the first admission for a session, forwards admissions and
//! departures to it, and forgets it once the room reports it has emptied.
//! The hub never awaits I/O: every hand-off to a room is a `try_send`.

use crate::error::AdmissionError;
use crate::state::room::{Admission, ConnId, FrameSender, RoomActor, RoomEvent, RoomHandle};
use crate::store::RecordStore;
use duet_proto::Identity;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Events that can be sent to the Hub.
#[derive(Debug)]
pub enum HubEvent {
    /// Route an admission to the session's room, creating it if needed.
    Admit {
        session_id: Arc<str>,
        admission: Admission,
    },
    /// An endpoint is gone; forward the departure to its room.
    Dismiss { room: RoomHandle, conn_id: ConnId },
    /// A room emptied and stopped accepting members.
    RoomVacated { session_id: Arc<str>, room_id: u64 },
    /// Snapshot of the registry.
    Stats { reply_tx: oneshot::Sender<HubStats> },
}

/// Registry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub rooms: usize,
}

/// Cloneable address of the hub task.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubEvent>,
}

impl HubHandle {
    /// Ask for a seat in `session_id`'s room.
    ///
    /// On success the room already holds `sender` and has queued `init`.
    pub async fn admit(
        &self,
        session_id: Arc<str>,
        conn_id: ConnId,
        identity: Identity,
        sender: FrameSender,
        cancel: CancellationToken,
    ) -> Result<RoomHandle, AdmissionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let admission = Admission {
            conn_id,
            identity,
            sender,
            cancel,
            reply_tx,
        };
        self.tx
            .send(HubEvent::Admit {
                session_id,
                admission,
            })
            .map_err(|_| AdmissionError::HubUnavailable)?;
        reply_rx
            .await
            .unwrap_or(Err(AdmissionError::HubUnavailable))
    }

    /// Report that an admitted endpoint is gone.
    pub fn dismiss(&self, room: RoomHandle, conn_id: ConnId) {
        if self.tx.send(HubEvent::Dismiss { room, conn_id }).is_err() {
            debug!(conn = %conn_id, "Hub stopped, dismissal dropped");
        }
    }

    /// Current registry size, or `None` if the hub is gone.
    pub async fn stats(&self) -> Option<HubStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(HubEvent::Stats { reply_tx }).ok()?;
        reply_rx.await.ok()
    }
}

/// The Hub actor.
pub struct Hub {
    rooms: HashMap<Arc<str>, RoomHandle>,
    next_room_id: u64,
    store: Arc<dyn RecordStore>,
    room_queue: usize,
    tx: mpsc::UnboundedSender<HubEvent>,
}

impl Hub {
    /// Create the hub and spawn it.
    pub fn spawn(store: Arc<dyn RecordStore>, room_queue: usize) -> HubHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        let hub = Self {
            rooms: HashMap::new(),
            next_room_id: 0,
            store,
            room_queue,
            tx: tx.clone(),
        };

        tokio::spawn(async move {
            hub.run(rx).await;
        });

        HubHandle { tx }
    }

    /// The main hub loop.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HubEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Admit {
                session_id,
                admission,
            } => {
                self.handle_admit(session_id, admission, true);
            }
            HubEvent::Dismiss { room, conn_id } => {
                Self::handle_dismiss(room, conn_id);
            }
            HubEvent::RoomVacated {
                session_id,
                room_id,
            } => {
                self.handle_vacated(session_id, room_id);
            }
            HubEvent::Stats { reply_tx } => {
                let _ = reply_tx.send(HubStats {
                    rooms: self.rooms.len(),
                });
            }
        }
    }

    fn room_for(&mut self, session_id: &Arc<str>) -> RoomHandle {
        if let Some(room) = self.rooms.get(session_id) {
            return room.clone();
        }

        self.next_room_id += 1;
        let room = RoomActor::spawn(
            session_id.clone(),
            self.next_room_id,
            self.store.clone(),
            self.tx.clone(),
            self.room_queue,
        );
        info!(session = %session_id, room = room.room_id, "Room created");
        crate::metrics::add_rooms(1);
        self.rooms.insert(session_id.clone(), room.clone());
        room
    }

    fn handle_admit(&mut self, session_id: Arc<str>, admission: Admission, retry: bool) {
        let room = self.room_for(&session_id);
        let event = RoomEvent::Admit {
            admission,
            handle: room.clone(),
        };

        match room.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                if let Some(admission) = into_admission(event) {
                    warn!(session = %session_id, conn = %admission.conn_id, "Room queue full, refusing admission");
                    admission.reject(AdmissionError::RoomBusy);
                }
            }
            Err(TrySendError::Closed(event)) => {
                // The room task is gone without reporting; replace it once.
                self.forget(&session_id, room.room_id);
                if let Some(admission) = into_admission(event) {
                    if retry {
                        self.handle_admit(session_id, admission, false);
                    } else {
                        admission.reject(AdmissionError::RoomBusy);
                    }
                }
            }
        }
    }

    fn handle_dismiss(room: RoomHandle, conn_id: ConnId) {
        match room.tx.try_send(RoomEvent::Leave { conn_id }) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                // Departures must not be lost; wait for space off the hub loop.
                tokio::spawn(async move {
                    let _ = room.tx.send(event).await;
                });
            }
        }
    }

    fn handle_vacated(&mut self, session_id: Arc<str>, room_id: u64) {
        if self.forget(&session_id, room_id) {
            info!(session = %session_id, room = room_id, "Room removed");
        }
    }

    /// Remove the registry entry if it still points at `room_id`.
    fn forget(&mut self, session_id: &Arc<str>, room_id: u64) -> bool {
        if self
            .rooms
            .get(session_id)
            .is_some_and(|room| room.room_id == room_id)
        {
            self.rooms.remove(session_id);
            crate::metrics::add_rooms(-1);
            true
        } else {
            false
        }
    }
}

fn into_admission(event: RoomEvent) -> Option<Admission> {
    match event {
        RoomEvent::Admit { admission, .. } => Some(admission),
        _ => None,
    }
}
