//! Actor model for session rooms.
//!
//! This module implements the `RoomActor`, which owns the membership of a
//! single session in an isolated Tokio task.
//!
//! # Architecture
//!
//! - **State Ownership**: The actor owns the member set (at most two seats).
//! - **Message Passing**: Admissions, departures and inbound envelopes all
//!   arrive as [`RoomEvent`]s on one bounded queue and are handled in order.
//! - **Lifecycle**: When the last member leaves, the record is deleted, the
//!   hub is told, and the room stops accepting members. Admissions that were
//!   already in flight are bounced back to the hub, which starts a fresh room.

use crate::state::hub::HubEvent;
use crate::store::RecordStore;
use duet_proto::Envelope;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, error};

mod handlers;
mod types;

pub use types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActorState {
    Active,
    Vacated,
}

/// The Room Actor.
///
/// Owns the state of a single session and processes events sequentially.
pub struct RoomActor {
    session_id: Arc<str>,
    room_id: u64,
    members: HashMap<ConnId, Member>,
    store: Arc<dyn RecordStore>,
    hub: mpsc::UnboundedSender<HubEvent>,
    state: ActorState,
}

impl RoomActor {
    /// Create a new Room Actor and spawn it.
    pub fn spawn(
        session_id: Arc<str>,
        room_id: u64,
        store: Arc<dyn RecordStore>,
        hub: mpsc::UnboundedSender<HubEvent>,
        capacity: usize,
    ) -> RoomHandle {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let actor = Self {
            session_id: session_id.clone(),
            room_id,
            members: HashMap::with_capacity(2),
            store,
            hub,
            state: ActorState::Active,
        };

        let span = crate::telemetry::spans::room(&session_id, room_id);
        tokio::spawn(async move { actor.run(rx).await }.instrument(span));

        RoomHandle {
            session_id,
            room_id,
            tx,
        }
    }

    /// The main actor loop. Ends once every handle is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<RoomEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Admit { admission, handle } => {
                self.handle_admit(admission, handle).await;
            }
            RoomEvent::Inbound {
                conn_id,
                raw,
                envelope,
            } => {
                self.handle_inbound(conn_id, raw, envelope).await;
            }
            RoomEvent::Leave { conn_id } => {
                self.handle_leave(conn_id).await;
            }
        }
    }

    /// Encode a server-originated envelope once for fan-out.
    fn encode(&self, envelope: &Envelope) -> Option<Arc<str>> {
        match envelope.encode() {
            Ok(text) => Some(Arc::from(text)),
            Err(e) => {
                error!(session = %self.session_id, kind = envelope.kind(), error = %e, "Failed to encode envelope");
                None
            }
        }
    }

    /// Send a server-originated envelope to a single member.
    fn send_to(&self, conn_id: &ConnId, envelope: &Envelope) {
        if let (Some(member), Some(frame)) = (self.members.get(conn_id), self.encode(envelope)) {
            member.deliver(frame);
        }
    }

    fn players_count(&self) -> usize {
        self.members.len()
    }

    fn report_store_error(&self, op: &'static str, err: &crate::store::StoreError) {
        crate::metrics::record_store_error(op, err.error_code());
        error!(session = %self.session_id, op, error = %err, "Record store call failed");
    }
}
