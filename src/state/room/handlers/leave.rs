//! Departure handling and room teardown.

use crate::state::hub::HubEvent;
use crate::state::room::{ActorState, ConnId, RoomActor};
use chrono::Utc;
use duet_proto::Envelope;
use tracing::info;

impl RoomActor {
    pub(crate) async fn handle_leave(&mut self, conn_id: ConnId) {
        let Some(member) = self.members.remove(&conn_id) else {
            return;
        };
        let participant = member.identity.id;
        info!(session = %self.session_id, conn = %conn_id, user = participant, "Member left");

        if let Err(e) = self.store.set_disconnected_at(participant, Utc::now()).await {
            self.report_store_error("set_disconnected_at", &e);
        }

        if !self.members.is_empty() {
            self.broadcast_envelope(&Envelope::room_status(
                self.players_count(),
                format!("{participant} has left the game"),
                false,
            ));
            return;
        }

        // Last one out: the session record goes with the room.
        let notice = match self.store.delete_session(&self.session_id).await {
            Ok(()) => Envelope::game_destroy("Game room deleted successfully"),
            Err(e) => {
                self.report_store_error("delete_session", &e);
                Envelope::error("Game deletion failed")
            }
        };
        if let Some(frame) = self.encode(&notice) {
            member.deliver(frame);
        }
        if let Err(e) = self.store.set_active_session(participant, None).await {
            self.report_store_error("set_active_session", &e);
        }

        // Dropping the member closes its outbound queue.
        drop(member);
        self.vacate();
    }

    /// Stop accepting members and tell the hub to forget this room.
    pub(super) fn vacate(&mut self) {
        if self.state == ActorState::Vacated {
            return;
        }
        self.state = ActorState::Vacated;
        info!(session = %self.session_id, room = self.room_id, "Room vacated");
        let _ = self.hub.send(HubEvent::RoomVacated {
            session_id: self.session_id.clone(),
            room_id: self.room_id,
        });
    }
}
