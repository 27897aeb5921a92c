//! Admission of connections into a room.
//!
//! The seat comes from the session record, never from arrival order. The
//! record is created by the first admission and joined by the second.

use crate::error::AdmissionError;
use crate::state::hub::HubEvent;
use crate::state::room::{ActorState, Admission, Member, RoomActor, RoomHandle};
use crate::store::StoreError;
use duet_proto::{Envelope, Seat, SessionRecord};
use tracing::{debug, info};

impl RoomActor {
    pub(crate) async fn handle_admit(&mut self, admission: Admission, handle: RoomHandle) {
        if self.state == ActorState::Vacated {
            debug!(session = %self.session_id, conn = %admission.conn_id, "Room vacated, returning admission to hub");
            let event = HubEvent::Admit {
                session_id: self.session_id.clone(),
                admission,
            };
            if let Err(err) = self.hub.send(event)
                && let HubEvent::Admit { admission, .. } = err.0
            {
                admission.reject(AdmissionError::HubUnavailable);
            }
            return;
        }

        let (record, seat) = match self.claim_seat(&admission).await {
            Ok(seated) => seated,
            Err(e) => {
                info!(
                    session = %self.session_id,
                    conn = %admission.conn_id,
                    user = admission.identity.id,
                    reason = e.error_code(),
                    "Admission refused"
                );
                admission.reject(e);
                if self.members.is_empty() {
                    self.vacate();
                }
                return;
            }
        };

        let Admission {
            conn_id,
            identity,
            sender,
            cancel,
            reply_tx,
        } = admission;

        info!(session = %self.session_id, conn = %conn_id, user = identity.id, seat = %seat, "Member admitted");

        self.members.insert(
            conn_id,
            Member {
                conn_id,
                identity: identity.clone(),
                seat,
                sender,
                cancel,
            },
        );

        let count = self.players_count();
        self.send_to(
            &conn_id,
            &Envelope::Init {
                game: record,
                color: seat,
                user: identity.clone(),
            },
        );
        self.send_to(
            &conn_id,
            &Envelope::room_status(count, "You have joined the room", count == 2),
        );

        if reply_tx.send(Ok(handle)).is_err() {
            debug!(session = %self.session_id, conn = %conn_id, "Endpoint went away during admission");
            self.handle_leave(conn_id).await;
            return;
        }

        if count == 2 {
            self.broadcast_envelope(&Envelope::room_status(
                count,
                "Both players have joined the game!",
                true,
            ));
            self.broadcast_envelope(&Envelope::chat(identity.id.to_string(), "Hello"));
        }
    }

    /// Capacity and identity checks, then create-or-join against the store.
    async fn claim_seat(&self, admission: &Admission) -> Result<(SessionRecord, Seat), AdmissionError> {
        let participant = admission.identity.id;

        if self.players_count() >= 2 {
            return Err(AdmissionError::RoomFull);
        }
        if self
            .members
            .values()
            .any(|m| m.identity.id == participant)
        {
            return Err(AdmissionError::AlreadyConnected(participant));
        }

        match self.store.get_session(&self.session_id).await {
            Ok(record) => {
                if record.seat_of(participant).is_none() && record.has_open_seat() {
                    self.store
                        .join_session(&self.session_id, participant)
                        .await
                        .map_err(|e| {
                            self.report_store_error("join_session", &e);
                            AdmissionError::JoinFailed(e)
                        })?;
                }
            }
            Err(StoreError::NotFound(_)) => {
                self.store
                    .create_session(&self.session_id, participant)
                    .await
                    .map_err(|e| {
                        self.report_store_error("create_session", &e);
                        AdmissionError::CreateFailed(e)
                    })?;
            }
            Err(e) => {
                self.report_store_error("get_session", &e);
                return Err(AdmissionError::Lookup(e));
            }
        }

        let record = self
            .store
            .get_session(&self.session_id)
            .await
            .map_err(|e| {
                self.report_store_error("get_session", &e);
                AdmissionError::Lookup(e)
            })?;
        let seat = record
            .seat_of(participant)
            .ok_or(AdmissionError::NotSeated(participant))?;
        Ok((record, seat))
    }
}
