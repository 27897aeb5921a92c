//! Dispatch of inbound envelopes by type.
//!
//! `move` and `chat` frames are relayed as the original text. Everything
//! else the room sends is encoded here.

use crate::state::room::{ConnId, RoomActor};
use crate::store::{NewMove, SessionUpdate};
use duet_proto::{Envelope, GameStatus, MoveBody, PongBody};
use std::sync::Arc;
use tracing::{debug, warn};

impl RoomActor {
    pub(crate) async fn handle_inbound(&mut self, conn_id: ConnId, raw: Arc<str>, envelope: Envelope) {
        if !self.members.contains_key(&conn_id) {
            debug!(session = %self.session_id, conn = %conn_id, kind = envelope.kind(), "Envelope from non-member dropped");
            return;
        }
        crate::metrics::record_envelope(envelope.kind());

        match envelope {
            Envelope::Move(body) => self.handle_move(conn_id, raw, body).await,
            Envelope::Chat(_) | Envelope::RoomStatus(_) => self.broadcast(raw, None),
            Envelope::SetActiveGame { game_id } => self.handle_set_active(game_id).await,
            Envelope::GameOver { .. } => {
                self.clear_active_sessions().await;
                self.broadcast(raw, None);
            }
            Envelope::Ping { sender } => self.handle_ping(conn_id, sender),
            other => {
                debug!(session = %self.session_id, conn = %conn_id, kind = other.kind(), "Dropping envelope");
            }
        }
    }

    /// Relay to the opponent, then persist when the sender is a member.
    async fn handle_move(&self, conn_id: ConnId, raw: Arc<str>, body: MoveBody) {
        self.broadcast(raw, Some(&conn_id));

        let MoveBody {
            from,
            to,
            sender,
            piece,
            fen,
            state,
            move_number,
            game_status,
            winner,
        } = body;

        let author = sender.as_deref().and_then(|declared| {
            self.members
                .values()
                .find(|m| m.identity.matches(declared))
        });
        let Some(author) = author else {
            debug!(session = %self.session_id, sender = ?sender, "Unattributed move relayed without persisting");
            return;
        };

        let mv = NewMove {
            session_id: self.session_id.to_string(),
            participant_id: author.identity.id,
            from,
            to,
            piece: piece.unwrap_or_else(|| "unknown".to_string()),
            state_after: fen.unwrap_or_default(),
            move_number: move_number.unwrap_or_default(),
        };
        if let Err(e) = self.store.append_move(mv).await {
            self.report_store_error("append_move", &e);
        }

        let status = match game_status.as_deref().map(str::parse::<GameStatus>) {
            Some(Ok(status)) => Some(status),
            Some(Err(e)) => {
                warn!(session = %self.session_id, error = %e, "Ignoring unknown game status");
                None
            }
            None => None,
        };
        let update = SessionUpdate {
            status,
            winner,
            state,
        };
        if !update.is_empty()
            && let Err(e) = self.store.update_session(&self.session_id, update).await
        {
            self.report_store_error("update_session", &e);
        }
    }

    async fn handle_set_active(&self, game_id: Option<String>) {
        let target = game_id.unwrap_or_else(|| self.session_id.to_string());
        for member in self.members.values() {
            if let Err(e) = self
                .store
                .set_active_session(member.identity.id, Some(&target))
                .await
            {
                self.report_store_error("set_active_session", &e);
            }
        }
    }

    async fn clear_active_sessions(&self) {
        for member in self.members.values() {
            if let Err(e) = self.store.set_active_session(member.identity.id, None).await {
                self.report_store_error("set_active_session", &e);
            }
        }
    }

    fn handle_ping(&self, conn_id: ConnId, sender: Option<String>) {
        let who = sender.clone().or_else(|| {
            self.members
                .get(&conn_id)
                .map(|m| m.identity.name.clone())
        });
        let count = self.players_count();
        let pong = Envelope::Pong(PongBody {
            message: format!(
                "Pong from {}. Room has {count} players",
                who.as_deref().unwrap_or("unknown")
            ),
            sender,
            players_count: count,
        });
        self.broadcast_envelope(&pong);
    }
}
