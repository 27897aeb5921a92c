//! Fan-out of frames to room members.

use super::{ConnId, RoomActor};
use duet_proto::Envelope;
use std::sync::Arc;

impl RoomActor {
    /// Queue `frame` for every member except `exclude`.
    pub(crate) fn broadcast(&self, frame: Arc<str>, exclude: Option<&ConnId>) {
        for (conn_id, member) in &self.members {
            if exclude == Some(conn_id) {
                continue;
            }
            member.deliver(frame.clone());
        }
    }

    /// Encode once and queue for every member.
    pub(crate) fn broadcast_envelope(&self, envelope: &Envelope) {
        if let Some(frame) = self.encode(envelope) {
            self.broadcast(frame, None);
        }
    }
}
