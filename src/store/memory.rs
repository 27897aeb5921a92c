//! In-process record store.
//!
//! Sessions, move logs and participant bookkeeping live in `DashMap`s.
//! Nothing survives a restart. Used by unit tests and `backend = "memory"`.

use super::{NewMove, RecordStore, SessionUpdate, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use duet_proto::{GameStatus, MoveRecord, ParticipantId, SessionRecord};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Per-participant bookkeeping.
#[derive(Debug, Clone, Default)]
struct ParticipantState {
    active_session: Option<String>,
    disconnected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<String, SessionRecord>,
    moves: DashMap<String, Vec<MoveRecord>>,
    participants: DashMap<ParticipantId, ParticipantState>,
    create_calls: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create_session` calls seen, successful or not.
    #[cfg(test)]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    /// A participant's active session, if set.
    #[cfg(test)]
    pub fn active_session(&self, participant: ParticipantId) -> Option<String> {
        self.participants
            .get(&participant)
            .and_then(|p| p.active_session.clone())
    }

    /// When a participant last disconnected.
    #[cfg(test)]
    pub fn disconnected_at(&self, participant: ParticipantId) -> Option<DateTime<Utc>> {
        self.participants
            .get(&participant)
            .and_then(|p| p.disconnected_at)
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    #[cfg(test)]
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_session(
        &self,
        session: &str,
        first: ParticipantId,
    ) -> Result<SessionRecord, StoreError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        match self.sessions.entry(session.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(session.to_string())),
            Entry::Vacant(slot) => {
                let record = SessionRecord::new(session, first);
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn join_session(&self, session: &str, second: ParticipantId) -> Result<(), StoreError> {
        self.check()?;
        let mut record = self
            .sessions
            .get_mut(session)
            .ok_or_else(|| StoreError::NotFound(session.to_string()))?;
        if record.first == second {
            return Err(StoreError::SameParticipant {
                session: session.to_string(),
                participant: second,
            });
        }
        if record.second.is_some() {
            return Err(StoreError::SeatTaken(session.to_string()));
        }
        record.second = Some(second);
        record.status = GameStatus::Active;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get_session(&self, session: &str) -> Result<SessionRecord, StoreError> {
        self.check()?;
        self.sessions
            .get(session)
            .map(|r| r.clone())
            .ok_or_else(|| StoreError::NotFound(session.to_string()))
    }

    async fn update_session(
        &self,
        session: &str,
        update: SessionUpdate,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut record = self
            .sessions
            .get_mut(session)
            .ok_or_else(|| StoreError::NotFound(session.to_string()))?;
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(winner) = update.winner {
            record.winner = Some(winner);
        }
        if let Some(state) = update.state {
            record.metadata = Some(state);
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_session(&self, session: &str) -> Result<(), StoreError> {
        self.check()?;
        self.moves.remove(session);
        self.sessions
            .remove(session)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(session.to_string()))
    }

    async fn append_move(&self, mv: NewMove) -> Result<(), StoreError> {
        self.check()?;
        if !self.sessions.contains_key(&mv.session_id) {
            return Err(StoreError::NotFound(mv.session_id));
        }
        let record = MoveRecord {
            session_id: mv.session_id.clone(),
            participant_id: mv.participant_id,
            from: mv.from,
            to: mv.to,
            piece: mv.piece,
            state_after: mv.state_after,
            move_number: mv.move_number,
            created_at: Utc::now(),
        };
        self.moves.entry(mv.session_id).or_default().push(record);
        Ok(())
    }

    async fn set_active_session(
        &self,
        participant: ParticipantId,
        session: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.participants.entry(participant).or_default().active_session =
            session.map(str::to_string);
        Ok(())
    }

    async fn set_disconnected_at(
        &self,
        participant: ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.participants.entry(participant).or_default().disconnected_at = Some(at);
        Ok(())
    }

    async fn list_moves(&self, session: &str) -> Result<Vec<MoveRecord>, StoreError> {
        self.check()?;
        Ok(self
            .moves
            .get(session)
            .map(|m| m.clone())
            .unwrap_or_default())
    }
}
