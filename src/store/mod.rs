//! Record store abstraction.
//!
//! Rooms consult the store during admission and persist moves, status
//! changes and participant bookkeeping while relaying. Two backends ship:
//! - [`MemoryStore`]: process-local maps (tests, `backend = "memory"`)
//! - [`SqliteStore`]: SQLx-backed SQLite with embedded migrations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duet_proto::{GameStatus, MoveRecord, ParticipantId, SessionRecord};
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{StoreBackend, StoreConfig};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("second seat already taken in session {0}")]
    SeatTaken(String),
    #[error("participant {participant} already holds the first seat of {session}")]
    SameParticipant {
        session: String,
        participant: ParticipantId,
    },
    #[error("session already exists: {0}")]
    AlreadyExists(String),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::SeatTaken(_) => "seat_taken",
            Self::SameParticipant { .. } => "same_participant",
            Self::AlreadyExists(_) => "already_exists",
            Self::Sqlx(_) => "sqlx",
            Self::Migration(_) => "migration",
            Self::Serialization(_) => "serialization",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

/// Fields of a session record a client may change. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub status: Option<GameStatus>,
    pub winner: Option<String>,
    pub state: Option<serde_json::Value>,
}

impl SessionUpdate {
    /// Whether applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.winner.is_none() && self.state.is_none()
    }
}

/// A move to append to a session's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMove {
    pub session_id: String,
    pub participant_id: ParticipantId,
    pub from: String,
    pub to: String,
    pub piece: String,
    pub state_after: String,
    pub move_number: u32,
}

/// Durable session storage used by rooms.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record with `first` holding the first seat.
    async fn create_session(
        &self,
        session: &str,
        first: ParticipantId,
    ) -> Result<SessionRecord, StoreError>;

    /// Seat `second` in the open second seat and mark the session active.
    ///
    /// Fails when the seat is taken or `second` already holds the first seat.
    async fn join_session(&self, session: &str, second: ParticipantId) -> Result<(), StoreError>;

    /// Fetch a record.
    async fn get_session(&self, session: &str) -> Result<SessionRecord, StoreError>;

    /// Apply client-supplied status, winner and state.
    async fn update_session(&self, session: &str, update: SessionUpdate)
    -> Result<(), StoreError>;

    /// Delete a record together with its move log.
    async fn delete_session(&self, session: &str) -> Result<(), StoreError>;

    /// Append one move to a session's log.
    async fn append_move(&self, mv: NewMove) -> Result<(), StoreError>;

    /// Set or clear a participant's active session.
    async fn set_active_session(
        &self,
        participant: ParticipantId,
        session: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Record when a participant last disconnected.
    async fn set_disconnected_at(
        &self,
        participant: ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// A session's move log in insertion order.
    async fn list_moves(&self, session: &str) -> Result<Vec<MoveRecord>, StoreError>;
}

/// Open the backend selected by `[store]`.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    let store: Arc<dyn RecordStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(SqliteStore::new(&config.path).await?),
    };
    Ok(store)
}
