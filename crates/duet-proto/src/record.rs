//! Session record and participant types.
//!
//! These mirror what the record store persists and what an `init` frame
//! exposes to the client: who holds which seat, the opaque game state, and
//! the terminal status/winner fields supplied by clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric participant identifier issued by the identity provider.
pub type ParticipantId = i64;

/// An authenticated participant.
///
/// Supplied when a connection is admitted and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable participant id.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Whether a declared `sender` string refers to this participant.
    ///
    /// Clients identify themselves either by display name or by the decimal
    /// rendering of their id (the server's own greeting uses the latter).
    pub fn matches(&self, declared: &str) -> bool {
        declared == self.name || declared.parse::<ParticipantId>().is_ok_and(|id| id == self.id)
    }
}

/// A participant's slot within a two-seat session.
///
/// Serialized with the player colors clients already understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    /// The seat taken by whoever created the session.
    #[serde(rename = "white")]
    First,
    /// The seat taken by the joining participant.
    #[serde(rename = "black")]
    Second,
}

impl Seat {
    /// Wire name of the seat.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "white",
            Self::Second => "black",
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a persisted session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Created, second seat still open.
    #[default]
    Waiting,
    /// Both seats taken.
    Active,
    /// Finished with a result.
    Completed,
    /// Left unfinished.
    Abandoned,
}

impl GameStatus {
    /// Storage / wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string is not one of the known statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for GameStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Durable representation of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub id: String,
    /// Participant holding the first seat.
    #[serde(rename = "white_player_id")]
    pub first: ParticipantId,
    /// Participant holding the second seat, once someone joined.
    #[serde(rename = "black_player_id")]
    pub second: Option<ParticipantId>,
    /// Opaque game state last reported by a client.
    pub metadata: Option<serde_json::Value>,
    /// Session status.
    pub status: GameStatus,
    /// Winner as reported by the client (e.g. a seat name or "draw").
    pub winner: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A fresh record with `first` holding the first seat.
    pub fn new(id: impl Into<String>, first: ParticipantId) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            first,
            second: None,
            metadata: None,
            status: GameStatus::Waiting,
            winner: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The seat `participant` holds in this record, if any.
    pub fn seat_of(&self, participant: ParticipantId) -> Option<Seat> {
        if self.first == participant {
            Some(Seat::First)
        } else if self.second == Some(participant) {
            Some(Seat::Second)
        } else {
            None
        }
    }

    /// Whether the second seat is still free.
    pub fn has_open_seat(&self) -> bool {
        self.second.is_none()
    }
}

/// One row of a session's move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Session the move belongs to.
    pub session_id: String,
    /// Participant who made the move.
    pub participant_id: ParticipantId,
    /// Origin square / position.
    pub from: String,
    /// Destination square / position.
    pub to: String,
    /// Moved piece as reported by the client.
    pub piece: String,
    /// Game state after the move.
    pub state_after: String,
    /// Client-side move counter.
    pub move_number: u32,
    /// When the move was stored.
    pub created_at: DateTime<Utc>,
}
