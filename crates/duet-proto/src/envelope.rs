//! The tagged JSON envelope exchanged over a session connection.
//!
//! Every frame is one JSON object whose `type` field selects the variant.
//! Fields that a variant does not know about are ignored, and a `type` the
//! server does not recognise decodes to [`Envelope::Unknown`] so that it can
//! be dropped without treating the frame as malformed.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::record::{Identity, Seat, SessionRecord};
use crate::MAX_ENVELOPE_LEN;

/// One self-describing unit of wire traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Sent once to a newly admitted participant.
    #[serde(rename = "init")]
    Init {
        /// Persisted session state.
        game: SessionRecord,
        /// Assigned seat.
        color: Seat,
        /// The participant's own identity.
        user: Identity,
    },

    /// Terminal or informational error.
    #[serde(rename = "error")]
    Error {
        /// Human-readable reason.
        message: String,
    },

    /// Membership change notice.
    #[serde(rename = "room_status")]
    RoomStatus(RoomStatusBody),

    /// The session record was deleted after the room emptied.
    #[serde(rename = "game-destroy")]
    GameDestroy {
        /// Human-readable notice.
        message: String,
    },

    /// Reply to `ping`.
    #[serde(rename = "pong")]
    Pong(PongBody),

    /// A game move relayed to the opponent.
    #[serde(rename = "move")]
    Move(MoveBody),

    /// Free-text chat relayed to everyone in the room.
    #[serde(rename = "chat")]
    Chat(ChatBody),

    /// Marks the session as each member's active session.
    #[serde(rename = "set-active-game")]
    SetActiveGame {
        /// Session to mark; defaults to the room's own session.
        #[serde(default, rename = "gameid", skip_serializing_if = "Option::is_none")]
        game_id: Option<String>,
    },

    /// The game ended; clears every member's active session.
    #[serde(rename = "game-over")]
    GameOver {
        /// Declared sender.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
        /// Terminal status reported by the client.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_status: Option<String>,
        /// Winner reported by the client.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<String>,
    },

    /// Liveness check answered with [`Envelope::Pong`] to every member.
    #[serde(rename = "ping")]
    Ping {
        /// Declared sender.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
    },

    /// Any `type` the server does not know.
    #[serde(other)]
    Unknown,
}

/// Body of a `room_status` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatusBody {
    /// Members currently connected.
    pub players_count: usize,
    /// Human-readable notice.
    #[serde(default)]
    pub message: String,
    /// Whether both seats are connected.
    #[serde(default)]
    pub ready_to_play: bool,
}

/// Body of a `pong` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongBody {
    /// Sender of the `ping` being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Human-readable summary.
    #[serde(default)]
    pub message: String,
    /// Members currently connected.
    #[serde(default)]
    pub players_count: usize,
}

/// Body of a `chat` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBody {
    /// Declared sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Chat text.
    #[serde(default)]
    pub message: String,
}

/// Body of a `move` frame.
///
/// The server does not interpret moves; it only persists them and relays
/// the original frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveBody {
    /// Origin square.
    #[serde(default)]
    pub from: String,
    /// Destination square.
    #[serde(default)]
    pub to: String,
    /// Declared sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Moved piece, when the client reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece: Option<String>,
    /// Position after the move.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    /// Opaque game state to store on the session record.
    #[serde(default, rename = "move", skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
    /// Client-side move counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_number: Option<u32>,
    /// Status to store on the session record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_status: Option<String>,
    /// Winner to store on the session record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
}

impl Envelope {
    /// Decode one inbound text frame.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() > MAX_ENVELOPE_LEN {
            return Err(ProtocolError::TooLong {
                actual: raw.len(),
                limit: MAX_ENVELOPE_LEN,
            });
        }
        Ok(serde_json::from_str(raw)?)
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Error { .. } => "error",
            Self::RoomStatus(_) => "room_status",
            Self::GameDestroy { .. } => "game-destroy",
            Self::Pong(_) => "pong",
            Self::Move(_) => "move",
            Self::Chat(_) => "chat",
            Self::SetActiveGame { .. } => "set-active-game",
            Self::GameOver { .. } => "game-over",
            Self::Ping { .. } => "ping",
            Self::Unknown => "unknown",
        }
    }

    /// The declared sender, for variants that carry one.
    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::Move(body) => body.sender.as_deref(),
            Self::Chat(body) => body.sender.as_deref(),
            Self::Pong(body) => body.sender.as_deref(),
            Self::GameOver { sender, .. } | Self::Ping { sender } => sender.as_deref(),
            _ => None,
        }
    }

    /// An `error` frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// A `room_status` frame.
    pub fn room_status(players_count: usize, message: impl Into<String>, ready_to_play: bool) -> Self {
        Self::RoomStatus(RoomStatusBody {
            players_count,
            message: message.into(),
            ready_to_play,
        })
    }

    /// A `chat` frame.
    pub fn chat(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Chat(ChatBody {
            sender: Some(sender.into()),
            message: message.into(),
        })
    }

    /// A `game-destroy` frame.
    pub fn game_destroy(message: impl Into<String>) -> Self {
        Self::GameDestroy {
            message: message.into(),
        }
    }
}
