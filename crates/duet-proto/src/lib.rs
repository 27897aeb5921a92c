//! # duet-proto
//!
//! Wire types shared by the duetd session relay and its clients.
//!
//! ## Features
//!
//! - [`Envelope`]: the self-describing JSON frame exchanged over the socket,
//!   tagged by its `type` field
//! - [`SessionRecord`] and [`Identity`]: the persisted session view and the
//!   participant identity embedded in `init` frames
//! - [`Seat`]: a participant's slot in a two-seat session
//!
//! ## Quick Start
//!
//! ```rust
//! use duet_proto::Envelope;
//!
//! let raw = r#"{"type":"move","from":"e2","to":"e4","sender":"alice","move_number":1}"#;
//! let envelope = Envelope::parse(raw).expect("valid envelope");
//! assert_eq!(envelope.kind(), "move");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod record;

pub use self::envelope::{ChatBody, Envelope, MoveBody, PongBody, RoomStatusBody};
pub use self::error::ProtocolError;
pub use self::record::{GameStatus, Identity, MoveRecord, ParticipantId, Seat, SessionRecord};

/// Maximum accepted size of one inbound text frame, in bytes.
pub const MAX_ENVELOPE_LEN: usize = 64 * 1024;
