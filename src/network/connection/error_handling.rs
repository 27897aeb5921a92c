//! Error handling utilities for connection management.
//!
//! Sorts transport failures into ordinary hang-ups and failures worth a
//! warning.

use crate::error::TransportError;
use std::io::ErrorKind;
use tokio_tungstenite::tungstenite::Error as WsError;

/// How a connection ended, for logging.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum CloseReason {
    /// Peer went away; nothing unusual.
    PeerGone,
    /// Idle cutoff elapsed.
    Idle,
    /// Anything else.
    Failure(String),
}

/// Classify a transport error into an actionable category.
pub(super) fn classify(e: &TransportError) -> CloseReason {
    match e {
        TransportError::IdleTimeout(_) => CloseReason::Idle,
        TransportError::WebSocket(ws) => match ws {
            WsError::ConnectionClosed | WsError::AlreadyClosed => CloseReason::PeerGone,
            WsError::Io(io)
                if matches!(
                    io.kind(),
                    ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::BrokenPipe
                        | ErrorKind::UnexpectedEof
                ) =>
            {
                CloseReason::PeerGone
            }
            WsError::Protocol(p) => CloseReason::Failure(format!("protocol violation: {p}")),
            other => CloseReason::Failure(other.to_string()),
        },
    }
}
