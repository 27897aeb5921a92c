//! Unified error handling for duetd.
//!
//! This module provides the error hierarchy for the session relay, with
//! client-facing `error` envelopes and metric labels.

use crate::store::StoreError;
use duet_proto::Envelope;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Admission Errors (terminal for one connection attempt)
// ============================================================================

/// Reasons a connection is refused entry to a room.
///
/// Every variant ends the attempt: the client receives the `error` envelope
/// from [`AdmissionError::to_envelope`] and the stream is closed.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("missing session identifier")]
    MissingSession,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("room is full")]
    RoomFull,

    #[error("participant {0} is already connected to this room")]
    AlreadyConnected(i64),

    #[error("participant {0} holds no seat in this session")]
    NotSeated(i64),

    #[error("failed to create session: {0}")]
    CreateFailed(#[source] StoreError),

    #[error("failed to join session: {0}")]
    JoinFailed(#[source] StoreError),

    #[error("session lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("room is not accepting admissions right now")]
    RoomBusy,

    #[error("session hub is unavailable")]
    HubUnavailable,
}

impl AdmissionError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingSession => "missing_session",
            Self::Unauthenticated => "unauthenticated",
            Self::RoomFull => "room_full",
            Self::AlreadyConnected(_) => "already_connected",
            Self::NotSeated(_) => "not_seated",
            Self::CreateFailed(_) => "create_failed",
            Self::JoinFailed(_) => "join_failed",
            Self::Lookup(_) => "lookup_failed",
            Self::RoomBusy => "room_busy",
            Self::HubUnavailable => "hub_unavailable",
        }
    }

    /// The `error` envelope sent to the client before the stream closes.
    pub fn to_envelope(&self) -> Envelope {
        let message = match self {
            Self::MissingSession => "Missing room ID",
            Self::Unauthenticated => "Unauthorized",
            Self::RoomFull => "Room is full",
            Self::AlreadyConnected(_) => "Already connected to this game",
            Self::NotSeated(_) => "You are not a player in this game",
            Self::CreateFailed(_) => "Failed to create game",
            Self::JoinFailed(_) => "Failed to join game",
            Self::Lookup(_) => "Game not found",
            Self::RoomBusy | Self::HubUnavailable => "Server busy, try again",
        };
        Envelope::error(message)
    }
}

// ============================================================================
// Transport Errors (end one connection)
// ============================================================================

/// Failures that terminate a connection's I/O loops.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("no frame received for {0:?}")]
    IdleTimeout(Duration),
}

impl TransportError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::WebSocket(_) => "websocket",
            Self::IdleTimeout(_) => "idle_timeout",
        }
    }
}
