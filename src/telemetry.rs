//! Telemetry utilities.

/// Standardized span constructors for session observability.
pub mod spans {
    use std::net::SocketAddr;
    use tracing::{Span, info_span};

    /// Create a span for a client connection.
    pub fn connection(conn: &uuid::Uuid, addr: &SocketAddr) -> Span {
        info_span!("connection", conn = %conn, addr = %addr)
    }

    /// Create a span for a room actor.
    pub fn room(session: &str, room: u64) -> Span {
        info_span!("room", session = %session, room = room)
    }
}
