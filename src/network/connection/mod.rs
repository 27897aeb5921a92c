//! Connection - Handles an individual WebSocket endpoint.
//!
//! Each Connection runs in its own Tokio task:
//!
//! ```text
//! Phase 1: Admission (hub -> room; error envelope + close on refusal)
//!    ↓
//! Phase 2: Relay (reader and writer joined on one task)
//!    ┌──────────────────────────────────────────────┐
//!    │  reader: frames -> Envelope::parse -> room   │
//!    │     ends on close/error/idle/cancel          │
//!    │     then dismisses itself through the hub    │
//!    │                                              │
//!    │  writer: outbound queue -> frames, pings     │
//!    │     ends when the room drops the member      │
//!    └──────────────────────────────────────────────┘
//! ```

mod error_handling;
mod event_loop;

use crate::config::LimitsConfig;
use crate::error::{AdmissionError, TransportError};
use crate::state::{ConnId, HubHandle};
use duet_proto::Identity;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use error_handling::{CloseReason, classify};

/// Who is connecting and to which session, as established at handshake.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub session_id: Arc<str>,
    pub identity: Identity,
}

/// A WebSocket endpoint.
pub struct Connection {
    conn_id: ConnId,
    addr: SocketAddr,
    ws: WebSocketStream<TcpStream>,
    hub: HubHandle,
    limits: LimitsConfig,
}

impl Connection {
    pub fn new(
        conn_id: ConnId,
        ws: WebSocketStream<TcpStream>,
        addr: SocketAddr,
        hub: HubHandle,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            conn_id,
            addr,
            ws,
            hub,
            limits,
        }
    }

    /// Admit, relay until the endpoint goes away, then leave the room.
    pub async fn run(self, ticket: Result<Ticket, AdmissionError>) -> Result<(), TransportError> {
        let Self {
            conn_id,
            addr,
            ws,
            hub,
            limits,
        } = self;

        let ticket = match ticket {
            Ok(ticket) => ticket,
            Err(e) => return refuse(ws, e).await,
        };

        let (tx, rx) = mpsc::channel(limits.outbound_queue.max(1));
        let cancel = CancellationToken::new();
        let room = match hub
            .admit(
                ticket.session_id.clone(),
                conn_id,
                ticket.identity.clone(),
                tx,
                cancel.clone(),
            )
            .await
        {
            Ok(room) => room,
            Err(e) => return refuse(ws, e).await,
        };

        crate::metrics::add_connected(1);
        info!(
            session = %ticket.session_id,
            user = ticket.identity.id,
            room = room.room_id,
            %addr,
            "Connection admitted"
        );

        let (sink, stream) = ws.split();

        let reader = async {
            let result =
                event_loop::read_loop(stream, &room, conn_id, &cancel, limits.idle_cutoff()).await;
            hub.dismiss(room.clone(), conn_id);
            result
        };
        let writer = event_loop::write_loop(sink, rx, &cancel, limits.ping_period());
        let (read_result, write_result) = tokio::join!(reader, writer);

        crate::metrics::add_connected(-1);

        for result in [read_result, write_result] {
            if let Err(e) = result {
                match classify(&e) {
                    CloseReason::PeerGone => debug!(error = %e, "Peer went away"),
                    CloseReason::Idle => info!(error = %e, "Idle connection dropped"),
                    CloseReason::Failure(detail) => {
                        warn!(code = e.error_code(), error = %detail, "Connection failed");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Send the refusal as an `error` envelope and close.
async fn refuse(
    mut ws: WebSocketStream<TcpStream>,
    err: AdmissionError,
) -> Result<(), TransportError> {
    info!(reason = err.error_code(), error = %err, "Connection refused");
    if let Ok(text) = err.to_envelope().encode() {
        ws.send(Message::Text(text)).await?;
    }
    ws.close(None).await?;
    Ok(())
}
