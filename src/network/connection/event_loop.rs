//! Reader and writer halves of an admitted connection.

use crate::error::TransportError;
use crate::state::{ConnId, RoomHandle};
use duet_proto::Envelope;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Read frames and queue parsed envelopes on the room, one at a time.
///
/// Returns on close frame, end of stream, cancellation, idle timeout or
/// read error.
pub(super) async fn read_loop(
    mut stream: WsStream,
    room: &RoomHandle,
    conn_id: ConnId,
    cancel: &CancellationToken,
    idle: Option<Duration>,
) -> Result<(), TransportError> {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Connection cancelled");
                return Ok(());
            }
            next = next_frame(&mut stream, idle) => next?,
        };

        let Some(message) = next else {
            return Ok(());
        };

        match message {
            Message::Text(text) => match Envelope::parse(&text) {
                Ok(envelope) => {
                    if !room.submit(conn_id, Arc::from(text), envelope).await {
                        debug!("Room stopped");
                        return Ok(());
                    }
                }
                Err(e) => {
                    debug!(code = e.error_code(), error = %e, "Dropping malformed envelope");
                }
            },
            Message::Close(frame) => {
                debug!(?frame, "Close frame received");
                return Ok(());
            }
            Message::Binary(_) => debug!("Ignoring binary frame"),
            // Ping replies are queued by tungstenite itself.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
}

async fn next_frame(
    stream: &mut WsStream,
    idle: Option<Duration>,
) -> Result<Option<Message>, TransportError> {
    let next = match idle {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| TransportError::IdleTimeout(limit))?,
        None => stream.next().await,
    };
    Ok(next.transpose()?)
}

/// Drain the outbound queue in order, pinging on `ping` if set.
///
/// Ends when the queue closes (the room dropped the member) or a write
/// fails; either way the reader is cancelled and a close frame is sent.
pub(super) async fn write_loop(
    mut sink: WsSink,
    mut rx: mpsc::Receiver<Arc<str>>,
    cancel: &CancellationToken,
    ping: Option<Duration>,
) -> Result<(), TransportError> {
    let mut ticker = ping_ticker(ping);

    let result = loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                        break Err(e.into());
                    }
                }
                None => break Ok(()),
            },
            _ = tick(&mut ticker) => {
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    break Err(e.into());
                }
            }
        }
    };

    cancel.cancel();
    if result.is_ok() {
        let _ = sink.close().await;
    }
    result
}

/// Ping schedule starting one period from now. A period too long to
/// schedule disables pings.
fn ping_ticker(period: Option<Duration>) -> Option<Interval> {
    let period = period?;
    let Some(start) = Instant::now().checked_add(period) else {
        warn!(?period, "Ping interval out of range, pings disabled");
        return None;
    };
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
