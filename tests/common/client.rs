//! Test WebSocket endpoint.
//!
//! Sends envelopes and asserts on what the server relays back.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// A test endpoint.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Open a WebSocket to `url`.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _) = connect_async(url).await?;
        Ok(Self { ws })
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a JSON envelope.
    pub async fn send(&mut self, envelope: Value) -> anyhow::Result<()> {
        self.send_raw(&envelope.to_string()).await
    }

    /// Receive the next text frame as JSON.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        Ok(serde_json::from_str(&self.recv_text().await?)?)
    }

    /// Receive the next text frame verbatim.
    pub async fn recv_text(&mut self) -> anyhow::Result<String> {
        self.recv_text_timeout(Duration::from_secs(5)).await
    }

    /// Receive the next text frame, skipping control frames.
    pub async fn recv_text_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        loop {
            match timeout(dur, self.ws.next()).await? {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(other)) => anyhow::bail!("expected text frame, got {other:?}"),
                Some(Err(e)) => return Err(e.into()),
                None => anyhow::bail!("connection closed"),
            }
        }
    }

    /// Receive until an envelope of `kind` arrives.
    pub async fn recv_kind(&mut self, kind: &str) -> anyhow::Result<Value> {
        loop {
            let envelope = self.recv().await?;
            if envelope["type"] == kind {
                return Ok(envelope);
            }
        }
    }

    /// Assert nothing arrives for `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_text_timeout(dur).await {
            Ok(text) => anyhow::bail!("unexpected frame: {text}"),
            Err(e) if e.is::<tokio::time::error::Elapsed>() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Wait for the server to close the connection.
    pub async fn expect_closed(&mut self) -> anyhow::Result<()> {
        loop {
            match timeout(Duration::from_secs(5), self.ws.next()).await? {
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(Message::Text(text))) => anyhow::bail!("unexpected frame: {text}"),
                Some(Ok(_)) => continue,
                Some(Err(_)) => return Ok(()),
            }
        }
    }

    /// Close our side and wait for the server to finish the handshake.
    pub async fn disconnect(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        while let Some(Ok(_)) = timeout(Duration::from_secs(5), self.ws.next()).await? {}
        Ok(())
    }
}
