//! Gateway - WebSocket listener that accepts incoming connections.
//!
//! The Gateway binds the listen socket, performs the upgrade handshake
//! (path, origin, session and token capture) and spawns a Connection task
//! for each endpoint.

use crate::auth::{Authenticator, token_from_headers};
use crate::config::{LimitsConfig, ListenConfig};
use crate::error::AdmissionError;
use crate::network::connection::{Connection, Ticket};
use crate::state::HubHandle;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// Upgrade path endpoints connect to.
pub const WS_PATH: &str = "/ws";

/// The Gateway accepts incoming WebSocket connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    allow_origins: Arc<[String]>,
    limits: LimitsConfig,
    hub: HubHandle,
    auth: Arc<dyn Authenticator>,
}

impl Gateway {
    /// Bind the gateway to the listen address.
    pub async fn bind(
        listen: &ListenConfig,
        limits: LimitsConfig,
        hub: HubHandle,
        auth: Arc<dyn Authenticator>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen.address).await?;
        info!(address = %listener.local_addr()?, "WebSocket listener bound");
        Ok(Self {
            listener,
            allow_origins: listen.allow_origins.clone().into(),
            limits,
            hub,
            auth,
        })
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let conn_id = Uuid::new_v4();
                    let span = crate::telemetry::spans::connection(&conn_id, &addr);
                    let allowed = Arc::clone(&self.allow_origins);
                    let hub = self.hub.clone();
                    let auth = Arc::clone(&self.auth);
                    let limits = self.limits.clone();

                    tokio::spawn(
                        async move {
                            let captured = Arc::new(Mutex::new(Handshake::default()));
                            let sink = Arc::clone(&captured);
                            let callback = move |req: &Request, response: Response| {
                                inspect_upgrade(req, response, &allowed, &addr, &sink)
                            };

                            let ws = match accept_hdr_async(stream, callback).await {
                                Ok(ws) => ws,
                                Err(e) => {
                                    warn!(error = %e, "WebSocket handshake failed");
                                    return;
                                }
                            };

                            let handshake = std::mem::take(&mut *captured.lock());
                            let ticket = handshake.into_ticket(auth.as_ref());
                            if let Err(e) = &ticket {
                                crate::metrics::record_admission_rejected(e.error_code());
                            }

                            let connection = Connection::new(conn_id, ws, addr, hub, limits);
                            if let Err(e) = connection.run(ticket).await {
                                error!(code = e.error_code(), error = %e, "Connection error");
                            }
                            info!("Connection closed");
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// What the upgrade request carried.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Handshake {
    room: Option<String>,
    token: Option<String>,
}

impl Handshake {
    /// Collect the session id and identity token from the upgrade request.
    ///
    /// A `token` query parameter wins over the `token` cookie, which wins
    /// over an `Authorization: Bearer` header.
    fn capture(req: &Request) -> Self {
        let mut handshake = Self::default();

        for (key, value) in query_pairs(req.uri().query().unwrap_or_default()) {
            match key.as_str() {
                "room" if !value.is_empty() => handshake.room = Some(value),
                "token" if !value.is_empty() => handshake.token = Some(value),
                _ => {}
            }
        }

        if handshake.token.is_none() {
            handshake.token = token_from_headers(req.headers());
        }

        handshake
    }

    fn into_ticket(self, auth: &dyn Authenticator) -> Result<Ticket, AdmissionError> {
        let room = self.room.ok_or(AdmissionError::MissingSession)?;
        let token = self.token.ok_or(AdmissionError::Unauthenticated)?;
        let identity = auth.authenticate(&token).map_err(|e| {
            info!(error = %e, "Token rejected");
            AdmissionError::Unauthenticated
        })?;
        Ok(Ticket {
            session_id: Arc::from(room),
            identity,
        })
    }
}

/// Upgrade callback: path and origin checks, then handshake capture.
fn inspect_upgrade(
    req: &Request,
    response: Response,
    allowed: &[String],
    addr: &SocketAddr,
    sink: &Mutex<Handshake>,
) -> Result<Response, ErrorResponse> {
    if req.uri().path() != WS_PATH {
        warn!(%addr, path = req.uri().path(), "Upgrade on unknown path");
        return Err(reject(http::StatusCode::NOT_FOUND, "Not found"));
    }

    if !allowed.is_empty() {
        let origin = header(req, http::header::ORIGIN);
        let permitted = origin.is_some_and(|o| allowed.iter().any(|a| a == o || a == "*"));
        if !permitted {
            warn!(%addr, origin = origin.unwrap_or("-"), "WebSocket CORS rejected");
            return Err(reject(
                http::StatusCode::FORBIDDEN,
                "CORS origin not allowed",
            ));
        }
    }

    *sink.lock() = Handshake::capture(req);
    Ok(response)
}

fn reject(status: http::StatusCode, message: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(message.to_string()));
    *response.status_mut() = status;
    response
}

fn header(req: &Request, name: http::header::HeaderName) -> Option<&str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn query_pairs(query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    query.split('&').filter(|p| !p.is_empty()).filter_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
        Some((key.to_string(), value))
    })
}
