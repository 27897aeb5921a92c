//! duetd - Duet Session Daemon
//!
//! Pairs two authenticated endpoints into a live session room and relays
//! their envelopes over WebSocket.

mod auth;
mod config;
mod error;
mod http;
mod metrics;
mod network;
mod state;
mod store;
mod telemetry;

use crate::auth::{Authenticator, JwtAuthenticator};
use crate::config::{Config, LogFormat};
use crate::network::Gateway;
use crate::state::Hub;
use duet_proto::Identity;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // `duetd mint-token <config> <id> <name>` prints a token for local testing.
    if args.first().map(String::as_str) == Some("mint-token") {
        return mint_token(&args[1..]);
    }

    let config_path = args
        .first()
        .cloned()
        .unwrap_or_else(|| "config.toml".to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            error!(path = %config_path, error = %e, "Failed to load config");
            return Err(e.into());
        }
    };

    init_tracing(config.logging.format);

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s), refusing to start", errors.len());
    }

    info!(server = %config.server.name, "Starting duetd");

    crate::metrics::init();

    let store = store::open(&config.store).await.map_err(|e| {
        error!(backend = ?config.store.backend, error = %e, "Failed to open record store");
        e
    })?;
    info!(backend = ?config.store.backend, "Record store ready");

    let hub = Hub::spawn(Arc::clone(&store), config.limits.room_queue);
    let auth: Arc<dyn Authenticator> = Arc::new(JwtAuthenticator::new(&config.auth.secret));

    if config.server.metrics_port != 0 {
        let state = http::AppState {
            hub: hub.clone(),
            store: Arc::clone(&store),
            auth: Arc::clone(&auth),
        };
        tokio::spawn(http::run_http_server(config.server.metrics_port, state));
    }

    let gateway = Gateway::bind(&config.listen, config.limits.clone(), hub, auth).await?;

    info!("Server ready");
    gateway.run().await
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn mint_token(args: &[String]) -> anyhow::Result<()> {
    let [path, id, name] = args else {
        anyhow::bail!("usage: duetd mint-token <config> <id> <name>");
    };
    let config = Config::load(path)?;
    let identity = Identity::new(id.parse()?, name.as_str());
    let token =
        JwtAuthenticator::new(&config.auth.secret).mint(&identity, auth::default_token_ttl())?;
    println!("{token}");
    Ok(())
}
