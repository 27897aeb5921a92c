//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use rand::Rng;
use rand::distributions::Alphanumeric;

pub fn default_server_name() -> String {
    "duetd".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}

pub fn default_store_path() -> String {
    "duetd.db".to_string()
}

pub fn default_auth_secret() -> String {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    tracing::warn!(
        "No auth secret configured - using ephemeral random secret. \
         Identity tokens minted elsewhere will NOT verify. \
         Set [auth].secret in config.toml for production use."
    );
    secret
}
