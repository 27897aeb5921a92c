//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{Config, StoreBackend};
use std::path::Path;
use thiserror::Error;

/// Shortest HS256 key accepted for identity tokens.
const MIN_SECRET_LEN: usize = 16;

/// Longest accepted liveness timer, in seconds (one day).
const MAX_TIMER_SECS: u64 = 24 * 60 * 60;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("auth.secret must be at least {min} characters, got {0}", min = MIN_SECRET_LEN)]
    WeakSecret(usize),
    #[error("limits.{0} must be greater than zero")]
    ZeroCapacity(&'static str),
    #[error("limits.idle_timeout ({idle}s) must exceed limits.ping_interval ({ping}s)")]
    IdleShorterThanPing { idle: u64, ping: u64 },
    #[error("limits.{0} must be at most {max} seconds, got {1}", max = MAX_TIMER_SECS)]
    TimerTooLong(&'static str, u64),
    #[error("store.path parent directory does not exist: {0}")]
    StorePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    if config.auth.secret.len() < MIN_SECRET_LEN {
        errors.push(ValidationError::WeakSecret(config.auth.secret.len()));
    }

    if config.limits.outbound_queue == 0 {
        errors.push(ValidationError::ZeroCapacity("outbound_queue"));
    }
    if config.limits.room_queue == 0 {
        errors.push(ValidationError::ZeroCapacity("room_queue"));
    }

    for (name, secs) in [
        ("ping_interval", config.limits.ping_interval),
        ("idle_timeout", config.limits.idle_timeout),
    ] {
        if secs > MAX_TIMER_SECS {
            errors.push(ValidationError::TimerTooLong(name, secs));
        }
    }

    // An idle cutoff shorter than the ping period would drop quiet but healthy peers.
    let limits = &config.limits;
    if limits.idle_timeout > 0 && limits.ping_interval > 0 && limits.idle_timeout <= limits.ping_interval {
        errors.push(ValidationError::IdleShorterThanPing {
            idle: limits.idle_timeout,
            ping: limits.ping_interval,
        });
    }

    if config.store.backend == StoreBackend::Sqlite && config.store.path != ":memory:" {
        let path = Path::new(&config.store.path);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::StorePathInvalid(config.store.path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r#"
[auth]
secret = "0123456789abcdef0123"

[store]
backend = "memory"
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config: Config = toml::from_str(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_short_secret_fails() {
        let config: Config = toml::from_str("[auth]\nsecret = \"short\"").unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::WeakSecret(5))));
    }

    #[test]
    fn test_zero_queue_fails() {
        let toml = format!("{}\n[limits]\noutbound_queue = 0\n", minimal_valid_config());
        let config: Config = toml::from_str(&toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::ZeroCapacity("outbound_queue")))
        );
    }

    #[test]
    fn test_idle_not_above_ping_fails() {
        let toml = format!(
            "{}\n[limits]\nping_interval = 30\nidle_timeout = 30\n",
            minimal_valid_config()
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::IdleShorterThanPing { .. }))
        );
    }

    #[test]
    fn test_oversized_timers_fail() {
        let toml = format!(
            "{}\n[limits]\nping_interval = 9223372036854775807\nidle_timeout = 9223372036854775807\n",
            minimal_valid_config()
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::TimerTooLong("ping_interval", secs) if *secs == i64::MAX as u64))
        );
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::TimerTooLong("idle_timeout", secs) if *secs == i64::MAX as u64))
        );
    }

    #[test]
    fn test_missing_store_directory_fails() {
        let toml = r#"
[auth]
secret = "0123456789abcdef0123"

[store]
backend = "sqlite"
path = "/nonexistent/dir/duetd.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::StorePathInvalid(_)))
        );
    }
}
