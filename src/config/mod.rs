//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, AuthConfig, StoreConfig)
//! - [`listen`]: WebSocket listener configuration (ListenConfig)
//! - [`limits`]: Queue capacities and liveness timers (LimitsConfig)
//! - [`validation`]: Startup sanity checks

mod defaults;
mod limits;
mod listen;
mod types;
pub mod validation;

pub use limits::LimitsConfig;
pub use listen::ListenConfig;
pub use types::{
    AuthConfig, Config, ConfigError, LogFormat, LoggingConfig, ServerConfig, StoreBackend,
    StoreConfig,
};
