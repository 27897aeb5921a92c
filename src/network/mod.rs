//! Network module.
//!
//! Contains the Gateway (WebSocket listener) and the Connection handler.

mod connection;
mod gateway;

pub use gateway::Gateway;
