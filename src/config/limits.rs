//! Queue capacity and liveness configuration.

use serde::Deserialize;
use std::time::Duration;

/// Queue capacities and connection liveness timers.
///
/// A value of `0` for either timer disables it; liveness is then inferred
/// from transport errors only.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Per-connection outbound queue capacity (default: 256).
    /// A member whose queue is full is disconnected.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    /// Room actor mailbox capacity (default: 128).
    #[serde(default = "default_room_queue")]
    pub room_queue: usize,
    /// Seconds between WebSocket pings sent to each connection (default: 30).
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Seconds without any inbound frame before a connection is dropped (default: 90).
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
            room_queue: default_room_queue(),
            ping_interval: default_ping_interval(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

impl LimitsConfig {
    /// Ping period, or `None` when pings are disabled.
    pub fn ping_period(&self) -> Option<Duration> {
        (self.ping_interval > 0).then(|| Duration::from_secs(self.ping_interval))
    }

    /// Idle cutoff, or `None` when the idle timeout is disabled.
    pub fn idle_cutoff(&self) -> Option<Duration> {
        (self.idle_timeout > 0).then(|| Duration::from_secs(self.idle_timeout))
    }
}

fn default_outbound_queue() -> usize {
    256
}

fn default_room_queue() -> usize {
    128
}

fn default_ping_interval() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    90
}
