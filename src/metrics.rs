//! Prometheus metrics collection for duetd.
//!
//! Exposed on the HTTP side API at `/metrics`.
//!
//! - `duet_connected_endpoints` - Admitted WebSocket connections (gauge)
//! - `duet_active_rooms` - Rooms registered with the hub (gauge)
//! - `duet_envelopes_total{type}` - Inbound envelopes dispatched by type
//! - `duet_frames_dropped_total` - Outbound frames dropped by backpressure
//! - `duet_admissions_rejected_total{reason}` - Refused admissions
//! - `duet_store_errors_total{op,error}` - Record store failures

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Inbound envelopes dispatched by a room, by `type`.
pub static ENVELOPES: OnceLock<IntCounterVec> = OnceLock::new();

/// Outbound frames dropped because a member's queue was full.
pub static FRAMES_DROPPED: OnceLock<IntCounter> = OnceLock::new();

/// Admissions refused, by reason.
pub static ADMISSIONS_REJECTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Record store failures, by operation and error kind.
pub static STORE_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Currently admitted connections.
pub static CONNECTED_ENDPOINTS: OnceLock<IntGauge> = OnceLock::new();

/// Rooms currently registered with the hub.
pub static ACTIVE_ROOMS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup. Until then every recording helper is a no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(ENVELOPES, IntCounterVec::new(Opts::new("duet_envelopes_total", "Inbound envelopes dispatched by type"), &["type"]));
    register!(FRAMES_DROPPED, IntCounter::new("duet_frames_dropped_total", "Outbound frames dropped due to backpressure"));
    register!(ADMISSIONS_REJECTED, IntCounterVec::new(Opts::new("duet_admissions_rejected_total", "Admissions refused by reason"), &["reason"]));
    register!(STORE_ERRORS, IntCounterVec::new(Opts::new("duet_store_errors_total", "Record store failures"), &["op", "error"]));
    register!(CONNECTED_ENDPOINTS, IntGauge::new("duet_connected_endpoints", "Currently admitted connections"));
    register!(ACTIVE_ROOMS, IntGauge::new("duet_active_rooms", "Rooms registered with the hub"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

#[inline]
pub fn record_envelope(kind: &str) {
    if let Some(c) = ENVELOPES.get() {
        c.with_label_values(&[kind]).inc();
    }
}

#[inline]
pub fn record_frame_dropped() {
    if let Some(c) = FRAMES_DROPPED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_admission_rejected(reason: &str) {
    if let Some(c) = ADMISSIONS_REJECTED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

#[inline]
pub fn record_store_error(op: &str, error: &str) {
    if let Some(c) = STORE_ERRORS.get() {
        c.with_label_values(&[op, error]).inc();
    }
}

/// Adjust the admitted-connection gauge by `delta`.
#[inline]
pub fn add_connected(delta: i64) {
    if let Some(g) = CONNECTED_ENDPOINTS.get() {
        g.add(delta);
    }
}

/// Adjust the live-room gauge by `delta`.
#[inline]
pub fn add_rooms(delta: i64) {
    if let Some(g) = ACTIVE_ROOMS.get() {
        g.add(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_envelope("move");
        record_admission_rejected("room_full");
        add_rooms(1);

        let output = gather_metrics();
        assert!(output.contains("duet_envelopes_total"));
        assert!(output.contains("duet_admissions_rejected_total"));
        assert!(output.contains("duet_active_rooms"));
    }
}
