//! Prometheus metrics collection for chatd-ng.
//!
//! Metrics are exposed on the admin HTTP server at `/metrics`.
//!
//! - `chat_sessions_active` - Sessions currently registered in the hub
//! - `chat_published_total{route}` - Broker publishes by route (user, room, admin, control)
//! - `chat_publish_failures_total{route}` - Failed broker publishes by route
//! - `chat_event_fanout` - Recipients per room-addressed event (histogram)
//! - `chat_dispatch_errors_total{error}` - Rejected client operations by error code

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Broker publishes by route.
pub static PUBLISHED: OnceLock<IntCounterVec> = OnceLock::new();

/// Failed broker publishes by route.
pub static PUBLISH_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Events written to session transports.
pub static DELIVERED: OnceLock<IntCounter> = OnceLock::new();

/// Sessions closed by a control message.
pub static EVICTIONS: OnceLock<IntCounter> = OnceLock::new();

/// Subscription attach retries after transient errors.
pub static ATTACH_RETRIES: OnceLock<IntCounter> = OnceLock::new();

/// Client operations rejected, by error code.
pub static DISPATCH_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Sessions currently registered.
pub static ACTIVE_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

/// Recipients per room-addressed event.
pub static EVENT_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded;
/// recording before `init` is a silent no-op.
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

    register!(PUBLISHED, IntCounterVec::new(Opts::new("chat_published_total", "Broker publishes by route"), &["route"]));
    register!(PUBLISH_FAILURES, IntCounterVec::new(Opts::new("chat_publish_failures_total", "Failed broker publishes by route"), &["route"]));
    register!(DELIVERED, IntCounter::new("chat_delivered_total", "Events written to session transports"));
    register!(EVICTIONS, IntCounter::new("chat_evictions_total", "Sessions closed by a control message"));
    register!(ATTACH_RETRIES, IntCounter::new("chat_attach_retries_total", "Subscription attach retries"));
    register!(DISPATCH_ERRORS, IntCounterVec::new(Opts::new("chat_dispatch_errors_total", "Rejected client operations by error code"), &["error"]));
    register!(ACTIVE_SESSIONS, IntGauge::new("chat_sessions_active", "Sessions currently registered"));
    register!(EVENT_FANOUT, Histogram::with_opts(
        HistogramOpts::new("chat_event_fanout", "Recipients per room-addressed event")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0])));
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

#[inline]
pub fn record_publish(route: &str) {
    if let Some(c) = PUBLISHED.get() {
        c.with_label_values(&[route]).inc();
    }
}

#[inline]
pub fn record_publish_failure(route: &str) {
    if let Some(c) = PUBLISH_FAILURES.get() {
        c.with_label_values(&[route]).inc();
    }
}

#[inline]
pub fn record_fanout(recipients: usize) {
    if let Some(h) = EVENT_FANOUT.get() {
        h.observe(recipients as f64);
    }
}

#[inline]
pub fn record_dispatch_error(code: &str) {
    if let Some(c) = DISPATCH_ERRORS.get() {
        c.with_label_values(&[code]).inc();
    }
}

#[inline]
pub fn inc_counter(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

#[inline]
pub fn session_opened() {
    if let Some(g) = ACTIVE_SESSIONS.get() {
        g.inc();
    }
}

#[inline]
pub fn session_closed() {
    if let Some(g) = ACTIVE_SESSIONS.get() {
        g.dec();
    }
}
