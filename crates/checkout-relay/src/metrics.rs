use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::{LazyLock, Once};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Upstream calls, labelled by gateway operation and upstream status
pub static UPSTREAM_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "relay_upstream_requests_total",
            "Upstream API calls by operation and status",
        ),
        &["operation", "status"],
    )
    .unwrap()
});

pub static UPSTREAM_LATENCY: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new("relay_upstream_latency_seconds", "Upstream API call latency")
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

// Token exchanges: fresh, cached, identity, failed
pub static TOKEN_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("relay_token_requests_total", "Access token lookups by outcome"),
        &["outcome"],
    )
    .unwrap()
});

// Requests answered with the generic 500 message
pub static RELAY_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("relay_failures_total", "Failed relays by endpoint and error kind"),
        &["endpoint", "kind"],
    )
    .unwrap()
});

static REGISTER: Once = Once::new();

/// Register all metrics with the registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(register_all);
}

fn register_all() {
    REGISTRY
        .register(Box::new(UPSTREAM_REQUESTS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(UPSTREAM_LATENCY.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(TOKEN_REQUESTS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(RELAY_FAILURES_TOTAL.clone()))
        .unwrap();
}

/// Encode the registry in the Prometheus text format.
pub fn metrics_output() -> Result<String, prometheus::Error> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
