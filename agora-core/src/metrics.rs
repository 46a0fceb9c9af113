//! Prometheus metrics for the presence coordinator
//!
//! Exposed via the /metrics endpoint for Prometheus scraping.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_with_registry, Encoder,
    IntCounterVec, IntGauge, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Conferences currently held in memory
pub static ACTIVE_CONFERENCES: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "agora_active_conferences",
        "Current number of live conferences",
        REGISTRY.clone()
    )
    .expect("Failed to register ACTIVE_CONFERENCES")
});

/// Transport connections attached to the hub
pub static ACTIVE_CONNECTIONS: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "agora_active_connections",
        "Current number of attached connections",
        REGISTRY.clone()
    )
    .expect("Failed to register ACTIVE_CONNECTIONS")
});

/// Inbound events processed, by event name
pub static EVENTS_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "agora_events_total",
        "Total number of inbound events handled",
        &["event"],
        REGISTRY.clone()
    )
    .expect("Failed to register EVENTS_TOTAL")
});

/// Outbound deliveries, by audience scope (conference, room, direct)
pub static FANOUT_DELIVERIES_TOTAL: std::sync::LazyLock<IntCounterVec> =
    std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            "agora_fanout_deliveries_total",
            "Total number of events delivered to connections",
            &["scope"],
            REGISTRY.clone()
        )
        .expect("Failed to register FANOUT_DELIVERIES_TOTAL")
    });

/// Render all registered metrics in the Prometheus text format
pub fn gather_metrics() -> crate::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::Error::Internal(e.to_string()))
}
