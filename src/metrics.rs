//! Prometheus metrics registry and the two global counters the service
//! tracks across its lifetime.
//!
//! Both counters double as the lock-free shared integers the ingress and
//! writer pool need: `prometheus::IntCounter`/`IntGauge` are themselves
//! atomic integers under the hood, so there is no separate
//! `std::sync::atomic` shadow copy to keep in sync: the metric *is* the
//! counter.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

/// Global registry under the crate namespace.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("sensor_ingest".into()), None)
        .expect("failed to create Prometheus registry")
});

/// Monotonic count of rows successfully inserted into ClickHouse.
pub static TOTAL_ROWS_INSERTED: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new(
        "total_rows_inserted",
        "Total number of rows successfully inserted",
    );
    let c = IntCounter::with_opts(opts).expect("counter opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// Current number of tasks resident on the bounded task queue.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    let opts = Opts::new("queue_depth", "Current number of tasks on the task queue");
    let g = IntGauge::with_opts(opts).expect("gauge opts");
    REGISTRY.register(Box::new(g.clone())).unwrap();
    g
});

/// Encode all metrics as Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let mf = REGISTRY.gather();
    encoder.encode(&mf, &mut buffer).expect("failed to encode");
    String::from_utf8(buffer).expect("invalid utf8")
}
