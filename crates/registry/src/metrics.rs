use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounter, IntCounterVec, IntGauge, Registry};
use tracing::error;

lazy_static! {
    static ref REGISTRY_CONNECTIONS: IntGauge = IntGauge::new(
        "streamscope_registry_connections",
        "Inspection sessions currently registered"
    )
    .unwrap();
    static ref REGISTRY_ROUTED_TOTAL: IntCounter = IntCounter::new(
        "streamscope_registry_routed_total",
        "Capture events delivered to an inspection session",
    )
    .unwrap();
    static ref REGISTRY_DROPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!(
            "streamscope_registry_dropped_total",
            "Capture events dropped by the background grouped by reason"
        ),
        &["reason"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register registry metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, REGISTRY_CONNECTIONS.clone());
    register(registry, REGISTRY_ROUTED_TOTAL.clone());
    register(registry, REGISTRY_DROPPED_TOTAL.clone());
}

pub fn set_connection_count(count: usize) {
    REGISTRY_CONNECTIONS.set(count as i64);
}

pub fn record_routed() {
    REGISTRY_ROUTED_TOTAL.inc();
}

pub fn record_dropped(reason: &str) {
    REGISTRY_DROPPED_TOTAL.with_label_values(&[reason]).inc();
}
