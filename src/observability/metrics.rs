use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub plans_total: IntCounterVec,
    pub plan_latency_seconds: HistogramVec,
    pub orders_claimed_total: IntCounter,
    pub backlog_size: IntGauge,
    pub status_updates_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let plans_total = IntCounterVec::new(
            Opts::new("plans_total", "Delivery planning calls by outcome"),
            &["outcome"],
        )
        .expect("valid plans_total metric");

        let plan_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "plan_latency_seconds",
                "Latency of delivery planning in seconds",
            ),
            &["outcome"],
        )
        .expect("valid plan_latency_seconds metric");

        let orders_claimed_total = IntCounter::new(
            "orders_claimed_total",
            "Orders moved to delivering by committed plans",
        )
        .expect("valid orders_claimed_total metric");

        let backlog_size = IntGauge::new(
            "backlog_size",
            "Orders awaiting shipment seen by the latest planning call",
        )
        .expect("valid backlog_size metric");

        let status_updates_total = IntCounterVec::new(
            Opts::new("status_updates_total", "Single order status updates by outcome"),
            &["outcome"],
        )
        .expect("valid status_updates_total metric");

        registry
            .register(Box::new(plans_total.clone()))
            .expect("register plans_total");
        registry
            .register(Box::new(plan_latency_seconds.clone()))
            .expect("register plan_latency_seconds");
        registry
            .register(Box::new(orders_claimed_total.clone()))
            .expect("register orders_claimed_total");
        registry
            .register(Box::new(backlog_size.clone()))
            .expect("register backlog_size");
        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register status_updates_total");

        Self {
            registry,
            plans_total,
            plan_latency_seconds,
            orders_claimed_total,
            backlog_size,
            status_updates_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
