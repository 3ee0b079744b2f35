use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub polls_total: IntCounterVec,
    pub poll_latency_seconds: HistogramVec,
    pub stale_responses_total: IntCounterVec,
    pub orders_created_total: IntCounterVec,
    pub active_trackers: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let polls_total = IntCounterVec::new(
            Opts::new("polls_total", "Backend fetches made by the tracker, by entity and outcome"),
            &["entity", "outcome"],
        )
        .expect("valid polls_total metric");

        let poll_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "poll_latency_seconds",
                "Latency of tracker fetches in seconds",
            ),
            &["entity"],
        )
        .expect("valid poll_latency_seconds metric");

        let stale_responses_total = IntCounterVec::new(
            Opts::new(
                "stale_responses_total",
                "Poll results discarded because they were superseded or arrived after stop",
            ),
            &["entity"],
        )
        .expect("valid stale_responses_total metric");

        let orders_created_total = IntCounterVec::new(
            Opts::new("orders_created_total", "Order creation attempts by outcome"),
            &["outcome"],
        )
        .expect("valid orders_created_total metric");

        let active_trackers = IntGauge::new("active_trackers", "Trackers currently polling")
            .expect("valid active_trackers metric");

        registry
            .register(Box::new(polls_total.clone()))
            .expect("register polls_total");
        registry
            .register(Box::new(poll_latency_seconds.clone()))
            .expect("register poll_latency_seconds");
        registry
            .register(Box::new(stale_responses_total.clone()))
            .expect("register stale_responses_total");
        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(active_trackers.clone()))
            .expect("register active_trackers");

        Self {
            registry,
            polls_total,
            poll_latency_seconds,
            stale_responses_total,
            orders_created_total,
            active_trackers,
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
