use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub retry_queue_depth: IntGaugeVec,
    pub send_latency_seconds: HistogramVec,
    pub sim_steps_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Status transitions by target and outcome"),
            &["target", "outcome"],
        )
        .expect("valid transitions_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new(
                "notifications_total",
                "Notification sends by channel and outcome",
            ),
            &["channel", "outcome"],
        )
        .expect("valid notifications_total metric");

        let retry_queue_depth = IntGaugeVec::new(
            Opts::new("retry_queue_depth", "Parked notification messages per channel"),
            &["channel"],
        )
        .expect("valid retry_queue_depth metric");

        let send_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "send_latency_seconds",
                "Latency of first-attempt channel sends in seconds",
            ),
            &["channel"],
        )
        .expect("valid send_latency_seconds metric");

        let sim_steps_total = IntCounter::new(
            "sim_steps_total",
            "Simulated position steps applied across all deliveries",
        )
        .expect("valid sim_steps_total metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(retry_queue_depth.clone()))
            .expect("register retry_queue_depth");
        registry
            .register(Box::new(send_latency_seconds.clone()))
            .expect("register send_latency_seconds");
        registry
            .register(Box::new(sim_steps_total.clone()))
            .expect("register sim_steps_total");

        Self {
            registry,
            transitions_total,
            notifications_total,
            retry_queue_depth,
            send_latency_seconds,
            sim_steps_total,
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
