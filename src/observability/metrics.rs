use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub feed_events_total: IntCounterVec,
    pub events_applied_total: IntCounterVec,
    pub snapshot_load_seconds: HistogramVec,
    pub mutations_total: IntCounterVec,
    pub active_feeds: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let feed_events_total = IntCounterVec::new(
            Opts::new("feed_events_total", "Change-feed events emitted by table"),
            &["table", "event_type"],
        )
        .expect("valid feed_events_total metric");

        let events_applied_total = IntCounterVec::new(
            Opts::new(
                "events_applied_total",
                "Change-feed events reconciled into views by outcome",
            ),
            &["collection", "outcome"],
        )
        .expect("valid events_applied_total metric");

        let snapshot_load_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "snapshot_load_seconds",
                "Latency of snapshot loads in seconds",
            ),
            &["collection", "outcome"],
        )
        .expect("valid snapshot_load_seconds metric");

        let mutations_total = IntCounterVec::new(
            Opts::new("mutations_total", "Gateway mutations by operation and outcome"),
            &["operation", "outcome"],
        )
        .expect("valid mutations_total metric");

        let active_feeds = IntGauge::new("active_feeds", "Currently mounted live views")
            .expect("valid active_feeds metric");

        registry
            .register(Box::new(feed_events_total.clone()))
            .expect("register feed_events_total");
        registry
            .register(Box::new(events_applied_total.clone()))
            .expect("register events_applied_total");
        registry
            .register(Box::new(snapshot_load_seconds.clone()))
            .expect("register snapshot_load_seconds");
        registry
            .register(Box::new(mutations_total.clone()))
            .expect("register mutations_total");
        registry
            .register(Box::new(active_feeds.clone()))
            .expect("register active_feeds");

        Self {
            registry,
            feed_events_total,
            events_applied_total,
            snapshot_load_seconds,
            mutations_total,
            active_feeds,
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
