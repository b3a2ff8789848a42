use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec};

#[derive(prometheus_metric_storage::MetricStorage)]
pub struct Metrics {
    /// Completed rounds grouped by market and outcome.
    #[metric(labels("market", "outcome"))]
    pub rounds: IntCounterVec,

    /// Total matched volume in micro-units.
    #[metric(labels("market"))]
    pub matched_volume: IntCounterVec,

    /// Clearing price of the last emitted round.
    #[metric(labels("market"))]
    pub clearing_price: IntGaugeVec,

    /// Matched pairs emitted.
    #[metric(labels("market"))]
    pub pairs: IntCounterVec,

    /// Wall-clock seconds spent per round phase.
    #[metric(labels("phase"), buckets(0.001, 0.01, 0.1, 0.5, 1, 5, 15, 60))]
    pub phase_seconds: HistogramVec,

    /// Settlement submissions grouped by outcome.
    #[metric(labels("outcome"))]
    pub settlements: IntCounterVec,
}

impl Metrics {
    pub fn get() -> &'static Self {
        Self::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}
