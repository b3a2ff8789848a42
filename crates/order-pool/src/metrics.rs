use prometheus::{IntCounterVec, IntGaugeVec};

#[derive(prometheus_metric_storage::MetricStorage)]
pub struct Metrics {
    /// Order submissions grouped by market and outcome.
    #[metric(labels("market", "outcome"))]
    pub submissions: IntCounterVec,

    /// Rejected submissions grouped by reason.
    #[metric(labels("reason"))]
    pub rejections: IntCounterVec,

    /// Orders currently pending in the pool.
    #[metric(labels("market", "side"))]
    pub pending_orders: IntGaugeVec,

    /// Cancellations grouped by whether an order was actually removed.
    #[metric(labels("outcome"))]
    pub cancellations: IntCounterVec,
}

impl Metrics {
    pub fn get() -> &'static Self {
        Self::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}
