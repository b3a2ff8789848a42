use prometheus::{IntCounterVec, IntGaugeVec};

#[derive(prometheus_metric_storage::MetricStorage)]
pub struct Metrics {
    /// Requests to executors grouped by executor index and outcome.
    #[metric(labels("executor", "outcome"))]
    pub requests: IntCounterVec,

    /// Executor status (0 online, 1 degraded, 2 offline).
    #[metric(labels("executor"))]
    pub executor_status: IntGaugeVec,

    /// Completed threshold operations grouped by kind.
    #[metric(labels("kind"))]
    pub operations: IntCounterVec,
}

impl Metrics {
    pub fn get() -> &'static Self {
        Self::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}
