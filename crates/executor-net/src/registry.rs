use {
    crate::{metrics::Metrics, transport::Endpoint},
    model::{
        health::{ExecutorHealth, ExecutorStatus},
        time::Clock,
    },
    phantom_crypto::Point,
    std::sync::{Arc, RwLock},
};

/// How many consecutive failures move an executor from `Degraded` to
/// `Offline`.
const OFFLINE_AFTER_FAILURES: u32 = 3;

/// One executor as the coordinator sees it. Indexes are fixed at setup; the
/// registry is the only writer of `status`.
#[derive(Debug, Clone)]
pub struct ExecutorDescriptor {
    pub index: u32,
    pub public_share: Point,
    pub endpoint: Endpoint,
    pub status: ExecutorStatus,
    pub rolling_error_count: u64,
    pub total_requests: u64,
    pub consecutive_failures: u32,
    pub last_heartbeat: u64,
}

impl ExecutorDescriptor {
    pub fn new(index: u32, public_share: Point, endpoint: Endpoint) -> Self {
        Self {
            index,
            public_share,
            endpoint,
            status: ExecutorStatus::Online,
            rolling_error_count: 0,
            total_requests: 0,
            consecutive_failures: 0,
            last_heartbeat: 0,
        }
    }
}

/// The authoritative set of executors. Updated atomically under one lock.
pub struct Registry {
    executors: RwLock<Vec<ExecutorDescriptor>>,
    clock: Arc<dyn Clock>,
    metrics: &'static Metrics,
}

impl Registry {
    pub fn new(executors: Vec<ExecutorDescriptor>, clock: Arc<dyn Clock>) -> Self {
        let registry = Self {
            executors: RwLock::new(executors),
            clock,
            metrics: Metrics::get(),
        };
        registry.export_status();
        registry
    }

    /// Candidates for a quorum: everything not `Offline`, preferring the
    /// lowest rolling error count with the index as deterministic
    /// tiebreaker.
    pub fn quorum_candidates(&self) -> Vec<(u32, Endpoint, Point)> {
        let mut candidates: Vec<ExecutorDescriptor> = self
            .executors
            .read()
            .unwrap()
            .iter()
            .filter(|descriptor| descriptor.status != ExecutorStatus::Offline)
            .cloned()
            .collect();
        candidates.sort_by_key(|descriptor| (descriptor.rolling_error_count, descriptor.index));
        candidates
            .into_iter()
            .map(|descriptor| (descriptor.index, descriptor.endpoint, descriptor.public_share))
            .collect()
    }

    /// Executors currently not fully available; probed by the heartbeat
    /// loop.
    pub fn impaired(&self) -> Vec<(u32, Endpoint)> {
        self.executors
            .read()
            .unwrap()
            .iter()
            .filter(|descriptor| descriptor.status != ExecutorStatus::Online)
            .map(|descriptor| (descriptor.index, descriptor.endpoint.clone()))
            .collect()
    }

    pub fn public_share(&self, index: u32) -> Option<Point> {
        self.executors
            .read()
            .unwrap()
            .iter()
            .find(|descriptor| descriptor.index == index)
            .map(|descriptor| descriptor.public_share)
    }

    pub fn public_shares(&self) -> Vec<(u32, Point)> {
        self.executors
            .read()
            .unwrap()
            .iter()
            .map(|descriptor| (descriptor.index, descriptor.public_share))
            .collect()
    }

    /// A successful interaction. `Degraded` executors recover to `Online`
    /// here; `Offline` ones only recover through a heartbeat.
    pub fn record_success(&self, index: u32) {
        let now = self.clock.now_monotonic_ms();
        self.with_descriptor(index, |descriptor| {
            descriptor.total_requests += 1;
            descriptor.consecutive_failures = 0;
            descriptor.last_heartbeat = now;
            if descriptor.status == ExecutorStatus::Degraded {
                descriptor.status = ExecutorStatus::Online;
            }
        });
        self.metrics
            .requests
            .with_label_values(&[&index.to_string(), "ok"])
            .inc();
        self.export_status();
    }

    /// A timeout, transport failure, or invalid proof. Degrades the
    /// executor immediately and takes it offline after three consecutive
    /// failures.
    pub fn record_failure(&self, index: u32) {
        self.with_descriptor(index, |descriptor| {
            descriptor.total_requests += 1;
            descriptor.rolling_error_count += 1;
            descriptor.consecutive_failures += 1;
            descriptor.status = if descriptor.consecutive_failures >= OFFLINE_AFTER_FAILURES {
                ExecutorStatus::Offline
            } else {
                ExecutorStatus::Degraded
            };
        });
        self.metrics
            .requests
            .with_label_values(&[&index.to_string(), "error"])
            .inc();
        self.export_status();
    }

    /// Degrades an executor without counting a failure; used when a
    /// response blows the soft deadline but is still awaited.
    pub fn mark_degraded(&self, index: u32) {
        self.with_descriptor(index, |descriptor| {
            if descriptor.status == ExecutorStatus::Online {
                descriptor.status = ExecutorStatus::Degraded;
            }
        });
        self.export_status();
    }

    /// A successful heartbeat brings any executor back online.
    pub fn mark_online(&self, index: u32) {
        let now = self.clock.now_monotonic_ms();
        self.with_descriptor(index, |descriptor| {
            descriptor.status = ExecutorStatus::Online;
            descriptor.consecutive_failures = 0;
            descriptor.last_heartbeat = now;
        });
        self.export_status();
    }

    pub fn health(&self) -> Vec<ExecutorHealth> {
        let now = self.clock.now_monotonic_ms();
        self.executors
            .read()
            .unwrap()
            .iter()
            .map(|descriptor| ExecutorHealth {
                index: descriptor.index,
                status: descriptor.status,
                error_rate: if descriptor.total_requests == 0 {
                    0.0
                } else {
                    descriptor.rolling_error_count as f64 / descriptor.total_requests as f64
                },
                last_heartbeat_ms: now.saturating_sub(descriptor.last_heartbeat),
            })
            .collect()
    }

    fn with_descriptor(&self, index: u32, update: impl FnOnce(&mut ExecutorDescriptor)) {
        let mut executors = self.executors.write().unwrap();
        if let Some(descriptor) = executors
            .iter_mut()
            .find(|descriptor| descriptor.index == index)
        {
            update(descriptor);
        }
    }

    fn export_status(&self) {
        for descriptor in self.executors.read().unwrap().iter() {
            let value = match descriptor.status {
                ExecutorStatus::Online => 0,
                ExecutorStatus::Degraded => 1,
                ExecutorStatus::Offline => 2,
            };
            self.metrics
                .executor_status
                .with_label_values(&[&descriptor.index.to_string()])
                .set(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, model::time::SystemClock};

    fn registry() -> Registry {
        let descriptors = (1..=3)
            .map(|index| {
                ExecutorDescriptor::new(
                    index,
                    Point::generator(),
                    Endpoint(format!("executor-{index}")),
                )
            })
            .collect();
        Registry::new(descriptors, Arc::new(SystemClock::default()))
    }

    #[test]
    fn three_consecutive_failures_take_an_executor_offline() {
        let registry = registry();
        registry.record_failure(1);
        assert_eq!(registry.health()[0].status, ExecutorStatus::Degraded);
        registry.record_failure(1);
        registry.record_failure(1);
        assert_eq!(registry.health()[0].status, ExecutorStatus::Offline);
        assert_eq!(registry.quorum_candidates().len(), 2);
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let registry = registry();
        registry.record_failure(1);
        registry.record_failure(1);
        registry.record_success(1);
        assert_eq!(registry.health()[0].status, ExecutorStatus::Online);
        registry.record_failure(1);
        assert_eq!(registry.health()[0].status, ExecutorStatus::Degraded);
    }

    #[test]
    fn heartbeat_revives_offline_executors() {
        let registry = registry();
        for _ in 0..3 {
            registry.record_failure(2);
        }
        assert_eq!(registry.impaired().len(), 1);
        registry.mark_online(2);
        assert_eq!(registry.health()[1].status, ExecutorStatus::Online);
        assert_eq!(registry.quorum_candidates().len(), 3);
    }

    #[test]
    fn quorum_prefers_reliable_executors_with_index_tiebreak() {
        let registry = registry();
        registry.record_failure(1);
        let candidates = registry.quorum_candidates();
        let indexes: Vec<u32> = candidates.iter().map(|(index, ..)| *index).collect();
        // Executor 1 has an error on record, so 2 and 3 come first in index
        // order.
        assert_eq!(indexes, vec![2, 3, 1]);
    }

    #[test]
    fn error_rate_reflects_history() {
        let registry = registry();
        registry.record_success(3);
        registry.record_failure(3);
        let health = registry.health();
        assert!((health[2].error_rate - 0.5).abs() < f64::EPSILON);
    }
}
