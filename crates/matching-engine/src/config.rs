use {
    executor_net::CoordinatorConfig,
    order_pool::PoolConfig,
    std::time::Duration,
};

/// Engine configuration. Defaults follow the production deployment: 30
/// second rounds against a 3-of-5 executor network, with caps that keep
/// discrete-log recovery of aggregates tractable.
#[derive(Debug, Clone)]
pub struct Config {
    /// Round cadence; zero disables periodic matching entirely.
    pub round_interval: Duration,
    /// Partial decryptions required to reconstruct an aggregate.
    pub threshold_t: usize,
    /// Size of the executor network.
    pub executors_n: usize,
    /// Upper bound (exclusive) on a single encrypted amount.
    pub max_amount: u64,
    /// Upper bound on limit prices, enforced on the public tick.
    pub max_price: u64,
    /// Cap on aggregate volume per round; the BSGS table is sized from
    /// this.
    pub max_round_volume: u64,
    /// Price granularity of one tick index step.
    pub tick_size: u64,
    /// Orders per market side before `PoolFull`.
    pub pool_capacity_per_side: usize,
    /// Pending orders on either side that trigger a round before the next
    /// scheduled tick.
    pub pool_high_water_mark: usize,
    /// Range proof width for solvency commitments.
    pub solvency_bits: usize,
    pub executor_soft_timeout: Duration,
    pub executor_hard_timeout: Duration,
    /// Attempts per threshold decryption before the round aborts.
    pub decrypt_attempts: usize,
    pub heartbeat_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            round_interval: Duration::from_secs(30),
            threshold_t: 3,
            executors_n: 5,
            max_amount: 1 << 40,
            max_price: 1 << 40,
            max_round_volume: 1 << 44,
            tick_size: 1000,
            pool_capacity_per_side: 1024,
            pool_high_water_mark: 512,
            solvency_bits: 40,
            executor_soft_timeout: Duration::from_secs(10),
            executor_hard_timeout: Duration::from_secs(20),
            decrypt_attempts: 2,
            heartbeat_interval: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            capacity_per_side: self.pool_capacity_per_side,
            max_price: self.max_price,
            tick_size: self.tick_size,
        }
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            threshold: self.threshold_t,
            soft_timeout: self.executor_soft_timeout,
            hard_timeout: self.executor_hard_timeout,
            ..Default::default()
        }
    }
}
