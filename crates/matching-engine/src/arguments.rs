use {crate::config::Config, std::time::Duration};

#[derive(clap::Parser)]
pub struct Arguments {
    /// Tracing filter directives.
    #[clap(long, env, default_value = "info")]
    pub log_filter: String,

    /// Round cadence. "0s" disables periodic matching; rounds then run only
    /// on pool fullness or explicit triggers.
    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub round_interval: Duration,

    /// Partial decryptions required to reconstruct an aggregate.
    #[clap(long, env, default_value = "3")]
    pub threshold: usize,

    /// Size of the executor network.
    #[clap(long, env, default_value = "5")]
    pub executors: usize,

    /// Markets to serve.
    #[clap(long, env, default_value = "ETH/USDC", use_value_delimiter = true)]
    pub markets: Vec<String>,

    /// Upper bound (exclusive) on a single encrypted amount in micro-units.
    #[clap(long, env, default_value = "1099511627776")]
    pub max_amount: u64,

    /// Upper bound on limit prices in micro-units.
    #[clap(long, env, default_value = "1099511627776")]
    pub max_price: u64,

    /// Cap on aggregate volume per round. Must stay small enough for
    /// discrete-log recovery of aggregates.
    #[clap(long, env, default_value = "17592186044416")]
    pub max_round_volume: u64,

    /// Price granularity of one tick index step, in micro-units.
    #[clap(long, env, default_value = "1000")]
    pub tick_size: u64,

    /// Orders per market side before submissions are rejected.
    #[clap(long, env, default_value = "1024")]
    pub pool_capacity_per_side: usize,

    /// Pending orders on either side that trigger an early round.
    #[clap(long, env, default_value = "512")]
    pub pool_high_water_mark: usize,

    /// Range proof width for solvency commitments.
    #[clap(long, env, default_value = "40")]
    pub solvency_bits: usize,

    #[clap(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub executor_soft_timeout: Duration,

    #[clap(long, env, default_value = "20s", value_parser = humantime::parse_duration)]
    pub executor_hard_timeout: Duration,

    #[clap(long, env, default_value = "5s", value_parser = humantime::parse_duration)]
    pub heartbeat_interval: Duration,
}

impl Arguments {
    pub fn config(&self) -> Config {
        Config {
            round_interval: self.round_interval,
            threshold_t: self.threshold,
            executors_n: self.executors,
            max_amount: self.max_amount,
            max_price: self.max_price,
            max_round_volume: self.max_round_volume,
            tick_size: self.tick_size,
            pool_capacity_per_side: self.pool_capacity_per_side,
            pool_high_water_mark: self.pool_high_water_mark,
            solvency_bits: self.solvency_bits,
            executor_soft_timeout: self.executor_soft_timeout,
            executor_hard_timeout: self.executor_hard_timeout,
            heartbeat_interval: self.heartbeat_interval,
            ..Default::default()
        }
    }
}
