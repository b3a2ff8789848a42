/// Executor availability as tracked by the coordinator. Only the
/// coordinator mutates this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ExecutorStatus {
    Online,
    Degraded,
    Offline,
}

/// Point-in-time health of a single executor, as served by the health API.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorHealth {
    pub index: u32,
    pub status: ExecutorStatus,
    pub error_rate: f64,
    pub last_heartbeat_ms: u64,
}
