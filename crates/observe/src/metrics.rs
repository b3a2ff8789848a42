use {
    prometheus::Registry,
    prometheus_metric_storage::StorageRegistry,
    std::sync::OnceLock,
};

static REGISTRY: OnceLock<StorageRegistry> = OnceLock::new();

/// The process-wide metric storage registry. Metric storage structs are
/// instantiated against this so that every crate contributes to the same
/// prometheus registry.
pub fn get_storage_registry() -> &'static StorageRegistry {
    REGISTRY.get_or_init(|| StorageRegistry::new(Registry::new()))
}

pub fn get_registry() -> &'static Registry {
    get_storage_registry().registry()
}

/// Encode the current state of all metrics in the prometheus text format.
pub fn encode() -> String {
    let mut buf = String::new();
    prometheus::TextEncoder::new()
        .encode_utf8(&get_registry().gather(), &mut buf)
        .unwrap_or_default();
    buf
}
