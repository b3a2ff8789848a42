use tracing_subscriber::{EnvFilter, fmt};

/// Initializes tracing with the given filter directives. Repeated calls are
/// harmless which keeps this usable from tests.
pub fn initialize(env_filter: &str) {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_ansi(atty())
        .try_init();
}

fn atty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}
