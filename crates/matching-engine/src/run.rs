use {
    crate::{arguments::Arguments, engine::Engine, settlement::LoggingSettlement},
    anyhow::{Context, Result},
    executor_net::{
        Coordinator, ExecutorDescriptor, LocalExecutor, LocalTransport, Registry, Transport,
    },
    model::{order::Market, time::SystemClock},
    order_pool::traits::SignatureVerifying,
    phantom_crypto::elgamal,
    std::sync::Arc,
};

/// A wallet that accepts every signature. Signature verification is an
/// external collaborator; deployments wire a real verifier here.
struct PermissiveWallet;

impl SignatureVerifying for PermissiveWallet {
    fn verify_signature(&self, _address: &str, _message: &[u8], _signature: &[u8]) -> bool {
        true
    }
}

/// Boots a self-contained engine: deals a fresh threshold key to an
/// in-process executor network and serves the configured markets until
/// interrupted.
pub async fn run(args: Arguments) -> Result<()> {
    observe::tracing::initialize(&args.log_filter);
    let config = args.config();
    tracing::info!(
        markets = ?args.markets,
        interval = ?config.round_interval,
        threshold = config.threshold_t,
        executors = config.executors_n,
        "starting matching engine"
    );

    let clock = Arc::new(SystemClock::default());
    let key = elgamal::threshold_keygen(
        config.threshold_t,
        config.executors_n,
        &mut rand::thread_rng(),
    )
    .context("threshold key generation")?;

    let executors: Vec<Arc<LocalExecutor>> = key
        .shares
        .iter()
        .map(|share| Arc::new(LocalExecutor::new(*share)))
        .collect();
    let descriptors = executors
        .iter()
        .map(|executor| {
            ExecutorDescriptor::new(
                executor.index(),
                executor.public_share(),
                LocalTransport::endpoint_of(executor.index()),
            )
        })
        .collect();
    let transport: Arc<dyn Transport> = Arc::new(LocalTransport::new(executors));
    let registry = Arc::new(Registry::new(descriptors, clock.clone()));
    let coordinator = Arc::new(Coordinator::new(
        registry,
        transport,
        key.public,
        config.coordinator(),
    ));
    coordinator.spawn_heartbeats(config.heartbeat_interval);

    let engine = Engine::new(
        Arc::new(PermissiveWallet),
        coordinator,
        Arc::new(LoggingSettlement),
        clock,
        config,
    )
    .context("engine construction")?;
    for market in &args.markets {
        engine.add_market(Market(market.clone()));
    }

    tokio::signal::ctrl_c().await.context("signal handler")?;
    tracing::info!("shutting down");
    Ok(())
}
