use {
    crate::{
        config::Config,
        metrics::Metrics,
        round::{self, RoundDeps},
        settlement::SettlementSubmitting,
    },
    executor_net::Coordinator,
    model::{
        dto::{
            CancelOrderResponse, ExecutorHealthDto, MatchingResultDto, RoundStatusDto,
            SubmitOrderRequest, SubmitOrderResponse,
        },
        health::ExecutorHealth,
        order::{Market, Nonce, Owner},
        round::{MatchingResult, Phase, RoundId},
        time::Clock,
    },
    order_pool::{OrderPool, traits::SignatureVerifying},
    phantom_crypto::{curve::KeyMaterial, rangeproof},
    sha2::{Digest, Sha256},
    std::{
        collections::{BTreeMap, HashMap},
        sync::{
            Arc, Mutex,
            atomic::{AtomicU64, Ordering},
        },
        time::Instant,
    },
    tokio::sync::{mpsc, watch},
    tracing::Instrument,
};

/// What caused a round to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Tick,
    Fullness,
    Explicit,
}

struct MarketRuntime {
    phase: Phase,
    phase_started: Instant,
    round_id: RoundId,
    next_round_at: Option<u64>,
    trigger: mpsc::Sender<Trigger>,
    cancel: Option<watch::Sender<bool>>,
}

/// The matching engine: owns the order pool, drives one sequential round
/// loop per market, and serves the external API.
pub struct Engine {
    pool: Arc<OrderPool>,
    coordinator: Arc<Coordinator>,
    settlement: Arc<dyn SettlementSubmitting>,
    clock: Arc<dyn Clock>,
    vrf_key: KeyMaterial,
    config: Config,
    round_counter: AtomicU64,
    results: Mutex<BTreeMap<u64, MatchingResult>>,
    markets: Mutex<HashMap<Market, MarketRuntime>>,
    metrics: &'static Metrics,
}

impl Engine {
    pub fn new(
        wallet: Arc<dyn SignatureVerifying>,
        coordinator: Arc<Coordinator>,
        settlement: Arc<dyn SettlementSubmitting>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Result<Arc<Self>, rangeproof::Error> {
        let vrf_key = KeyMaterial::generate(&mut rand::thread_rng());
        Self::with_vrf_key(wallet, coordinator, settlement, clock, config, vrf_key)
    }

    /// Like [`Self::new`] with a caller-provided VRF key, which pins the
    /// shuffle for reproducible runs.
    pub fn with_vrf_key(
        wallet: Arc<dyn SignatureVerifying>,
        coordinator: Arc<Coordinator>,
        settlement: Arc<dyn SettlementSubmitting>,
        clock: Arc<dyn Clock>,
        config: Config,
        vrf_key: KeyMaterial,
    ) -> Result<Arc<Self>, rangeproof::Error> {
        let generators = Arc::new(rangeproof::Generators::new(config.solvency_bits)?);
        let pool = Arc::new(OrderPool::new(
            wallet,
            generators,
            coordinator.group_key(),
            config.pool(),
        ));
        Ok(Arc::new(Self {
            pool,
            coordinator,
            settlement,
            clock,
            vrf_key,
            config,
            round_counter: AtomicU64::new(0),
            results: Default::default(),
            markets: Default::default(),
            metrics: Metrics::get(),
        }))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The public key under which round shuffles can be audited.
    pub fn vrf_public_key(&self) -> phantom_crypto::Point {
        self.vrf_key.public()
    }

    /// Registers a market and spawns its scheduler and round loop.
    pub fn add_market(self: &Arc<Self>, market: Market) {
        self.pool.register_market(market.clone());
        let (trigger_tx, trigger_rx) = mpsc::channel(8);
        let next_round_at = (!self.config.round_interval.is_zero())
            .then(|| self.clock.now_monotonic_ms() + self.config.round_interval.as_millis() as u64);
        self.markets.lock().unwrap().insert(
            market.clone(),
            MarketRuntime {
                phase: Phase::Idle,
                phase_started: Instant::now(),
                round_id: RoundId(0),
                next_round_at,
                trigger: trigger_tx,
                cancel: None,
            },
        );
        let engine = Arc::clone(self);
        let loop_market = market.clone();
        tokio::spawn(async move { engine.market_loop(loop_market, trigger_rx).await });
        if !self.config.round_interval.is_zero() {
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.scheduler_loop(market).await });
        }
    }

    /// Submits an encrypted order. Input-level rejections surface here
    /// synchronously and are never system faults.
    pub fn submit_order(&self, request: &SubmitOrderRequest) -> SubmitOrderResponse {
        let submission = match request.decode() {
            Ok(submission) => submission,
            Err(error) => {
                return SubmitOrderResponse {
                    accepted: false,
                    id: None,
                    reason: Some(error.to_string()),
                };
            }
        };
        let market = submission.market.clone();
        match self.pool.submit(submission) {
            Ok(uid) => {
                self.note_pending(&market);
                SubmitOrderResponse {
                    accepted: true,
                    id: Some(uid.0),
                    reason: None,
                }
            }
            Err(rejection) => SubmitOrderResponse {
                accepted: false,
                id: None,
                reason: Some(rejection.to_string()),
            },
        }
    }

    pub fn cancel_order(&self, owner: &str, nonce: u64) -> CancelOrderResponse {
        CancelOrderResponse {
            cancelled: self.pool.cancel(&Owner(owner.to_string()), Nonce(nonce)),
        }
    }

    pub fn round_status(&self, market: &Market) -> Option<RoundStatusDto> {
        let (pending_buys, pending_sells) = self.pool.pending(market)?;
        let markets = self.markets.lock().unwrap();
        let runtime = markets.get(market)?;
        let now = self.clock.now_monotonic_ms();
        Some(RoundStatusDto {
            round_id: runtime.round_id.0,
            phase: runtime.phase.to_string(),
            next_round_in_ms: runtime
                .next_round_at
                .map_or(0, |at| at.saturating_sub(now)),
            pending_buys: pending_buys as u64,
            pending_sells: pending_sells as u64,
        })
    }

    /// The domain result of an emitted round.
    pub fn result(&self, round_id: RoundId) -> Option<MatchingResult> {
        self.results.lock().unwrap().get(&round_id.0).cloned()
    }

    /// The wire-format result of an emitted round.
    pub fn get_result(&self, round_id: u64) -> Option<MatchingResultDto> {
        let result = self.result(RoundId(round_id))?;
        MatchingResultDto::try_from(&result).ok()
    }

    pub fn executor_health(&self) -> Vec<ExecutorHealth> {
        self.coordinator.registry().health()
    }

    pub fn executor_health_dto(&self) -> Vec<ExecutorHealthDto> {
        self.executor_health().iter().map(Into::into).collect()
    }

    /// Explicitly starts a round for the market at the next opportunity.
    pub fn trigger(&self, market: &Market) {
        self.send_trigger(market, Trigger::Explicit);
    }

    /// Requests cancellation of the in-flight round. Rounds honor this up
    /// to aggregation; during decryption it applies once the external call
    /// resolves. Returns whether a round was in flight.
    pub fn cancel_round(&self, market: &Market) -> bool {
        let markets = self.markets.lock().unwrap();
        match markets.get(market).and_then(|runtime| runtime.cancel.as_ref()) {
            Some(cancel) => cancel.send(true).is_ok(),
            None => false,
        }
    }

    pub fn set_market_open(&self, market: &Market, open: bool) {
        self.pool.set_market_open(market, open);
    }

    fn note_pending(&self, market: &Market) {
        let mut markets = self.markets.lock().unwrap();
        let Some(runtime) = markets.get_mut(market) else {
            return;
        };
        if runtime.phase == Phase::Idle {
            runtime.phase = Phase::Collecting;
        }
        let Some((buys, sells)) = self.pool.pending(market) else {
            return;
        };
        if buys.max(sells) >= self.config.pool_high_water_mark {
            let _ = runtime.trigger.try_send(Trigger::Fullness);
        }
    }

    fn send_trigger(&self, market: &Market, trigger: Trigger) {
        let markets = self.markets.lock().unwrap();
        if let Some(runtime) = markets.get(market) {
            let _ = runtime.trigger.try_send(trigger);
        }
    }

    async fn scheduler_loop(self: Arc<Self>, market: Market) {
        let period = self.config.round_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            {
                let mut markets = self.markets.lock().unwrap();
                let Some(runtime) = markets.get_mut(&market) else {
                    return;
                };
                runtime.next_round_at =
                    Some(self.clock.now_monotonic_ms() + period.as_millis() as u64);
            }
            self.send_trigger(&market, Trigger::Tick);
        }
    }

    async fn market_loop(self: Arc<Self>, market: Market, mut triggers: mpsc::Receiver<Trigger>) {
        while let Some(trigger) = triggers.recv().await {
            let round_id = RoundId(self.round_counter.fetch_add(1, Ordering::Relaxed) + 1);
            let (cancel_tx, cancel_rx) = watch::channel(false);
            {
                // Entering the round and leaving Idle must be one atomic
                // update, or a status reader could see the new round id
                // with no round in flight.
                let mut markets = self.markets.lock().unwrap();
                let Some(runtime) = markets.get_mut(&market) else {
                    return;
                };
                runtime.round_id = round_id;
                runtime.cancel = Some(cancel_tx);
                runtime.phase = Phase::Freezing;
                runtime.phase_started = Instant::now();
            }
            tracing::debug!(?trigger, round = round_id.0, %market, "starting round");

            let set_phase = |phase: Phase| self.set_phase(&market, phase);
            let outcome = round::run(RoundDeps {
                pool: &self.pool,
                coordinator: &self.coordinator,
                vrf_key: &self.vrf_key,
                config: &self.config,
                market: &market,
                round_id,
                cancel: cancel_rx,
                set_phase: &set_phase,
            })
            .instrument(tracing::info_span!("round", id = round_id.0, %market))
            .await;

            {
                let mut markets = self.markets.lock().unwrap();
                if let Some(runtime) = markets.get_mut(&market) {
                    runtime.cancel = None;
                }
            }

            match outcome {
                Ok(Some(result)) => self.emit(&market, result),
                Ok(None) => {
                    tracing::debug!(round = round_id.0, %market, "nothing to match");
                }
                Err(error) => {
                    // Structured abort event; orders were already restored.
                    tracing::warn!(
                        round = round_id.0,
                        %market,
                        reason = %error,
                        "round aborted"
                    );
                    self.metrics
                        .rounds
                        .with_label_values(&[&market.0, "aborted"])
                        .inc();
                    if error.is_fatal() {
                        tracing::error!(%market, "fatal round failure, stopping market loop");
                        self.set_phase(&market, Phase::Idle);
                        return;
                    }
                }
            }
            self.set_phase(&market, Phase::Idle);
        }
    }

    fn emit(&self, market: &Market, result: MatchingResult) {
        self.metrics
            .rounds
            .with_label_values(&[&market.0, "emitted"])
            .inc();
        self.metrics
            .matched_volume
            .with_label_values(&[&market.0])
            .inc_by(result.matched_volume);
        self.metrics
            .pairs
            .with_label_values(&[&market.0])
            .inc_by(result.pairs.len() as u64);
        self.metrics
            .clearing_price
            .with_label_values(&[&market.0])
            .set(i64::try_from(result.clearing_price).unwrap_or(i64::MAX));
        tracing::info!(
            round = result.round_id.0,
            %market,
            clearing_price = result.clearing_price,
            matched_volume = result.matched_volume,
            pairs = result.pairs.len(),
            "round emitted"
        );
        if result.matched_volume > 0 {
            self.settle(&result);
        }
        self.results
            .lock()
            .unwrap()
            .insert(result.round_id.0, result);
    }

    /// Threshold-signs the batch commitment and hands it to the settlement
    /// sink in the background. Failures are logged and counted; the result
    /// stays emitted.
    fn settle(&self, result: &MatchingResult) {
        let commitment = batch_commitment(result);
        let coordinator = Arc::clone(&self.coordinator);
        let settlement = Arc::clone(&self.settlement);
        let metrics = self.metrics;
        let round_id = result.round_id;
        tokio::spawn(
            async move {
                let signature = match coordinator.sign(commitment).await {
                    Ok(signature) => signature,
                    Err(error) => {
                        tracing::warn!(?error, "threshold signing failed");
                        metrics
                            .settlements
                            .with_label_values(&["sign_failed"])
                            .inc();
                        return;
                    }
                };
                match settlement.submit(commitment, signature).await {
                    Ok(tx) => {
                        tracing::info!(tx = %tx.0, "settled");
                        metrics.settlements.with_label_values(&["submitted"]).inc();
                    }
                    Err(error) => {
                        tracing::warn!(?error, "settlement submission failed");
                        metrics.settlements.with_label_values(&["failed"]).inc();
                    }
                }
            }
            .instrument(tracing::info_span!("settle", id = round_id.0)),
        );
    }

    fn set_phase(&self, market: &Market, phase: Phase) {
        let mut markets = self.markets.lock().unwrap();
        let Some(runtime) = markets.get_mut(market) else {
            return;
        };
        let elapsed = runtime.phase_started.elapsed();
        self.metrics
            .phase_seconds
            .with_label_values(&[&runtime.phase.to_string()])
            .observe(elapsed.as_secs_f64());
        runtime.phase = phase;
        runtime.phase_started = Instant::now();
    }
}

/// The commitment the settlement sink receives: a hash over everything the
/// emitted result reveals.
fn batch_commitment(result: &MatchingResult) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"phantompool/v1/batch");
    hasher.update(result.round_id.0.to_be_bytes());
    hasher.update(result.clearing_price.to_be_bytes());
    hasher.update(result.matched_volume.to_be_bytes());
    for pair in &result.pairs {
        hasher.update(pair.buy.0.to_be_bytes());
        hasher.update(pair.sell.0.to_be_bytes());
        hasher.update(pair.amount.to_be_bytes());
    }
    hasher.finalize().into()
}
