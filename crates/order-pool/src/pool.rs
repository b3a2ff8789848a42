use {
    crate::{metrics::Metrics, traits::SignatureVerifying},
    model::{
        order::{Market, Nonce, Order, OrderUid, Owner, Rejection, Side, Submission},
        round::RoundId,
    },
    phantom_crypto::{Ciphertext, Point, elgamal, rangeproof},
    sha2::{Digest, Sha256},
    std::{
        collections::{HashMap, HashSet},
        sync::{
            Arc, RwLock,
            atomic::{AtomicU64, Ordering},
        },
    },
};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Orders per market side above which submissions are rejected.
    pub capacity_per_side: usize,
    /// Upper bound on the public tick price of a submission.
    pub max_price: u64,
    /// Price represented by one tick index step, in micro-units.
    pub tick_size: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity_per_side: 1024,
            max_price: 1 << 40,
            tick_size: 1000,
        }
    }
}

/// A frozen view of one market at a round boundary. Snapshots are taken
/// atomically: an order is either fully inside one snapshot or still in the
/// pool, never both.
#[derive(Debug, Clone)]
pub struct RoundSnapshot {
    pub round_id: RoundId,
    pub market: Market,
    pub buys: Vec<Order>,
    pub sells: Vec<Order>,
    pub sum_buys: Option<Ciphertext>,
    pub sum_sells: Option<Ciphertext>,
    pub seed: [u8; 32],
}

#[derive(Default)]
struct SideQueue {
    orders: Vec<Order>,
    /// Homomorphic fold of all contained encrypted amounts. Kept in lockstep
    /// with `orders`; any mutation recomputes or extends it.
    sum: Option<Ciphertext>,
    seed: [u8; 32],
}

impl SideQueue {
    fn push(&mut self, order: Order) {
        self.sum = Some(match self.sum {
            Some(sum) => sum.add(order.encrypted_amount),
            None => order.encrypted_amount,
        });
        self.seed = fold_seed(self.seed, order.solvency.commitment);
        self.orders.push(order);
    }

    fn rebuild_caches(&mut self) {
        self.sum = None;
        self.seed = [0u8; 32];
        for order in &self.orders {
            self.sum = Some(match self.sum {
                Some(sum) => sum.add(order.encrypted_amount),
                None => order.encrypted_amount,
            });
            self.seed = fold_seed(self.seed, order.solvency.commitment);
        }
    }

    fn drain(&mut self) -> (Vec<Order>, Option<Ciphertext>, [u8; 32]) {
        let orders = std::mem::take(&mut self.orders);
        let sum = self.sum.take();
        let seed = std::mem::replace(&mut self.seed, [0u8; 32]);
        (orders, sum, seed)
    }
}

fn fold_seed(seed: [u8; 32], commitment: Point) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"phantompool/v1/pool-seed");
    hasher.update(seed);
    hasher.update(commitment.to_bytes().unwrap_or([0u8; 64]));
    hasher.finalize().into()
}

struct MarketState {
    buys: SideQueue,
    sells: SideQueue,
    /// Nonces stay consumed forever, including for cancelled and matched
    /// orders; this is what makes replayed submissions fail.
    used_nonces: HashSet<(Owner, Nonce)>,
    open: bool,
}

impl MarketState {
    fn new() -> Self {
        Self {
            buys: SideQueue::default(),
            sells: SideQueue::default(),
            used_nonces: HashSet::new(),
            open: true,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideQueue {
        match side {
            Side::Buy => &mut self.buys,
            Side::Sell => &mut self.sells,
        }
    }
}

/// The mutable state of pending encrypted orders, one two-sided queue per
/// registered market. Mutations go through a per-pool write lock; reads of
/// cached aggregates share a read lock.
pub struct OrderPool {
    markets: RwLock<HashMap<Market, MarketState>>,
    wallet: Arc<dyn SignatureVerifying>,
    range_gens: Arc<rangeproof::Generators>,
    encryption_key: Point,
    config: PoolConfig,
    next_uid: AtomicU64,
    metrics: &'static Metrics,
}

impl OrderPool {
    pub fn new(
        wallet: Arc<dyn SignatureVerifying>,
        range_gens: Arc<rangeproof::Generators>,
        encryption_key: Point,
        config: PoolConfig,
    ) -> Self {
        Self {
            markets: Default::default(),
            wallet,
            range_gens,
            encryption_key,
            config,
            next_uid: AtomicU64::new(1),
            metrics: Metrics::get(),
        }
    }

    pub fn register_market(&self, market: Market) {
        self.markets
            .write()
            .unwrap()
            .entry(market)
            .or_insert_with(MarketState::new);
    }

    pub fn set_market_open(&self, market: &Market, open: bool) {
        if let Some(state) = self.markets.write().unwrap().get_mut(market) {
            state.open = open;
        }
    }

    /// Validates and appends a submission. The heavy proof checks run
    /// before the pool lock is taken.
    pub fn submit(&self, submission: Submission) -> Result<OrderUid, Rejection> {
        let result = self.submit_inner(submission);
        if let Err(rejection) = &result {
            let reason: &'static str = (*rejection).into();
            self.metrics.rejections.with_label_values(&[reason]).inc();
        }
        result
    }

    fn submit_inner(&self, submission: Submission) -> Result<OrderUid, Rejection> {
        {
            let markets = self.markets.read().unwrap();
            let state = markets
                .get(&submission.market)
                .ok_or(Rejection::UnknownMarket)?;
            if !state.open {
                return Err(Rejection::MarketClosed);
            }
        }
        let tick_price = (submission.tick.0 as u64).saturating_mul(self.config.tick_size);
        if tick_price > self.config.max_price {
            return Err(Rejection::AmountOutOfRange);
        }
        if !self.wallet.verify_signature(
            &submission.owner.0,
            &submission.signed_message(),
            &submission.signature.0,
        ) {
            return Err(Rejection::InvalidSignature);
        }
        if !rangeproof::verify(
            &self.range_gens,
            submission.solvency.commitment,
            &submission.solvency.proof,
        ) {
            return Err(Rejection::SolvencyFailed);
        }

        let mut markets = self.markets.write().unwrap();
        let state = markets
            .get_mut(&submission.market)
            .ok_or(Rejection::UnknownMarket)?;
        if !state.open {
            return Err(Rejection::MarketClosed);
        }
        if state.side_mut(submission.side).orders.len() >= self.config.capacity_per_side {
            return Err(Rejection::PoolFull);
        }
        let nonce_key = (submission.owner.clone(), submission.nonce);
        if state.used_nonces.contains(&nonce_key) {
            return Err(Rejection::DuplicateNonce);
        }
        state.used_nonces.insert(nonce_key);

        let uid = OrderUid(self.next_uid.fetch_add(1, Ordering::Relaxed));
        let market = submission.market.clone();
        let side = submission.side;
        state.side_mut(side).push(submission.into_order(uid));

        self.metrics
            .submissions
            .with_label_values(&[&market.0, "accepted"])
            .inc();
        self.metrics
            .pending_orders
            .with_label_values(&[&market.0, &side.to_string()])
            .set(i64::try_from(state.side_mut(side).orders.len()).unwrap_or(i64::MAX));
        tracing::debug!(%market, %side, uid = uid.0, "order accepted");
        Ok(uid)
    }

    /// Removes a pending order. Returns `false` for orders that are
    /// unknown, already matched, or currently frozen inside a round
    /// snapshot; cancellation is idempotent and never touches a snapshot.
    pub fn cancel(&self, owner: &Owner, nonce: Nonce) -> bool {
        let mut markets = self.markets.write().unwrap();
        for (market, state) in markets.iter_mut() {
            for side in [Side::Buy, Side::Sell] {
                let queue = state.side_mut(side);
                let Some(position) = queue
                    .orders
                    .iter()
                    .position(|order| order.owner == *owner && order.nonce == nonce)
                else {
                    continue;
                };
                queue.orders.remove(position);
                queue.rebuild_caches();
                self.metrics
                    .pending_orders
                    .with_label_values(&[&market.0, &side.to_string()])
                    .set(i64::try_from(queue.orders.len()).unwrap_or(i64::MAX));
                self.metrics
                    .cancellations
                    .with_label_values(&["cancelled"])
                    .inc();
                tracing::debug!(%market, %side, "order cancelled");
                return true;
            }
        }
        self.metrics
            .cancellations
            .with_label_values(&["no_op"])
            .inc();
        false
    }

    /// Atomically drains the market into a frozen snapshot and resets the
    /// caches. Orders submitted after this call belong to the next round.
    pub fn snapshot(&self, market: &Market, round_id: RoundId) -> Option<RoundSnapshot> {
        let mut markets = self.markets.write().unwrap();
        let state = markets.get_mut(market)?;
        let (buys, sum_buys, buy_seed) = state.buys.drain();
        let (sells, sum_sells, sell_seed) = state.sells.drain();
        for side in [Side::Buy, Side::Sell] {
            self.metrics
                .pending_orders
                .with_label_values(&[&market.0, &side.to_string()])
                .set(0);
        }
        let mut hasher = Sha256::new();
        hasher.update(b"phantompool/v1/snapshot-seed");
        hasher.update(buy_seed);
        hasher.update(sell_seed);
        Some(RoundSnapshot {
            round_id,
            market: market.clone(),
            buys,
            sells,
            sum_buys,
            sum_sells,
            seed: hasher.finalize().into(),
        })
    }

    /// Re-inserts orders a round did not consume. Replayed orders keep
    /// their original submit time and uid. With `rerandomize` set their
    /// ciphertexts are refreshed so an observer cannot link them across
    /// rounds; aborted rounds replay verbatim instead, restoring the exact
    /// pre-round state.
    pub fn replay(&self, market: &Market, orders: Vec<Order>, rerandomize: bool) {
        if orders.is_empty() {
            return;
        }
        let mut rng = rand::thread_rng();
        let mut markets = self.markets.write().unwrap();
        let Some(state) = markets.get_mut(market) else {
            return;
        };
        for mut order in orders {
            if rerandomize {
                order.encrypted_amount =
                    elgamal::rerandomize(self.encryption_key, order.encrypted_amount, &mut rng);
                order.encrypted_limit_price = elgamal::rerandomize(
                    self.encryption_key,
                    order.encrypted_limit_price,
                    &mut rng,
                );
            }
            let side = order.side;
            state.side_mut(side).orders.push(order);
        }
        for side in [Side::Buy, Side::Sell] {
            let queue = state.side_mut(side);
            queue
                .orders
                .sort_by_key(|order| (order.submit_time, order.uid));
            queue.rebuild_caches();
            self.metrics
                .pending_orders
                .with_label_values(&[&market.0, &side.to_string()])
                .set(i64::try_from(queue.orders.len()).unwrap_or(i64::MAX));
        }
    }

    /// Number of pending (buy, sell) orders, or `None` for unknown markets.
    pub fn pending(&self, market: &Market) -> Option<(usize, usize)> {
        let markets = self.markets.read().unwrap();
        let state = markets.get(market)?;
        Some((state.buys.orders.len(), state.sells.orders.len()))
    }

    /// The cached aggregate ciphertexts of both sides.
    pub fn aggregates(&self, market: &Market) -> Option<(Option<Ciphertext>, Option<Ciphertext>)> {
        let markets = self.markets.read().unwrap();
        let state = markets.get(market)?;
        Some((state.buys.sum, state.sells.sum))
    }

    pub fn markets(&self) -> Vec<Market> {
        self.markets.read().unwrap().keys().cloned().collect()
    }
}
