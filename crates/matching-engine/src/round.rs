//! Execution of a single matching round against a frozen pool snapshot.
//!
//! The round only ever decrypts aggregates: the two side sums, the per-tick
//! sums used to locate the clearing price, and the amounts of the orders
//! that actually cross it. Any failure puts the pool back into its exact
//! pre-round state; a round never partially matches.

use {
    crate::{config::Config, merkle, pricing},
    executor_net::Coordinator,
    model::{
        order::{Market, Order, Side},
        round::{MatchingResult, Pair, Phase, RoundId},
    },
    order_pool::{OrderPool, RoundSnapshot},
    phantom_crypto::{
        Ciphertext,
        curve::KeyMaterial,
        elgamal::{self, PartialDecryption},
        vrf,
    },
    sha2::{Digest, Sha256},
    std::collections::BTreeMap,
    tokio::sync::watch,
};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error("quorum not reached")]
    QuorumNotReached,
    #[error("aggregate volume exceeded the configured cap")]
    VolumeOutOfRange,
    #[error("own vrf proof failed verification")]
    VrfProofInvalid,
    #[error("round cancelled")]
    Cancelled,
}

impl RoundError {
    /// Fatal errors indicate a bug rather than an environmental failure;
    /// the market loop stops instead of retrying next round.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::VrfProofInvalid)
    }
}

fn map_executor_error(error: executor_net::Error) -> RoundError {
    match error {
        executor_net::Error::Crypto(elgamal::Error::DiscreteLog(_)) => {
            RoundError::VolumeOutOfRange
        }
        _ => RoundError::QuorumNotReached,
    }
}

pub(crate) struct RoundDeps<'a> {
    pub pool: &'a OrderPool,
    pub coordinator: &'a Coordinator,
    pub vrf_key: &'a KeyMaterial,
    pub config: &'a Config,
    pub market: &'a Market,
    pub round_id: RoundId,
    pub cancel: watch::Receiver<bool>,
    pub set_phase: &'a (dyn Fn(Phase) + Send + Sync),
}

/// Drives one round to completion. `Ok(None)` means there was nothing to
/// match; `Err` means the round aborted and the pool was restored.
pub(crate) async fn run(deps: RoundDeps<'_>) -> Result<Option<MatchingResult>, RoundError> {
    (deps.set_phase)(Phase::Freezing);
    let Some(snapshot) = deps.pool.snapshot(deps.market, deps.round_id) else {
        return Ok(None);
    };
    if snapshot.buys.is_empty() && snapshot.sells.is_empty() {
        return Ok(None);
    }
    let pristine: Vec<Order> = snapshot
        .buys
        .iter()
        .chain(snapshot.sells.iter())
        .cloned()
        .collect();

    match execute(&deps, snapshot).await {
        Ok(outcome) => {
            // Unmatched tails go back rerandomized so the next round's pool
            // is unlinkable to this one.
            deps.pool.replay(deps.market, outcome.leftovers, true);
            Ok(Some(outcome.result))
        }
        Err(error) => {
            deps.pool.replay(deps.market, pristine, false);
            Err(error)
        }
    }
}

struct Outcome {
    result: MatchingResult,
    leftovers: Vec<Order>,
}

async fn execute(deps: &RoundDeps<'_>, snapshot: RoundSnapshot) -> Result<Outcome, RoundError> {
    let RoundSnapshot {
        round_id,
        mut buys,
        mut sells,
        sum_buys,
        sum_sells,
        seed,
        ..
    } = snapshot;

    // Shuffle. The VRF input commits to the round, the market, the exact
    // order set, and the pool seed folded over all submissions.
    let uids: Vec<_> = buys
        .iter()
        .chain(sells.iter())
        .map(|order| order.uid)
        .collect();
    let mut alpha = Vec::with_capacity(64 + deps.market.0.len());
    alpha.extend_from_slice(&round_id.0.to_be_bytes());
    alpha.extend_from_slice(deps.market.0.as_bytes());
    alpha.extend_from_slice(&merkle::merkle_root(&uids));
    alpha.extend_from_slice(&seed);
    let proof = vrf::prove(deps.vrf_key, &alpha);
    if !vrf::verify(deps.vrf_key.public(), &alpha, &proof) {
        return Err(RoundError::VrfProofInvalid);
    }
    let shuffle_seed = vrf::to_uniform_bytes(proof.gamma);
    vrf::shuffle(side_seed(shuffle_seed, Side::Buy), &mut buys);
    vrf::shuffle(side_seed(shuffle_seed, Side::Sell), &mut sells);

    check_cancelled(&deps.cancel)?;
    (deps.set_phase)(Phase::Aggregating);
    let buy_ticks = tick_sums(&buys);
    let sell_ticks = tick_sums(&sells);

    check_cancelled(&deps.cancel)?;
    (deps.set_phase)(Phase::Decrypting);
    let mut batch = Vec::new();
    batch.extend(sum_buys);
    batch.extend(sum_sells);
    batch.extend(buy_ticks.values().copied());
    batch.extend(sell_ticks.values().copied());
    let values = decrypt_batch(deps, &batch).await?;
    let transcript = decrypt_transcript(deps, sum_buys, sum_sells).await?;
    // Cancellation during decryption is deferred until the calls above
    // resolved; it still restores the full pre-round state.
    check_cancelled(&deps.cancel)?;

    let mut values = values.into_iter();
    let total_buy = sum_buys.map_or(0, |_| values.next().unwrap_or(0));
    let total_sell = sum_sells.map_or(0, |_| values.next().unwrap_or(0));
    let buy_tick_volumes: BTreeMap<u32, u64> = buy_ticks
        .keys()
        .map(|&tick| (tick, values.next().unwrap_or(0)))
        .collect();
    let sell_tick_volumes: BTreeMap<u32, u64> = sell_ticks
        .keys()
        .map(|&tick| (tick, values.next().unwrap_or(0)))
        .collect();

    (deps.set_phase)(Phase::Pricing);
    let clearing = if total_buy == 0 || total_sell == 0 {
        None
    } else {
        let mut ticks: BTreeMap<u32, pricing::TickVolume> = BTreeMap::new();
        for (&tick, &volume) in &buy_tick_volumes {
            ticks
                .entry(tick)
                .or_insert(pricing::TickVolume {
                    tick,
                    buy: 0,
                    sell: 0,
                })
                .buy += volume;
        }
        for (&tick, &volume) in &sell_tick_volumes {
            ticks
                .entry(tick)
                .or_insert(pricing::TickVolume {
                    tick,
                    buy: 0,
                    sell: 0,
                })
                .sell += volume;
        }
        let ticks: Vec<pricing::TickVolume> = ticks.into_values().collect();
        pricing::clearing_tick(&ticks)
    };

    let Some(clearing) = clearing else {
        // No crossing ticks: emit an empty result and return both sides.
        tracing::debug!(round = round_id.0, "no cross");
        let leftovers = buys.into_iter().chain(sells).collect();
        return Ok(Outcome {
            result: MatchingResult {
                round_id,
                clearing_price: 0,
                matched_volume: 0,
                pairs: Vec::new(),
                vrf: proof,
                decryption_transcript: transcript,
            },
            leftovers,
        });
    };

    (deps.set_phase)(Phase::Pairing);
    let (pairs, leftovers) = pair_orders(deps, buys, sells, clearing.tick).await?;

    (deps.set_phase)(Phase::Emitting);
    let matched_volume = pairs.iter().map(|pair| pair.amount).sum();
    Ok(Outcome {
        result: MatchingResult {
            round_id,
            clearing_price: clearing.tick as u64 * deps.config.tick_size,
            matched_volume,
            pairs,
            vrf: proof,
            decryption_transcript: transcript,
        },
        leftovers,
    })
}

/// Walks the shuffled eligible orders at the clearing tick and pairs them
/// sequentially, each pair taking the smaller remaining amount. Only the
/// amounts of eligible orders are decrypted, in one batch.
async fn pair_orders(
    deps: &RoundDeps<'_>,
    buys: Vec<Order>,
    sells: Vec<Order>,
    clearing_tick: u32,
) -> Result<(Vec<Pair>, Vec<Order>), RoundError> {
    let mut leftovers = Vec::new();
    let mut eligible_buys = Vec::new();
    for order in buys {
        if order.tick.0 >= clearing_tick {
            eligible_buys.push(order);
        } else {
            leftovers.push(order);
        }
    }
    let mut eligible_sells = Vec::new();
    for order in sells {
        if order.tick.0 <= clearing_tick {
            eligible_sells.push(order);
        } else {
            leftovers.push(order);
        }
    }

    let amounts: Vec<Ciphertext> = eligible_buys
        .iter()
        .chain(eligible_sells.iter())
        .map(|order| order.encrypted_amount)
        .collect();
    let amounts = decrypt_batch(deps, &amounts).await?;
    let (buy_amounts, sell_amounts) = amounts.split_at(eligible_buys.len());
    let mut buy_remaining: Vec<u64> = buy_amounts.to_vec();
    let mut sell_remaining: Vec<u64> = sell_amounts.to_vec();

    let mut pairs = Vec::new();
    let (mut bi, mut si) = (0, 0);
    while bi < eligible_buys.len() && si < eligible_sells.len() {
        let amount = buy_remaining[bi].min(sell_remaining[si]);
        if amount > 0 {
            pairs.push(Pair {
                buy: eligible_buys[bi].uid,
                sell: eligible_sells[si].uid,
                amount,
            });
            buy_remaining[bi] -= amount;
            sell_remaining[si] -= amount;
        }
        if buy_remaining[bi] == 0 {
            bi += 1;
        }
        if si < eligible_sells.len() && sell_remaining[si] == 0 {
            si += 1;
        }
    }

    // Fully filled orders are consumed; a partially filled order returns
    // with its remainder freshly encrypted.
    let group_key = deps.coordinator.group_key();
    let mut rng = rand::thread_rng();
    for (mut order, remaining) in eligible_buys
        .into_iter()
        .zip(buy_remaining)
        .chain(eligible_sells.into_iter().zip(sell_remaining))
    {
        if remaining == 0 {
            continue;
        }
        if let Ok(ciphertext) = elgamal::encrypt(
            group_key,
            remaining,
            deps.config.max_round_volume,
            &mut rng,
        ) {
            order.encrypted_amount = ciphertext;
        }
        leftovers.push(order);
    }
    Ok((pairs, leftovers))
}

async fn decrypt_batch(
    deps: &RoundDeps<'_>,
    ciphertexts: &[Ciphertext],
) -> Result<Vec<u64>, RoundError> {
    let mut attempt = 0;
    loop {
        match deps
            .coordinator
            .batch_decrypt(ciphertexts, deps.config.max_round_volume)
            .await
        {
            Ok(values) => return Ok(values),
            Err(error) if error.is_transient() && attempt + 1 < deps.config.decrypt_attempts => {
                tracing::warn!(attempt, ?error, "batch decryption failed, retrying");
                attempt += 1;
            }
            Err(error) => return Err(map_executor_error(error)),
        }
    }
}

/// Threshold-decrypts the combined volume of both sides once, keeping the
/// verified partials as the round's public transcript.
async fn decrypt_transcript(
    deps: &RoundDeps<'_>,
    sum_buys: Option<Ciphertext>,
    sum_sells: Option<Ciphertext>,
) -> Result<Vec<PartialDecryption>, RoundError> {
    let total = match (sum_buys, sum_sells) {
        (Some(buys), Some(sells)) => buys.add(sells),
        (Some(single), None) | (None, Some(single)) => single,
        (None, None) => return Ok(Vec::new()),
    };
    let mut attempt = 0;
    loop {
        match deps
            .coordinator
            .decrypt(total, deps.config.max_round_volume)
            .await
        {
            Ok(decryption) => return Ok(decryption.transcript),
            Err(error) if error.is_transient() && attempt + 1 < deps.config.decrypt_attempts => {
                tracing::warn!(attempt, ?error, "transcript decryption failed, retrying");
                attempt += 1;
            }
            Err(error) => return Err(map_executor_error(error)),
        }
    }
}

fn tick_sums(orders: &[Order]) -> BTreeMap<u32, Ciphertext> {
    let mut sums: BTreeMap<u32, Ciphertext> = BTreeMap::new();
    for order in orders {
        sums.entry(order.tick.0)
            .and_modify(|sum| *sum = sum.add(order.encrypted_amount))
            .or_insert(order.encrypted_amount);
    }
    sums
}

fn side_seed(seed: [u8; 32], side: Side) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"phantompool/v1/side-seed");
    hasher.update(seed);
    hasher.update([match side {
        Side::Buy => 0u8,
        Side::Sell => 1u8,
    }]);
    hasher.finalize().into()
}

fn check_cancelled(cancel: &watch::Receiver<bool>) -> Result<(), RoundError> {
    if *cancel.borrow() {
        Err(RoundError::Cancelled)
    } else {
        Ok(())
    }
}
