//! Uniform clearing price discovery over decrypted tick-bucket volumes.
//!
//! Limit prices are never decrypted per order: submissions commit to a
//! public tick index, and only the aggregate buy and sell volume per tick
//! is recovered through the threshold network. The clearing tick is the one
//! maximizing matched volume.

/// Aggregate decrypted volume at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickVolume {
    pub tick: u32,
    pub buy: u64,
    pub sell: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clearing {
    pub tick: u32,
    /// Executable volume at the tick: the smaller of demand at-or-above
    /// and supply at-or-below.
    pub matched: u64,
}

/// Picks the tick maximizing matched volume. Buy orders execute at ticks at
/// or below their limit, sells at or above, so demand accumulates downward
/// and supply upward. Ties break toward the midpoint of the volume-weighted
/// mean bid and ask ticks, then toward the lower tick.
pub fn clearing_tick(volumes: &[TickVolume]) -> Option<Clearing> {
    let mut ticks: Vec<TickVolume> = volumes.to_vec();
    ticks.sort_by_key(|volume| volume.tick);
    ticks.dedup_by(|duplicate, kept| {
        if duplicate.tick == kept.tick {
            kept.buy += duplicate.buy;
            kept.sell += duplicate.sell;
            true
        } else {
            false
        }
    });

    // supply_below[i]: sell volume at ticks <= ticks[i];
    // demand_above[i]: buy volume at ticks >= ticks[i].
    let mut supply_below = Vec::with_capacity(ticks.len());
    let mut running = 0u64;
    for volume in &ticks {
        running += volume.sell;
        supply_below.push(running);
    }
    let mut demand_above = vec![0u64; ticks.len()];
    let mut running = 0u64;
    for (position, volume) in ticks.iter().enumerate().rev() {
        running += volume.buy;
        demand_above[position] = running;
    }

    let midpoint = midpoint_distance_basis(&ticks)?;
    let mut best: Option<(Clearing, u128)> = None;
    for (position, volume) in ticks.iter().enumerate() {
        let matched = demand_above[position].min(supply_below[position]);
        if matched == 0 {
            continue;
        }
        let distance = midpoint.distance(volume.tick);
        let better = match &best {
            None => true,
            Some((incumbent, incumbent_distance)) => {
                matched > incumbent.matched
                    || (matched == incumbent.matched
                        && (distance < *incumbent_distance
                            || (distance == *incumbent_distance && volume.tick < incumbent.tick)))
            }
        };
        if better {
            best = Some((
                Clearing {
                    tick: volume.tick,
                    matched,
                },
                distance,
            ));
        }
    }
    best.map(|(clearing, _)| clearing)
}

/// Exact-arithmetic distance to the midpoint of the volume-weighted mean
/// bid and ask ticks: `|tick - (mean_bid + mean_ask) / 2|`, scaled by the
/// common denominator to stay in integers.
struct Midpoint {
    numerator: u128,
    denominator: u128,
}

impl Midpoint {
    fn distance(&self, tick: u32) -> u128 {
        let scaled = tick as u128 * self.denominator;
        scaled.abs_diff(self.numerator)
    }
}

fn midpoint_distance_basis(ticks: &[TickVolume]) -> Option<Midpoint> {
    let (mut bid_weighted, mut bid_volume) = (0u128, 0u128);
    let (mut ask_weighted, mut ask_volume) = (0u128, 0u128);
    for volume in ticks {
        bid_weighted += volume.tick as u128 * volume.buy as u128;
        bid_volume += volume.buy as u128;
        ask_weighted += volume.tick as u128 * volume.sell as u128;
        ask_volume += volume.sell as u128;
    }
    if bid_volume == 0 || ask_volume == 0 {
        return None;
    }
    // (bid_weighted/bid_volume + ask_weighted/ask_volume) / 2 over the
    // common denominator 2 * bid_volume * ask_volume.
    Some(Midpoint {
        numerator: bid_weighted * ask_volume + ask_weighted * bid_volume,
        denominator: 2 * bid_volume * ask_volume,
    })
}
