use {
    crate::order::OrderUid,
    phantom_crypto::{elgamal::PartialDecryption, vrf::VrfProof},
};

/// Monotonically increasing round identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundId(pub u64);

impl RoundId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for RoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The states a round moves through. Also reported by the status API, which
/// shows `Idle` between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Idle,
    Collecting,
    Freezing,
    Aggregating,
    Decrypting,
    Pricing,
    Pairing,
    Emitting,
}

/// One matched (buy, sell) pair at the clearing price. Amounts are in the
/// same micro-units as the orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub buy: OrderUid,
    pub sell: OrderUid,
    pub amount: u64,
}

/// The aggregate outcome of one round. This is everything the engine
/// reveals: the uniform price, the matched volume, the pairs, and the
/// material to audit the shuffle and the threshold decryption.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingResult {
    pub round_id: RoundId,
    pub clearing_price: u64,
    pub matched_volume: u64,
    pub pairs: Vec<Pair>,
    pub vrf: VrfProof,
    pub decryption_transcript: Vec<PartialDecryption>,
}

