use {
    crate::time::Timestamp,
    phantom_crypto::{Ciphertext, Point, rangeproof::RangeProof},
};

/// A trading pair such as `"ETH/USDC"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Market(pub String);

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Market {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// The address that placed an order. Opaque to the engine; only the wallet
/// collaborator interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Owner(pub String);

/// Per-owner monotone counter preventing replay of submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nonce(pub u64);

/// Engine-assigned order identifier, unique per engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderUid(pub u64);

/// Public coarse price bucket committed at submission time. The tick price
/// is `index * tick_size`; only tick aggregates are ever decrypted when the
/// engine searches for the clearing price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickIndex(pub u32);

/// The Bulletproof commitment and proof showing the owner can cover the
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvencyProof {
    pub commitment: Point,
    pub proof: RangeProof,
}

/// Opaque signature bytes checked by the wallet collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(pub Vec<u8>);

/// An encrypted order as held by the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub uid: OrderUid,
    pub owner: Owner,
    pub market: Market,
    pub side: Side,
    pub encrypted_amount: Ciphertext,
    pub encrypted_limit_price: Ciphertext,
    pub tick: TickIndex,
    pub solvency: SolvencyProof,
    pub signature: Signature,
    pub submit_time: Timestamp,
    pub nonce: Nonce,
}

impl Order {
    /// The canonical byte string the order signature covers. Every field a
    /// malicious relay could benefit from changing is bound here.
    pub fn signing_message(
        owner: &Owner,
        market: &Market,
        side: Side,
        commitment: Point,
        nonce: Nonce,
        submit_time: Timestamp,
    ) -> Vec<u8> {
        let mut message = Vec::with_capacity(128);
        message.extend_from_slice(b"phantompool/order/");
        message.extend_from_slice(owner.0.as_bytes());
        message.push(0);
        message.extend_from_slice(market.0.as_bytes());
        message.push(0);
        message.push(match side {
            Side::Buy => 0,
            Side::Sell => 1,
        });
        message.extend_from_slice(&commitment.to_bytes().unwrap_or([0u8; 64]));
        message.extend_from_slice(&nonce.0.to_be_bytes());
        message.extend_from_slice(&submit_time.0.to_be_bytes());
        message
    }
}

/// A decoded submission: everything an [`Order`] carries except the uid,
/// which the pool assigns on acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub owner: Owner,
    pub market: Market,
    pub side: Side,
    pub encrypted_amount: Ciphertext,
    pub encrypted_limit_price: Ciphertext,
    pub tick: TickIndex,
    pub solvency: SolvencyProof,
    pub signature: Signature,
    pub nonce: Nonce,
    pub submit_time: Timestamp,
}

impl Submission {
    pub fn into_order(self, uid: OrderUid) -> Order {
        Order {
            uid,
            owner: self.owner,
            market: self.market,
            side: self.side,
            encrypted_amount: self.encrypted_amount,
            encrypted_limit_price: self.encrypted_limit_price,
            tick: self.tick,
            solvency: self.solvency,
            signature: self.signature,
            submit_time: self.submit_time,
            nonce: self.nonce,
        }
    }

    pub fn signed_message(&self) -> Vec<u8> {
        Order::signing_message(
            &self.owner,
            &self.market,
            self.side,
            self.solvency.commitment,
            self.nonce,
            self.submit_time,
        )
    }
}

/// Why a submission was not accepted. Surfaced verbatim to the caller and
/// used as a metric label; never counted as a system fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
    InvalidSignature,
    SolvencyFailed,
    DuplicateNonce,
    UnknownMarket,
    MarketClosed,
    AmountOutOfRange,
    PoolFull,
}
