//! Wire representations of the core API. All scalars and coordinates are
//! 32-byte big-endian values, hex-encoded in lowercase; formats here are
//! bit-exact and versioned implicitly by the API.

use {
    crate::{
        health::ExecutorHealth,
        order::{Market, Nonce, Owner, Side, Signature, SolvencyProof, Submission, TickIndex},
        round::{MatchingResult, Pair},
        time::Timestamp,
    },
    phantom_crypto::{
        Ciphertext, Point,
        curve,
        elgamal::{DleqProof, PartialDecryption},
        rangeproof::RangeProof,
        vrf::VrfProof,
    },
    serde::{Deserialize, Serialize},
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("field is not valid lowercase hex of the expected width")]
    InvalidHex,
    #[error("the point at infinity cannot appear on the wire")]
    PointAtInfinity,
    #[error("malformed solvency proof")]
    InvalidProof,
    #[error(transparent)]
    Curve(#[from] curve::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointDto {
    pub x: String,
    pub y: String,
}

impl TryFrom<Point> for PointDto {
    type Error = DecodeError;

    fn try_from(point: Point) -> Result<Self, Self::Error> {
        let bytes = point
            .to_bytes()
            .map_err(|_| DecodeError::PointAtInfinity)?;
        Ok(Self {
            x: hex::encode(&bytes[..32]),
            y: hex::encode(&bytes[32..]),
        })
    }
}

impl TryFrom<&PointDto> for Point {
    type Error = DecodeError;

    fn try_from(dto: &PointDto) -> Result<Self, Self::Error> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&decode_hex32(&dto.x)?);
        bytes[32..].copy_from_slice(&decode_hex32(&dto.y)?);
        Ok(Point::from_bytes(&bytes)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextDto {
    pub c1: PointDto,
    pub c2: PointDto,
}

impl TryFrom<Ciphertext> for CiphertextDto {
    type Error = DecodeError;

    fn try_from(ciphertext: Ciphertext) -> Result<Self, Self::Error> {
        Ok(Self {
            c1: ciphertext.c1.try_into()?,
            c2: ciphertext.c2.try_into()?,
        })
    }
}

impl TryFrom<&CiphertextDto> for Ciphertext {
    type Error = DecodeError;

    fn try_from(dto: &CiphertextDto) -> Result<Self, Self::Error> {
        Ok(Self {
            c1: (&dto.c1).try_into()?,
            c2: (&dto.c2).try_into()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfProofDto {
    pub gamma: PointDto,
    pub c: String,
    pub s: String,
}

impl TryFrom<VrfProof> for VrfProofDto {
    type Error = DecodeError;

    fn try_from(proof: VrfProof) -> Result<Self, Self::Error> {
        Ok(Self {
            gamma: proof.gamma.try_into()?,
            c: hex::encode(proof.c.to_be_bytes()),
            s: hex::encode(proof.s.to_be_bytes()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DleqProofDto {
    pub c: String,
    pub s: String,
}

impl From<DleqProof> for DleqProofDto {
    fn from(proof: DleqProof) -> Self {
        Self {
            c: hex::encode(proof.c.to_be_bytes()),
            s: hex::encode(proof.s.to_be_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionShareDto {
    pub index: u32,
    pub proof: DleqProofDto,
    pub partial: PointDto,
}

impl TryFrom<&PartialDecryption> for DecryptionShareDto {
    type Error = DecodeError;

    fn try_from(partial: &PartialDecryption) -> Result<Self, Self::Error> {
        Ok(Self {
            index: partial.index,
            proof: partial.proof.into(),
            partial: partial.share.try_into()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingResultDto {
    pub round_id: u64,
    pub clearing_price: u64,
    pub matched_volume: u64,
    pub pairs: Vec<(u64, u64, u64)>,
    pub vrf: VrfProofDto,
    pub decryption_transcript: Vec<DecryptionShareDto>,
}

impl TryFrom<&MatchingResult> for MatchingResultDto {
    type Error = DecodeError;

    fn try_from(result: &MatchingResult) -> Result<Self, Self::Error> {
        Ok(Self {
            round_id: result.round_id.0,
            clearing_price: result.clearing_price,
            matched_volume: result.matched_volume,
            pairs: result
                .pairs
                .iter()
                .map(|Pair { buy, sell, amount }| (buy.0, sell.0, *amount))
                .collect(),
            vrf: result.vrf.try_into()?,
            decryption_transcript: result
                .decryption_transcript
                .iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideDto {
    Buy,
    Sell,
}

impl From<SideDto> for Side {
    fn from(side: SideDto) -> Self {
        match side {
            SideDto::Buy => Side::Buy,
            SideDto::Sell => Side::Sell,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    pub owner: String,
    pub market: String,
    pub side: SideDto,
    pub encrypted_amount: CiphertextDto,
    pub encrypted_limit_price: CiphertextDto,
    pub tick_index: u32,
    pub solvency_commitment: PointDto,
    /// Opaque range proof bytes, hex-encoded.
    pub solvency_proof: String,
    /// Opaque wallet signature bytes, hex-encoded.
    pub signature: String,
    pub nonce: u64,
    pub submit_time: u64,
}

impl SubmitOrderRequest {
    pub fn decode(&self) -> Result<Submission, DecodeError> {
        let proof_bytes = hex::decode(&self.solvency_proof).map_err(|_| DecodeError::InvalidHex)?;
        Ok(Submission {
            owner: Owner(self.owner.clone()),
            market: Market(self.market.clone()),
            side: self.side.into(),
            encrypted_amount: (&self.encrypted_amount).try_into()?,
            encrypted_limit_price: (&self.encrypted_limit_price).try_into()?,
            tick: TickIndex(self.tick_index),
            solvency: SolvencyProof {
                commitment: (&self.solvency_commitment).try_into()?,
                proof: RangeProof::from_bytes(&proof_bytes)
                    .map_err(|_| DecodeError::InvalidProof)?,
            },
            signature: Signature(
                hex::decode(&self.signature).map_err(|_| DecodeError::InvalidHex)?,
            ),
            nonce: Nonce(self.nonce),
            submit_time: Timestamp(self.submit_time),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderResponse {
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStatusDto {
    pub round_id: u64,
    pub phase: String,
    pub next_round_in_ms: u64,
    pub pending_buys: u64,
    pub pending_sells: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorHealthDto {
    pub index: u32,
    pub status: String,
    pub error_rate: f64,
    pub last_heartbeat_ms: u64,
}

impl From<&ExecutorHealth> for ExecutorHealthDto {
    fn from(health: &ExecutorHealth) -> Self {
        Self {
            index: health.index,
            status: health.status.to_string(),
            error_rate: health.error_rate,
            last_heartbeat_ms: health.last_heartbeat_ms,
        }
    }
}

fn decode_hex32(input: &str) -> Result<[u8; 32], DecodeError> {
    let bytes = hex::decode(input).map_err(|_| DecodeError::InvalidHex)?;
    bytes.try_into().map_err(|_| DecodeError::InvalidHex)
}
