//! Threshold Schnorr signatures over batch commitments.
//!
//! The coordinator runs two rounds: participants first commit to their
//! signing nonces, then answer the aggregated challenge. Partial responses
//! combine with the same Lagrange weights as partial decryptions. Signing
//! nonces are derived from `(share, session, message)`; a session id is
//! used for exactly one message and one challenge.

use phantom_crypto::{
    Point, Scalar,
    curve::hash_to_scalar,
    shamir::Share,
};

/// A combined Schnorr signature under the group public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdSignature {
    pub r: Point,
    pub s: Scalar,
}

pub fn nonce(share: &Share, session: u64, message: &[u8; 32]) -> Scalar {
    hash_to_scalar(
        "sign/nonce",
        &[
            &share.value.to_be_bytes(),
            &session.to_be_bytes(),
            message,
        ],
    )
}

pub fn challenge(combined_nonce: Point, group_key: Point, message: &[u8; 32]) -> Scalar {
    hash_to_scalar(
        "sign/challenge",
        &[
            &combined_nonce.to_bytes().unwrap_or([0u8; 64]),
            &group_key.to_bytes().unwrap_or([0u8; 64]),
            message,
        ],
    )
}

/// Checks a partial response against the executor's nonce commitment and
/// public share: `s_i * G == R_i + c * PK_i`.
pub fn verify_partial(
    share: Scalar,
    commitment: Point,
    challenge: Scalar,
    public_share: Point,
) -> bool {
    Point::generator().mul_vartime(share)
        == commitment.add(public_share.mul_vartime(challenge))
}

/// Checks the combined signature under the group key.
pub fn verify(signature: &ThresholdSignature, group_key: Point, message: &[u8; 32]) -> bool {
    let c = challenge(signature.r, group_key, message);
    Point::generator().mul_vartime(signature.s)
        == signature.r.add(group_key.mul_vartime(c))
}
