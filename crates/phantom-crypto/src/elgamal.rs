//! Additively homomorphic ElGamal over the curve.
//!
//! Messages are encrypted in the exponent: `C1 = r*G`, `C2 = m*G + r*PK`.
//! Adding two ciphertexts componentwise adds the plaintexts, which is what
//! lets the pool aggregate order amounts without decrypting them. Decryption
//! recovers `m*G` and solves the bounded discrete log with BSGS, so message
//! values must stay below the configured volume cap.
//!
//! Partial decryptions carry a Chaum-Pedersen proof binding the partial to
//! the executor's public share, which is what keeps a Byzantine executor
//! from corrupting a reconstruction undetected.

use {
    crate::{
        bsgs,
        curve::{KeyMaterial, Point, Scalar, hash_to_scalar},
        shamir::{self, Share},
    },
    rand::RngCore,
};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("message {message} is outside the range [0, {max})")]
    MessageOutOfRange { message: u64, max: u64 },
    #[error("partial decryption proof for executor {index} is invalid")]
    InvalidPartialProof { index: u32 },
    #[error("partial decryption batch for executor {index} has {actual} items, expected {expected}")]
    BatchLengthMismatch {
        index: u32,
        expected: usize,
        actual: usize,
    },
    #[error("no public share known for executor {index}")]
    UnknownShareIndex { index: u32 },
    #[error(transparent)]
    DiscreteLog(#[from] bsgs::Error),
    #[error(transparent)]
    Sharing(#[from] shamir::Error),
}

/// An ElGamal ciphertext. Componentwise addition of two ciphertexts encrypts
/// the sum of their plaintexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ciphertext {
    pub c1: Point,
    pub c2: Point,
}

impl Ciphertext {
    pub fn add(self, other: Self) -> Self {
        Self {
            c1: self.c1.add(other.c1),
            c2: self.c2.add(other.c2),
        }
    }
}

pub fn keygen(rng: &mut dyn RngCore) -> KeyMaterial {
    KeyMaterial::generate(rng)
}

/// A dealt threshold key: the group public key, one secret share per
/// executor, and the public shares used to verify partial decryptions. The
/// full secret never leaves this function.
pub struct ThresholdKey {
    pub public: Point,
    pub shares: Vec<Share>,
    pub public_shares: Vec<(u32, Point)>,
}

pub fn threshold_keygen(
    t: usize,
    n: usize,
    rng: &mut dyn RngCore,
) -> Result<ThresholdKey, Error> {
    let key = KeyMaterial::generate(rng);
    let shares = shamir::share(key.secret(), t, n, rng)?;
    let public_shares = shares
        .iter()
        .map(|share| (share.index, Point::generator().mul(share.value)))
        .collect();
    Ok(ThresholdKey {
        public: key.public(),
        shares,
        public_shares,
    })
}

/// Encrypts `message` under `public_key` with fresh non-zero randomness.
/// Both ciphertext components of a fresh encryption are non-infinity.
pub fn encrypt(
    public_key: Point,
    message: u64,
    max: u64,
    rng: &mut dyn RngCore,
) -> Result<Ciphertext, Error> {
    if message >= max {
        return Err(Error::MessageOutOfRange { message, max });
    }
    loop {
        let r = Scalar::random(rng);
        let c1 = Point::generator().mul(r);
        // The message is in the exponent and is as secret as the
        // randomness, so both multiplications take the ladder.
        let c2 = Point::generator()
            .mul(Scalar::from_u64(message))
            .add(public_key.mul(r));
        if !c1.is_infinity() && !c2.is_infinity() {
            return Ok(Ciphertext { c1, c2 });
        }
    }
}

/// Adds an encryption of zero, producing an unlinkable ciphertext of the
/// same plaintext.
pub fn rerandomize(public_key: Point, ciphertext: Ciphertext, rng: &mut dyn RngCore) -> Ciphertext {
    let r = Scalar::random(rng);
    Ciphertext {
        c1: ciphertext.c1.add(Point::generator().mul(r)),
        c2: ciphertext.c2.add(public_key.mul(r)),
    }
}

/// Non-distributed decryption with the full secret key.
pub fn decrypt(key: &KeyMaterial, ciphertext: Ciphertext, bound: u64) -> Result<u64, Error> {
    let shared = ciphertext.c1.mul(key.secret());
    let message_point = ciphertext.c2.add(shared.neg());
    Ok(bsgs::Table::shared(bound).solve(message_point)?)
}

/// A Chaum-Pedersen style proof of discrete log equality: the prover knows
/// `sk` with `PK = sk*G` and `D = sk*U` for public `U`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DleqProof {
    pub c: Scalar,
    pub s: Scalar,
}

fn dleq_prove(secret: Scalar, base: Point, public: Point, image: Point) -> DleqProof {
    // Deterministic nonce derived from the witness and the statement, in the
    // style of RFC 6979. Repeating a nonce across distinct statements would
    // leak the share.
    let k = hash_to_scalar(
        "elgamal/dleq/nonce",
        &[
            &secret.to_be_bytes(),
            &point_bytes(base),
            &point_bytes(image),
        ],
    );
    let commit_g = Point::generator().mul(k);
    let commit_u = base.mul(k);
    let c = dleq_challenge(base, public, image, commit_g, commit_u);
    DleqProof { c, s: k + c * secret }
}

fn dleq_verify(proof: &DleqProof, base: Point, public: Point, image: Point) -> bool {
    // Recompute the commitments from the response and check the challenge.
    let commit_g = Point::generator()
        .mul_vartime(proof.s)
        .add(public.mul_vartime(proof.c).neg());
    let commit_u = base
        .mul_vartime(proof.s)
        .add(image.mul_vartime(proof.c).neg());
    dleq_challenge(base, public, image, commit_g, commit_u) == proof.c
}

fn dleq_challenge(
    base: Point,
    public: Point,
    image: Point,
    commit_g: Point,
    commit_u: Point,
) -> Scalar {
    hash_to_scalar(
        "elgamal/dleq/challenge",
        &[
            &point_bytes(Point::generator()),
            &point_bytes(base),
            &point_bytes(public),
            &point_bytes(image),
            &point_bytes(commit_g),
            &point_bytes(commit_u),
        ],
    )
}

fn point_bytes(point: Point) -> [u8; 64] {
    point.to_bytes().unwrap_or([0u8; 64])
}

/// One executor's contribution `D_i = sk_i * C1` to a threshold decryption,
/// with the proof binding it to the executor's public share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDecryption {
    pub index: u32,
    pub share: Point,
    pub proof: DleqProof,
}

pub fn partial_decrypt(key_share: &Share, c1: Point) -> PartialDecryption {
    let share = c1.mul(key_share.value);
    let public = Point::generator().mul(key_share.value);
    PartialDecryption {
        index: key_share.index,
        share,
        proof: dleq_prove(key_share.value, c1, public, share),
    }
}

pub fn verify_partial(
    public_share: Point,
    c1: Point,
    partial: &PartialDecryption,
) -> Result<(), Error> {
    if dleq_verify(&partial.proof, c1, public_share, partial.share) {
        Ok(())
    } else {
        Err(Error::InvalidPartialProof {
            index: partial.index,
        })
    }
}

/// Partial decryptions for a batch of ciphertexts, proven together: a single
/// proof over a random linear combination of the statements covers every
/// item in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPartialDecryption {
    pub index: u32,
    pub shares: Vec<Point>,
    pub proof: DleqProof,
}

pub fn partial_decrypt_batch(key_share: &Share, c1s: &[Point]) -> BatchPartialDecryption {
    let shares: Vec<Point> = c1s.iter().map(|&c1| c1.mul(key_share.value)).collect();
    let public = Point::generator().mul(key_share.value);
    let (combined_base, combined_image) = batch_combination(key_share.index, c1s, &shares);
    BatchPartialDecryption {
        index: key_share.index,
        proof: dleq_prove(key_share.value, combined_base, public, combined_image),
        shares,
    }
}

pub fn verify_partial_batch(
    public_share: Point,
    c1s: &[Point],
    batch: &BatchPartialDecryption,
) -> Result<(), Error> {
    if batch.shares.len() != c1s.len() {
        return Err(Error::BatchLengthMismatch {
            index: batch.index,
            expected: c1s.len(),
            actual: batch.shares.len(),
        });
    }
    let (combined_base, combined_image) = batch_combination(batch.index, c1s, &batch.shares);
    if dleq_verify(&batch.proof, combined_base, public_share, combined_image) {
        Ok(())
    } else {
        Err(Error::InvalidPartialProof { index: batch.index })
    }
}

/// Derives the weights for the batched statement from everything both sides
/// agree on: the executor index, the inputs and the claimed outputs.
fn batch_combination(index: u32, c1s: &[Point], shares: &[Point]) -> (Point, Point) {
    let mut weight_input = Vec::with_capacity(1 + 64 * (c1s.len() + shares.len()));
    weight_input.extend_from_slice(&index.to_be_bytes());
    for point in c1s.iter().chain(shares.iter()) {
        weight_input.extend_from_slice(&point_bytes(*point));
    }
    let mut base = Point::Infinity;
    let mut image = Point::Infinity;
    for (position, (&c1, &share)) in c1s.iter().zip(shares.iter()).enumerate() {
        let weight = hash_to_scalar(
            "elgamal/dleq/batch-weight",
            &[&weight_input, &(position as u64).to_be_bytes()],
        );
        base = base.add(c1.mul_vartime(weight));
        image = image.add(share.mul_vartime(weight));
    }
    (base, image)
}

/// Verifies `t` partial decryptions and reconstructs the plaintext.
///
/// `public_shares` maps executor indexes to their public share points; every
/// partial must verify against its share before it contributes.
pub fn combine(
    ciphertext: Ciphertext,
    partials: &[PartialDecryption],
    public_shares: &[(u32, Point)],
    bound: u64,
) -> Result<u64, Error> {
    for partial in partials {
        let public_share = public_shares
            .iter()
            .find(|(index, _)| *index == partial.index)
            .map(|(_, point)| *point)
            .ok_or(Error::UnknownShareIndex {
                index: partial.index,
            })?;
        verify_partial(public_share, ciphertext.c1, partial)?;
    }
    let shares: Vec<(u32, Point)> = partials
        .iter()
        .map(|partial| (partial.index, partial.share))
        .collect();
    reconstruct(ciphertext, &shares, bound)
}

/// Reconstructs the plaintext from partial shares whose proofs the caller
/// has already verified, for example through a batch proof.
pub fn reconstruct(
    ciphertext: Ciphertext,
    shares: &[(u32, Point)],
    bound: u64,
) -> Result<u64, Error> {
    let indexes: Vec<u32> = shares.iter().map(|(index, _)| *index).collect();
    let mut combined = Point::Infinity;
    for (index, share) in shares {
        let lambda = shamir::lagrange_zero(&indexes, *index)?;
        combined = combined.add(share.mul_vartime(lambda));
    }
    let message_point = ciphertext.c2.add(combined.neg());
    Ok(bsgs::Table::shared(bound).solve(message_point)?)
}

#[cfg(test)]
mod tests {
    use {super::*, crate::shamir, rand::rngs::OsRng};

    const BOUND: u64 = 1 << 16;

    #[test]
    fn encryption_round_trips() {
        let mut rng = OsRng;
        let key = keygen(&mut rng);
        for message in [0u64, 1, 42, 65535] {
            let ciphertext = encrypt(key.public(), message, BOUND, &mut rng).unwrap();
            assert_eq!(decrypt(&key, ciphertext, BOUND).unwrap(), message);
        }
    }

    #[test]
    fn encryption_rejects_out_of_range_messages() {
        let mut rng = OsRng;
        let key = keygen(&mut rng);
        assert!(matches!(
            encrypt(key.public(), BOUND, BOUND, &mut rng),
            Err(Error::MessageOutOfRange { .. })
        ));
    }

    #[test]
    fn fresh_ciphertext_components_are_not_infinity() {
        let mut rng = OsRng;
        let key = keygen(&mut rng);
        let ciphertext = encrypt(key.public(), 0, BOUND, &mut rng).unwrap();
        assert!(!ciphertext.c1.is_infinity());
        assert!(!ciphertext.c2.is_infinity());
    }

    #[test]
    fn homomorphic_addition_adds_plaintexts() {
        let mut rng = OsRng;
        let key = keygen(&mut rng);
        let a = encrypt(key.public(), 1000, BOUND, &mut rng).unwrap();
        let b = encrypt(key.public(), 2345, BOUND, &mut rng).unwrap();
        assert_eq!(decrypt(&key, a.add(b), BOUND).unwrap(), 3345);
    }

    #[test]
    fn rerandomization_preserves_the_plaintext() {
        let mut rng = OsRng;
        let key = keygen(&mut rng);
        let ciphertext = encrypt(key.public(), 777, BOUND, &mut rng).unwrap();
        let rerandomized = rerandomize(key.public(), ciphertext, &mut rng);
        assert_ne!(rerandomized, ciphertext);
        assert_eq!(decrypt(&key, rerandomized, BOUND).unwrap(), 777);
    }

    #[test]
    fn decryption_fails_past_the_volume_cap() {
        let mut rng = OsRng;
        let key = keygen(&mut rng);
        let a = encrypt(key.public(), BOUND - 1, BOUND, &mut rng).unwrap();
        let b = encrypt(key.public(), BOUND - 1, BOUND, &mut rng).unwrap();
        assert!(matches!(
            decrypt(&key, a.add(b), BOUND),
            Err(Error::DiscreteLog(bsgs::Error::DiscreteLogOutOfRange { .. }))
        ));
    }

    fn threshold_setup(rng: &mut OsRng) -> (KeyMaterial, Vec<Share>, Vec<(u32, Point)>) {
        let key = keygen(rng);
        let shares = shamir::share(key.secret(), 3, 5, rng).unwrap();
        let public_shares = shares
            .iter()
            .map(|share| (share.index, Point::generator().mul(share.value)))
            .collect();
        (key, shares, public_shares)
    }

    #[test]
    fn threshold_decryption_matches_plain_decryption() {
        let mut rng = OsRng;
        let (key, shares, public_shares) = threshold_setup(&mut rng);
        let ciphertext = encrypt(key.public(), 4242, BOUND, &mut rng).unwrap();

        for picks in [[0usize, 1, 2], [1, 3, 4], [0, 2, 4]] {
            let partials: Vec<PartialDecryption> = picks
                .iter()
                .map(|&i| partial_decrypt(&shares[i], ciphertext.c1))
                .collect();
            let recovered = combine(ciphertext, &partials, &public_shares, BOUND).unwrap();
            assert_eq!(recovered, 4242);
            assert_eq!(recovered, decrypt(&key, ciphertext, BOUND).unwrap());
        }
    }

    #[test]
    fn tampered_partial_is_rejected() {
        let mut rng = OsRng;
        let (key, shares, public_shares) = threshold_setup(&mut rng);
        let ciphertext = encrypt(key.public(), 1, BOUND, &mut rng).unwrap();
        let mut partials: Vec<PartialDecryption> = shares[..3]
            .iter()
            .map(|share| partial_decrypt(share, ciphertext.c1))
            .collect();
        // Swap in a different (valid) curve point for the partial.
        partials[0].share = partials[0].share.add(Point::generator());
        assert!(matches!(
            combine(ciphertext, &partials, &public_shares, BOUND),
            Err(Error::InvalidPartialProof { index: 1 })
        ));
    }

    #[test]
    fn partial_proof_binds_the_executor_share() {
        let mut rng = OsRng;
        let (_, shares, public_shares) = threshold_setup(&mut rng);
        let key = keygen(&mut rng);
        let ciphertext = encrypt(key.public(), 1, BOUND, &mut rng).unwrap();
        let partial = partial_decrypt(&shares[0], ciphertext.c1);
        assert!(verify_partial(public_shares[0].1, ciphertext.c1, &partial).is_ok());
        // Verifying against a different executor's share fails.
        assert!(verify_partial(public_shares[1].1, ciphertext.c1, &partial).is_err());
    }

    #[test]
    fn batch_partials_verify_and_reject_tampering() {
        let mut rng = OsRng;
        let (key, shares, public_shares) = threshold_setup(&mut rng);
        let ciphertexts: Vec<Ciphertext> = (0..4)
            .map(|i| encrypt(key.public(), 100 + i, BOUND, &mut rng).unwrap())
            .collect();
        let c1s: Vec<Point> = ciphertexts.iter().map(|ct| ct.c1).collect();

        let batch = partial_decrypt_batch(&shares[0], &c1s);
        assert!(verify_partial_batch(public_shares[0].1, &c1s, &batch).is_ok());

        let mut tampered = batch.clone();
        tampered.shares[2] = tampered.shares[2].add(Point::generator());
        assert!(verify_partial_batch(public_shares[0].1, &c1s, &tampered).is_err());
    }

    #[test]
    fn batch_partials_reconstruct_every_item() {
        let mut rng = OsRng;
        let (key, shares, _) = threshold_setup(&mut rng);
        let messages = [5u64, 0, 999];
        let ciphertexts: Vec<Ciphertext> = messages
            .iter()
            .map(|&m| encrypt(key.public(), m, BOUND, &mut rng).unwrap())
            .collect();
        let c1s: Vec<Point> = ciphertexts.iter().map(|ct| ct.c1).collect();
        let batches: Vec<BatchPartialDecryption> = shares[1..4]
            .iter()
            .map(|share| partial_decrypt_batch(share, &c1s))
            .collect();
        for (batch, share) in batches.iter().zip(&shares[1..4]) {
            let public = Point::generator().mul(share.value);
            assert!(verify_partial_batch(public, &c1s, batch).is_ok());
        }

        for (position, (&message, &ciphertext)) in
            messages.iter().zip(ciphertexts.iter()).enumerate()
        {
            let verified: Vec<(u32, Point)> = batches
                .iter()
                .map(|batch| (batch.index, batch.shares[position]))
                .collect();
            assert_eq!(
                reconstruct(ciphertext, &verified, BOUND).unwrap(),
                message
            );
        }
    }
}
