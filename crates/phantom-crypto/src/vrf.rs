//! Verifiable random function over the curve, plus the deterministic shuffle
//! seeded from its output.
//!
//! The VRF pins each round's order permutation to the round input: anyone
//! holding the public key can check that the shuffle was not chosen after
//! seeing the orders. Proofs are deterministic, so proving twice for the
//! same input yields identical output and proof.

use {
    crate::curve::{KeyMaterial, Point, Scalar, hash_to_curve, hash_to_scalar},
    sha2::{Digest, Sha256},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrfProof {
    pub gamma: Point,
    pub c: Scalar,
    pub s: Scalar,
}

/// Evaluates the VRF on `alpha`: `gamma = sk * hash_to_curve(alpha)` with a
/// Schnorr-style proof of correct evaluation.
pub fn prove(key: &KeyMaterial, alpha: &[u8]) -> VrfProof {
    let h = hash_to_curve("vrf/input", alpha);
    let gamma = h.mul(key.secret());
    // The nonce is derived, not sampled: determinism is part of the VRF
    // contract and a repeated nonce with distinct challenges would leak the
    // key.
    let k = hash_to_scalar(
        "vrf/nonce",
        &[&key.secret().to_be_bytes(), &point_bytes(h), alpha],
    );
    let c = challenge(h, key.public(), gamma, Point::generator().mul(k), h.mul(k));
    VrfProof {
        gamma,
        c,
        s: k - c * key.secret(),
    }
}

/// Checks that `proof` is a correct VRF evaluation of `alpha` under
/// `public_key`.
pub fn verify(public_key: Point, alpha: &[u8], proof: &VrfProof) -> bool {
    let h = hash_to_curve("vrf/input", alpha);
    // s = k - c*sk implies s*G + c*PK = k*G and s*H + c*gamma = k*H.
    let u = Point::generator()
        .mul_vartime(proof.s)
        .add(public_key.mul_vartime(proof.c));
    let v = h
        .mul_vartime(proof.s)
        .add(proof.gamma.mul_vartime(proof.c));
    challenge(h, public_key, proof.gamma, u, v) == proof.c
}

fn challenge(h: Point, public_key: Point, gamma: Point, u: Point, v: Point) -> Scalar {
    hash_to_scalar(
        "vrf/challenge",
        &[
            &point_bytes(h),
            &point_bytes(public_key),
            &point_bytes(gamma),
            &point_bytes(u),
            &point_bytes(v),
        ],
    )
}

fn point_bytes(point: Point) -> [u8; 64] {
    point.to_bytes().unwrap_or([0u8; 64])
}

/// Collapses the VRF output point into uniform bytes.
pub fn to_uniform_bytes(gamma: Point) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"phantompool/v1/vrf/output");
    hasher.update(point_bytes(gamma));
    hasher.finalize().into()
}

/// Applies the Fisher-Yates permutation determined by `seed` to `items`.
/// Equal seeds produce equal permutations.
pub fn shuffle<T>(seed: [u8; 32], items: &mut [T]) {
    let mut stream = SeedStream::new(seed);
    for i in (1..items.len()).rev() {
        let j = stream.next_below(i as u64 + 1) as usize;
        items.swap(i, j);
    }
}

/// SHA-256 in counter mode over the seed. Bounded draws use rejection
/// sampling so every index is equally likely.
struct SeedStream {
    seed: [u8; 32],
    counter: u64,
    buffer: [u8; 32],
    offset: usize,
}

impl SeedStream {
    fn new(seed: [u8; 32]) -> Self {
        Self {
            seed,
            counter: 0,
            buffer: [0u8; 32],
            offset: 32,
        }
    }

    fn next_u64(&mut self) -> u64 {
        if self.offset + 8 > 32 {
            let mut hasher = Sha256::new();
            hasher.update(b"phantompool/v1/shuffle");
            hasher.update(self.seed);
            hasher.update(self.counter.to_be_bytes());
            self.buffer = hasher.finalize().into();
            self.counter += 1;
            self.offset = 0;
        }
        let value = u64::from_be_bytes(self.buffer[self.offset..self.offset + 8].try_into().unwrap());
        self.offset += 8;
        value
    }

    fn next_below(&mut self, bound: u64) -> u64 {
        let zone = u64::MAX - u64::MAX % bound;
        loop {
            let value = self.next_u64();
            if value < zone {
                return value % bound;
            }
        }
    }
}
