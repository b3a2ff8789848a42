//! Bulletproof range proofs for solvency commitments.
//!
//! A prover commits to a value as `C = v*G + r*H` and shows `v` lies in
//! `[0, 2^n_bits)` without revealing it. The proof is the standard
//! inner-product construction: bit-decomposition constraints are folded into
//! a single inner product which a logarithmic-round argument then attests.
//! Verification reduces to one multi-scalar multiplication, and several
//! proofs verify together by taking a random linear combination of their
//! equations.
//!
//! The inner-product argument halves vector lengths each round, so vectors
//! are padded with zeros up to the next power of two. Padded slots carry no
//! range constraints; only the first `n_bits` positions bind the committed
//! value.

use {
    crate::{
        curve::{Point, Scalar, hash_to_curve},
        transcript::Transcript,
    },
    rand::RngCore,
};

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("value does not fit in {bits} bits")]
    ValueOutOfRange { bits: usize },
    #[error("range width must be between 1 and 64 bits")]
    UnsupportedBitWidth,
    #[error("malformed range proof encoding")]
    MalformedProof,
}

/// Public generators for range proofs of a fixed bit width. Deriving them by
/// hashing fixed labels means no party knows discrete-log relations between
/// them.
pub struct Generators {
    n_bits: usize,
    slots: usize,
    h: Point,
    g_vec: Vec<Point>,
    h_vec: Vec<Point>,
    u: Point,
}

impl Generators {
    pub fn new(n_bits: usize) -> Result<Self, Error> {
        if n_bits == 0 || n_bits > 64 {
            return Err(Error::UnsupportedBitWidth);
        }
        let slots = n_bits.next_power_of_two();
        Ok(Self {
            n_bits,
            slots,
            h: hash_to_curve("rangeproof/h", b""),
            g_vec: (0..slots)
                .map(|i| hash_to_curve("rangeproof/g", &(i as u64).to_be_bytes()))
                .collect(),
            h_vec: (0..slots)
                .map(|i| hash_to_curve("rangeproof/hv", &(i as u64).to_be_bytes()))
                .collect(),
            u: hash_to_curve("rangeproof/u", b""),
        })
    }

    pub fn n_bits(&self) -> usize {
        self.n_bits
    }

    /// The Pedersen commitment `v*G + r*H`. Both scalars are secret, so
    /// both multiplications take the ladder.
    pub fn commit(&self, v: u64, r: Scalar) -> Point {
        Point::generator()
            .mul(Scalar::from_u64(v))
            .add(self.h.mul(r))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeProof {
    a: Point,
    s: Point,
    t1: Point,
    t2: Point,
    taux: Scalar,
    mu: Scalar,
    t_hat: Scalar,
    ipa_l: Vec<Point>,
    ipa_r: Vec<Point>,
    ipa_a: Scalar,
    ipa_b: Scalar,
}

impl RangeProof {
    /// Serialized size in bytes; logarithmic in the bit width.
    pub fn size(&self) -> usize {
        let points = 4 + self.ipa_l.len() + self.ipa_r.len();
        let scalars = 5;
        1 + points * 64 + scalars * 32
    }

    /// Fixed-layout binary encoding: a round count, then all points, then
    /// all scalars.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(self.size());
        out.push(self.ipa_l.len() as u8);
        let points = [self.a, self.s, self.t1, self.t2]
            .into_iter()
            .chain(self.ipa_l.iter().copied())
            .chain(self.ipa_r.iter().copied());
        for point in points {
            out.extend_from_slice(&point.to_bytes().map_err(|_| Error::MalformedProof)?);
        }
        for scalar in [self.taux, self.mu, self.t_hat, self.ipa_a, self.ipa_b] {
            out.extend_from_slice(&scalar.to_be_bytes());
        }
        Ok(out)
    }

    /// Decodes [`Self::to_bytes`] output, rejecting off-curve points and
    /// non-canonical scalars.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let rounds = *bytes.first().ok_or(Error::MalformedProof)? as usize;
        if rounds > 6 {
            return Err(Error::MalformedProof);
        }
        let point_count = 4 + 2 * rounds;
        if bytes.len() != 1 + point_count * 64 + 5 * 32 {
            return Err(Error::MalformedProof);
        }
        let mut points = Vec::with_capacity(point_count);
        for chunk in bytes[1..1 + point_count * 64].chunks_exact(64) {
            let encoded: &[u8; 64] = chunk.try_into().unwrap();
            points.push(Point::from_bytes(encoded).map_err(|_| Error::MalformedProof)?);
        }
        let mut scalars = Vec::with_capacity(5);
        for chunk in bytes[1 + point_count * 64..].chunks_exact(32) {
            let encoded: [u8; 32] = chunk.try_into().unwrap();
            scalars.push(Scalar::from_be_bytes(encoded).map_err(|_| Error::MalformedProof)?);
        }
        Ok(Self {
            a: points[0],
            s: points[1],
            t1: points[2],
            t2: points[3],
            ipa_l: points[4..4 + rounds].to_vec(),
            ipa_r: points[4 + rounds..].to_vec(),
            taux: scalars[0],
            mu: scalars[1],
            t_hat: scalars[2],
            ipa_a: scalars[3],
            ipa_b: scalars[4],
        })
    }
}

/// Proves `v` lies in `[0, 2^n_bits)` under the commitment `v*G + r*H`.
pub fn prove(
    gens: &Generators,
    v: u64,
    r: Scalar,
    rng: &mut dyn RngCore,
) -> Result<(Point, RangeProof), Error> {
    let n = gens.n_bits;
    let m = gens.slots;
    if n < 64 && v >> n != 0 {
        return Err(Error::ValueOutOfRange { bits: n });
    }
    let commitment = gens.commit(v, r);

    // Bit decomposition, zero beyond n.
    let a_l: Vec<Scalar> = (0..m)
        .map(|i| {
            if i < n && (v >> i) & 1 == 1 {
                Scalar::one()
            } else {
                Scalar::ZERO
            }
        })
        .collect();
    let a_r: Vec<Scalar> = (0..m)
        .map(|i| {
            if i < n {
                a_l[i] - Scalar::one()
            } else {
                Scalar::ZERO
            }
        })
        .collect();

    let alpha = Scalar::random(rng);
    let a_commit = gens
        .h
        .mul(alpha)
        .add(vector_commit(&a_l, &gens.g_vec))
        .add(vector_commit(&a_r, &gens.h_vec));

    let s_l: Vec<Scalar> = (0..m)
        .map(|i| {
            if i < n {
                Scalar::random(rng)
            } else {
                Scalar::ZERO
            }
        })
        .collect();
    let s_r: Vec<Scalar> = (0..m)
        .map(|i| {
            if i < n {
                Scalar::random(rng)
            } else {
                Scalar::ZERO
            }
        })
        .collect();
    let rho = Scalar::random(rng);
    let s_commit = gens
        .h
        .mul(rho)
        .add(vector_commit(&s_l, &gens.g_vec))
        .add(vector_commit(&s_r, &gens.h_vec));

    let mut transcript = Transcript::new("rangeproof");
    transcript.append_u64("n", n as u64);
    transcript.append_point("V", commitment);
    transcript.append_point("A", a_commit);
    transcript.append_point("S", s_commit);
    let y = transcript.challenge_scalar("y");
    let z = transcript.challenge_scalar("z");

    let y_pow = scalar_powers(y, m);
    // one_n and two_n vanish on padded slots, so padded coordinates of l and
    // r stay zero throughout.
    let z2 = z * z;
    let l0: Vec<Scalar> = (0..m)
        .map(|i| a_l[i] - if i < n { z } else { Scalar::ZERO })
        .collect();
    let l1 = s_l;
    let r0: Vec<Scalar> = (0..m)
        .map(|i| {
            let mut value = y_pow[i] * (a_r[i] + if i < n { z } else { Scalar::ZERO });
            if i < n {
                value = value + z2 * two_pow(i);
            }
            value
        })
        .collect();
    let r1: Vec<Scalar> = (0..m).map(|i| y_pow[i] * s_r[i]).collect();

    let t1_scalar = inner_product(&l0, &r1) + inner_product(&l1, &r0);
    let t2_scalar = inner_product(&l1, &r1);
    let tau1 = Scalar::random(rng);
    let tau2 = Scalar::random(rng);
    let t1_commit = gens.commit_scalar(t1_scalar, tau1);
    let t2_commit = gens.commit_scalar(t2_scalar, tau2);

    transcript.append_point("T1", t1_commit);
    transcript.append_point("T2", t2_commit);
    let x = transcript.challenge_scalar("x");

    let l_vec: Vec<Scalar> = (0..m).map(|i| l0[i] + x * l1[i]).collect();
    let r_vec: Vec<Scalar> = (0..m).map(|i| r0[i] + x * r1[i]).collect();
    let t_hat = inner_product(&l_vec, &r_vec);
    let taux = tau1 * x + tau2 * (x * x) + z2 * r;
    let mu = alpha + rho * x;

    transcript.append_scalar("t", t_hat);
    transcript.append_scalar("taux", taux);
    transcript.append_scalar("mu", mu);
    let w = transcript.challenge_scalar("w");
    let q = gens.u.mul_vartime(w);

    // Inner-product argument over the y-twisted h generators.
    let y_inv_pow = scalar_powers(
        y.invert().expect("challenge scalars are non-zero"),
        m,
    );
    let mut g_basis = gens.g_vec.clone();
    let mut h_basis: Vec<Point> = gens
        .h_vec
        .iter()
        .enumerate()
        .map(|(i, h)| h.mul_vartime(y_inv_pow[i]))
        .collect();
    let mut a_fold = l_vec;
    let mut b_fold = r_vec;
    let mut ipa_l = Vec::new();
    let mut ipa_r = Vec::new();
    while a_fold.len() > 1 {
        let half = a_fold.len() / 2;
        let (a_lo, a_hi) = a_fold.split_at(half);
        let (b_lo, b_hi) = b_fold.split_at(half);
        let (g_lo, g_hi) = g_basis.split_at(half);
        let (h_lo, h_hi) = h_basis.split_at(half);

        let l_point = vector_commit(a_lo, g_hi)
            .add(vector_commit(b_hi, h_lo))
            .add(q.mul(inner_product(a_lo, b_hi)));
        let r_point = vector_commit(a_hi, g_lo)
            .add(vector_commit(b_lo, h_hi))
            .add(q.mul(inner_product(a_hi, b_lo)));
        transcript.append_point("L", l_point);
        transcript.append_point("R", r_point);
        ipa_l.push(l_point);
        ipa_r.push(r_point);
        let u_j = transcript.challenge_scalar("u");
        let u_inv = u_j.invert().expect("challenge scalars are non-zero");

        a_fold = (0..half).map(|i| a_lo[i] * u_j + a_hi[i] * u_inv).collect();
        b_fold = (0..half).map(|i| b_lo[i] * u_inv + b_hi[i] * u_j).collect();
        g_basis = (0..half)
            .map(|i| g_lo[i].mul_vartime(u_inv).add(g_hi[i].mul_vartime(u_j)))
            .collect();
        h_basis = (0..half)
            .map(|i| h_lo[i].mul_vartime(u_j).add(h_hi[i].mul_vartime(u_inv)))
            .collect();
    }

    Ok((
        commitment,
        RangeProof {
            a: a_commit,
            s: s_commit,
            t1: t1_commit,
            t2: t2_commit,
            taux,
            mu,
            t_hat,
            ipa_l,
            ipa_r,
            ipa_a: a_fold[0],
            ipa_b: b_fold[0],
        },
    ))
}

/// Verifies a single proof. Soundness holds except with negligible
/// probability; completeness is exact.
pub fn verify(gens: &Generators, commitment: Point, proof: &RangeProof) -> bool {
    batch_verify(gens, &[(commitment, proof.clone())])
}

/// Verifies several proofs with one multi-scalar multiplication over a
/// random linear combination of their verification equations.
pub fn batch_verify(gens: &Generators, items: &[(Point, RangeProof)]) -> bool {
    if items.is_empty() {
        return true;
    }
    let m = gens.slots;
    let rounds = m.trailing_zeros() as usize;

    let mut rng = rand::rngs::OsRng;
    let mut coeff_g = Scalar::ZERO;
    let mut coeff_h = Scalar::ZERO;
    let mut coeff_u = Scalar::ZERO;
    let mut coeff_g_vec = vec![Scalar::ZERO; m];
    let mut coeff_h_vec = vec![Scalar::ZERO; m];
    let mut terms: Vec<(Scalar, Point)> = Vec::new();

    for (commitment, proof) in items {
        if proof.ipa_l.len() != rounds || proof.ipa_r.len() != rounds {
            return false;
        }
        let Challenges { y, z, x, w, u_rounds } = replay_transcript(gens, *commitment, proof);

        let weight_t = Scalar::random(&mut rng);
        let weight_ipa = Scalar::random(&mut rng);

        // t-check: (t_hat - delta(y, z)) G + taux H - z^2 V - x T1 - x^2 T2.
        let z2 = z * z;
        let delta = delta_value(gens.n_bits, y, z);
        coeff_g = coeff_g + weight_t * (proof.t_hat - delta);
        coeff_h = coeff_h + weight_t * proof.taux;
        terms.push((-(weight_t * z2), *commitment));
        terms.push((-(weight_t * x), proof.t1));
        terms.push((-(weight_t * (x * x)), proof.t2));

        // Inner-product check, unrolled into generator coefficients.
        let y_inv = match y.invert() {
            Ok(inv) => inv,
            Err(_) => return false,
        };
        let y_inv_pow = scalar_powers(y_inv, m);
        let s_vec = match verification_scalars(&u_rounds, m) {
            Some(s_vec) => s_vec,
            None => return false,
        };

        terms.push((weight_ipa, proof.a));
        terms.push((weight_ipa * x, proof.s));
        coeff_h = coeff_h - weight_ipa * proof.mu;
        coeff_u = coeff_u + weight_ipa * w * (proof.t_hat - proof.ipa_a * proof.ipa_b);
        for i in 0..m {
            let Ok(s_inv) = s_vec[i].invert() else {
                return false;
            };
            let mut g_coeff = -(proof.ipa_a * s_vec[i]);
            // The h generators are y-twisted inside the argument, so the
            // folded-basis term picks up a factor y^-i while the plain z
            // term does not.
            let mut h_coeff = -(proof.ipa_b * s_inv) * y_inv_pow[i];
            if i < gens.n_bits {
                g_coeff = g_coeff - z;
                h_coeff = h_coeff + z + z2 * two_pow(i) * y_inv_pow[i];
            }
            coeff_g_vec[i] = coeff_g_vec[i] + weight_ipa * g_coeff;
            coeff_h_vec[i] = coeff_h_vec[i] + weight_ipa * h_coeff;
        }
        for (j, (l_point, r_point)) in proof.ipa_l.iter().zip(proof.ipa_r.iter()).enumerate() {
            let u_j = u_rounds[j];
            let u_inv = match u_j.invert() {
                Ok(inv) => inv,
                Err(_) => return false,
            };
            terms.push((weight_ipa * u_j * u_j, *l_point));
            terms.push((weight_ipa * u_inv * u_inv, *r_point));
        }
    }

    terms.push((coeff_g, Point::generator()));
    terms.push((coeff_h, gens.h));
    terms.push((coeff_u, gens.u));
    for i in 0..m {
        terms.push((coeff_g_vec[i], gens.g_vec[i]));
        terms.push((coeff_h_vec[i], gens.h_vec[i]));
    }
    Point::msm(&terms).is_infinity()
}

struct Challenges {
    y: Scalar,
    z: Scalar,
    x: Scalar,
    w: Scalar,
    u_rounds: Vec<Scalar>,
}

fn replay_transcript(gens: &Generators, commitment: Point, proof: &RangeProof) -> Challenges {
    let mut transcript = Transcript::new("rangeproof");
    transcript.append_u64("n", gens.n_bits as u64);
    transcript.append_point("V", commitment);
    transcript.append_point("A", proof.a);
    transcript.append_point("S", proof.s);
    let y = transcript.challenge_scalar("y");
    let z = transcript.challenge_scalar("z");
    transcript.append_point("T1", proof.t1);
    transcript.append_point("T2", proof.t2);
    let x = transcript.challenge_scalar("x");
    transcript.append_scalar("t", proof.t_hat);
    transcript.append_scalar("taux", proof.taux);
    transcript.append_scalar("mu", proof.mu);
    let w = transcript.challenge_scalar("w");
    let mut u_rounds = Vec::with_capacity(proof.ipa_l.len());
    for (l_point, r_point) in proof.ipa_l.iter().zip(proof.ipa_r.iter()) {
        transcript.append_point("L", *l_point);
        transcript.append_point("R", *r_point);
        u_rounds.push(transcript.challenge_scalar("u"));
    }
    Challenges { y, z, x, w, u_rounds }
}

/// The folded-basis coefficients `s_i = prod_j u_j^(+-1)` of the
/// inner-product argument, where the sign for round `j` follows the half
/// index `i` fell into.
fn verification_scalars(u_rounds: &[Scalar], m: usize) -> Option<Vec<Scalar>> {
    let rounds = u_rounds.len();
    let mut all_inv = Scalar::one();
    for u in u_rounds {
        all_inv = all_inv * u.invert().ok()?;
    }
    let mut s_vec = Vec::with_capacity(m);
    s_vec.push(all_inv);
    for i in 1..m {
        let bit = usize::BITS as usize - 1 - i.leading_zeros() as usize;
        let u_j = u_rounds[rounds - 1 - bit];
        s_vec.push(s_vec[i - (1 << bit)] * u_j * u_j);
    }
    Some(s_vec)
}

/// `delta(y, z) = (z - z^2) * sum(y^i) - z^3 * (2^n - 1)` over the first
/// `n` slots.
fn delta_value(n: usize, y: Scalar, z: Scalar) -> Scalar {
    let mut sum_y = Scalar::ZERO;
    let mut y_i = Scalar::one();
    for _ in 0..n {
        sum_y = sum_y + y_i;
        y_i = y_i * y;
    }
    let sum_two = if n == 64 {
        Scalar::from_u64(u64::MAX)
    } else {
        Scalar::from_u64((1u64 << n) - 1)
    };
    let z2 = z * z;
    (z - z2) * sum_y - z2 * z * sum_two
}

fn two_pow(i: usize) -> Scalar {
    Scalar::from_u64(1u64 << i)
}

fn inner_product(a: &[Scalar], b: &[Scalar]) -> Scalar {
    a.iter()
        .zip(b.iter())
        .fold(Scalar::ZERO, |acc, (&x, &y)| acc + x * y)
}

/// Commits a secret scalar vector onto a public basis; ladder
/// multiplications throughout since the scalars are witness material.
fn vector_commit(scalars: &[Scalar], points: &[Point]) -> Point {
    scalars
        .iter()
        .zip(points.iter())
        .fold(Point::Infinity, |acc, (&s, &p)| acc.add(p.mul(s)))
}

fn scalar_powers(base: Scalar, count: usize) -> Vec<Scalar> {
    let mut powers = Vec::with_capacity(count);
    let mut current = Scalar::one();
    for _ in 0..count {
        powers.push(current);
        current = current * base;
    }
    powers
}

impl Generators {
    fn commit_scalar(&self, value: Scalar, blinding: Scalar) -> Point {
        Point::generator().mul(value).add(self.h.mul(blinding))
    }
}
