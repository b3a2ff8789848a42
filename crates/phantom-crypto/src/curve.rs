//! Arithmetic over secp256k1: a short-Weierstrass curve `y^2 = x^3 + 7` with
//! cofactor 1 and 256-bit prime group order.
//!
//! Scalars live in `[0, N)` where `N` is the order of the base point; field
//! elements in `[0, P)`. Both are represented as [`ruint::aliases::U256`] and
//! serialized as 32-byte big-endian values.

use {
    rand::RngCore,
    ruint::{aliases::U256, uint},
    sha2::{Digest, Sha256},
    zeroize::Zeroize,
};

uint! {
    /// The field modulus `P`.
    pub const FIELD_MODULUS: U256 =
        0xFFFFFFFF_FFFFFFFF_FFFFFFFF_FFFFFFFF_FFFFFFFF_FFFFFFFF_FFFFFFFE_FFFFFC2F_U256;

    /// The prime order `N` of the base point.
    pub const GROUP_ORDER: U256 =
        0xFFFFFFFF_FFFFFFFF_FFFFFFFF_FFFFFFFE_BAAEDCE6_AF48A03B_BFD25E8C_D0364141_U256;

    const GENERATOR_X: U256 =
        0x79BE667E_F9DCBBAC_55A06295_CE870B07_029BFCDB_2DCE28D9_59F2815B_16F81798_U256;
    const GENERATOR_Y: U256 =
        0x483ADA77_26A3C465_5DA4FBFC_0E1108A8_FD17B448_A6855419_9C47D08F_FB10D4B8_U256;

    const CURVE_B: U256 = 0x7_U256;

    /// `(P + 1) / 4`; since `P = 3 mod 4`, `t^SQRT_EXPONENT` is a square root
    /// of `t` whenever one exists.
    const SQRT_EXPONENT: U256 =
        0x3FFFFFFF_FFFFFFFF_FFFFFFFF_FFFFFFFF_FFFFFFFF_FFFFFFFF_FFFFFFFF_BFFFFF0C_U256;
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("modular inverse is not defined for this input")]
    InverseNotDefined,
    #[error("point is not on the curve")]
    OffCurvePoint,
    #[error("encoding is not a canonical 32-byte big-endian value")]
    NonCanonicalEncoding,
    #[error("the point at infinity has no affine encoding")]
    InfinityNotEncodable,
    #[error("zero is not a valid secret scalar")]
    ZeroScalar,
}

/// Computes `a^-1 mod modulus` with the extended Euclidean algorithm.
///
/// Fails with [`Error::InverseNotDefined`] for zero and for inputs that share
/// a factor with the modulus.
pub fn mod_inverse(a: U256, modulus: U256) -> Result<U256, Error> {
    let a = a.reduce_mod(modulus);
    if a == U256::ZERO {
        return Err(Error::InverseNotDefined);
    }
    let (mut r0, mut r1) = (modulus, a);
    let (mut t0, mut t1) = (U256::ZERO, U256::from(1u64));
    while r1 != U256::ZERO {
        let q = r0 / r1;
        // q * r1 <= r0, so the product cannot overflow.
        let r2 = r0 - q * r1;
        r0 = r1;
        r1 = r2;
        let t2 = sub_mod(t0, q.mul_mod(t1, modulus), modulus);
        t0 = t1;
        t1 = t2;
    }
    if r0 != U256::from(1u64) {
        return Err(Error::InverseNotDefined);
    }
    Ok(t0)
}

fn sub_mod(a: U256, b: U256, modulus: U256) -> U256 {
    a.add_mod(modulus - b, modulus)
}

/// A scalar modulo the group order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scalar(U256);

impl Scalar {
    pub const ZERO: Self = Self(U256::ZERO);

    pub fn one() -> Self {
        Self(U256::from(1u64))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    /// Interprets 32 big-endian bytes as a scalar, reducing modulo the group
    /// order. Used for hash outputs, never for canonical decoding.
    pub fn from_bytes_mod_order(bytes: [u8; 32]) -> Self {
        Self(U256::from_be_bytes(bytes).reduce_mod(GROUP_ORDER))
    }

    /// Decodes a canonical scalar, rejecting values `>= N`.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Result<Self, Error> {
        let value = U256::from_be_bytes(bytes);
        if value >= GROUP_ORDER {
            return Err(Error::NonCanonicalEncoding);
        }
        Ok(Self(value))
    }

    pub fn to_be_bytes(self) -> [u8; 32] {
        self.0.to_be_bytes()
    }

    /// Samples a uniform scalar in `[1, N)` by rejection.
    pub fn random(rng: &mut dyn RngCore) -> Self {
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            let candidate = U256::from_be_bytes(bytes);
            if candidate != U256::ZERO && candidate < GROUP_ORDER {
                return Self(candidate);
            }
        }
    }

    pub fn is_zero(self) -> bool {
        self.0 == U256::ZERO
    }

    pub fn invert(self) -> Result<Self, Error> {
        mod_inverse(self.0, GROUP_ORDER).map(Self)
    }

    pub fn pow(self, exponent: u64) -> Self {
        Self(self.0.pow_mod(U256::from(exponent), GROUP_ORDER))
    }

    pub(crate) fn raw(self) -> U256 {
        self.0
    }
}

impl std::ops::Add for Scalar {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.add_mod(rhs.0, GROUP_ORDER))
    }
}

impl std::ops::Sub for Scalar {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(sub_mod(self.0, rhs.0, GROUP_ORDER))
    }
}

impl std::ops::Mul for Scalar {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self(self.0.mul_mod(rhs.0, GROUP_ORDER))
    }
}

impl std::ops::Neg for Scalar {
    type Output = Self;

    fn neg(self) -> Self {
        Self(sub_mod(U256::ZERO, self.0, GROUP_ORDER))
    }
}

impl std::fmt::Debug for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scalar({:#x})", self.0)
    }
}

/// A curve point in affine coordinates, or the point at infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: U256, y: U256 },
}

impl Point {
    pub fn generator() -> Self {
        Self::Affine {
            x: GENERATOR_X,
            y: GENERATOR_Y,
        }
    }

    pub fn is_infinity(self) -> bool {
        matches!(self, Self::Infinity)
    }

    pub fn is_on_curve(self) -> bool {
        match self {
            Self::Infinity => true,
            Self::Affine { x, y } => {
                let lhs = y.mul_mod(y, FIELD_MODULUS);
                let rhs = x
                    .mul_mod(x, FIELD_MODULUS)
                    .mul_mod(x, FIELD_MODULUS)
                    .add_mod(CURVE_B, FIELD_MODULUS);
                lhs == rhs
            }
        }
    }

    pub fn neg(self) -> Self {
        match self {
            Self::Infinity => Self::Infinity,
            Self::Affine { x, y } => Self::Affine {
                x,
                y: sub_mod(U256::ZERO, y, FIELD_MODULUS),
            },
        }
    }

    pub fn add(self, other: Self) -> Self {
        let (x1, y1, x2, y2) = match (self, other) {
            (Self::Infinity, p) => return p,
            (p, Self::Infinity) => return p,
            (Self::Affine { x: x1, y: y1 }, Self::Affine { x: x2, y: y2 }) => (x1, y1, x2, y2),
        };
        if x1 == x2 {
            return if y1 == sub_mod(U256::ZERO, y2, FIELD_MODULUS) {
                // P + (-P), which also covers doubling a point with y = 0.
                Self::Infinity
            } else {
                self.double()
            };
        }
        // lambda = (y2 - y1) / (x2 - x1)
        let dx = sub_mod(x2, x1, FIELD_MODULUS);
        let dy = sub_mod(y2, y1, FIELD_MODULUS);
        let lambda = dy.mul_mod(field_inverse(dx), FIELD_MODULUS);
        Self::chord(lambda, x1, y1, x2)
    }

    pub fn double(self) -> Self {
        let (x, y) = match self {
            Self::Infinity => return Self::Infinity,
            Self::Affine { x, y } => (x, y),
        };
        if y == U256::ZERO {
            return Self::Infinity;
        }
        // lambda = 3 x^2 / 2 y
        let three_x2 = x
            .mul_mod(x, FIELD_MODULUS)
            .mul_mod(U256::from(3u64), FIELD_MODULUS);
        let two_y = y.add_mod(y, FIELD_MODULUS);
        let lambda = three_x2.mul_mod(field_inverse(two_y), FIELD_MODULUS);
        Self::chord(lambda, x, y, x)
    }

    fn chord(lambda: U256, x1: U256, y1: U256, x2: U256) -> Self {
        let x3 = sub_mod(
            sub_mod(lambda.mul_mod(lambda, FIELD_MODULUS), x1, FIELD_MODULUS),
            x2,
            FIELD_MODULUS,
        );
        let y3 = sub_mod(
            lambda.mul_mod(sub_mod(x1, x3, FIELD_MODULUS), FIELD_MODULUS),
            y1,
            FIELD_MODULUS,
        );
        Self::Affine { x: x3, y: y3 }
    }

    /// Scalar multiplication with a Montgomery ladder. The ladder performs
    /// the same sequence of group operations for every bit which is the
    /// variant to use when the scalar is secret.
    pub fn mul(self, scalar: Scalar) -> Self {
        let k = scalar.raw();
        let mut r0 = Self::Infinity;
        let mut r1 = self;
        for i in (0..256).rev() {
            if k.bit(i) {
                r0 = r0.add(r1);
                r1 = r1.double();
            } else {
                r1 = r0.add(r1);
                r0 = r0.double();
            }
        }
        r0
    }

    /// Double-and-add scalar multiplication for public scalars.
    pub fn mul_vartime(self, scalar: Scalar) -> Self {
        let k = scalar.raw();
        if k == U256::ZERO || self.is_infinity() {
            return Self::Infinity;
        }
        let mut acc = Self::Infinity;
        for i in (0..=highest_bit(k)).rev() {
            acc = acc.double();
            if k.bit(i) {
                acc = acc.add(self);
            }
        }
        acc
    }

    /// Computes `sum(scalar_i * point_i)` term by term.
    pub fn msm(terms: &[(Scalar, Point)]) -> Self {
        terms
            .iter()
            .fold(Self::Infinity, |acc, (scalar, point)| {
                acc.add(point.mul_vartime(*scalar))
            })
    }

    /// Fixed 32-byte big-endian coordinates. The point at infinity is not
    /// encodable.
    pub fn to_bytes(self) -> Result<[u8; 64], Error> {
        match self {
            Self::Infinity => Err(Error::InfinityNotEncodable),
            Self::Affine { x, y } => {
                let mut out = [0u8; 64];
                out[..32].copy_from_slice(&x.to_be_bytes::<32>());
                out[32..].copy_from_slice(&y.to_be_bytes::<32>());
                Ok(out)
            }
        }
    }

    /// Decodes affine coordinates, rejecting off-curve points and
    /// non-canonical coordinates.
    pub fn from_bytes(bytes: &[u8; 64]) -> Result<Self, Error> {
        let x = U256::from_be_bytes::<32>(bytes[..32].try_into().unwrap());
        let y = U256::from_be_bytes::<32>(bytes[32..].try_into().unwrap());
        if x >= FIELD_MODULUS || y >= FIELD_MODULUS {
            return Err(Error::NonCanonicalEncoding);
        }
        let point = Self::Affine { x, y };
        if !point.is_on_curve() {
            return Err(Error::OffCurvePoint);
        }
        Ok(point)
    }
}

fn field_inverse(a: U256) -> U256 {
    // The field modulus is prime, so a^(P-2) inverts every non-zero element.
    // Zero never reaches this: chord and tangent slopes divide by values the
    // callers have already excluded.
    a.pow_mod(FIELD_MODULUS - U256::from(2u64), FIELD_MODULUS)
}

fn highest_bit(value: U256) -> usize {
    255 - value.leading_zeros()
}

/// Hashes arbitrary input parts into a scalar with domain separation. Each
/// part is length-prefixed so distinct splits of the same bytes hash
/// differently.
pub fn hash_to_scalar(domain: &str, parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(b"phantompool/v1/");
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    Scalar::from_bytes_mod_order(hasher.finalize().into())
}

/// Maps input bytes onto a curve point by try-and-increment: derive candidate
/// x coordinates from a counter-extended hash until one lands on the curve.
/// The y coordinate with even parity is chosen so the mapping is canonical.
pub fn hash_to_curve(domain: &str, data: &[u8]) -> Point {
    for counter in 0u32.. {
        let mut hasher = Sha256::new();
        hasher.update(b"phantompool/v1/htc/");
        hasher.update(domain.as_bytes());
        hasher.update((data.len() as u64).to_be_bytes());
        hasher.update(data);
        hasher.update(counter.to_be_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        let x = U256::from_be_bytes(digest);
        if x >= FIELD_MODULUS {
            continue;
        }
        let rhs = x
            .mul_mod(x, FIELD_MODULUS)
            .mul_mod(x, FIELD_MODULUS)
            .add_mod(CURVE_B, FIELD_MODULUS);
        let y = rhs.pow_mod(SQRT_EXPONENT, FIELD_MODULUS);
        if y.mul_mod(y, FIELD_MODULUS) != rhs {
            continue;
        }
        let y = if y.bit(0) {
            sub_mod(U256::ZERO, y, FIELD_MODULUS)
        } else {
            y
        };
        return Point::Affine { x, y };
    }
    unreachable!("try-and-increment terminates for roughly half of all candidates")
}

/// A private scalar paired with its public point. The private half never
/// leaves this type: it is excluded from `Debug` output and wiped on drop.
pub struct KeyMaterial {
    secret: Scalar,
    public: Point,
}

impl KeyMaterial {
    pub fn generate(rng: &mut dyn RngCore) -> Self {
        let secret = Scalar::random(rng);
        Self {
            public: Point::generator().mul(secret),
            secret,
        }
    }

    pub fn from_secret(secret: Scalar) -> Result<Self, Error> {
        if secret.is_zero() {
            return Err(Error::ZeroScalar);
        }
        Ok(Self {
            public: Point::generator().mul(secret),
            secret,
        })
    }

    pub fn public(&self) -> Point {
        self.public
    }

    pub(crate) fn secret(&self) -> Scalar {
        self.secret
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0 = U256::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rand::rngs::OsRng};

    #[test]
    fn generator_is_on_curve() {
        assert!(Point::generator().is_on_curve());
    }

    #[test]
    fn generator_has_expected_order() {
        let n = Scalar::from_bytes_mod_order(GROUP_ORDER.to_be_bytes());
        // N reduces to zero mod N, so N * G must be the identity.
        assert!(n.is_zero());
        let n_minus_one = Scalar::ZERO - Scalar::one();
        let almost = Point::generator().mul_vartime(n_minus_one);
        assert_eq!(almost.add(Point::generator()), Point::Infinity);
    }

    #[test]
    fn addition_matches_doubling() {
        let g = Point::generator();
        assert_eq!(g.add(g), g.double());
        assert_eq!(g.add(g).add(g), g.mul_vartime(Scalar::from_u64(3)));
    }

    #[test]
    fn ladder_and_vartime_multiplication_agree() {
        let mut rng = OsRng;
        for _ in 0..8 {
            let k = Scalar::random(&mut rng);
            let p = Point::generator();
            assert_eq!(p.mul(k), p.mul_vartime(k));
        }
    }

    #[test]
    fn adding_inverse_yields_infinity() {
        let p = Point::generator().mul_vartime(Scalar::from_u64(42));
        assert_eq!(p.add(p.neg()), Point::Infinity);
        assert_eq!(Point::Infinity.add(p), p);
        assert_eq!(p.add(Point::Infinity), p);
    }

    #[test]
    fn mod_inverse_round_trips() {
        let mut rng = OsRng;
        for _ in 0..8 {
            let a = Scalar::random(&mut rng);
            let inv = a.invert().unwrap();
            assert_eq!(a * inv, Scalar::one());
        }
    }

    #[test]
    fn mod_inverse_rejects_zero() {
        assert_eq!(
            mod_inverse(U256::ZERO, GROUP_ORDER),
            Err(Error::InverseNotDefined)
        );
        assert_eq!(Scalar::ZERO.invert(), Err(Error::InverseNotDefined));
    }

    #[test]
    fn mod_inverse_rejects_non_units() {
        assert_eq!(
            mod_inverse(U256::from(6u64), U256::from(8u64)),
            Err(Error::InverseNotDefined)
        );
        assert_eq!(
            mod_inverse(U256::from(3u64), U256::from(8u64)).unwrap(),
            U256::from(3u64)
        );
    }

    #[test]
    fn point_serialization_round_trips() {
        let p = Point::generator().mul_vartime(Scalar::from_u64(123456789));
        let bytes = p.to_bytes().unwrap();
        assert_eq!(Point::from_bytes(&bytes).unwrap(), p);
    }

    #[test]
    fn deserialization_rejects_off_curve_points() {
        let mut bytes = Point::generator().to_bytes().unwrap();
        bytes[63] ^= 1;
        assert_eq!(Point::from_bytes(&bytes), Err(Error::OffCurvePoint));
    }

    #[test]
    fn infinity_is_not_encodable() {
        assert_eq!(
            Point::Infinity.to_bytes(),
            Err(Error::InfinityNotEncodable)
        );
    }

    #[test]
    fn hash_to_curve_lands_on_curve_and_is_deterministic() {
        let a = hash_to_curve("test", b"input");
        let b = hash_to_curve("test", b"input");
        let c = hash_to_curve("test", b"other");
        assert!(a.is_on_curve());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(hash_to_curve("elsewhere", b"input"), a);
    }

    #[test]
    fn hash_to_scalar_separates_domains_and_parts() {
        let a = hash_to_scalar("d1", &[b"ab", b"c"]);
        let b = hash_to_scalar("d1", &[b"a", b"bc"]);
        let c = hash_to_scalar("d2", &[b"ab", b"c"]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, hash_to_scalar("d1", &[b"ab", b"c"]));
    }

    #[test]
    fn scalar_decoding_rejects_values_above_order() {
        assert!(Scalar::from_be_bytes(GROUP_ORDER.to_be_bytes()).is_err());
        let below = (GROUP_ORDER - U256::from(1u64)).to_be_bytes();
        assert!(Scalar::from_be_bytes(below).is_ok());
    }
}
