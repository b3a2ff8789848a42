//! Shamir secret sharing over the curve's scalar field.
//!
//! A secret scalar is split into `n` shares so that any `t` of them
//! reconstruct it by Lagrange interpolation at zero while any `t - 1` reveal
//! nothing. The same Lagrange coefficients weight partial decryptions and
//! partial signatures in the threshold protocols.

use {
    crate::curve::{self, Scalar},
    rand::RngCore,
};

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("threshold must satisfy 1 <= t <= n")]
    InvalidThreshold,
    #[error("share index 0 would leak the secret")]
    ZeroIndex,
    #[error("duplicate share index {0}")]
    DuplicateIndex(u32),
    #[error("expected exactly {expected} shares, got {actual}")]
    WrongShareCount { expected: usize, actual: usize },
    #[error(transparent)]
    Curve(#[from] curve::Error),
}

/// One evaluation `(i, p(i))` of the sharing polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Share {
    pub index: u32,
    pub value: Scalar,
}

/// Splits `secret` into `n` shares with reconstruction threshold `t`.
pub fn share(
    secret: Scalar,
    t: usize,
    n: usize,
    rng: &mut dyn RngCore,
) -> Result<Vec<Share>, Error> {
    if t == 0 || t > n {
        return Err(Error::InvalidThreshold);
    }
    // p(x) = secret + a1 x + ... + a_{t-1} x^{t-1}
    let coefficients: Vec<Scalar> = std::iter::once(secret)
        .chain((1..t).map(|_| Scalar::random(rng)))
        .collect();
    Ok((1..=n as u32)
        .map(|index| Share {
            index,
            value: evaluate(&coefficients, index),
        })
        .collect())
}

fn evaluate(coefficients: &[Scalar], x: u32) -> Scalar {
    let x = Scalar::from_u64(x as u64);
    coefficients
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, &c| acc * x + c)
}

/// The Lagrange coefficient at zero for index `i` within `indexes`:
/// `prod_{j != i} (-j) * (i - j)^-1 mod n`.
pub fn lagrange_zero(indexes: &[u32], i: u32) -> Result<Scalar, Error> {
    check_distinct(indexes)?;
    let mut coefficient = Scalar::one();
    let xi = Scalar::from_u64(i as u64);
    for &j in indexes {
        if j == i {
            continue;
        }
        let xj = Scalar::from_u64(j as u64);
        coefficient = coefficient * (-xj) * (xi - xj).invert()?;
    }
    Ok(coefficient)
}

/// Reconstructs the secret from exactly `t` distinct shares.
pub fn reconstruct(shares: &[Share], t: usize) -> Result<Scalar, Error> {
    if shares.len() != t {
        return Err(Error::WrongShareCount {
            expected: t,
            actual: shares.len(),
        });
    }
    let indexes: Vec<u32> = shares.iter().map(|share| share.index).collect();
    let mut secret = Scalar::ZERO;
    for share in shares {
        secret = secret + lagrange_zero(&indexes, share.index)? * share.value;
    }
    Ok(secret)
}

fn check_distinct(indexes: &[u32]) -> Result<(), Error> {
    for (position, &index) in indexes.iter().enumerate() {
        if index == 0 {
            return Err(Error::ZeroIndex);
        }
        if indexes[..position].contains(&index) {
            return Err(Error::DuplicateIndex(index));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, rand::rngs::OsRng};

    #[test]
    fn any_t_shares_reconstruct() {
        let mut rng = OsRng;
        let secret = Scalar::random(&mut rng);
        let shares = share(secret, 3, 5, &mut rng).unwrap();
        for picks in [[0, 1, 2], [0, 3, 4], [1, 2, 4], [2, 3, 4]] {
            let subset: Vec<Share> = picks.iter().map(|&i| shares[i]).collect();
            assert_eq!(reconstruct(&subset, 3).unwrap(), secret);
        }
    }

    #[test]
    fn too_few_shares_fail_verifiably() {
        let mut rng = OsRng;
        let secret = Scalar::random(&mut rng);
        let shares = share(secret, 3, 5, &mut rng).unwrap();
        assert!(matches!(
            reconstruct(&shares[..2], 3),
            Err(Error::WrongShareCount {
                expected: 3,
                actual: 2
            })
        ));
        // Interpolating through only two of three required points lands on a
        // different polynomial and thus a different "secret".
        let wrong = reconstruct(&shares[..2], 2).unwrap();
        assert_ne!(wrong, secret);
    }

    #[test]
    fn duplicate_indexes_are_rejected() {
        let mut rng = OsRng;
        let shares = share(Scalar::from_u64(7), 2, 3, &mut rng).unwrap();
        let duplicated = [shares[0], shares[0]];
        assert!(matches!(
            reconstruct(&duplicated, 2),
            Err(Error::DuplicateIndex(1))
        ));
        assert!(matches!(
            lagrange_zero(&[1, 1, 2], 1),
            Err(Error::DuplicateIndex(1))
        ));
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let mut rng = OsRng;
        assert!(matches!(
            share(Scalar::from_u64(1), 0, 5, &mut rng),
            Err(Error::InvalidThreshold)
        ));
        assert!(matches!(
            share(Scalar::from_u64(1), 6, 5, &mut rng),
            Err(Error::InvalidThreshold)
        ));
    }

    #[test]
    fn lagrange_coefficients_sum_shares_to_secret() {
        let mut rng = OsRng;
        let secret = Scalar::random(&mut rng);
        let shares = share(secret, 2, 3, &mut rng).unwrap();
        let indexes = [1u32, 3];
        let combined = lagrange_zero(&indexes, 1).unwrap() * shares[0].value
            + lagrange_zero(&indexes, 3).unwrap() * shares[2].value;
        assert_eq!(combined, secret);
    }
}
