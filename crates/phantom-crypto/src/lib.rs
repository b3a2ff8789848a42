//! Cryptographic primitives for the PhantomPool matching engine.
//!
//! Everything operates over a single 256-bit short-Weierstrass curve
//! (secp256k1). The modules build on each other: [`curve`] provides scalar
//! and point arithmetic, [`elgamal`] the additively homomorphic encryption
//! with threshold decryption, [`shamir`] the secret sharing underneath the
//! threshold scheme, [`vrf`] verifiable round randomness, and [`rangeproof`]
//! Bulletproof range proofs for order solvency commitments.

pub mod bsgs;
pub mod curve;
pub mod elgamal;
pub mod rangeproof;
pub mod shamir;
pub mod transcript;
pub mod vrf;

pub use {
    curve::{KeyMaterial, Point, Scalar},
    elgamal::Ciphertext,
};
