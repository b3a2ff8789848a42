//! Fiat-Shamir transcript over SHA-256.
//!
//! Every proof system in this crate derives its challenges from a transcript
//! so that challenges bind the full interaction history. Challenges are also
//! folded back into the state, which makes later challenges depend on
//! earlier ones.

use {
    crate::curve::{Point, Scalar},
    sha2::{Digest, Sha256},
};

#[derive(Clone)]
pub struct Transcript {
    state: [u8; 32],
}

impl Transcript {
    pub fn new(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"phantompool/v1/transcript/");
        hasher.update(label.as_bytes());
        Self {
            state: hasher.finalize().into(),
        }
    }

    pub fn append_bytes(&mut self, label: &str, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.state);
        hasher.update((label.len() as u64).to_be_bytes());
        hasher.update(label.as_bytes());
        hasher.update((data.len() as u64).to_be_bytes());
        hasher.update(data);
        self.state = hasher.finalize().into();
    }

    pub fn append_u64(&mut self, label: &str, value: u64) {
        self.append_bytes(label, &value.to_be_bytes());
    }

    pub fn append_scalar(&mut self, label: &str, scalar: Scalar) {
        self.append_bytes(label, &scalar.to_be_bytes());
    }

    /// Appends a point's affine encoding. The identity appends a fixed marker
    /// instead, which keeps the transcript total.
    pub fn append_point(&mut self, label: &str, point: Point) {
        match point.to_bytes() {
            Ok(bytes) => self.append_bytes(label, &bytes),
            Err(_) => self.append_bytes(label, b"infinity"),
        }
    }

    /// Produces a challenge scalar and mixes it back into the state.
    pub fn challenge_scalar(&mut self, label: &str) -> Scalar {
        let mut hasher = Sha256::new();
        hasher.update(self.state);
        hasher.update(b"challenge/");
        hasher.update(label.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        self.state = digest;
        let scalar = Scalar::from_bytes_mod_order(digest);
        if scalar.is_zero() {
            // A zero challenge would make responses independent of the
            // witness. Vanishingly unlikely, handled anyway.
            return Scalar::one();
        }
        scalar
    }
}
