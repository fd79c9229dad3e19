//! Fiat-Shamir channel
//!
//! Prover and verifier drive identical channels: every commitment and
//! out-of-domain value is mixed in the same order, so every challenge the
//! verifier squeezes equals the one the prover used. A proof whose
//! transcript was altered anywhere derives different query positions.

use crate::hash::{domain, keccak_hash, Hash32};
use crate::m31::M31;
use crate::qm31::QM31;

/// Keccak-based transcript
#[derive(Clone, Debug)]
pub struct Channel {
    state: Hash32,
    counter: u64,
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel {
    pub fn new() -> Self {
        Self {
            state: keccak_hash(&[domain::CHANNEL]),
            counter: 0,
        }
    }

    /// Mix a 32-byte digest into the channel state
    pub fn mix_digest(&mut self, digest: &Hash32) {
        self.state = keccak_hash(&[&self.state, digest]);
        self.counter += 1;
    }

    /// Mix a QM31 element into the channel
    pub fn mix_qm31(&mut self, elem: &QM31) {
        self.state = keccak_hash(&[&self.state, &elem.to_bytes()]);
        self.counter += 1;
    }

    pub fn mix_qm31s(&mut self, elems: &[QM31]) {
        for e in elems {
            self.mix_qm31(e);
        }
    }

    /// Squeeze an M31 element from the channel
    pub fn squeeze_m31(&mut self) -> M31 {
        self.state = keccak_hash(&[&self.state, &self.counter.to_le_bytes()]);
        self.counter += 1;
        M31::from_le_bytes([self.state[0], self.state[1], self.state[2], self.state[3]])
    }

    /// Squeeze a QM31 element from the channel
    pub fn squeeze_qm31(&mut self) -> QM31 {
        let a = self.squeeze_m31();
        let b = self.squeeze_m31();
        let c = self.squeeze_m31();
        let d = self.squeeze_m31();
        QM31::new(a, b, c, d)
    }

    /// Squeeze `count` distinct indices in `[0, bound)`, in draw order.
    ///
    /// `count` must not exceed `bound`.
    pub fn squeeze_distinct_indices(&mut self, count: usize, bound: usize) -> Vec<usize> {
        debug_assert!(count <= bound);
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let idx = self.squeeze_m31().value() as usize % bound;
            if !out.contains(&idx) {
                out.push(idx);
            }
        }
        out
    }
}
