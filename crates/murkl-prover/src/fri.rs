//! FRI (Fast Reed-Solomon IOP of Proximity)
//!
//! Each layer is a vector of evaluations over a coset `D_k`; its leaves are
//! the antipodal pairs `(f(x), f(-x))`, so one opening gives the verifier
//! both inputs of a fold:
//!
//! ```text
//! f'(x²) = (f(x) + f(-x)) / 2 + β · (f(x) - f(-x)) / (2x)
//! ```
//!
//! After [`FRI_LAYERS`] folds the remaining evaluations must agree with a
//! polynomial of fewer than [`LAST_LAYER_SIZE`] coefficients, which the
//! proof carries in the clear.

use crate::air::{eval_domain, EVAL_SIZE, LOG_EVAL_SIZE, TRACE_SIZE};
use crate::channel::Channel;
use crate::circle::Coset;
use crate::m31::M31;
use crate::merkle::{Hash, MerkleTree};
use crate::poly;
use crate::qm31::QM31;

/// Number of committed FRI layers
pub const FRI_LAYERS: usize = 3;

/// Coefficients of the final polynomial
pub const LAST_LAYER_SIZE: usize = TRACE_SIZE >> FRI_LAYERS;

/// Number of query positions drawn from the transcript
pub const N_QUERIES: usize = 8;

/// Domain of layer `k`: the evaluation domain squared `k` times
pub fn layer_domain(k: usize) -> Coset {
    (0..k).fold(eval_domain(), |d, _| d.squared())
}

/// Number of evaluations in layer `k`
pub const fn layer_size(k: usize) -> usize {
    EVAL_SIZE >> k
}

/// Merkle depth of layer `k` (one leaf per antipodal pair)
pub const fn layer_depth(k: usize) -> usize {
    (LOG_EVAL_SIZE as usize) - k - 1
}

/// Serialise one antipodal pair as a Merkle leaf
pub fn pair_leaf(a: &QM31, b: &QM31) -> [u8; 32] {
    let mut leaf = [0u8; 32];
    leaf[..16].copy_from_slice(&a.to_bytes());
    leaf[16..].copy_from_slice(&b.to_bytes());
    leaf
}

/// Fold one antipodal pair at `x` (the point of `f_x`)
pub fn fold_pair(f_x: QM31, f_neg_x: QM31, x: QM31, beta: QM31) -> QM31 {
    let half = QM31::from_m31(M31::new(2).inverse());
    let even = (f_x + f_neg_x) * half;
    let odd = (f_x - f_neg_x) * half * x.inverse();
    even + beta * odd
}

/// Fold a whole layer; `values.len()` must equal the domain size
pub fn fold_layer(values: &[QM31], domain: &Coset, beta: QM31) -> Vec<QM31> {
    let half = values.len() / 2;
    (0..half)
        .map(|i| fold_pair(values[i], values[i + half], domain.at(i).to_qm31(), beta))
        .collect()
}

/// Prover-side state after committing every layer
pub struct FriProver {
    layers: Vec<(Vec<QM31>, MerkleTree)>,
    last_layer: Vec<QM31>,
}

/// The DEEP quotient folded to something that is not low degree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("FRI last layer has degree {degree}, expected < {}", LAST_LAYER_SIZE)]
pub struct NotLowDegree {
    pub degree: usize,
}

impl FriProver {
    /// Commit to `values` over the evaluation domain, drawing one folding
    /// challenge per layer, then mix in the last-layer coefficients.
    pub fn commit(values: Vec<QM31>, channel: &mut Channel) -> Result<Self, NotLowDegree> {
        let mut layers = Vec::with_capacity(FRI_LAYERS);
        let mut current = values;
        for k in 0..FRI_LAYERS {
            let half = current.len() / 2;
            let leaves: Vec<[u8; 32]> = (0..half)
                .map(|i| pair_leaf(&current[i], &current[i + half]))
                .collect();
            let tree = MerkleTree::commit(&leaves);
            channel.mix_digest(&tree.root());
            let beta = channel.squeeze_qm31();
            let folded = fold_layer(&current, &layer_domain(k), beta);
            layers.push((current, tree));
            current = folded;
        }

        let coeffs = poly::interpolate(&current, &layer_domain(FRI_LAYERS));
        if let Some(degree) = poly::degree(&coeffs) {
            if degree >= LAST_LAYER_SIZE {
                return Err(NotLowDegree { degree });
            }
        }
        let last_layer = coeffs[..LAST_LAYER_SIZE].to_vec();
        channel.mix_qm31s(&last_layer);
        Ok(Self { layers, last_layer })
    }

    pub fn layer_root(&self, k: usize) -> Hash {
        self.layers[k].1.root()
    }

    pub fn last_layer(&self) -> &[QM31] {
        &self.last_layer
    }

    /// Pair values and Merkle path of layer `k` for query position `q`
    pub fn open(&self, k: usize, q: usize) -> ([QM31; 2], Vec<Hash>) {
        let (values, tree) = &self.layers[k];
        let half = values.len() / 2;
        let p = q % half;
        ([values[p], values[p + half]], tree.open(p).siblings)
    }
}
