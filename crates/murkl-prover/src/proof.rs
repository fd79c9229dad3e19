//! Proof wire format
//!
//! ```text
//! trace_commitment        [32]
//! composition_commitment  [32]
//! oods_count u32,  oods_values      oods_count × QM31
//! fri_layer_count u32, fri_layers {
//!     commitment [32]
//!     eval_count u32, evals         eval_count × QM31
//!     path_count u32, paths         path_count × { depth u32, depth × [32] }
//! }
//! last_layer_size u32, last_layer_coeffs × QM31
//! query_count u32, query_positions  query_count × u32
//! query_decommitments               query_count × { trace_path, composition_path }
//! ```
//!
//! All integers are little-endian; a QM31 is four canonical u32 limbs.
//! Decoding is purely structural: any counts are accepted as long as they
//! fit in the remaining input. Whether they match the protocol parameters
//! is checked by the verifier.

use crate::merkle::Hash;
use crate::qm31::{QM31, QM31_BYTES};
use thiserror::Error;

/// Largest proof a buffer may hold
pub const MAX_PROOF_SIZE: usize = 16384;

/// Structural decoding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofFormatError {
    #[error("truncated {field}: need {needed} bytes at offset {offset}, {remaining} left")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("non-canonical field element at offset {offset}")]
    NonCanonical { offset: usize },
    #[error("{count} trailing bytes after proof")]
    TrailingBytes { count: usize },
}

/// One committed FRI layer with its per-query openings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FriLayerProof {
    pub commitment: Hash,
    pub evaluations: Vec<QM31>,
    pub merkle_paths: Vec<Vec<Hash>>,
}

/// Trace and composition openings for one query
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryDecommitment {
    pub trace_path: Vec<Hash>,
    pub composition_path: Vec<Hash>,
}

/// STARK proof
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Proof {
    pub trace_commitment: Hash,
    pub composition_commitment: Hash,
    pub oods_values: Vec<QM31>,
    pub fri_layers: Vec<FriLayerProof>,
    pub last_layer_coeffs: Vec<QM31>,
    pub query_positions: Vec<u32>,
    /// One entry per query position
    pub query_decommitments: Vec<QueryDecommitment>,
}

impl Proof {
    /// Encoded length in bytes
    pub fn encoded_len(&self) -> usize {
        let path_len = |p: &Vec<Hash>| 4 + 32 * p.len();
        64 + 4
            + QM31_BYTES * self.oods_values.len()
            + 4
            + self
                .fri_layers
                .iter()
                .map(|l| {
                    32 + 4
                        + QM31_BYTES * l.evaluations.len()
                        + 4
                        + l.merkle_paths.iter().map(path_len).sum::<usize>()
                })
                .sum::<usize>()
            + 4
            + QM31_BYTES * self.last_layer_coeffs.len()
            + 4
            + 4 * self.query_positions.len()
            + self
                .query_decommitments
                .iter()
                .map(|d| path_len(&d.trace_path) + path_len(&d.composition_path))
                .sum::<usize>()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer(Vec::with_capacity(self.encoded_len()));
        w.hash(&self.trace_commitment);
        w.hash(&self.composition_commitment);
        w.qm31s(&self.oods_values);

        w.u32(self.fri_layers.len() as u32);
        for layer in &self.fri_layers {
            w.hash(&layer.commitment);
            w.qm31s(&layer.evaluations);
            w.u32(layer.merkle_paths.len() as u32);
            for path in &layer.merkle_paths {
                w.path(path);
            }
        }

        w.qm31s(&self.last_layer_coeffs);

        w.u32(self.query_positions.len() as u32);
        for pos in &self.query_positions {
            w.u32(*pos);
        }
        for dec in &self.query_decommitments {
            w.path(&dec.trace_path);
            w.path(&dec.composition_path);
        }
        w.0
    }

    /// Decode a proof, rejecting truncated input, non-canonical limbs and
    /// trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofFormatError> {
        let mut r = Reader { bytes, offset: 0 };
        let trace_commitment = r.hash("trace_commitment")?;
        let composition_commitment = r.hash("composition_commitment")?;
        let oods_values = r.qm31s("oods_values")?;

        let layer_count = r.count("fri_layers", 32 + 4 + 4)?;
        let mut fri_layers = Vec::with_capacity(layer_count);
        for _ in 0..layer_count {
            let commitment = r.hash("fri_layer_commitment")?;
            let evaluations = r.qm31s("fri_layer_evals")?;
            let path_count = r.count("fri_layer_paths", 4)?;
            let mut merkle_paths = Vec::with_capacity(path_count);
            for _ in 0..path_count {
                merkle_paths.push(r.path("fri_layer_path")?);
            }
            fri_layers.push(FriLayerProof {
                commitment,
                evaluations,
                merkle_paths,
            });
        }

        let last_layer_coeffs = r.qm31s("last_layer_coeffs")?;

        let query_count = r.count("query_positions", 4)?;
        let mut query_positions = Vec::with_capacity(query_count);
        for _ in 0..query_count {
            query_positions.push(r.u32("query_position")?);
        }
        // Each decommitment is at least two empty paths.
        r.ensure("query_decommitments", query_count.saturating_mul(8))?;
        let mut query_decommitments = Vec::with_capacity(query_count);
        for _ in 0..query_count {
            let trace_path = r.path("trace_path")?;
            let composition_path = r.path("composition_path")?;
            query_decommitments.push(QueryDecommitment {
                trace_path,
                composition_path,
            });
        }

        if r.remaining() != 0 {
            return Err(ProofFormatError::TrailingBytes {
                count: r.remaining(),
            });
        }

        Ok(Self {
            trace_commitment,
            composition_commitment,
            oods_values,
            fri_layers,
            last_layer_coeffs,
            query_positions,
            query_decommitments,
        })
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn hash(&mut self, h: &Hash) {
        self.0.extend_from_slice(h);
    }

    fn qm31s(&mut self, values: &[QM31]) {
        self.u32(values.len() as u32);
        for v in values {
            self.0.extend_from_slice(&v.to_bytes());
        }
    }

    fn path(&mut self, nodes: &[Hash]) {
        self.u32(nodes.len() as u32);
        for n in nodes {
            self.hash(n);
        }
    }
}

/// Bounds-checked cursor. Every count is validated against the remaining
/// input before anything is allocated.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn ensure(&self, field: &'static str, needed: usize) -> Result<(), ProofFormatError> {
        if needed > self.remaining() {
            return Err(ProofFormatError::Truncated {
                field,
                offset: self.offset,
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], ProofFormatError> {
        self.ensure(field, n)?;
        let out = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, ProofFormatError> {
        let b = self.take(field, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn hash(&mut self, field: &'static str) -> Result<Hash, ProofFormatError> {
        let mut h = [0u8; 32];
        h.copy_from_slice(self.take(field, 32)?);
        Ok(h)
    }

    /// Read a u32 count and check `count × min_item_size` bytes remain
    fn count(&mut self, field: &'static str, min_item_size: usize) -> Result<usize, ProofFormatError> {
        let count = self.u32(field)? as usize;
        self.ensure(field, count.saturating_mul(min_item_size))?;
        Ok(count)
    }

    fn qm31(&mut self, field: &'static str) -> Result<QM31, ProofFormatError> {
        let offset = self.offset;
        let mut limbs = [0u8; QM31_BYTES];
        limbs.copy_from_slice(self.take(field, QM31_BYTES)?);
        QM31::from_canonical_bytes(&limbs).ok_or(ProofFormatError::NonCanonical { offset })
    }

    fn qm31s(&mut self, field: &'static str) -> Result<Vec<QM31>, ProofFormatError> {
        let count = self.count(field, QM31_BYTES)?;
        (0..count).map(|_| self.qm31(field)).collect()
    }

    fn path(&mut self, field: &'static str) -> Result<Vec<Hash>, ProofFormatError> {
        let depth = self.count(field, 32)?;
        (0..depth).map(|_| self.hash(field)).collect()
    }
}
