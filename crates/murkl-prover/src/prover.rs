//! STARK proof generation
//!
//! Produces a [`Proof`] that the verifier accepts for exactly one set of
//! [`PublicInputs`]. The transcript order is fixed:
//!
//! 1. public inputs (commitment, nullifier, merkle root, recipient)
//! 2. trace commitment → α
//! 3. composition commitment → z
//! 4. trace values at z → γ
//! 5. each FRI layer commitment → β_k
//! 6. last-layer coefficients → query positions

use crate::air::{
    self, composition_at, eval_domain, trace_leaf, OodsSample, Trace, TraceRow, EVAL_SIZE,
    N_COLUMNS,
};
use crate::channel::Channel;
use crate::fri::{pair_leaf, FriProver, NotLowDegree, FRI_LAYERS, N_QUERIES};
use crate::merkle::MerkleTree;
use crate::poly;
use crate::proof::{FriLayerProof, Proof, QueryDecommitment};
use crate::qm31::QM31;
use crate::types::{PublicInputs, Witness};
use rand::RngCore;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProverError {
    #[error("witness does not open the {0} in the public inputs")]
    WitnessMismatch(&'static str),
    #[error(transparent)]
    NotLowDegree(#[from] NotLowDegree),
}

/// Proof generator
#[derive(Clone, Debug, Default)]
pub struct Prover;

impl Prover {
    pub fn new() -> Self {
        Self
    }

    /// Prove with a fresh salt from the thread RNG
    pub fn prove(&self, witness: &Witness, inputs: &PublicInputs) -> Result<Proof, ProverError> {
        let mut witness = *witness;
        rand::thread_rng().fill_bytes(&mut witness.salt);
        self.prove_deterministic(&witness, inputs)
    }

    /// Prove with a fresh salt from a caller-supplied RNG
    pub fn prove_with_rng<R: RngCore>(
        &self,
        witness: &Witness,
        inputs: &PublicInputs,
        rng: &mut R,
    ) -> Result<Proof, ProverError> {
        let mut witness = *witness;
        rng.fill_bytes(&mut witness.salt);
        self.prove_deterministic(&witness, inputs)
    }

    /// Prove using the salt already in `witness`
    pub fn prove_deterministic(
        &self,
        witness: &Witness,
        inputs: &PublicInputs,
    ) -> Result<Proof, ProverError> {
        if witness.secret.commitment() != inputs.commitment {
            return Err(ProverError::WitnessMismatch("commitment"));
        }
        if witness.secret.nullifier(witness.leaf_index) != inputs.nullifier {
            return Err(ProverError::WitnessMismatch("nullifier"));
        }

        let felts = inputs.felts();
        let trace = Trace::generate(witness, &felts);
        let trace_domain = air::trace_domain();
        let coeffs: Vec<Vec<QM31>> = trace
            .columns
            .iter()
            .map(|col| {
                let values: Vec<QM31> = col.iter().map(|v| QM31::from_m31(*v)).collect();
                poly::interpolate(&values, &trace_domain)
            })
            .collect();

        // Low-degree extension
        let domain = eval_domain();
        let points: Vec<QM31> = domain.points().iter().map(|p| p.to_qm31()).collect();
        let rows: Vec<TraceRow> = points
            .iter()
            .map(|x| core::array::from_fn(|j| poly::evaluate(&coeffs[j], *x)))
            .collect();
        let half = EVAL_SIZE / 2;

        let trace_tree = MerkleTree::commit(
            &(0..half)
                .map(|p| trace_leaf(&rows[p], &rows[p + half]))
                .collect::<Vec<_>>(),
        );

        let mut channel = Channel::new();
        inputs.mix_into(&mut channel);
        channel.mix_digest(&trace_tree.root());
        let alpha = channel.squeeze_qm31();

        let composition: Vec<QM31> = rows
            .iter()
            .zip(&points)
            .map(|(row, x)| composition_at(row, alpha, *x, &felts))
            .collect();
        let composition_tree = MerkleTree::commit(
            &(0..half)
                .map(|p| pair_leaf(&composition[p], &composition[p + half]))
                .collect::<Vec<_>>(),
        );
        channel.mix_digest(&composition_tree.root());
        let z = channel.squeeze_qm31();

        let oods_trace: TraceRow = core::array::from_fn(|j| poly::evaluate(&coeffs[j], z));
        channel.mix_qm31s(&oods_trace);
        let gamma = channel.squeeze_qm31();
        let oods = OodsSample {
            point: z,
            trace: oods_trace,
            composition: composition_at(&oods_trace, alpha, z, &felts),
            gamma,
        };

        let deep: Vec<QM31> = (0..EVAL_SIZE)
            .map(|i| oods.deep_quotient(points[i], &rows[i], composition[i]))
            .collect();
        let fri = FriProver::commit(deep, &mut channel)?;

        let positions = channel.squeeze_distinct_indices(N_QUERIES, EVAL_SIZE);
        debug!(?positions, "drew query positions");

        let mut fri_layers = Vec::with_capacity(FRI_LAYERS);
        for k in 0..FRI_LAYERS {
            let mut evaluations = Vec::new();
            let mut merkle_paths = Vec::with_capacity(N_QUERIES);
            for &q in &positions {
                let (pair, path) = fri.open(k, q);
                if k == 0 {
                    let p = q % half;
                    evaluations.extend_from_slice(&rows[p]);
                    evaluations.push(composition[p]);
                    evaluations.extend_from_slice(&rows[p + half]);
                    evaluations.push(composition[p + half]);
                } else {
                    evaluations.extend_from_slice(&pair);
                }
                merkle_paths.push(path);
            }
            fri_layers.push(FriLayerProof {
                commitment: fri.layer_root(k),
                evaluations,
                merkle_paths,
            });
        }

        let query_decommitments = positions
            .iter()
            .map(|q| QueryDecommitment {
                trace_path: trace_tree.open(q % half).siblings,
                composition_path: composition_tree.open(q % half).siblings,
            })
            .collect();

        let proof = Proof {
            trace_commitment: trace_tree.root(),
            composition_commitment: composition_tree.root(),
            oods_values: oods_trace.to_vec(),
            fri_layers,
            last_layer_coeffs: fri.last_layer().to_vec(),
            query_positions: positions.iter().map(|q| *q as u32).collect(),
            query_decommitments,
        };
        debug!(bytes = proof.encoded_len(), "proof generated");
        debug_assert_eq!(proof.oods_values.len(), N_COLUMNS);
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Secret;
    use crate::fri::{layer_depth, LAST_LAYER_SIZE};

    fn setup() -> (Witness, PublicInputs) {
        let secret = Secret::from_credentials("@alice", "correct horse");
        let witness = Witness::new(secret, 2, [1u8; 32]);
        let inputs = witness.public_inputs([0xAB; 32], [0xCD; 32]);
        (witness, inputs)
    }

    #[test]
    fn test_proof_shape() {
        let (witness, inputs) = setup();
        let proof = Prover::new().prove_deterministic(&witness, &inputs).unwrap();
        assert_eq!(proof.oods_values.len(), 4);
        assert_eq!(proof.fri_layers.len(), FRI_LAYERS);
        assert_eq!(proof.fri_layers[0].evaluations.len(), 10 * N_QUERIES);
        assert_eq!(proof.fri_layers[1].evaluations.len(), 2 * N_QUERIES);
        for (k, layer) in proof.fri_layers.iter().enumerate() {
            assert!(layer.merkle_paths.iter().all(|p| p.len() == layer_depth(k)));
        }
        assert_eq!(proof.last_layer_coeffs.len(), LAST_LAYER_SIZE);
        assert_eq!(proof.query_positions.len(), N_QUERIES);
        assert!(proof.encoded_len() < crate::proof::MAX_PROOF_SIZE);
    }

    #[test]
    fn test_deterministic_given_salt() {
        let (witness, inputs) = setup();
        let a = Prover::new().prove_deterministic(&witness, &inputs).unwrap();
        let b = Prover::new().prove_deterministic(&witness, &inputs).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fresh_salt_changes_proof() {
        let (witness, inputs) = setup();
        let a = Prover::new().prove(&witness, &inputs).unwrap();
        let b = Prover::new().prove(&witness, &inputs).unwrap();
        assert_ne!(a.trace_commitment, b.trace_commitment);
    }

    #[test]
    fn test_rejects_foreign_nullifier() {
        let (witness, mut inputs) = setup();
        inputs.nullifier = witness.secret.nullifier(witness.leaf_index + 1);
        assert_eq!(
            Prover::new().prove_deterministic(&witness, &inputs),
            Err(ProverError::WitnessMismatch("nullifier"))
        );
    }

    #[test]
    fn test_rejects_foreign_commitment() {
        let (witness, mut inputs) = setup();
        inputs.commitment = [0u8; 32];
        assert_eq!(
            Prover::new().prove_deterministic(&witness, &inputs),
            Err(ProverError::WitnessMismatch("commitment"))
        );
    }
}
