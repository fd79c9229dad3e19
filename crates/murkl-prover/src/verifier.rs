//! STARK proof verification
//!
//! Verification is all-or-nothing and side-effect free. The checks run in
//! order:
//!
//! 1. shape: every count matches the protocol parameters
//! 2. transcript: challenges and query positions are re-derived from the
//!    public inputs and commitments and must match the proof
//! 3. per query: trace and composition openings against their roots, the
//!    DEEP quotient against FRI layer 0, every fold against the next layer,
//!    and the last fold against the last-layer polynomial
//!
//! Adversarial bytes produce an error, never a panic.
//!
//! Acceptance means the proof was built over exactly these public inputs.
//! It says nothing about who knows the secret behind the commitment: the
//! AIR has no relation between the secret and the commitment or nullifier
//! felts (see the crate docs).

use crate::air::{composition_at, eval_domain, trace_leaf, OodsSample, TraceRow, EVAL_SIZE, N_COLUMNS};
use crate::channel::Channel;
use crate::fri::{
    fold_pair, layer_depth, layer_domain, pair_leaf, FRI_LAYERS, LAST_LAYER_SIZE, N_QUERIES,
};
use crate::merkle::verify_leaf;
use crate::poly;
use crate::proof::{Proof, ProofFormatError};
use crate::qm31::QM31;
use crate::types::PublicInputs;
use thiserror::Error;
use tracing::{debug, instrument};

/// Values opened at layer 0 per query: trace row and composition at x and -x
pub const LAYER0_VALUES_PER_QUERY: usize = 2 * (N_COLUMNS + 1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("invalid proof format: {0}")]
    InvalidProofFormat(String),
    #[error("query positions do not match the transcript")]
    ChallengeMismatch,
    #[error("{commitment} decommitment failed for query {query}")]
    MerkleMismatch {
        commitment: &'static str,
        query: usize,
    },
    #[error("FRI fold inconsistent at layer {layer} for query {query}")]
    FriFoldMismatch { layer: usize, query: usize },
    #[error("FRI last layer disagrees for query {query}")]
    LastLayerMismatch { query: usize },
}

impl From<ProofFormatError> for VerificationError {
    fn from(e: ProofFormatError) -> Self {
        Self::InvalidProofFormat(e.to_string())
    }
}

fn format_error(msg: impl Into<String>) -> VerificationError {
    VerificationError::InvalidProofFormat(msg.into())
}

/// Challenges re-derived from the transcript
struct Challenges {
    alpha: QM31,
    oods: OodsSample,
    betas: Vec<QM31>,
    positions: Vec<usize>,
}

/// STARK verifier
#[derive(Clone, Debug, Default)]
pub struct Verifier;

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Decode and verify a serialized proof
    pub fn verify_bytes(&self, bytes: &[u8], inputs: &PublicInputs) -> Result<(), VerificationError> {
        let proof = Proof::from_bytes(bytes)?;
        self.verify(&proof, inputs)
    }

    /// Verify a decoded proof against its public inputs
    #[instrument(level = "debug", name = "verify", skip_all)]
    pub fn verify(&self, proof: &Proof, inputs: &PublicInputs) -> Result<(), VerificationError> {
        check_shape(proof)?;
        let felts = inputs.felts();
        let challenges = replay_transcript(proof, inputs, &felts);

        let claimed: Vec<usize> = proof.query_positions.iter().map(|p| *p as usize).collect();
        if claimed != challenges.positions {
            debug!("query positions diverge from transcript");
            return Err(VerificationError::ChallengeMismatch);
        }

        let domains: Vec<_> = (0..=FRI_LAYERS).map(layer_domain).collect();
        let half = EVAL_SIZE / 2;
        for (qi, &q) in challenges.positions.iter().enumerate() {
            let p = q % half;
            let opened = &proof.fri_layers[0].evaluations
                [qi * LAYER0_VALUES_PER_QUERY..(qi + 1) * LAYER0_VALUES_PER_QUERY];
            let row: TraceRow = core::array::from_fn(|j| opened[j]);
            let comp = opened[N_COLUMNS];
            let anti: TraceRow = core::array::from_fn(|j| opened[N_COLUMNS + 1 + j]);
            let anti_comp = opened[2 * N_COLUMNS + 1];

            let dec = &proof.query_decommitments[qi];
            if !verify_leaf(&trace_leaf(&row, &anti), p, &dec.trace_path, &proof.trace_commitment) {
                return Err(VerificationError::MerkleMismatch {
                    commitment: "trace",
                    query: qi,
                });
            }
            if !verify_leaf(
                &pair_leaf(&comp, &anti_comp),
                p,
                &dec.composition_path,
                &proof.composition_commitment,
            ) {
                return Err(VerificationError::MerkleMismatch {
                    commitment: "composition",
                    query: qi,
                });
            }

            let x = domains[0].at(p).to_qm31();
            let mut pair = [
                challenges.oods.deep_quotient(x, &row, comp),
                challenges.oods.deep_quotient(-x, &anti, anti_comp),
            ];

            let mut pos = q;
            let mut folded = QM31::ZERO;
            for k in 0..FRI_LAYERS {
                let layer = &proof.fri_layers[k];
                let layer_half = layer_size_half(k);
                let pk = pos % layer_half;
                if k > 0 {
                    let opened = [layer.evaluations[2 * qi], layer.evaluations[2 * qi + 1]];
                    let expected = if pos < layer_half { opened[0] } else { opened[1] };
                    if expected != folded {
                        return Err(VerificationError::FriFoldMismatch { layer: k, query: qi });
                    }
                    pair = opened;
                }
                if !verify_leaf(
                    &pair_leaf(&pair[0], &pair[1]),
                    pk,
                    &layer.merkle_paths[qi],
                    &layer.commitment,
                ) {
                    return Err(VerificationError::MerkleMismatch {
                        commitment: "fri layer",
                        query: qi,
                    });
                }
                let xk = domains[k].at(pk).to_qm31();
                folded = fold_pair(pair[0], pair[1], xk, challenges.betas[k]);
                pos = pk;
            }

            let last_x = domains[FRI_LAYERS].at(pos).to_qm31();
            if poly::evaluate(&proof.last_layer_coeffs, last_x) != folded {
                return Err(VerificationError::LastLayerMismatch { query: qi });
            }
        }

        debug!(alpha = %challenges.alpha, "proof verified");
        Ok(())
    }
}

fn layer_size_half(k: usize) -> usize {
    (EVAL_SIZE >> k) / 2
}

fn check_shape(proof: &Proof) -> Result<(), VerificationError> {
    if proof.oods_values.len() != N_COLUMNS {
        return Err(format_error(format!(
            "expected {N_COLUMNS} OOD values, got {}",
            proof.oods_values.len()
        )));
    }
    if proof.fri_layers.len() != FRI_LAYERS {
        return Err(format_error(format!(
            "expected {FRI_LAYERS} FRI layers, got {}",
            proof.fri_layers.len()
        )));
    }
    for (k, layer) in proof.fri_layers.iter().enumerate() {
        let per_query = if k == 0 { LAYER0_VALUES_PER_QUERY } else { 2 };
        if layer.evaluations.len() != per_query * N_QUERIES {
            return Err(format_error(format!("FRI layer {k} has {} evaluations", layer.evaluations.len())));
        }
        if layer.merkle_paths.len() != N_QUERIES
            || layer.merkle_paths.iter().any(|p| p.len() != layer_depth(k))
        {
            return Err(format_error(format!("FRI layer {k} has malformed paths")));
        }
    }
    if proof.last_layer_coeffs.len() != LAST_LAYER_SIZE {
        return Err(format_error(format!(
            "expected {LAST_LAYER_SIZE} last-layer coefficients, got {}",
            proof.last_layer_coeffs.len()
        )));
    }
    if proof.query_positions.len() != N_QUERIES || proof.query_decommitments.len() != N_QUERIES {
        return Err(format_error(format!("expected {N_QUERIES} queries")));
    }
    if proof.query_positions.iter().any(|p| *p as usize >= EVAL_SIZE) {
        return Err(format_error("query position outside the evaluation domain"));
    }
    let depth = layer_depth(0);
    if proof
        .query_decommitments
        .iter()
        .any(|d| d.trace_path.len() != depth || d.composition_path.len() != depth)
    {
        return Err(format_error("malformed trace or composition path"));
    }
    Ok(())
}

fn replay_transcript(proof: &Proof, inputs: &PublicInputs, felts: &[crate::m31::M31; 4]) -> Challenges {
    let mut channel = Channel::new();
    inputs.mix_into(&mut channel);
    channel.mix_digest(&proof.trace_commitment);
    let alpha = channel.squeeze_qm31();
    channel.mix_digest(&proof.composition_commitment);
    let z = channel.squeeze_qm31();

    let trace: TraceRow = core::array::from_fn(|j| proof.oods_values[j]);
    channel.mix_qm31s(&trace);
    let gamma = channel.squeeze_qm31();
    let oods = OodsSample {
        point: z,
        trace,
        composition: composition_at(&trace, alpha, z, felts),
        gamma,
    };

    let betas = proof
        .fri_layers
        .iter()
        .map(|layer| {
            channel.mix_digest(&layer.commitment);
            channel.squeeze_qm31()
        })
        .collect();
    channel.mix_qm31s(&proof.last_layer_coeffs);
    let positions = channel.squeeze_distinct_indices(N_QUERIES, EVAL_SIZE);

    Challenges {
        alpha,
        oods,
        betas,
        positions,
    }
}

#[cfg(all(test, feature = "prover"))]
mod tests {
    use super::*;
    use crate::hash::Secret;
    use crate::prover::Prover;
    use crate::types::Witness;

    fn fixture() -> (Proof, PublicInputs) {
        let secret = Secret::from_credentials("@carol", "s3cret");
        let witness = Witness::new(secret, 5, [9u8; 32]);
        let inputs = witness.public_inputs([0x11; 32], [0x22; 32]);
        let proof = Prover::new().prove_deterministic(&witness, &inputs).unwrap();
        (proof, inputs)
    }

    #[test]
    fn test_accepts_honest_proof() {
        let (proof, inputs) = fixture();
        assert_eq!(Verifier::new().verify(&proof, &inputs), Ok(()));
        assert_eq!(Verifier::new().verify_bytes(&proof.to_bytes(), &inputs), Ok(()));
    }

    #[test]
    fn test_rejects_other_recipient() {
        let (proof, mut inputs) = fixture();
        inputs.recipient = [0x33; 32];
        assert_eq!(
            Verifier::new().verify(&proof, &inputs),
            Err(VerificationError::ChallengeMismatch)
        );
    }

    #[test]
    fn test_commitment_and_nullifier_are_pinned() {
        let (proof, inputs) = fixture();
        let mut other = inputs;
        other.commitment = [0x44; 32];
        assert!(Verifier::new().verify(&proof, &other).is_err());
        let mut other = inputs;
        other.nullifier = [0x55; 32];
        assert!(Verifier::new().verify(&proof, &other).is_err());
    }

    #[test]
    fn test_rejects_tampered_oods() {
        let (mut proof, inputs) = fixture();
        proof.oods_values[0] = proof.oods_values[0] + QM31::ONE;
        assert!(Verifier::new().verify(&proof, &inputs).is_err());
    }

    #[test]
    fn test_rejects_tampered_fri_value() {
        let (mut proof, inputs) = fixture();
        proof.fri_layers[1].evaluations[0] = proof.fri_layers[1].evaluations[0] + QM31::ONE;
        let err = Verifier::new().verify(&proof, &inputs).unwrap_err();
        assert!(matches!(
            err,
            VerificationError::FriFoldMismatch { .. } | VerificationError::MerkleMismatch { .. }
        ));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let (mut proof, inputs) = fixture();
        proof.last_layer_coeffs.push(QM31::ZERO);
        assert!(matches!(
            Verifier::new().verify(&proof, &inputs),
            Err(VerificationError::InvalidProofFormat(_))
        ));
    }

    #[test]
    fn test_rejects_all_zero_bytes() {
        let (_, inputs) = fixture();
        assert!(matches!(
            Verifier::new().verify_bytes(&[0u8; 100], &inputs),
            Err(VerificationError::InvalidProofFormat(_))
        ));
    }
}
