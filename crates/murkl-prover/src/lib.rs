//! Murkl Prover - Circle STARK proofs and protocol engine
//!
//! This crate provides the cryptographic primitives and state machines of the
//! Murkl private-transfer protocol: a sender deposits tokens against a
//! commitment, and the recipient later claims them with a STARK proof that
//! reveals only a nullifier.
//!
//! # Features
//!
//! - `prover` - Proof generation (default)
//! - `serde` - Serialize/Deserialize on off-chain data types
//! - `wasm` - WebAssembly support (RNG via `getrandom/js`)
//!
//! # Components
//!
//! - `m31`, `qm31` - Mersenne-31 field and its degree-4 extension
//! - `circle` - Circle group points and cosets
//! - `hash` - Domain-separated keccak hashing, commitments and nullifiers
//! - `merkle`, `accumulator` - Keccak Merkle trees and the deposit accumulator
//! - `channel` - Fiat-Shamir transcript
//! - `air`, `fri`, `poly` - Constraint system and low-degree testing
//! - `proof` - Proof wire format
//! - `prover`, `verifier` - Proof generation and verification
//! - `protocol` - Pools, proof buffers, claims and the in-memory ledger
//!
//! # What a proof establishes
//!
//! A verified proof pins the felts of the four public inputs (commitment,
//! nullifier, merkle root, recipient) into the trace and the transcript, so
//! it cannot be replayed against other inputs or redirected to another
//! recipient. It does NOT prove knowledge of the secret behind the
//! commitment: commitments and nullifiers are keccak digests, and the keccak
//! preimage relation is not part of the AIR. Only [`prover::Prover`] checks
//! that the witness opens both values, and a prover that skips that check
//! can build an accepting proof for any commitment and nullifier pair. Do
//! not treat a verified proof as evidence of secret knowledge.

pub mod accumulator;
pub mod air;
pub mod channel;
pub mod circle;
pub mod fri;
pub mod hash;
pub mod m31;
pub mod merkle;
pub mod poly;
pub mod proof;
pub mod protocol;
#[cfg(feature = "prover")]
pub mod prover;
pub mod qm31;
pub mod types;
pub mod verifier;

// Re-exports for convenience
pub use accumulator::{Accumulator, AccumulatorError, DepositTree, MERKLE_DEPTH, ROOT_HISTORY_SIZE};
pub use circle::{CirclePoint, Coset, CIRCLE_GENERATOR};
pub use hash::{commitment, hash_identifier, hash_password, keccak_hash, nullifier, Hash32, Secret};
pub use m31::{M31, M31_PRIME};
pub use merkle::{MerklePath, MerkleTree};
pub use proof::{Proof, ProofFormatError, MAX_PROOF_SIZE};
#[cfg(feature = "prover")]
pub use prover::{Prover, ProverError};
pub use qm31::QM31;
pub use types::{Address, PublicInputs, Witness};
pub use verifier::{VerificationError, Verifier};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::accumulator::{Accumulator, DepositTree};
    pub use crate::hash::{Hash32, Secret};
    pub use crate::m31::M31;
    pub use crate::protocol::{Ledger, MurklInstruction, ProtocolError};
    #[cfg(feature = "prover")]
    pub use crate::prover::Prover;
    pub use crate::qm31::QM31;
    pub use crate::types::{Address, PublicInputs, Witness};
    pub use crate::verifier::Verifier;
}
