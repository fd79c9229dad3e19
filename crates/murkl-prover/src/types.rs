//! Common types shared by the prover, verifier and protocol engine

use crate::channel::Channel;
use crate::hash::{public_input_felt, Hash32, Secret};
use crate::m31::M31;

/// A 32-byte account address
pub type Address = [u8; 32];

/// Public inputs every proof is bound to.
///
/// `recipient` is the token account the claim will pay out to; binding it
/// here is what stops a relayer from redirecting a verified proof.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PublicInputs {
    pub commitment: Hash32,
    pub nullifier: Hash32,
    pub merkle_root: Hash32,
    pub recipient: Address,
}

impl PublicInputs {
    pub fn new(commitment: Hash32, nullifier: Hash32, merkle_root: Hash32, recipient: Address) -> Self {
        Self {
            commitment,
            nullifier,
            merkle_root,
            recipient,
        }
    }

    /// The four values in transcript order
    pub fn as_array(&self) -> [&Hash32; 4] {
        [&self.commitment, &self.nullifier, &self.merkle_root, &self.recipient]
    }

    /// Field elements pinned into trace column 0, rows 0..4
    pub fn felts(&self) -> [M31; 4] {
        self.as_array().map(public_input_felt)
    }

    /// Absorb into a fresh transcript before any proof data
    pub fn mix_into(&self, channel: &mut Channel) {
        for value in self.as_array() {
            channel.mix_digest(value);
        }
    }
}

/// Prover-side witness
#[derive(Clone, Copy, Debug)]
pub struct Witness {
    pub secret: Secret,
    pub leaf_index: u32,
    /// Fresh randomness that makes two proofs of the same statement unlinkable
    pub salt: [u8; 32],
}

impl Witness {
    pub fn new(secret: Secret, leaf_index: u32, salt: [u8; 32]) -> Self {
        Self {
            secret,
            leaf_index,
            salt,
        }
    }

    /// The public inputs this witness can prove, given a root and recipient
    pub fn public_inputs(&self, merkle_root: Hash32, recipient: Address) -> PublicInputs {
        PublicInputs::new(
            self.secret.commitment(),
            self.secret.nullifier(self.leaf_index),
            merkle_root,
            recipient,
        )
    }
}
