//! JSON files the CLI reads and writes
//!
//! Hashes are stored as `0x`-prefixed hex so the files can be pasted into
//! other tools without re-encoding.

use anyhow::{bail, Context, Result};
use murkl_prover::{Hash32, PublicInputs};
use serde::{Deserialize, Serialize};

/// What a sender keeps after `murkl commit`.
///
/// The password is never written: the recipient gets it out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentRecord {
    pub identifier: String,
    pub identifier_hash: u32,
    pub commitment: String,
}

/// Every commitment in a pool, in deposit order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositSet {
    pub leaves: Vec<String>,
    /// Root the set produced when it was last written, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl DepositSet {
    pub fn commitments(&self) -> Result<Vec<Hash32>> {
        self.leaves
            .iter()
            .enumerate()
            .map(|(i, leaf)| parse_hash(leaf).with_context(|| format!("leaf {i}")))
            .collect()
    }

    /// Position of `commitment`, if it was deposited
    pub fn find_leaf(&self, commitment: &Hash32) -> Result<Option<u64>> {
        Ok(self
            .commitments()?
            .iter()
            .position(|leaf| leaf == commitment)
            .map(|i| i as u64))
    }
}

/// A proof plus the public inputs it was generated for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofBundle {
    pub proof: String,
    pub commitment: String,
    pub nullifier: String,
    pub merkle_root: String,
    pub recipient: String,
    pub leaf_index: u64,
}

impl ProofBundle {
    pub fn new(proof: &[u8], inputs: &PublicInputs, leaf_index: u64) -> Self {
        Self {
            proof: hex::encode(proof),
            commitment: format_hash(&inputs.commitment),
            nullifier: format_hash(&inputs.nullifier),
            merkle_root: format_hash(&inputs.merkle_root),
            recipient: format_hash(&inputs.recipient),
            leaf_index,
        }
    }

    pub fn proof_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(self.proof.trim_start_matches("0x")).context("proof is not valid hex")
    }

    pub fn public_inputs(&self) -> Result<PublicInputs> {
        Ok(PublicInputs::new(
            parse_hash(&self.commitment).context("commitment")?,
            parse_hash(&self.nullifier).context("nullifier")?,
            parse_hash(&self.merkle_root).context("merkle_root")?,
            parse_hash(&self.recipient).context("recipient")?,
        ))
    }
}

pub fn format_hash(hash: &Hash32) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Parse 32 bytes of hex, with or without a `0x` prefix
pub fn parse_hash(s: &str) -> Result<Hash32> {
    let bytes = hex::decode(s.trim().trim_start_matches("0x")).context("invalid hex")?;
    if bytes.len() != 32 {
        bail!("expected 32 bytes, got {}", bytes.len());
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}
