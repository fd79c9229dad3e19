//! Murkl WASM Prover
//!
//! Generates claim proofs in the browser. Everything is delegated to
//! `murkl-prover`, so the bytes produced here are exactly what the on-chain
//! verifier reads.

use murkl_prover::protocol::instruction::discriminator;
use murkl_prover::{Hash32, Prover, PublicInputs, Secret, Verifier, Witness};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[derive(Debug, Serialize, Deserialize)]
struct ProofBundle {
    commitment: String,
    nullifier: String,
    merkle_root: String,
    recipient: String,
    leaf_index: u32,
    proof: String,
    proof_size: usize,
}

fn parse_hash(name: &str, s: &str) -> Result<Hash32, String> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| format!("{name}: {e}"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("{name}: expected 32 bytes, got {}", b.len()))
}

fn build_proof(
    identifier: &str,
    password: &str,
    leaf_index: u32,
    merkle_root_hex: &str,
    recipient_hex: &str,
) -> Result<ProofBundle, String> {
    let merkle_root = parse_hash("merkle_root", merkle_root_hex)?;
    let recipient = parse_hash("recipient", recipient_hex)?;

    let witness = Witness::new(Secret::from_credentials(identifier, password), leaf_index, [0; 32]);
    let inputs = witness.public_inputs(merkle_root, recipient);
    let proof = Prover::new()
        .prove(&witness, &inputs)
        .map_err(|e| e.to_string())?
        .to_bytes();

    Ok(ProofBundle {
        commitment: hex::encode(inputs.commitment),
        nullifier: hex::encode(inputs.nullifier),
        merkle_root: hex::encode(inputs.merkle_root),
        recipient: hex::encode(inputs.recipient),
        leaf_index,
        proof_size: proof.len(),
        proof: hex::encode(proof),
    })
}

fn check_proof(bundle: &ProofBundle) -> Result<(), String> {
    let inputs = PublicInputs::new(
        parse_hash("commitment", &bundle.commitment)?,
        parse_hash("nullifier", &bundle.nullifier)?,
        parse_hash("merkle_root", &bundle.merkle_root)?,
        parse_hash("recipient", &bundle.recipient)?,
    );
    let proof = hex::decode(bundle.proof.trim_start_matches("0x")).map_err(|e| format!("proof: {e}"))?;
    Verifier::new().verify_bytes(&proof, &inputs).map_err(|e| e.to_string())
}

// ============================================================================
// Public API
// ============================================================================

/// Generate commitment from identifier and password
#[wasm_bindgen]
pub fn generate_commitment(identifier: &str, password: &str) -> String {
    hex::encode(Secret::from_credentials(identifier, password).commitment())
}

/// Generate nullifier from password and leaf index
#[wasm_bindgen]
pub fn generate_nullifier(password: &str, leaf_index: u32) -> String {
    hex::encode(murkl_prover::nullifier(murkl_prover::hash_password(password), leaf_index))
}

/// Generate a proof bundle.
///
/// `merkle_root_hex` is a recent pool root (fetch from relayer/chain) and
/// `recipient_hex` the token account the claim pays out to.
#[wasm_bindgen]
pub fn generate_proof(
    identifier: &str,
    password: &str,
    leaf_index: u32,
    merkle_root_hex: &str,
    recipient_hex: &str,
) -> Result<JsValue, JsError> {
    let bundle = build_proof(identifier, password, leaf_index, merkle_root_hex, recipient_hex)
        .map_err(|e| JsError::new(&e))?;
    serde_wasm_bindgen::to_value(&bundle).map_err(|e| JsError::new(&e.to_string()))
}

/// Check a bundle produced by `generate_proof`
#[wasm_bindgen]
pub fn verify_proof(bundle: JsValue) -> Result<bool, JsError> {
    let bundle: ProofBundle =
        serde_wasm_bindgen::from_value(bundle).map_err(|e| JsError::new(&e.to_string()))?;
    Ok(check_proof(&bundle).is_ok())
}

/// Verify commitment matches identifier + password
#[wasm_bindgen]
pub fn verify_commitment(identifier: &str, password: &str, commitment_hex: &str) -> bool {
    parse_hash("commitment", commitment_hex)
        .map(|expected| Secret::from_credentials(identifier, password).commitment() == expected)
        .unwrap_or(false)
}

/// 8-byte instruction discriminator, hex encoded
#[wasm_bindgen]
pub fn instruction_discriminator(name: &str) -> String {
    hex::encode(discriminator(name))
}

/// Get the SDK version
#[wasm_bindgen]
pub fn get_sdk_version() -> String {
    concat!("murkl-wasm-", env!("CARGO_PKG_VERSION")).to_string()
}
