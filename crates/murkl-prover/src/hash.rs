//! Hash functions for the Murkl protocol
//!
//! Provides keccak256-based hash functions for:
//! - Identifier and password hashing (string → M31)
//! - Commitments (identifier + secret → 32-byte commitment)
//! - Nullifiers (secret + leaf_index → 32-byte nullifier)
//! - Public-input and witness field element derivation
//!
//! Every hash is prefixed with a tag from [`domain`]. SHA-256 is used only
//! for instruction and account discriminators.

use crate::m31::M31;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// A 32-byte hash output
pub type Hash32 = [u8; 32];

/// Domain separation tags. Each purpose has exactly one tag.
pub mod domain {
    pub const IDENTIFIER: &[u8] = b"murkl_identifier_v1";
    pub const PASSWORD: &[u8] = b"murkl_password_v1";
    pub const COMMITMENT: &[u8] = b"murkl_m31_hash_v1";
    pub const NULLIFIER: &[u8] = b"murkl_nullifier_v1";
    pub const PUBLIC_INPUT: &[u8] = b"murkl_public_input_v1";
    pub const TRACE: &[u8] = b"murkl_trace_v1";
    pub const CHANNEL: &[u8] = b"murkl_channel_v1";
}

/// Hash arbitrary inputs with keccak256
///
/// Concatenates all inputs and returns the hash.
///
/// # Example
/// ```rust
/// use murkl_prover::hash::keccak_hash;
///
/// let hash = keccak_hash(&[b"domain".as_slice(), &[1u8, 2, 3]]);
/// assert_eq!(hash.len(), 32);
/// ```
pub fn keccak_hash(inputs: &[&[u8]]) -> Hash32 {
    let mut hasher = Keccak256::new();
    for input in inputs {
        hasher.update(input);
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Reduce the low 32 bits (little-endian) of a hash modulo p
#[inline]
pub fn hash_to_m31(hash: &Hash32) -> M31 {
    M31::new(u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]))
}

/// Hash a password to derive the secret
///
/// Domain: `murkl_password_v1`
pub fn hash_password(password: &str) -> M31 {
    hash_to_m31(&keccak_hash(&[domain::PASSWORD, password.as_bytes()]))
}

/// Hash an identifier (case-insensitive)
///
/// Domain: `murkl_identifier_v1`
pub fn hash_identifier(identifier: &str) -> M31 {
    let normalized = identifier.to_lowercase();
    hash_to_m31(&keccak_hash(&[domain::IDENTIFIER, normalized.as_bytes()]))
}

/// 32-byte leaf commitment stored on-chain
///
/// Domain: `murkl_m31_hash_v1`
pub fn commitment(id_hash: M31, secret: M31) -> Hash32 {
    keccak_hash(&[
        domain::COMMITMENT,
        &id_hash.to_le_bytes(),
        &secret.to_le_bytes(),
    ])
}

/// 32-byte nullifier revealed at claim time
///
/// Domain: `murkl_nullifier_v1`
pub fn nullifier(secret: M31, leaf_index: u32) -> Hash32 {
    keccak_hash(&[
        domain::NULLIFIER,
        &secret.to_le_bytes(),
        &leaf_index.to_le_bytes(),
    ])
}

/// Map a 32-byte public value (commitment, nullifier, root, recipient)
/// to the field element the AIR binds it to.
pub fn public_input_felt(value: &Hash32) -> M31 {
    hash_to_m31(&keccak_hash(&[domain::PUBLIC_INPUT, value]))
}

/// First 8 bytes of SHA-256(`namespace:name`)
pub fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::new()
        .chain_update(namespace.as_bytes())
        .chain_update(b":")
        .chain_update(name.as_bytes())
        .finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// The secret material a recipient needs to claim one deposit.
///
/// `Debug` never prints the secret.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Secret {
    pub id_hash: M31,
    pub secret: M31,
}

impl Secret {
    pub fn new(id_hash: M31, secret: M31) -> Self {
        Self { id_hash, secret }
    }

    /// Derive from the human-facing identifier and password
    pub fn from_credentials(identifier: &str, password: &str) -> Self {
        Self::new(hash_identifier(identifier), hash_password(password))
    }

    pub fn commitment(&self) -> Hash32 {
        commitment(self.id_hash, self.secret)
    }

    pub fn nullifier(&self, leaf_index: u32) -> Hash32 {
        nullifier(self.secret, leaf_index)
    }
}

impl core::fmt::Debug for Secret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Secret")
            .field("id_hash", &self.id_hash)
            .field("secret", &"<redacted>")
            .finish()
    }
}
