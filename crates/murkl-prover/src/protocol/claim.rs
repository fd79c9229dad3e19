//! Claim authorization
//!
//! A claim pays out one deposit exactly once. Checks run in a fixed order so
//! a replayed nullifier is reported as `AlreadyClaimed` before anything
//! about the proof is considered.

use super::buffer::ProofBuffer;
use super::error::ProtocolError;
use super::pool::{DepositRecord, Pool};
use crate::hash::Hash32;
use crate::types::Address;

/// Registry entry whose existence marks a nullifier as spent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NullifierRecord {
    pub pool: Address,
    pub nullifier: Hash32,
    pub leaf_index: u64,
    pub recipient: Address,
}

/// What the claimant asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimRequest {
    pub nullifier: Hash32,
    pub recipient_token_account: Address,
    pub relayer_fee: u64,
}

/// Amounts leaving the vault on success
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payout {
    pub recipient_amount: u64,
    pub relayer_fee: u64,
}

/// The pool-side facts a claim is checked against
pub trait ClaimPolicy {
    fn pool_key(&self) -> Address;
    fn max_relayer_fee_bps(&self) -> u16;
    fn is_known_root(&self, root: &Hash32) -> bool;
}

/// In-memory pool paired with its address
pub struct PoolRef<'a> {
    pub key: Address,
    pub pool: &'a Pool,
}

impl ClaimPolicy for PoolRef<'_> {
    fn pool_key(&self) -> Address {
        self.key
    }

    fn max_relayer_fee_bps(&self) -> u16 {
        self.pool.config.max_relayer_fee_bps
    }

    fn is_known_root(&self, root: &Hash32) -> bool {
        self.pool.tree.is_known_root(root)
    }
}

/// Decide whether a claim may proceed and how much goes where.
///
/// `nullifier_spent` is whether a [`NullifierRecord`] already exists for
/// `(pool, request.nullifier)`.
pub fn authorize_claim<P, D>(
    policy: &P,
    deposit: &DepositRecord,
    buffer: &ProofBuffer<D>,
    nullifier_spent: bool,
    request: &ClaimRequest,
) -> Result<Payout, ProtocolError>
where
    P: ClaimPolicy + ?Sized,
    D: AsRef<[u8]>,
{
    if deposit.pool != policy.pool_key() {
        return Err(ProtocolError::DepositPoolMismatch);
    }
    if nullifier_spent || deposit.claimed {
        return Err(ProtocolError::AlreadyClaimed);
    }
    let inputs = buffer.public_inputs().ok_or(ProtocolError::ProofNotVerified)?;

    if inputs.nullifier != request.nullifier {
        return Err(ProtocolError::NullifierMismatch);
    }
    if inputs.commitment != deposit.commitment {
        return Err(ProtocolError::CommitmentMismatch);
    }
    if !policy.is_known_root(&inputs.merkle_root) {
        return Err(ProtocolError::UnknownMerkleRoot);
    }
    if inputs.recipient != request.recipient_token_account {
        return Err(ProtocolError::RecipientMismatch);
    }

    let max = (deposit.amount as u128 * policy.max_relayer_fee_bps() as u128
        / super::pool::BPS_DENOMINATOR) as u64;
    if request.relayer_fee > max {
        return Err(ProtocolError::FeeTooHigh {
            fee: request.relayer_fee,
            max,
        });
    }
    Ok(Payout {
        recipient_amount: deposit.amount - request.relayer_fee,
        relayer_fee: request.relayer_fee,
    })
}

/// Build the registry entry and mark the deposit claimed.
///
/// Only call after [`authorize_claim`] succeeded, in the same atomic step
/// as the transfers.
pub fn record_claim(deposit: &mut DepositRecord, request: &ClaimRequest) -> NullifierRecord {
    deposit.claimed = true;
    NullifierRecord {
        pool: deposit.pool,
        nullifier: request.nullifier,
        leaf_index: deposit.leaf_index,
        recipient: request.recipient_token_account,
    }
}
