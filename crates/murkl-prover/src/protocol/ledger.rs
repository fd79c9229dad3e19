//! In-memory ledger
//!
//! Executes encoded instructions against a set of accounts the same way the
//! on-chain programs do. Each instruction runs on a staged copy of the state
//! and is committed only if it succeeds, so a rejected instruction leaves
//! nothing behind.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::buffer::{account_size, BufferState, ProofBuffer};
use super::claim::{authorize_claim, record_claim, ClaimRequest, NullifierRecord, PoolRef};
use super::error::ProtocolError;
use super::instruction::MurklInstruction;
use super::pool::{DepositRecord, Pool, PoolConfig};
use crate::hash::Hash32;
use crate::proof::MAX_PROOF_SIZE;
use crate::types::{Address, PublicInputs};
use crate::verifier::Verifier;

/// Derive a program address from seeds
pub fn derive_address(seeds: &[&[u8]]) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(b"murkl_address_v1");
    for seed in seeds {
        hasher.update((seed.len() as u32).to_le_bytes());
        hasher.update(seed);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Address of the deposit record for `(pool, leaf_index)`
pub fn deposit_address(pool: &Address, leaf_index: u64) -> Address {
    derive_address(&[b"deposit", pool, &leaf_index.to_le_bytes()])
}

/// Address of the nullifier record for `(pool, nullifier)`
pub fn nullifier_address(pool: &Address, nullifier: &Hash32) -> Address {
    derive_address(&[b"nullifier", pool, nullifier])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TokenAccount {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
}

/// What a successful instruction did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    PoolInitialized {
        pool: Address,
        config: PoolConfig,
    },
    Deposited {
        pool: Address,
        deposit: Address,
        leaf_index: u64,
        amount: u64,
        merkle_root: Hash32,
    },
    PauseChanged {
        pool: Address,
        paused: bool,
    },
    BufferCreated {
        buffer: Address,
        expected_size: u32,
    },
    ChunkWritten {
        buffer: Address,
        bytes_written: u32,
        expected_size: u32,
    },
    BufferFinalized {
        buffer: Address,
        inputs: PublicInputs,
    },
    BufferClosed {
        buffer: Address,
    },
    Claimed {
        pool: Address,
        record: Address,
        recipient_amount: u64,
        relayer_fee: u64,
    },
}

#[derive(Clone, Debug, Default)]
struct LedgerState {
    pools: BTreeMap<Address, Pool>,
    deposits: BTreeMap<Address, DepositRecord>,
    buffers: BTreeMap<Address, Vec<u8>>,
    nullifiers: BTreeMap<Address, NullifierRecord>,
    tokens: BTreeMap<Address, TokenAccount>,
}

/// Serialised executor for the instruction set
#[derive(Debug, Default)]
pub struct Ledger {
    state: LedgerState,
    verifier: Verifier,
    slot: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed instructions
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Execute one instruction signed by `signer`.
    pub fn process(
        &mut self,
        signer: &Address,
        accounts: &[Address],
        data: &[u8],
    ) -> Result<Event, ProtocolError> {
        let ix = MurklInstruction::decode(data)?;
        let roles = ix.account_roles();
        if accounts.len() != roles.len() {
            return Err(ProtocolError::MissingAccounts {
                expected: roles.len(),
                got: accounts.len(),
            });
        }

        let mut staged = self.state.clone();
        match staged.apply(&self.verifier, signer, accounts, ix.clone()) {
            Ok(event) => {
                self.state = staged;
                self.slot += 1;
                info!(slot = self.slot, instruction = ix.name(), "instruction committed");
                Ok(event)
            }
            Err(e) => {
                warn!(instruction = ix.name(), error = %e, class = ?e.class(), "instruction rejected");
                Err(e)
            }
        }
    }

    pub fn create_token_account(
        &mut self,
        address: Address,
        mint: Address,
        owner: Address,
    ) -> Result<(), ProtocolError> {
        if self.state.tokens.contains_key(&address) {
            return Err(ProtocolError::AccountAlreadyExists("token account"));
        }
        self.state.tokens.insert(address, TokenAccount { mint, owner, amount: 0 });
        Ok(())
    }

    pub fn mint_to(&mut self, address: &Address, amount: u64) -> Result<(), ProtocolError> {
        let account = self
            .state
            .tokens
            .get_mut(address)
            .ok_or(ProtocolError::AccountNotFound("token account"))?;
        account.amount = account
            .amount
            .checked_add(amount)
            .ok_or(ProtocolError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn token_account(&self, address: &Address) -> Option<&TokenAccount> {
        self.state.tokens.get(address)
    }

    pub fn balance(&self, address: &Address) -> Option<u64> {
        self.token_account(address).map(|a| a.amount)
    }

    pub fn pool(&self, address: &Address) -> Option<&Pool> {
        self.state.pools.get(address)
    }

    pub fn deposit_record(&self, address: &Address) -> Option<&DepositRecord> {
        self.state.deposits.get(address)
    }

    pub fn nullifier_record(&self, pool: &Address, nullifier: &Hash32) -> Option<&NullifierRecord> {
        self.state.nullifiers.get(&nullifier_address(pool, nullifier))
    }

    pub fn nullifier_count(&self) -> usize {
        self.state.nullifiers.len()
    }

    /// Raw buffer account data
    pub fn buffer(&self, address: &Address) -> Option<ProofBuffer<&[u8]>> {
        let data = self.state.buffers.get(address)?;
        ProofBuffer::load(data.as_slice()).ok()
    }

    /// Lifecycle stage of a buffer as seen by `pool`, including `Consumed`
    /// once its nullifier has been claimed there
    pub fn buffer_state(&self, pool: &Address, address: &Address) -> Option<BufferState> {
        let buffer = self.buffer(address)?;
        let state = buffer.state();
        let consumed = buffer
            .public_inputs()
            .is_some_and(|inputs| self.nullifier_record(pool, &inputs.nullifier).is_some());
        Some(if consumed { BufferState::Consumed } else { state })
    }
}

fn require_signer(signer: &Address, account: &Address) -> Result<(), ProtocolError> {
    if signer != account {
        return Err(ProtocolError::Unauthorized);
    }
    Ok(())
}

impl LedgerState {
    fn apply(
        &mut self,
        verifier: &Verifier,
        signer: &Address,
        accounts: &[Address],
        ix: MurklInstruction,
    ) -> Result<Event, ProtocolError> {
        match ix {
            MurklInstruction::InitializePool {
                min_deposit,
                max_relayer_fee_bps,
            } => {
                let [pool, admin, mint, vault] = [accounts[0], accounts[1], accounts[2], accounts[3]];
                require_signer(signer, &admin)?;
                if self.pools.contains_key(&pool) {
                    return Err(ProtocolError::AccountAlreadyExists("pool"));
                }
                if self.tokens.contains_key(&vault) {
                    return Err(ProtocolError::AccountAlreadyExists("vault"));
                }
                let config = PoolConfig {
                    min_deposit,
                    max_relayer_fee_bps,
                };
                self.pools.insert(pool, Pool::new(admin, mint, vault, config)?);
                self.tokens.insert(
                    vault,
                    TokenAccount {
                        mint,
                        owner: pool,
                        amount: 0,
                    },
                );
                Ok(Event::PoolInitialized { pool, config })
            }

            MurklInstruction::Deposit { amount, commitment } => {
                let [pool_key, source, depositor] = [accounts[0], accounts[1], accounts[2]];
                require_signer(signer, &depositor)?;
                let pool = self.pools.get_mut(&pool_key).ok_or(ProtocolError::AccountNotFound("pool"))?;
                let record = pool.deposit(pool_key, amount, commitment)?;
                let (mint, vault, merkle_root) = (pool.mint, pool.vault, pool.merkle_root());

                let from = self.tokens.get(&source).ok_or(ProtocolError::AccountNotFound("depositor token account"))?;
                if from.owner != depositor {
                    return Err(ProtocolError::Unauthorized);
                }
                if from.mint != mint {
                    return Err(ProtocolError::InvalidAccount("depositor token account mint"));
                }
                self.transfer(&source, &vault, amount)?;

                let deposit = deposit_address(&pool_key, record.leaf_index);
                self.deposits.insert(deposit, record);
                Ok(Event::Deposited {
                    pool: pool_key,
                    deposit,
                    leaf_index: record.leaf_index,
                    amount,
                    merkle_root,
                })
            }

            MurklInstruction::SetPaused { paused } => {
                let [pool_key, admin] = [accounts[0], accounts[1]];
                require_signer(signer, &admin)?;
                let pool = self.pools.get_mut(&pool_key).ok_or(ProtocolError::AccountNotFound("pool"))?;
                pool.set_paused(&admin, paused)?;
                Ok(Event::PauseChanged { pool: pool_key, paused })
            }

            MurklInstruction::CreateProofBuffer { expected_size } => {
                let [buffer, owner] = [accounts[0], accounts[1]];
                require_signer(signer, &owner)?;
                if self.buffers.contains_key(&buffer) {
                    return Err(ProtocolError::BufferAlreadyInitialized);
                }
                let space = account_size(expected_size.min(MAX_PROOF_SIZE as u32));
                let data = ProofBuffer::initialize(vec![0u8; space], &owner, expected_size)?.into_inner();
                self.buffers.insert(buffer, data);
                Ok(Event::BufferCreated { buffer, expected_size })
            }

            MurklInstruction::WriteProofChunk { offset, data } => {
                let [buffer_key, owner] = [accounts[0], accounts[1]];
                require_signer(signer, &owner)?;
                let mut buffer = self.load_buffer_mut(&buffer_key)?;
                let bytes_written = buffer.write_chunk(&owner, offset, &data)?;
                Ok(Event::ChunkWritten {
                    buffer: buffer_key,
                    bytes_written,
                    expected_size: buffer.expected_size(),
                })
            }

            MurklInstruction::FinalizeProofBuffer {
                commitment,
                nullifier,
                merkle_root,
            } => {
                let [buffer_key, owner, recipient] = [accounts[0], accounts[1], accounts[2]];
                require_signer(signer, &owner)?;
                if !self.tokens.contains_key(&recipient) {
                    return Err(ProtocolError::AccountNotFound("recipient token account"));
                }
                let inputs = PublicInputs::new(commitment, nullifier, merkle_root, recipient);
                let mut buffer = self.load_buffer_mut(&buffer_key)?;
                buffer.finalize(&owner, &inputs, verifier)?;
                Ok(Event::BufferFinalized {
                    buffer: buffer_key,
                    inputs,
                })
            }

            MurklInstruction::CloseProofBuffer => {
                let [buffer_key, owner] = [accounts[0], accounts[1]];
                require_signer(signer, &owner)?;
                let data = self.buffers.get(&buffer_key).ok_or(ProtocolError::AccountNotFound("proof buffer"))?;
                if ProofBuffer::load(data.as_slice())?.owner() != owner {
                    return Err(ProtocolError::Unauthorized);
                }
                self.buffers.remove(&buffer_key);
                Ok(Event::BufferClosed { buffer: buffer_key })
            }

            MurklInstruction::Claim {
                relayer_fee,
                nullifier,
            } => {
                let [pool_key, deposit_key, buffer_key, recipient, relayer_account, relayer] =
                    [accounts[0], accounts[1], accounts[2], accounts[3], accounts[4], accounts[5]];
                require_signer(signer, &relayer)?;

                let pool = self.pools.get(&pool_key).ok_or(ProtocolError::AccountNotFound("pool"))?;
                let deposit = self
                    .deposits
                    .get(&deposit_key)
                    .copied()
                    .ok_or(ProtocolError::AccountNotFound("deposit"))?;
                let data = self.buffers.get(&buffer_key).ok_or(ProtocolError::AccountNotFound("proof buffer"))?;
                let buffer = ProofBuffer::load(data.as_slice())?;
                let record_key = nullifier_address(&pool_key, &nullifier);
                let request = ClaimRequest {
                    nullifier,
                    recipient_token_account: recipient,
                    relayer_fee,
                };
                let policy = PoolRef { key: pool_key, pool };
                let payout = authorize_claim(
                    &policy,
                    &deposit,
                    &buffer,
                    self.nullifiers.contains_key(&record_key),
                    &request,
                )?;

                let (mint, vault) = (pool.mint, pool.vault);
                for account in [&recipient, &relayer_account] {
                    let token = self.tokens.get(account).ok_or(ProtocolError::AccountNotFound("payout token account"))?;
                    if token.mint != mint {
                        return Err(ProtocolError::InvalidAccount("payout token account mint"));
                    }
                }
                self.transfer(&vault, &recipient, payout.recipient_amount)?;
                self.transfer(&vault, &relayer_account, payout.relayer_fee)?;

                let mut deposit = deposit;
                let record = record_claim(&mut deposit, &request);
                self.deposits.insert(deposit_key, deposit);
                self.nullifiers.insert(record_key, record);
                Ok(Event::Claimed {
                    pool: pool_key,
                    record: record_key,
                    recipient_amount: payout.recipient_amount,
                    relayer_fee: payout.relayer_fee,
                })
            }
        }
    }

    fn load_buffer_mut(&mut self, key: &Address) -> Result<ProofBuffer<&mut Vec<u8>>, ProtocolError> {
        let data = self.buffers.get_mut(key).ok_or(ProtocolError::AccountNotFound("proof buffer"))?;
        ProofBuffer::load(data)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), ProtocolError> {
        let source = self.tokens.get_mut(from).ok_or(ProtocolError::AccountNotFound("token account"))?;
        source.amount = source
            .amount
            .checked_sub(amount)
            .ok_or(ProtocolError::InsufficientFunds {
                needed: amount,
                available: source.amount,
            })?;
        let dest = self.tokens.get_mut(to).ok_or(ProtocolError::AccountNotFound("token account"))?;
        dest.amount = dest.amount.checked_add(amount).ok_or(ProtocolError::ArithmeticOverflow)?;
        Ok(())
    }
}
