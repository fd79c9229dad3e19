//! Protocol state machines
//!
//! Pools, deposits, proof buffers and claims, plus an in-memory [`Ledger`]
//! that drives them through the binary instruction set.

pub mod buffer;
pub mod claim;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod pool;

pub use buffer::{account_size, BufferState, ProofBuffer};
pub use claim::{authorize_claim, record_claim, ClaimPolicy, ClaimRequest, NullifierRecord, Payout, PoolRef};
pub use error::{ErrorClass, ProtocolError};
pub use instruction::MurklInstruction;
pub use ledger::{deposit_address, derive_address, nullifier_address, Event, Ledger, TokenAccount};
pub use pool::{DepositRecord, Pool, PoolConfig, MAX_RELAYER_FEE_BPS};
