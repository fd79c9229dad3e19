use crate::accumulator::AccumulatorError;
use crate::verifier::VerificationError;
use thiserror::Error;

/// Broad category of a rejected transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InputValidation,
    StatePrecondition,
    Authorization,
    Economic,
}

/// Every way an instruction can be rejected. A rejected instruction leaves
/// no state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid proof size {size} (must be 1..={max})")]
    InvalidSize { size: u32, max: u32 },
    #[error("invalid proof format: {0}")]
    InvalidProofFormat(String),
    #[error("proof rejected: {0}")]
    ProofRejected(VerificationError),
    #[error("chunk [{offset}, {offset}+{len}) exceeds expected size {expected}")]
    OffsetOutOfRange { offset: u32, len: usize, expected: u32 },
    #[error("upload incomplete: {written} of {expected} bytes written")]
    IncompleteUpload { written: u32, expected: u32 },
    #[error("proof buffer is not finalized")]
    ProofNotVerified,
    #[error("nullifier already claimed")]
    AlreadyClaimed,
    #[error("signer is not authorized for this account")]
    Unauthorized,
    #[error("recipient token account does not match the verified proof")]
    RecipientMismatch,
    #[error("deposit of {amount} below pool minimum {min}")]
    DepositTooSmall { amount: u64, min: u64 },
    #[error("relayer fee {fee} exceeds maximum {max}")]
    FeeTooHigh { fee: u64, max: u64 },
    #[error("pool is paused")]
    PoolPaused,

    #[error("proof buffer already finalized")]
    BufferFinalized,
    #[error("proof buffer account too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("proof buffer already initialized")]
    BufferAlreadyInitialized,
    #[error("verified nullifier does not match the claim")]
    NullifierMismatch,
    #[error("verified commitment does not match the deposit")]
    CommitmentMismatch,
    #[error("merkle root is not a recent root of this pool")]
    UnknownMerkleRoot,
    #[error("deposit belongs to a different pool")]
    DepositPoolMismatch,
    #[error("invalid pool config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Accumulator(#[from] AccumulatorError),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
    #[error("invalid account: {0}")]
    InvalidAccount(&'static str),
    #[error("account not found: {0}")]
    AccountNotFound(&'static str),
    #[error("account already exists: {0}")]
    AccountAlreadyExists(&'static str),
    #[error("invalid instruction data: {0}")]
    InvalidInstruction(String),
    #[error("expected {expected} accounts, got {got}")]
    MissingAccounts { expected: usize, got: usize },
}

impl ProtocolError {
    pub fn class(&self) -> ErrorClass {
        use ProtocolError::*;
        match self {
            InvalidSize { .. }
            | InvalidProofFormat(_)
            | ProofRejected(_)
            | OffsetOutOfRange { .. }
            | BufferTooSmall { .. }
            | NullifierMismatch
            | CommitmentMismatch
            | UnknownMerkleRoot
            | DepositPoolMismatch
            | InvalidConfig(_)
            | InvalidAccount(_)
            | InvalidInstruction(_)
            | MissingAccounts { .. } => ErrorClass::InputValidation,
            IncompleteUpload { .. }
            | ProofNotVerified
            | AlreadyClaimed
            | BufferFinalized
            | BufferAlreadyInitialized
            | Accumulator(_)
            | AccountNotFound(_)
            | AccountAlreadyExists(_) => ErrorClass::StatePrecondition,
            Unauthorized | RecipientMismatch => ErrorClass::Authorization,
            DepositTooSmall { .. }
            | FeeTooHigh { .. }
            | PoolPaused
            | InsufficientFunds { .. }
            | ArithmeticOverflow => ErrorClass::Economic,
        }
    }
}

impl From<VerificationError> for ProtocolError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::InvalidProofFormat(msg) => Self::InvalidProofFormat(msg),
            other => Self::ProofRejected(other),
        }
    }
}
