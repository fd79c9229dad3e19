//! Proof buffers and Circle STARK verification for Solana
//!
//! A proof is larger than one transaction, so the relayer uploads it into a
//! buffer account in chunks and then asks the program to verify it against
//! the claim's public inputs. A verified buffer records those inputs and
//! becomes read-only; the Murkl program reads them at claim time.
//!
//! The buffer layout and every check live in
//! `murkl_prover::protocol::buffer`, shared with the off-chain ledger.

use anchor_lang::prelude::*;
use murkl_prover::protocol::buffer::{account_size, ProofBuffer};
use murkl_prover::protocol::ProtocolError;
use murkl_prover::{PublicInputs, Verifier};

pub use murkl_prover::MAX_PROOF_SIZE;

declare_id!("StArKSLbAn43UCcujFMc5gKc8rY2BVfSbguMfyLTMtw");

/// Space the caller must allocate for a buffer of `expected_size` bytes
pub const fn buffer_space(expected_size: u32) -> usize {
    account_size(expected_size)
}

// ============================================================================
// Program
// ============================================================================

#[program]
pub mod stark_verifier {
    use super::*;

    /// Initialize a proof buffer.
    ///
    /// The account must be pre-created by the caller, owned by this program,
    /// with `buffer_space(expected_size)` bytes.
    pub fn create_proof_buffer(ctx: Context<CreateProofBuffer>, expected_size: u32) -> Result<()> {
        create(ctx, expected_size)
    }

    pub fn init_proof_buffer(ctx: Context<CreateProofBuffer>, expected_size: u32) -> Result<()> {
        create(ctx, expected_size)
    }

    pub fn write_proof_chunk(ctx: Context<WriteProofChunk>, offset: u32, data: Vec<u8>) -> Result<()> {
        write(ctx, offset, &data)
    }

    pub fn upload_chunk(ctx: Context<WriteProofChunk>, offset: u32, data: Vec<u8>) -> Result<()> {
        write(ctx, offset, &data)
    }

    /// Verify the uploaded proof and seal the buffer.
    ///
    /// The recipient binding is the `recipient_token_account` key, never an
    /// argument, so the proof is tied to the account that will be paid.
    pub fn finalize_proof_buffer(
        ctx: Context<FinalizeProofBuffer>,
        commitment: [u8; 32],
        nullifier: [u8; 32],
        merkle_root: [u8; 32],
    ) -> Result<()> {
        finalize(ctx, commitment, nullifier, merkle_root)
    }

    pub fn finalize_and_verify(
        ctx: Context<FinalizeProofBuffer>,
        commitment: [u8; 32],
        nullifier: [u8; 32],
        merkle_root: [u8; 32],
    ) -> Result<()> {
        finalize(ctx, commitment, nullifier, merkle_root)
    }

    /// Return the buffer's rent to its owner. Allowed in any state.
    pub fn close_proof_buffer(ctx: Context<CloseProofBuffer>) -> Result<()> {
        let buffer = &ctx.accounts.proof_buffer;
        {
            let data = buffer.try_borrow_data()?;
            let loaded = ProofBuffer::load(&**data).map_err(reject)?;
            require!(
                loaded.owner() == ctx.accounts.owner.key().to_bytes(),
                VerifierError::Unauthorized
            );
        }

        let owner = &ctx.accounts.owner;
        let refund = buffer.lamports();
        **owner.lamports.borrow_mut() = owner
            .lamports()
            .checked_add(refund)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        **buffer.lamports.borrow_mut() = 0;
        buffer.try_borrow_mut_data()?.fill(0);

        msg!("Proof buffer closed, {} lamports returned", refund);
        Ok(())
    }
}

fn create(ctx: Context<CreateProofBuffer>, expected_size: u32) -> Result<()> {
    let owner = ctx.accounts.owner.key().to_bytes();
    let mut data = ctx.accounts.proof_buffer.try_borrow_mut_data()?;
    ProofBuffer::initialize(&mut **data, &owner, expected_size).map_err(reject)?;
    msg!("Proof buffer initialized, expecting {} bytes", expected_size);
    Ok(())
}

fn write(ctx: Context<WriteProofChunk>, offset: u32, chunk: &[u8]) -> Result<()> {
    let owner = ctx.accounts.owner.key().to_bytes();
    let mut data = ctx.accounts.proof_buffer.try_borrow_mut_data()?;
    let mut buffer = ProofBuffer::load(&mut **data).map_err(reject)?;
    let written = buffer.write_chunk(&owner, offset, chunk).map_err(reject)?;
    msg!(
        "Uploaded {} bytes at offset {} ({}/{})",
        chunk.len(),
        offset,
        written,
        buffer.expected_size()
    );
    Ok(())
}

fn finalize(
    ctx: Context<FinalizeProofBuffer>,
    commitment: [u8; 32],
    nullifier: [u8; 32],
    merkle_root: [u8; 32],
) -> Result<()> {
    let owner = ctx.accounts.owner.key().to_bytes();
    let recipient = ctx.accounts.recipient_token_account.key().to_bytes();
    let inputs = PublicInputs::new(commitment, nullifier, merkle_root, recipient);

    let mut data = ctx.accounts.proof_buffer.try_borrow_mut_data()?;
    let mut buffer = ProofBuffer::load(&mut **data).map_err(reject)?;
    buffer.finalize(&owner, &inputs, &Verifier::new()).map_err(reject)?;

    msg!("STARK proof verified and finalized");
    Ok(())
}

fn reject(e: ProtocolError) -> Error {
    msg!("Rejected: {}", e);
    let code = match e {
        ProtocolError::InvalidSize { .. } => VerifierError::InvalidSize,
        ProtocolError::InvalidProofFormat(_) => VerifierError::InvalidProofFormat,
        ProtocolError::ProofRejected(_) => VerifierError::ProofRejected,
        ProtocolError::OffsetOutOfRange { .. } => VerifierError::OffsetOutOfRange,
        ProtocolError::IncompleteUpload { .. } => VerifierError::IncompleteUpload,
        ProtocolError::Unauthorized => VerifierError::Unauthorized,
        ProtocolError::BufferFinalized => VerifierError::BufferFinalized,
        ProtocolError::BufferTooSmall { .. } => VerifierError::BufferTooSmall,
        ProtocolError::BufferAlreadyInitialized => VerifierError::BufferAlreadyInitialized,
        _ => VerifierError::InvalidBufferAccount,
    };
    code.into()
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Accounts)]
pub struct CreateProofBuffer<'info> {
    /// CHECK: Raw buffer account, layout checked by `ProofBuffer`
    #[account(mut, owner = crate::ID)]
    pub proof_buffer: AccountInfo<'info>,

    pub owner: Signer<'info>,
}

#[derive(Accounts)]
pub struct WriteProofChunk<'info> {
    /// CHECK: Raw buffer account, layout checked by `ProofBuffer`
    #[account(mut, owner = crate::ID)]
    pub proof_buffer: AccountInfo<'info>,

    pub owner: Signer<'info>,
}

#[derive(Accounts)]
pub struct FinalizeProofBuffer<'info> {
    /// CHECK: Raw buffer account, layout checked by `ProofBuffer`
    #[account(mut, owner = crate::ID)]
    pub proof_buffer: AccountInfo<'info>,

    pub owner: Signer<'info>,

    /// CHECK: Only its key is used, as the recipient binding
    pub recipient_token_account: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct CloseProofBuffer<'info> {
    /// CHECK: Raw buffer account, layout checked by `ProofBuffer`
    #[account(mut, owner = crate::ID)]
    pub proof_buffer: AccountInfo<'info>,

    #[account(mut)]
    pub owner: Signer<'info>,
}

// ============================================================================
// Errors
// ============================================================================

#[error_code]
pub enum VerifierError {
    #[msg("Proof size must be between 1 and 16384 bytes")]
    InvalidSize,

    #[msg("Invalid proof format")]
    InvalidProofFormat,

    #[msg("STARK verification failed")]
    ProofRejected,

    #[msg("Chunk extends past the expected proof size")]
    OffsetOutOfRange,

    #[msg("Not every proof byte has been uploaded")]
    IncompleteUpload,

    #[msg("Unauthorized")]
    Unauthorized,

    #[msg("Buffer already finalized")]
    BufferFinalized,

    #[msg("Buffer too small")]
    BufferTooSmall,

    #[msg("Buffer already initialized")]
    BufferAlreadyInitialized,

    #[msg("Account is not a proof buffer")]
    InvalidBufferAccount,
}
