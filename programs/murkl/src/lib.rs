//! Murkl - Anonymous Social Transfers on Solana
//!
//! Senders deposit tokens against a commitment; the recipient later claims
//! them through a relayer with a STARK proof verified by the
//! `stark-verifier` program. The claim reveals only a nullifier.
//!
//! The deposit tree and the claim rules are the SDK's
//! (`murkl_prover::accumulator`, `murkl_prover::protocol::claim`); this
//! program stores their state in accounts and moves the tokens.

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Token, TokenAccount, Transfer};
use murkl_prover::accumulator::{Accumulator, MERKLE_DEPTH, ROOT_HISTORY_SIZE};
use murkl_prover::protocol::claim::{authorize_claim, record_claim, ClaimPolicy, ClaimRequest};
use murkl_prover::protocol::{DepositRecord, PoolConfig, ProofBuffer, ProtocolError};

declare_id!("74P7nTytTESmeJTH46geZ93GLFq3yAojnvKDxJFFZa92");

#[program]
pub mod murkl {
    use super::*;

    /// Initialize a new Murkl pool for `(admin, token_mint)`
    pub fn initialize_pool(
        ctx: Context<InitializePool>,
        min_deposit: u64,
        max_relayer_fee_bps: u16,
    ) -> Result<()> {
        let config = PoolConfig {
            min_deposit,
            max_relayer_fee_bps,
        };
        config.validate().map_err(reject)?;

        let pool = &mut ctx.accounts.pool;
        pool.admin = ctx.accounts.admin.key();
        pool.token_mint = ctx.accounts.token_mint.key();
        pool.vault = ctx.accounts.vault.key();
        pool.min_deposit = min_deposit;
        pool.max_relayer_fee_bps = max_relayer_fee_bps;
        pool.paused = false;
        pool.bump = ctx.bumps.pool;
        pool.store_tree(&Accumulator::new());

        msg!("Murkl pool initialized");
        Ok(())
    }

    /// Deposit tokens against `commitment`
    pub fn deposit(ctx: Context<Deposit>, amount: u64, commitment: [u8; 32]) -> Result<()> {
        let pool = &mut ctx.accounts.pool;
        let mut state = pool.to_sdk();
        let pool_key = pool.key().to_bytes();
        let record = state.deposit(pool_key, amount, commitment).map_err(reject)?;
        pool.store_tree(&state.tree);

        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.to_account_info(),
                Transfer {
                    from: ctx.accounts.depositor_token_account.to_account_info(),
                    to: ctx.accounts.vault.to_account_info(),
                    authority: ctx.accounts.depositor.to_account_info(),
                },
            ),
            amount,
        )?;

        let deposit = &mut ctx.accounts.deposit_account;
        deposit.pool = pool.key();
        deposit.commitment = commitment;
        deposit.amount = amount;
        deposit.leaf_index = record.leaf_index;
        deposit.claimed = false;

        emit!(DepositEvent {
            pool: pool.key(),
            commitment,
            amount,
            leaf_index: record.leaf_index,
            merkle_root: pool.merkle_root,
        });
        Ok(())
    }

    pub fn set_paused(ctx: Context<SetPaused>, paused: bool) -> Result<()> {
        let pool = &mut ctx.accounts.pool;
        let mut state = pool.to_sdk();
        state
            .set_paused(&ctx.accounts.admin.key().to_bytes(), paused)
            .map_err(reject)?;
        pool.paused = state.paused;
        msg!("Pool paused: {}", paused);
        Ok(())
    }

    /// Pay out a deposit against a verified proof buffer.
    ///
    /// Relayer signs and pays fees; the recipient never signs.
    pub fn claim(ctx: Context<Claim>, relayer_fee: u64, nullifier: [u8; 32]) -> Result<()> {
        let pool = &ctx.accounts.pool;
        let request = ClaimRequest {
            nullifier,
            recipient_token_account: ctx.accounts.recipient_token_account.key().to_bytes(),
            relayer_fee,
        };
        let mut deposit = ctx.accounts.deposit_account.to_sdk();

        let payout = {
            let data = ctx.accounts.proof_buffer.try_borrow_data()?;
            let buffer = ProofBuffer::load(&**data).map_err(reject)?;
            let policy = PoolPolicy {
                key: pool.key(),
                pool,
            };
            authorize_claim(
                &policy,
                &deposit,
                &buffer,
                ctx.accounts.nullifier_account.used,
                &request,
            )
            .map_err(reject)?
        };

        let record = record_claim(&mut deposit, &request);
        let nullifier_account = &mut ctx.accounts.nullifier_account;
        nullifier_account.pool = pool.key();
        nullifier_account.nullifier = record.nullifier;
        nullifier_account.leaf_index = record.leaf_index;
        nullifier_account.recipient = ctx.accounts.recipient_token_account.key();
        nullifier_account.used = true;
        nullifier_account.claimed_at = Clock::get()?.unix_timestamp;
        ctx.accounts.deposit_account.claimed = deposit.claimed;

        let admin = pool.admin;
        let mint = pool.token_mint;
        let signer_seeds: &[&[u8]] = &[b"pool", admin.as_ref(), mint.as_ref(), &[pool.bump]];

        token::transfer(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.to_account_info(),
                Transfer {
                    from: ctx.accounts.vault.to_account_info(),
                    to: ctx.accounts.recipient_token_account.to_account_info(),
                    authority: pool.to_account_info(),
                },
                &[signer_seeds],
            ),
            payout.recipient_amount,
        )?;

        if payout.relayer_fee > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.to_account_info(),
                    Transfer {
                        from: ctx.accounts.vault.to_account_info(),
                        to: ctx.accounts.relayer_token_account.to_account_info(),
                        authority: pool.to_account_info(),
                    },
                    &[signer_seeds],
                ),
                payout.relayer_fee,
            )?;
        }

        emit!(ClaimEvent {
            pool: pool.key(),
            nullifier,
            recipient: ctx.accounts.recipient_token_account.key(),
            amount: payout.recipient_amount,
            relayer: ctx.accounts.relayer.key(),
            relayer_fee: payout.relayer_fee,
        });

        msg!(
            "STARK verified! {} tokens to recipient, {} fee to relayer",
            payout.recipient_amount,
            payout.relayer_fee
        );
        Ok(())
    }
}

fn reject(e: ProtocolError) -> Error {
    msg!("Rejected: {}", e);
    let code = match e {
        ProtocolError::ProofNotVerified => MurklError::ProofNotVerified,
        ProtocolError::AlreadyClaimed => MurklError::AlreadyClaimed,
        ProtocolError::RecipientMismatch => MurklError::RecipientMismatch,
        ProtocolError::FeeTooHigh { .. } => MurklError::FeeTooHigh,
        ProtocolError::NullifierMismatch => MurklError::NullifierMismatch,
        ProtocolError::CommitmentMismatch => MurklError::CommitmentMismatch,
        ProtocolError::UnknownMerkleRoot => MurklError::UnknownMerkleRoot,
        ProtocolError::DepositPoolMismatch => MurklError::DepositPoolMismatch,
        ProtocolError::DepositTooSmall { .. } => MurklError::DepositTooSmall,
        ProtocolError::PoolPaused => MurklError::PoolPaused,
        ProtocolError::InvalidConfig(_) => MurklError::InvalidConfig,
        ProtocolError::Accumulator(_) => MurklError::TreeFull,
        ProtocolError::Unauthorized => MurklError::Unauthorized,
        _ => MurklError::InvalidProofBuffer,
    };
    code.into()
}

// ============================================================================
// Accounts
// ============================================================================

#[account]
pub struct Pool {
    pub admin: Pubkey,
    pub token_mint: Pubkey,
    pub vault: Pubkey,
    pub min_deposit: u64,
    pub max_relayer_fee_bps: u16,
    pub paused: bool,
    pub bump: u8,
    pub merkle_root: [u8; 32],
    pub leaf_count: u64,
    pub frontier: [[u8; 32]; MERKLE_DEPTH],
    pub root_history: [[u8; 32]; ROOT_HISTORY_SIZE],
    pub history_cursor: u32,
}

impl Pool {
    pub const SPACE: usize =
        8 + 32 * 3 + 8 + 2 + 1 + 1 + 32 + 8 + 32 * MERKLE_DEPTH + 32 * ROOT_HISTORY_SIZE + 4;

    fn tree(&self) -> Accumulator {
        Accumulator {
            root: self.merkle_root,
            leaf_count: self.leaf_count,
            frontier: self.frontier,
            root_history: self.root_history,
            history_cursor: self.history_cursor,
        }
    }

    fn store_tree(&mut self, tree: &Accumulator) {
        self.merkle_root = tree.root;
        self.leaf_count = tree.leaf_count;
        self.frontier = tree.frontier;
        self.root_history = tree.root_history;
        self.history_cursor = tree.history_cursor;
    }

    fn to_sdk(&self) -> murkl_prover::protocol::Pool {
        murkl_prover::protocol::Pool {
            admin: self.admin.to_bytes(),
            mint: self.token_mint.to_bytes(),
            vault: self.vault.to_bytes(),
            config: PoolConfig {
                min_deposit: self.min_deposit,
                max_relayer_fee_bps: self.max_relayer_fee_bps,
            },
            paused: self.paused,
            tree: self.tree(),
        }
    }
}

/// A pool account together with its address
struct PoolPolicy<'a> {
    key: Pubkey,
    pool: &'a Pool,
}

impl ClaimPolicy for PoolPolicy<'_> {
    fn pool_key(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    fn max_relayer_fee_bps(&self) -> u16 {
        self.pool.max_relayer_fee_bps
    }

    fn is_known_root(&self, root: &[u8; 32]) -> bool {
        self.pool.tree().is_known_root(root)
    }
}

#[account]
pub struct DepositAccount {
    pub pool: Pubkey,
    pub commitment: [u8; 32],
    pub amount: u64,
    pub leaf_index: u64,
    pub claimed: bool,
}

impl DepositAccount {
    pub const SPACE: usize = 8 + 32 + 32 + 8 + 8 + 1;

    fn to_sdk(&self) -> DepositRecord {
        DepositRecord {
            pool: self.pool.to_bytes(),
            leaf_index: self.leaf_index,
            amount: self.amount,
            commitment: self.commitment,
            claimed: self.claimed,
        }
    }
}

#[account]
pub struct NullifierAccount {
    pub pool: Pubkey,
    pub nullifier: [u8; 32],
    pub leaf_index: u64,
    pub recipient: Pubkey,
    pub used: bool,
    pub claimed_at: i64,
}

impl NullifierAccount {
    pub const SPACE: usize = 8 + 32 + 32 + 8 + 32 + 1 + 8;
}

// ============================================================================
// Contexts
// ============================================================================

#[derive(Accounts)]
pub struct InitializePool<'info> {
    #[account(
        init,
        payer = admin,
        space = Pool::SPACE,
        seeds = [b"pool", admin.key().as_ref(), token_mint.key().as_ref()],
        bump
    )]
    pub pool: Box<Account<'info, Pool>>,

    #[account(mut)]
    pub admin: Signer<'info>,

    /// CHECK: Token mint, checked by the vault's token constraint
    pub token_mint: AccountInfo<'info>,

    #[account(
        init,
        payer = admin,
        token::mint = token_mint,
        token::authority = pool,
        seeds = [b"vault", pool.key().as_ref()],
        bump
    )]
    pub vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
    pub rent: Sysvar<'info, Rent>,
}

#[derive(Accounts)]
pub struct Deposit<'info> {
    #[account(mut)]
    pub pool: Box<Account<'info, Pool>>,

    #[account(
        init,
        payer = depositor,
        space = DepositAccount::SPACE,
        seeds = [b"deposit", pool.key().as_ref(), &pool.leaf_count.to_le_bytes()],
        bump
    )]
    pub deposit_account: Account<'info, DepositAccount>,

    #[account(mut, address = pool.vault)]
    pub vault: Account<'info, TokenAccount>,

    #[account(mut, token::mint = pool.token_mint)]
    pub depositor_token_account: Account<'info, TokenAccount>,

    #[account(mut)]
    pub depositor: Signer<'info>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct SetPaused<'info> {
    #[account(mut)]
    pub pool: Box<Account<'info, Pool>>,

    pub admin: Signer<'info>,
}

#[derive(Accounts)]
#[instruction(relayer_fee: u64, nullifier: [u8; 32])]
pub struct Claim<'info> {
    pub pool: Box<Account<'info, Pool>>,

    #[account(mut)]
    pub deposit_account: Account<'info, DepositAccount>,

    /// CHECK: Proof buffer, layout checked by `ProofBuffer`
    #[account(owner = stark_verifier::ID @ MurklError::InvalidProofBuffer)]
    pub proof_buffer: AccountInfo<'info>,

    #[account(
        init_if_needed,
        payer = relayer,
        space = NullifierAccount::SPACE,
        seeds = [b"nullifier", pool.key().as_ref(), nullifier.as_ref()],
        bump
    )]
    pub nullifier_account: Account<'info, NullifierAccount>,

    #[account(mut, address = pool.vault)]
    pub vault: Account<'info, TokenAccount>,

    /// Recipient's token account - they don't need to sign!
    #[account(mut, token::mint = pool.token_mint)]
    pub recipient_token_account: Account<'info, TokenAccount>,

    /// Relayer's token account for fee (can be same as recipient if self-relay)
    #[account(mut, token::mint = pool.token_mint)]
    pub relayer_token_account: Account<'info, TokenAccount>,

    #[account(mut)]
    pub relayer: Signer<'info>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

// ============================================================================
// Events & Errors
// ============================================================================

#[event]
pub struct DepositEvent {
    pub pool: Pubkey,
    pub commitment: [u8; 32],
    pub amount: u64,
    pub leaf_index: u64,
    pub merkle_root: [u8; 32],
}

#[event]
pub struct ClaimEvent {
    pub pool: Pubkey,
    pub nullifier: [u8; 32],
    pub recipient: Pubkey,
    pub amount: u64,
    pub relayer: Pubkey,
    pub relayer_fee: u64,
}

#[error_code]
pub enum MurklError {
    #[msg("Proof buffer is not finalized")]
    ProofNotVerified,
    #[msg("Already claimed")]
    AlreadyClaimed,
    #[msg("Recipient does not match the verified proof")]
    RecipientMismatch,
    #[msg("Relayer fee too high")]
    FeeTooHigh,
    #[msg("Nullifier does not match the verified proof")]
    NullifierMismatch,
    #[msg("Commitment does not match the deposit")]
    CommitmentMismatch,
    #[msg("Merkle root is not a recent pool root")]
    UnknownMerkleRoot,
    #[msg("Deposit belongs to another pool")]
    DepositPoolMismatch,
    #[msg("Deposit below pool minimum")]
    DepositTooSmall,
    #[msg("Pool is paused")]
    PoolPaused,
    #[msg("Invalid pool configuration")]
    InvalidConfig,
    #[msg("Deposit tree is full")]
    TreeFull,
    #[msg("Unauthorized")]
    Unauthorized,
    #[msg("Invalid proof buffer account")]
    InvalidProofBuffer,
}
