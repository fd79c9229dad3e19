//! Murkl CLI
//!
//! Sender side: `commit` a deposit. Recipient side: `prove` a claim against
//! the pool's deposit set, check it with `verify`, and plan the chunked
//! upload with `chunks`. `simulate` runs a whole transfer on the in-memory
//! ledger.

mod types;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use murkl_prover::accumulator::{verify_inclusion, DepositTree};
use murkl_prover::protocol::{account_size, BufferState, Event, Ledger, MurklInstruction};
use murkl_prover::{Address, Hash32, Prover, Secret, Verifier, Witness, MAX_PROOF_SIZE};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::types::{format_hash, parse_hash, CommitmentRecord, DepositSet, ProofBundle};

/// Largest chunk that fits one transaction next to the instruction header
const DEFAULT_CHUNK_SIZE: usize = 900;

#[derive(Parser)]
#[command(name = "murkl")]
#[command(about = "🐈‍⬛ Murkl - Anonymous social transfers")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a deposit commitment (sender side)
    Commit {
        /// Social identifier (e.g., "@alice" or "alice@email.com")
        #[arg(short, long, env = "MURKL_IDENTIFIER")]
        identifier: String,

        /// Password shared with the recipient
        #[arg(short, long, env = "MURKL_PASSWORD")]
        password: String,

        /// Output file for the commitment record
        #[arg(short, long, default_value = "deposit.json")]
        output: PathBuf,

        /// Also append the commitment to this deposit set
        #[arg(short, long)]
        deposits: Option<PathBuf>,
    },

    /// Print the values derived from identifier + password
    Hash {
        #[arg(short, long, env = "MURKL_IDENTIFIER")]
        identifier: String,

        #[arg(short, long, env = "MURKL_PASSWORD")]
        password: String,

        /// Leaf index to derive the nullifier for
        #[arg(short, long, default_value_t = 0)]
        leaf_index: u32,
    },

    /// Generate a claim proof (recipient side)
    Prove {
        #[arg(short, long, env = "MURKL_IDENTIFIER")]
        identifier: String,

        #[arg(short, long, env = "MURKL_PASSWORD")]
        password: String,

        /// Deposit set of the pool
        #[arg(short, long, default_value = "deposits.json")]
        deposits: PathBuf,

        /// Leaf index of the deposit; found by commitment when omitted
        #[arg(short, long)]
        leaf_index: Option<u64>,

        /// Token account the claim pays out to (32-byte hex)
        #[arg(short, long, env = "MURKL_RECIPIENT")]
        recipient: String,

        /// Output file for the raw proof; the bundle goes next to it as .json
        #[arg(short, long, default_value = "proof.bin")]
        output: PathBuf,
    },

    /// Verify a proof bundle locally
    Verify {
        /// Proof bundle written by `prove`
        #[arg(short, long, default_value = "proof.json")]
        bundle: PathBuf,

        /// Check this raw proof file instead of the bundle's proof
        #[arg(long)]
        proof: Option<PathBuf>,
    },

    /// Show info about a commitment record, deposit set or proof bundle
    Info {
        #[arg(short, long, default_value = "deposit.json")]
        input: PathBuf,
    },

    /// Print the upload plan for a proof file
    Chunks {
        #[arg(short, long, default_value = "proof.bin")]
        proof: PathBuf,

        #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Run deposit, upload, finalize and claim on an in-memory ledger
    Simulate {
        #[arg(short, long, default_value = "@alice")]
        identifier: String,

        #[arg(short, long, default_value = "hunter2")]
        password: String,

        #[arg(short, long, default_value_t = 1_000_000)]
        amount: u64,

        /// Relayer fee, taken out of the deposit
        #[arg(short, long, default_value_t = 5_000)]
        fee: u64,

        #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Commit { identifier, password, output, deposits } => {
            cmd_commit(&identifier, &password, &output, deposits.as_deref())
        }
        Commands::Hash { identifier, password, leaf_index } => {
            cmd_hash(&identifier, &password, leaf_index);
            Ok(())
        }
        Commands::Prove { identifier, password, deposits, leaf_index, recipient, output } => {
            cmd_prove(&identifier, &password, &deposits, leaf_index, &recipient, &output)
        }
        Commands::Verify { bundle, proof } => cmd_verify(&bundle, proof.as_deref()),
        Commands::Info { input } => cmd_info(&input),
        Commands::Chunks { proof, chunk_size } => cmd_chunks(&proof, chunk_size),
        Commands::Simulate { identifier, password, amount, fee, chunk_size } => {
            cmd_simulate(&identifier, &password, amount, fee, chunk_size)
        }
    };

    if let Err(e) = result {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn short(hash: &Hash32) -> String {
    format!("0x{}", hex::encode(&hash[..8]))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn cmd_commit(identifier: &str, password: &str, output: &Path, deposits: Option<&Path>) -> Result<()> {
    println!("🐈‍⬛ Murkl - Generating commitment\n");

    let secret = Secret::from_credentials(identifier, password);
    let commitment = secret.commitment();
    println!("   Identifier: {}", identifier);
    println!("   ID hash (M31): {}", secret.id_hash);
    println!("   Password: {}", "*".repeat(password.len()));
    println!("   Commitment: {}", format_hash(&commitment));

    let record = CommitmentRecord {
        identifier: identifier.to_string(),
        identifier_hash: secret.id_hash.into(),
        commitment: format_hash(&commitment),
    };
    write_json(output, &record)?;
    println!("\n✅ Commitment saved to {:?}", output);

    if let Some(path) = deposits {
        let mut set: DepositSet = if path.exists() { read_json(path)? } else { DepositSet::default() };
        let leaf_index = set.leaves.len();
        set.leaves.push(format_hash(&commitment));
        let tree = DepositTree::from_leaves(set.commitments()?)?;
        set.root = Some(format_hash(&tree.root()));
        write_json(path, &set)?;
        println!("✅ Appended as leaf {} of {:?}", leaf_index, path);
    }

    println!("\n📋 NEXT STEPS:");
    println!("   1. Use the commitment in a deposit transaction");
    println!("   2. Share the password with the recipient out of band");
    println!("   3. Recipient claims with: murkl prove -i {} -p <password> -r <token account>", identifier);
    Ok(())
}

fn cmd_hash(identifier: &str, password: &str, leaf_index: u32) {
    println!("🐈‍⬛ Murkl - Compute Hash\n");

    let secret = Secret::from_credentials(identifier, password);
    println!("   Identifier: {}", identifier);
    println!("   ID hash: {}", secret.id_hash);
    println!("   Secret (from password): {}", secret.secret);
    println!("   Commitment: {}", format_hash(&secret.commitment()));
    println!("   Nullifier (leaf {}): {}", leaf_index, format_hash(&secret.nullifier(leaf_index)));
}

fn cmd_prove(
    identifier: &str,
    password: &str,
    deposits: &Path,
    leaf_index: Option<u64>,
    recipient: &str,
    output: &Path,
) -> Result<()> {
    println!("🐈‍⬛ Murkl - Generating STARK proof\n");

    let secret = Secret::from_credentials(identifier, password);
    let commitment = secret.commitment();
    let recipient = parse_hash(recipient).context("recipient")?;

    let set: DepositSet = read_json(deposits)?;
    let found = set.find_leaf(&commitment)?;
    let leaf_index = match (leaf_index, found) {
        (Some(given), Some(found)) if given != found => {
            bail!("commitment is at leaf {found}, not {given}")
        }
        (Some(given), _) => given,
        (None, Some(found)) => found,
        (None, None) => bail!("commitment {} is not in {}", short(&commitment), deposits.display()),
    };
    let leaf = u32::try_from(leaf_index).context("leaf index does not fit in u32")?;

    let tree = DepositTree::from_leaves(set.commitments()?)?;
    let root = tree.root();
    if let Some(recorded) = &set.root {
        if parse_hash(recorded)? != root {
            bail!("deposit set root does not match its leaves");
        }
    }
    let path = tree.path(leaf_index)?;
    if !verify_inclusion(&commitment, &path, &root) {
        bail!("leaf {leaf_index} does not hold this commitment");
    }
    debug!(leaf_index, root = %hex::encode(root), "deposit located");

    println!("   Identifier: {}", identifier);
    println!("   Commitment: {}", short(&commitment));
    println!("   Leaf index: {}", leaf_index);
    println!("   Merkle root: {}", short(&root));

    let witness = Witness::new(secret, leaf, [0; 32]);
    let inputs = witness.public_inputs(root, recipient);
    println!("   Nullifier: {}", short(&inputs.nullifier));

    println!("\n   Generating STARK proof...");
    let proof = Prover::new().prove(&witness, &inputs)?;
    let bytes = proof.to_bytes();
    info!(size = bytes.len(), "proof generated");

    let bundle_path = output.with_extension("json");
    fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    write_json(&bundle_path, &ProofBundle::new(&bytes, &inputs, leaf_index))?;

    println!("   Proof size: {} bytes", bytes.len());
    println!("\n✅ Proof saved to {:?}", output);
    println!("✅ Proof bundle saved to {:?}", bundle_path);
    println!("\n📋 NEXT STEP: hand the bundle to a relayer");
    Ok(())
}

fn cmd_verify(bundle_path: &Path, proof_path: Option<&Path>) -> Result<()> {
    println!("🐈‍⬛ Murkl - Verifying proof\n");

    let bundle: ProofBundle = read_json(bundle_path)?;
    let inputs = bundle.public_inputs()?;
    let bytes = match proof_path {
        Some(path) => fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => bundle.proof_bytes()?,
    };

    println!("   Commitment: {}", short(&inputs.commitment));
    println!("   Nullifier: {}", short(&inputs.nullifier));
    println!("   Merkle root: {}", short(&inputs.merkle_root));
    println!("   Recipient: {}", short(&inputs.recipient));
    println!("   Proof size: {} bytes\n", bytes.len());

    Verifier::new()
        .verify_bytes(&bytes, &inputs)
        .context("proof is INVALID")?;
    println!("✅ Proof is VALID!");
    Ok(())
}

fn cmd_info(input: &Path) -> Result<()> {
    println!("🐈‍⬛ Murkl - File Info\n");

    let json = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;

    if let Ok(bundle) = serde_json::from_str::<ProofBundle>(&json) {
        println!("   Proof bundle");
        println!("   Commitment: {}", bundle.commitment);
        println!("   Nullifier: {}", bundle.nullifier);
        println!("   Merkle root: {}", bundle.merkle_root);
        println!("   Recipient: {}", bundle.recipient);
        println!("   Leaf index: {}", bundle.leaf_index);
        println!("   Proof size: {} bytes", bundle.proof_bytes()?.len());
        return Ok(());
    }

    if let Ok(record) = serde_json::from_str::<CommitmentRecord>(&json) {
        println!("   Commitment record");
        println!("   Identifier: {}", record.identifier);
        println!("   ID hash: {}", record.identifier_hash);
        println!("   Commitment: {}", record.commitment);
        return Ok(());
    }

    if let Ok(set) = serde_json::from_str::<DepositSet>(&json) {
        let tree = DepositTree::from_leaves(set.commitments()?)?;
        println!("   Deposit set");
        println!("   Leaves: {}", tree.len());
        println!("   Merkle root: {}", format_hash(&tree.root()));
        return Ok(());
    }

    bail!("unknown file format")
}

fn cmd_chunks(proof: &Path, chunk_size: usize) -> Result<()> {
    println!("🐈‍⬛ Murkl - Upload plan\n");

    if chunk_size == 0 {
        bail!("chunk size must be positive");
    }
    let bytes = fs::read(proof).with_context(|| format!("reading {}", proof.display()))?;
    if bytes.is_empty() || bytes.len() > MAX_PROOF_SIZE {
        bail!("proof is {} bytes, must be 1..={}", bytes.len(), MAX_PROOF_SIZE);
    }
    let expected = bytes.len() as u32;

    println!("   Proof size: {} bytes", bytes.len());
    println!("   Buffer account size: {} bytes", account_size(expected));
    println!("   1. create_proof_buffer(expected_size = {})", expected);
    for (i, chunk) in bytes.chunks(chunk_size).enumerate() {
        println!("   {}. write_proof_chunk(offset = {}, len = {})", i + 2, i * chunk_size, chunk.len());
    }
    let n = bytes.len().div_ceil(chunk_size);
    println!("   {}. finalize_proof_buffer(commitment, nullifier, merkle_root)", n + 2);
    println!("   {}. claim(relayer_fee, nullifier)", n + 3);
    println!("\n   {} transactions", n + 3);
    Ok(())
}

fn cmd_simulate(identifier: &str, password: &str, amount: u64, fee: u64, chunk_size: usize) -> Result<()> {
    println!("🐈‍⬛ Murkl - Simulated transfer\n");

    if chunk_size == 0 {
        bail!("chunk size must be positive");
    }

    let admin: Address = [0xa0; 32];
    let pool: Address = [0xa1; 32];
    let mint: Address = [0xa2; 32];
    let vault: Address = [0xa3; 32];
    let sender: Address = [0xb0; 32];
    let sender_tokens: Address = [0xb1; 32];
    let recipient: Address = [0xc0; 32];
    let recipient_tokens: Address = [0xc1; 32];
    let relayer: Address = [0xd0; 32];
    let relayer_tokens: Address = [0xd1; 32];
    let buffer: Address = [0xe0; 32];

    let mut ledger = Ledger::new();
    let init = MurklInstruction::InitializePool {
        min_deposit: 1,
        max_relayer_fee_bps: 100,
    };
    ledger.process(&admin, &[pool, admin, mint, vault], &init.encode())?;
    ledger.create_token_account(sender_tokens, mint, sender)?;
    ledger.mint_to(&sender_tokens, amount)?;
    ledger.create_token_account(recipient_tokens, mint, recipient)?;
    ledger.create_token_account(relayer_tokens, mint, relayer)?;

    // Sender
    let secret = Secret::from_credentials(identifier, password);
    let deposit = MurklInstruction::Deposit {
        amount,
        commitment: secret.commitment(),
    };
    let (deposit_key, leaf_index, root) =
        match ledger.process(&sender, &[pool, sender_tokens, sender], &deposit.encode())? {
            Event::Deposited { deposit, leaf_index, merkle_root, .. } => (deposit, leaf_index, merkle_root),
            other => bail!("unexpected event {other:?}"),
        };
    println!("   Deposited {} at leaf {}, root {}", amount, leaf_index, short(&root));

    // Recipient
    let leaf = u32::try_from(leaf_index)?;
    let witness = Witness::new(secret, leaf, [0; 32]);
    let inputs = witness.public_inputs(root, recipient_tokens);
    let bytes = Prover::new().prove(&witness, &inputs)?.to_bytes();
    println!("   Proved claim, {} byte proof", bytes.len());

    // Relayer
    let create = MurklInstruction::CreateProofBuffer {
        expected_size: bytes.len() as u32,
    };
    ledger.process(&relayer, &[buffer, relayer], &create.encode())?;
    for (i, chunk) in bytes.chunks(chunk_size).enumerate() {
        let write = MurklInstruction::WriteProofChunk {
            offset: (i * chunk_size) as u32,
            data: chunk.to_vec(),
        };
        ledger.process(&relayer, &[buffer, relayer], &write.encode())?;
    }
    println!("   Uploaded in {} chunks", bytes.len().div_ceil(chunk_size));

    let finalize = MurklInstruction::FinalizeProofBuffer {
        commitment: inputs.commitment,
        nullifier: inputs.nullifier,
        merkle_root: inputs.merkle_root,
    };
    ledger.process(&relayer, &[buffer, relayer, recipient_tokens], &finalize.encode())?;
    println!("   Proof verified, buffer finalized");

    let claim = MurklInstruction::Claim {
        relayer_fee: fee,
        nullifier: inputs.nullifier,
    };
    ledger.process(
        &relayer,
        &[pool, deposit_key, buffer, recipient_tokens, relayer_tokens, relayer],
        &claim.encode(),
    )?;

    if ledger.buffer_state(&pool, &buffer) != Some(BufferState::Consumed) {
        bail!("buffer was not consumed by the claim");
    }
    println!("\n✅ Claimed");
    println!("   Recipient balance: {}", ledger.balance(&recipient_tokens).unwrap_or(0));
    println!("   Relayer balance: {}", ledger.balance(&relayer_tokens).unwrap_or(0));
    println!("   Vault balance: {}", ledger.balance(&vault).unwrap_or(0));
    Ok(())
}
