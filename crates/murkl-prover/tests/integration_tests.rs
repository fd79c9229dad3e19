//! End-to-end tests: deposit, chunked upload, verification and claim on the
//! in-memory ledger

use std::sync::OnceLock;

use murkl_prover::prelude::*;
use murkl_prover::proof::{FriLayerProof, Proof, QueryDecommitment};
use murkl_prover::protocol::{BufferState, Event};
use proptest::prelude::*;

const ADMIN: Address = [0xa0; 32];
const POOL: Address = [0xa1; 32];
const MINT: Address = [0xa2; 32];
const VAULT: Address = [0xa3; 32];
const SENDER: Address = [0xb0; 32];
const SENDER_TOKENS: Address = [0xb1; 32];
const RECIPIENT: Address = [0xc0; 32];
const RECIPIENT_A: Address = [0xc1; 32];
const RECIPIENT_B: Address = [0xc2; 32];
const RELAYER: Address = [0xd0; 32];
const RELAYER_TOKENS: Address = [0xd1; 32];
const BUFFER: Address = [0xe0; 32];
const SECOND_BUFFER: Address = [0xe1; 32];
const OTHER_POOL: Address = [0xf1; 32];
const OTHER_VAULT: Address = [0xf3; 32];

const AMOUNT: u64 = 10_000_000;
const CHUNK: usize = 900;

struct Deposited {
    ledger: Ledger,
    secret: Secret,
    deposit: Address,
    leaf_index: u64,
    root: Hash32,
}

fn ledger_with_pool() -> Ledger {
    let mut ledger = Ledger::new();
    let init = MurklInstruction::InitializePool {
        min_deposit: 1_000,
        max_relayer_fee_bps: 100,
    };
    ledger.process(&ADMIN, &[POOL, ADMIN, MINT, VAULT], &init.encode()).unwrap();
    ledger.create_token_account(SENDER_TOKENS, MINT, SENDER).unwrap();
    ledger.mint_to(&SENDER_TOKENS, 100 * AMOUNT).unwrap();
    for (account, owner) in [(RECIPIENT_A, RECIPIENT), (RECIPIENT_B, RECIPIENT), (RELAYER_TOKENS, RELAYER)] {
        ledger.create_token_account(account, MINT, owner).unwrap();
    }
    ledger
}

fn deposit(ledger: &mut Ledger, commitment: Hash32) -> (Address, u64, Hash32) {
    let ix = MurklInstruction::Deposit {
        amount: AMOUNT,
        commitment,
    };
    match ledger.process(&SENDER, &[POOL, SENDER_TOKENS, SENDER], &ix.encode()).unwrap() {
        Event::Deposited {
            deposit,
            leaf_index,
            merkle_root,
            ..
        } => (deposit, leaf_index, merkle_root),
        other => panic!("unexpected event {other:?}"),
    }
}

fn deposited() -> Deposited {
    let mut ledger = ledger_with_pool();
    // Unrelated deposits before and after the one being claimed
    deposit(&mut ledger, [1; 32]);
    let secret = Secret::from_credentials("@alice", "correct horse battery staple");
    let (deposit_key, leaf_index, root) = deposit(&mut ledger, secret.commitment());
    deposit(&mut ledger, [2; 32]);
    Deposited {
        ledger,
        secret,
        deposit: deposit_key,
        leaf_index,
        root,
    }
}

fn prove(secret: Secret, leaf_index: u64, root: Hash32, recipient: Address) -> (Vec<u8>, PublicInputs) {
    let witness = Witness::new(secret, leaf_index as u32, [0; 32]);
    let inputs = witness.public_inputs(root, recipient);
    let proof = Prover::new().prove(&witness, &inputs).unwrap();
    (proof.to_bytes(), inputs)
}

fn create_buffer_at(ledger: &mut Ledger, buffer: Address, expected_size: u32) -> Result<Event, ProtocolError> {
    let ix = MurklInstruction::CreateProofBuffer { expected_size };
    ledger.process(&RELAYER, &[buffer, RELAYER], &ix.encode())
}

fn create_buffer(ledger: &mut Ledger, expected_size: u32) -> Result<Event, ProtocolError> {
    create_buffer_at(ledger, BUFFER, expected_size)
}

fn write_at(ledger: &mut Ledger, buffer: Address, offset: usize, data: &[u8]) -> Result<Event, ProtocolError> {
    let ix = MurklInstruction::WriteProofChunk {
        offset: offset as u32,
        data: data.to_vec(),
    };
    ledger.process(&RELAYER, &[buffer, RELAYER], &ix.encode())
}

fn write(ledger: &mut Ledger, offset: usize, data: &[u8]) -> Result<Event, ProtocolError> {
    write_at(ledger, BUFFER, offset, data)
}

fn finalize_at(ledger: &mut Ledger, buffer: Address, inputs: &PublicInputs) -> Result<Event, ProtocolError> {
    let ix = MurklInstruction::FinalizeProofBuffer {
        commitment: inputs.commitment,
        nullifier: inputs.nullifier,
        merkle_root: inputs.merkle_root,
    };
    ledger.process(&RELAYER, &[buffer, RELAYER, inputs.recipient], &ix.encode())
}

fn finalize(ledger: &mut Ledger, inputs: &PublicInputs) -> Result<Event, ProtocolError> {
    finalize_at(ledger, BUFFER, inputs)
}

fn claim_from(
    ledger: &mut Ledger,
    buffer: Address,
    deposit: Address,
    nullifier: Hash32,
    recipient: Address,
    fee: u64,
) -> Result<Event, ProtocolError> {
    let ix = MurklInstruction::Claim {
        relayer_fee: fee,
        nullifier,
    };
    ledger.process(
        &RELAYER,
        &[POOL, deposit, buffer, recipient, RELAYER_TOKENS, RELAYER],
        &ix.encode(),
    )
}

fn claim(ledger: &mut Ledger, deposit: Address, nullifier: Hash32, recipient: Address, fee: u64) -> Result<Event, ProtocolError> {
    claim_from(ledger, BUFFER, deposit, nullifier, recipient, fee)
}

/// Upload `bytes` in 900-byte chunks, last chunk first
fn upload_to(ledger: &mut Ledger, buffer: Address, bytes: &[u8]) {
    let chunks: Vec<_> = bytes.chunks(CHUNK).enumerate().collect();
    for (i, chunk) in chunks.into_iter().rev() {
        write_at(ledger, buffer, i * CHUNK, chunk).unwrap();
    }
}

fn upload(ledger: &mut Ledger, bytes: &[u8]) {
    upload_to(ledger, BUFFER, bytes)
}

// === Scenario tests ===

#[test]
fn test_deposit_records_amount_and_commitment() {
    let mut ledger = ledger_with_pool();
    assert_eq!(ledger.pool(&POOL).map(|p| p.leaf_count()), Some(0));
    let (key, leaf_index, root) = deposit(&mut ledger, [0x42; 32]);

    let pool = ledger.pool(&POOL).unwrap();
    assert_eq!(pool.leaf_count(), 1);
    assert_eq!(pool.merkle_root(), root);
    assert_eq!(leaf_index, 0);
    let record = ledger.deposit_record(&key).unwrap();
    assert_eq!(record.amount, AMOUNT);
    assert_eq!(record.commitment, [0x42; 32]);
    assert!(!record.claimed);
    assert_eq!(ledger.balance(&VAULT), Some(AMOUNT));
}

#[test]
fn test_finalize_waits_for_every_chunk() {
    let mut ledger = ledger_with_pool();
    create_buffer(&mut ledger, 3800).unwrap();
    let junk: Vec<u8> = (0..3800u32).map(|i| (i % 251) as u8).collect();
    let inputs = PublicInputs::new([1; 32], [2; 32], [3; 32], RECIPIENT_A);

    let offsets: Vec<usize> = (0..3800).step_by(CHUNK).collect();
    assert_eq!(offsets.len(), 5);
    for (n, &offset) in offsets.iter().enumerate() {
        let end = (offset + CHUNK).min(3800);
        write(&mut ledger, offset, &junk[offset..end]).unwrap();
        if n + 1 < offsets.len() {
            assert_eq!(
                finalize(&mut ledger, &inputs),
                Err(ProtocolError::IncompleteUpload {
                    written: end as u32,
                    expected: 3800
                })
            );
        }
    }

    let buffer = ledger.buffer(&BUFFER).unwrap();
    assert_eq!(buffer.bytes_written(), 3800);
    assert_eq!(buffer.proof_bytes(), &junk[..]);

    // Complete, so the gate is passed and the bytes themselves are judged
    let err = finalize(&mut ledger, &inputs).unwrap_err();
    assert!(!matches!(err, ProtocolError::IncompleteUpload { .. }));
    assert_eq!(ledger.buffer_state(&POOL, &BUFFER), Some(BufferState::Writing));
}

#[test]
fn test_all_zero_proof_is_malformed() {
    let mut ledger = ledger_with_pool();
    create_buffer(&mut ledger, 100).unwrap();
    write(&mut ledger, 0, &[0u8; 100]).unwrap();
    let inputs = PublicInputs::new([7; 32], [8; 32], [9; 32], RECIPIENT_A);
    let err = finalize(&mut ledger, &inputs).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidProofFormat(_)), "{err}");
    assert_eq!(ledger.buffer_state(&POOL, &BUFFER), Some(BufferState::Writing));
}

#[test]
fn test_claim_requires_finalized_buffer() {
    let Deposited {
        mut ledger,
        secret,
        deposit,
        leaf_index,
        root,
    } = deposited();
    let (bytes, _) = prove(secret, leaf_index, root, RECIPIENT_A);
    create_buffer(&mut ledger, bytes.len() as u32).unwrap();
    upload(&mut ledger, &bytes);

    let nullifier = secret.nullifier(leaf_index as u32);
    assert_eq!(
        claim(&mut ledger, deposit, nullifier, RECIPIENT_A, 0),
        Err(ProtocolError::ProofNotVerified)
    );
    assert_eq!(ledger.nullifier_count(), 0);
    assert_eq!(ledger.balance(&RECIPIENT_A), Some(0));
}

#[test]
fn test_claim_pays_once_and_binds_recipient() {
    let Deposited {
        mut ledger,
        secret,
        deposit,
        leaf_index,
        root,
    } = deposited();
    let (bytes, inputs) = prove(secret, leaf_index, root, RECIPIENT_A);
    create_buffer(&mut ledger, bytes.len() as u32).unwrap();
    upload(&mut ledger, &bytes);
    finalize(&mut ledger, &inputs).unwrap();
    assert_eq!(ledger.buffer_state(&POOL, &BUFFER), Some(BufferState::Finalized));

    // Finalized buffers are read-only
    assert_eq!(write(&mut ledger, 0, &[0]), Err(ProtocolError::BufferFinalized));

    let fee = AMOUNT / 100;
    let event = claim(&mut ledger, deposit, inputs.nullifier, RECIPIENT_A, fee).unwrap();
    assert!(matches!(event, Event::Claimed { recipient_amount, relayer_fee, .. }
        if recipient_amount == AMOUNT - fee && relayer_fee == fee));
    assert_eq!(ledger.balance(&RECIPIENT_A), Some(AMOUNT - fee));
    assert_eq!(ledger.balance(&RELAYER_TOKENS), Some(fee));
    assert_eq!(ledger.balance(&VAULT), Some(2 * AMOUNT));
    assert!(ledger.deposit_record(&deposit).is_some_and(|d| d.claimed));
    assert_eq!(ledger.buffer_state(&POOL, &BUFFER), Some(BufferState::Consumed));

    // Same body, recipient swapped
    assert!(claim(&mut ledger, deposit, inputs.nullifier, RECIPIENT_B, fee).is_err());
    assert!(claim(&mut ledger, deposit, inputs.nullifier, RECIPIENT_A, fee).is_err());
    assert_eq!(ledger.balance(&RECIPIENT_B), Some(0));
    assert_eq!(ledger.nullifier_count(), 1);
    let record = ledger.nullifier_record(&POOL, &inputs.nullifier).unwrap();
    assert_eq!(record.recipient, RECIPIENT_A);
    assert_eq!(record.leaf_index, leaf_index);
}

#[test]
fn test_second_valid_proof_cannot_claim_again() {
    let Deposited {
        mut ledger,
        secret,
        deposit,
        leaf_index,
        root,
    } = deposited();
    let (bytes, inputs) = prove(secret, leaf_index, root, RECIPIENT_A);
    create_buffer(&mut ledger, bytes.len() as u32).unwrap();
    upload(&mut ledger, &bytes);
    finalize(&mut ledger, &inputs).unwrap();
    claim(&mut ledger, deposit, inputs.nullifier, RECIPIENT_A, 0).unwrap();

    // Fresh salt: different bytes, same nullifier, and it verifies on its own
    let (again, again_inputs) = prove(secret, leaf_index, root, RECIPIENT_A);
    assert_ne!(again, bytes);
    assert_eq!(again_inputs, inputs);
    create_buffer_at(&mut ledger, SECOND_BUFFER, again.len() as u32).unwrap();
    upload_to(&mut ledger, SECOND_BUFFER, &again);
    finalize_at(&mut ledger, SECOND_BUFFER, &again_inputs).unwrap();
    assert_eq!(ledger.buffer_state(&POOL, &SECOND_BUFFER), Some(BufferState::Consumed));

    assert_eq!(
        claim_from(&mut ledger, SECOND_BUFFER, deposit, again_inputs.nullifier, RECIPIENT_A, 0),
        Err(ProtocolError::AlreadyClaimed)
    );
    assert_eq!(ledger.nullifier_count(), 1);
    assert_eq!(ledger.balance(&RECIPIENT_A), Some(AMOUNT));
}

#[test]
fn test_consumed_only_in_the_claiming_pool() {
    let Deposited {
        mut ledger,
        secret,
        deposit,
        leaf_index,
        root,
    } = deposited();
    let init = MurklInstruction::InitializePool {
        min_deposit: 1_000,
        max_relayer_fee_bps: 100,
    };
    ledger
        .process(&ADMIN, &[OTHER_POOL, ADMIN, MINT, OTHER_VAULT], &init.encode())
        .unwrap();

    let (bytes, inputs) = prove(secret, leaf_index, root, RECIPIENT_A);
    create_buffer(&mut ledger, bytes.len() as u32).unwrap();
    upload(&mut ledger, &bytes);
    finalize(&mut ledger, &inputs).unwrap();
    claim(&mut ledger, deposit, inputs.nullifier, RECIPIENT_A, 0).unwrap();

    assert_eq!(ledger.buffer_state(&POOL, &BUFFER), Some(BufferState::Consumed));
    assert_eq!(ledger.buffer_state(&OTHER_POOL, &BUFFER), Some(BufferState::Finalized));
    assert!(ledger.nullifier_record(&OTHER_POOL, &inputs.nullifier).is_none());
}

#[test]
fn test_redirected_claim_is_rejected_before_payout() {
    let Deposited {
        mut ledger,
        secret,
        deposit,
        leaf_index,
        root,
    } = deposited();
    let (bytes, inputs) = prove(secret, leaf_index, root, RECIPIENT_A);
    create_buffer(&mut ledger, bytes.len() as u32).unwrap();
    upload(&mut ledger, &bytes);
    finalize(&mut ledger, &inputs).unwrap();

    assert_eq!(
        claim(&mut ledger, deposit, inputs.nullifier, RECIPIENT_B, 0),
        Err(ProtocolError::RecipientMismatch)
    );
    assert_eq!(ledger.nullifier_count(), 0);
    assert!(claim(&mut ledger, deposit, inputs.nullifier, RECIPIENT_A, 0).is_ok());
}

#[test]
fn test_finalize_binds_recipient_account() {
    let Deposited {
        mut ledger,
        secret,
        leaf_index,
        root,
        ..
    } = deposited();
    let (bytes, mut inputs) = prove(secret, leaf_index, root, RECIPIENT_A);
    create_buffer(&mut ledger, bytes.len() as u32).unwrap();
    upload(&mut ledger, &bytes);

    inputs.recipient = RECIPIENT_B;
    assert!(matches!(
        finalize(&mut ledger, &inputs),
        Err(ProtocolError::ProofRejected(_))
    ));
    assert_eq!(ledger.buffer_state(&POOL, &BUFFER), Some(BufferState::Writing));
}

#[test]
fn test_fee_cap() {
    let Deposited {
        mut ledger,
        secret,
        deposit,
        leaf_index,
        root,
    } = deposited();
    let (bytes, inputs) = prove(secret, leaf_index, root, RECIPIENT_A);
    create_buffer(&mut ledger, bytes.len() as u32).unwrap();
    upload(&mut ledger, &bytes);
    finalize(&mut ledger, &inputs).unwrap();

    let max = AMOUNT / 100;
    assert_eq!(
        claim(&mut ledger, deposit, inputs.nullifier, RECIPIENT_A, max + 1),
        Err(ProtocolError::FeeTooHigh { fee: max + 1, max })
    );
}

#[test]
fn test_claim_against_wrong_deposit() {
    let Deposited {
        mut ledger,
        secret,
        leaf_index,
        root,
        ..
    } = deposited();
    let (bytes, inputs) = prove(secret, leaf_index, root, RECIPIENT_A);
    create_buffer(&mut ledger, bytes.len() as u32).unwrap();
    upload(&mut ledger, &bytes);
    finalize(&mut ledger, &inputs).unwrap();

    let (other, _, _) = deposit(&mut ledger, [3; 32]);
    assert_eq!(
        claim(&mut ledger, other, inputs.nullifier, RECIPIENT_A, 0),
        Err(ProtocolError::CommitmentMismatch)
    );
}

#[test]
fn test_claims_allowed_while_paused() {
    let Deposited {
        mut ledger,
        secret,
        deposit: deposit_key,
        leaf_index,
        root,
    } = deposited();
    let pause = MurklInstruction::SetPaused { paused: true };
    ledger.process(&ADMIN, &[POOL, ADMIN], &pause.encode()).unwrap();
    assert!(matches!(
        ledger.process(
            &SENDER,
            &[POOL, SENDER_TOKENS, SENDER],
            &MurklInstruction::Deposit {
                amount: AMOUNT,
                commitment: [5; 32]
            }
            .encode()
        ),
        Err(ProtocolError::PoolPaused)
    ));

    let (bytes, inputs) = prove(secret, leaf_index, root, RECIPIENT_A);
    create_buffer(&mut ledger, bytes.len() as u32).unwrap();
    upload(&mut ledger, &bytes);
    finalize(&mut ledger, &inputs).unwrap();
    assert!(claim(&mut ledger, deposit_key, inputs.nullifier, RECIPIENT_A, 0).is_ok());
}

#[test]
fn test_legacy_instruction_names() {
    let mut ledger = ledger_with_pool();
    let create = MurklInstruction::CreateProofBuffer { expected_size: 8 };
    ledger
        .process(&RELAYER, &[BUFFER, RELAYER], &create.encode_as("init_proof_buffer"))
        .unwrap();
    let upload = MurklInstruction::WriteProofChunk {
        offset: 0,
        data: vec![0; 8],
    };
    ledger
        .process(&RELAYER, &[BUFFER, RELAYER], &upload.encode_as("upload_chunk"))
        .unwrap();
    assert!(ledger.buffer(&BUFFER).is_some_and(|b| b.is_complete()));
}

// === Proof wire format ===

fn honest_proof() -> &'static (Vec<u8>, PublicInputs) {
    static PROOF: OnceLock<(Vec<u8>, PublicInputs)> = OnceLock::new();
    PROOF.get_or_init(|| {
        let secret = Secret::from_credentials("@bob", "hunter2");
        prove(secret, 3, [0x5a; 32], RECIPIENT_A)
    })
}

#[test]
fn test_proof_fits_a_buffer() {
    let (bytes, inputs) = honest_proof();
    assert!(bytes.len() <= murkl_prover::MAX_PROOF_SIZE);
    let proof = Proof::from_bytes(bytes).unwrap();
    assert_eq!(proof.encoded_len(), bytes.len());
    assert_eq!(&proof.to_bytes(), bytes);
    assert!(Verifier::new().verify(&proof, inputs).is_ok());
}

fn qm31() -> impl Strategy<Value = QM31> {
    any::<[u32; 4]>().prop_map(|[a, b, c, d]| QM31::from_u32(a, b, c, d))
}

fn path() -> impl Strategy<Value = Vec<Hash32>> {
    proptest::collection::vec(any::<Hash32>(), 0..6)
}

fn fri_layer() -> impl Strategy<Value = FriLayerProof> {
    (
        any::<Hash32>(),
        proptest::collection::vec(qm31(), 0..12),
        proptest::collection::vec(path(), 0..6),
    )
        .prop_map(|(commitment, evaluations, merkle_paths)| FriLayerProof {
            commitment,
            evaluations,
            merkle_paths,
        })
}

/// Structurally valid proofs with arbitrary counts, including empty layers
fn arbitrary_proof() -> impl Strategy<Value = Proof> {
    (
        any::<Hash32>(),
        any::<Hash32>(),
        proptest::collection::vec(qm31(), 0..8),
        proptest::collection::vec(fri_layer(), 0..4),
        proptest::collection::vec(qm31(), 0..6),
        proptest::collection::vec((any::<u32>(), path(), path()), 0..10),
    )
        .prop_map(|(trace_commitment, composition_commitment, oods_values, fri_layers, last_layer_coeffs, queries)| {
            let query_positions = queries.iter().map(|(pos, _, _)| *pos).collect();
            let query_decommitments = queries
                .into_iter()
                .map(|(_, trace_path, composition_path)| QueryDecommitment {
                    trace_path,
                    composition_path,
                })
                .collect();
            Proof {
                trace_commitment,
                composition_commitment,
                oods_values,
                fri_layers,
                last_layer_coeffs,
                query_positions,
                query_decommitments,
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_wire_format_roundtrips(proof in arbitrary_proof()) {
        let bytes = proof.to_bytes();
        prop_assert_eq!(proof.encoded_len(), bytes.len());
        prop_assert_eq!(Proof::from_bytes(&bytes), Ok(proof));
    }

    #[test]
    fn prop_decoder_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = Proof::from_bytes(&bytes);
    }

    #[test]
    fn prop_any_flipped_byte_is_rejected(index in any::<prop::sample::Index>(), bit in 0u8..8) {
        let (bytes, inputs) = honest_proof();
        let mut tampered = bytes.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= 1 << bit;
        prop_assert!(Verifier::new().verify_bytes(&tampered, inputs).is_err(), "byte {} accepted", i);
    }
}
