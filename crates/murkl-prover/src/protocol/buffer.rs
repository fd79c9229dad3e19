//! Chunked proof upload
//!
//! A proof is too large for one transaction, so it is staged in a buffer
//! account and verified once every byte is present.
//!
//! Account layout (all integers little-endian):
//!
//! ```text
//! [0..8]      discriminator   SHA-256("account:ProofBuffer")[..8]
//! [8..40]     owner
//! [40..44]    expected_size   u32
//! [44..48]    bytes_written   u32, size of the union of written ranges
//! [48]        finalized       0 | 1
//! [49..81]    commitment      } recorded on successful finalize
//! [81..113]   nullifier       }
//! [113..145]  merkle_root     }
//! [145..177]  recipient       }
//! [177..]     coverage bitmap (one bit per proof byte), then proof bytes
//! ```
//!
//! The state machine works on any `AsRef<[u8]>` storage so the same code
//! runs over an on-chain account borrow and an in-memory `Vec<u8>`.

use super::error::ProtocolError;
use crate::hash::sighash;
use crate::proof::MAX_PROOF_SIZE;
use crate::types::{Address, PublicInputs};
use crate::verifier::Verifier;
use tracing::{debug, warn};

pub const HEADER_SIZE: usize = 177;

const OFFSET_OWNER: usize = 8;
const OFFSET_EXPECTED_SIZE: usize = 40;
const OFFSET_BYTES_WRITTEN: usize = 44;
const OFFSET_FINALIZED: usize = 48;
const OFFSET_COMMITMENT: usize = 49;
const OFFSET_NULLIFIER: usize = 81;
const OFFSET_MERKLE_ROOT: usize = 113;
const OFFSET_RECIPIENT: usize = 145;

/// Account discriminator of a proof buffer
pub fn buffer_discriminator() -> [u8; 8] {
    sighash("account", "ProofBuffer")
}

/// Observable lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Writing,
    Finalized,
    /// Finalized and its nullifier has been claimed
    Consumed,
}

/// Total account size for a buffer expecting `expected_size` proof bytes
pub const fn account_size(expected_size: u32) -> usize {
    HEADER_SIZE + bitmap_len(expected_size) + expected_size as usize
}

const fn bitmap_len(expected_size: u32) -> usize {
    (expected_size as usize).div_ceil(8)
}

/// View over proof buffer account data
pub struct ProofBuffer<D> {
    data: D,
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_key(data: &[u8], offset: usize) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&data[offset..offset + 32]);
    out
}

impl<D: AsRef<[u8]>> ProofBuffer<D> {
    /// Wrap initialised account data, checking discriminator and length
    pub fn load(data: D) -> Result<Self, ProtocolError> {
        let bytes = data.as_ref();
        if bytes.len() < HEADER_SIZE || bytes[..8] != buffer_discriminator() {
            return Err(ProtocolError::InvalidAccount("not a proof buffer"));
        }
        let expected = read_u32(bytes, OFFSET_EXPECTED_SIZE);
        if expected == 0 || expected as usize > MAX_PROOF_SIZE || bytes.len() < account_size(expected) {
            return Err(ProtocolError::InvalidAccount("corrupt proof buffer header"));
        }
        Ok(Self { data })
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn owner(&self) -> Address {
        read_key(self.bytes(), OFFSET_OWNER)
    }

    pub fn expected_size(&self) -> u32 {
        read_u32(self.bytes(), OFFSET_EXPECTED_SIZE)
    }

    pub fn bytes_written(&self) -> u32 {
        read_u32(self.bytes(), OFFSET_BYTES_WRITTEN)
    }

    pub fn is_finalized(&self) -> bool {
        self.bytes()[OFFSET_FINALIZED] == 1
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_written() == self.expected_size()
    }

    /// `Empty`, `Writing` or `Finalized`; consumption is tracked by the
    /// nullifier registry.
    pub fn state(&self) -> BufferState {
        if self.is_finalized() {
            BufferState::Finalized
        } else if self.bytes_written() == 0 {
            BufferState::Empty
        } else {
            BufferState::Writing
        }
    }

    /// Public inputs the proof was verified against, once finalized
    pub fn public_inputs(&self) -> Option<PublicInputs> {
        if !self.is_finalized() {
            return None;
        }
        let b = self.bytes();
        Some(PublicInputs::new(
            read_key(b, OFFSET_COMMITMENT),
            read_key(b, OFFSET_NULLIFIER),
            read_key(b, OFFSET_MERKLE_ROOT),
            read_key(b, OFFSET_RECIPIENT),
        ))
    }

    fn bitmap_range(&self) -> core::ops::Range<usize> {
        HEADER_SIZE..HEADER_SIZE + bitmap_len(self.expected_size())
    }

    fn data_range(&self) -> core::ops::Range<usize> {
        let start = self.bitmap_range().end;
        start..start + self.expected_size() as usize
    }

    pub fn proof_bytes(&self) -> &[u8] {
        &self.bytes()[self.data_range()]
    }

    /// Whether byte `i` of the proof has been written
    pub fn is_covered(&self, i: usize) -> bool {
        let bitmap = &self.bytes()[self.bitmap_range()];
        bitmap[i / 8] & (1 << (i % 8)) != 0
    }

    pub fn into_inner(self) -> D {
        self.data
    }
}

impl<D: AsRef<[u8]> + AsMut<[u8]>> ProofBuffer<D> {
    /// Initialise fresh (all-zero) account data for `owner`
    pub fn initialize(mut data: D, owner: &Address, expected_size: u32) -> Result<Self, ProtocolError> {
        if expected_size == 0 || expected_size as usize > MAX_PROOF_SIZE {
            return Err(ProtocolError::InvalidSize {
                size: expected_size,
                max: MAX_PROOF_SIZE as u32,
            });
        }
        let needed = account_size(expected_size);
        let bytes = data.as_mut();
        if bytes.len() < needed {
            return Err(ProtocolError::BufferTooSmall {
                needed,
                available: bytes.len(),
            });
        }
        if bytes[..8].iter().any(|b| *b != 0) {
            return Err(ProtocolError::BufferAlreadyInitialized);
        }

        bytes[..needed].fill(0);
        bytes[..8].copy_from_slice(&buffer_discriminator());
        bytes[OFFSET_OWNER..OFFSET_OWNER + 32].copy_from_slice(owner);
        bytes[OFFSET_EXPECTED_SIZE..OFFSET_EXPECTED_SIZE + 4].copy_from_slice(&expected_size.to_le_bytes());
        debug!(expected_size, "proof buffer initialized");
        Ok(Self { data })
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn require_writable(&self, caller: &Address) -> Result<(), ProtocolError> {
        if self.owner() != *caller {
            return Err(ProtocolError::Unauthorized);
        }
        if self.is_finalized() {
            return Err(ProtocolError::BufferFinalized);
        }
        Ok(())
    }

    /// Write `chunk` at `offset`. Chunks may arrive in any order and may
    /// overlap; `bytes_written` counts each byte once.
    pub fn write_chunk(&mut self, caller: &Address, offset: u32, chunk: &[u8]) -> Result<u32, ProtocolError> {
        self.require_writable(caller)?;
        let expected = self.expected_size();
        let end = (offset as usize).checked_add(chunk.len());
        if end.map_or(true, |end| end > expected as usize) {
            return Err(ProtocolError::OffsetOutOfRange {
                offset,
                len: chunk.len(),
                expected,
            });
        }

        let start = offset as usize;
        let bitmap = self.bitmap_range();
        let data = self.data_range();
        let mut newly_covered = 0u32;
        let bytes = self.bytes_mut();
        bytes[data.start + start..data.start + start + chunk.len()].copy_from_slice(chunk);
        for i in start..start + chunk.len() {
            let cell = &mut bytes[bitmap.start + i / 8];
            let bit = 1u8 << (i % 8);
            if *cell & bit == 0 {
                *cell |= bit;
                newly_covered += 1;
            }
        }

        let written = self.bytes_written() + newly_covered;
        self.bytes_mut()[OFFSET_BYTES_WRITTEN..OFFSET_BYTES_WRITTEN + 4].copy_from_slice(&written.to_le_bytes());
        debug!(offset, len = chunk.len(), written, expected, "proof chunk written");
        Ok(written)
    }

    /// Verify the uploaded proof against `inputs` and seal the buffer.
    ///
    /// On any rejection the buffer is left exactly as it was and stays
    /// writable.
    pub fn finalize(
        &mut self,
        caller: &Address,
        inputs: &PublicInputs,
        verifier: &Verifier,
    ) -> Result<(), ProtocolError> {
        self.require_writable(caller)?;
        if !self.is_complete() {
            return Err(ProtocolError::IncompleteUpload {
                written: self.bytes_written(),
                expected: self.expected_size(),
            });
        }

        if let Err(e) = verifier.verify_bytes(self.proof_bytes(), inputs) {
            warn!(error = %e, "proof rejected at finalize");
            return Err(e.into());
        }

        let bytes = self.bytes_mut();
        bytes[OFFSET_COMMITMENT..OFFSET_COMMITMENT + 32].copy_from_slice(&inputs.commitment);
        bytes[OFFSET_NULLIFIER..OFFSET_NULLIFIER + 32].copy_from_slice(&inputs.nullifier);
        bytes[OFFSET_MERKLE_ROOT..OFFSET_MERKLE_ROOT + 32].copy_from_slice(&inputs.merkle_root);
        bytes[OFFSET_RECIPIENT..OFFSET_RECIPIENT + 32].copy_from_slice(&inputs.recipient);
        bytes[OFFSET_FINALIZED] = 1;
        debug!("proof verified and buffer finalized");
        Ok(())
    }
}
