//! Binary instruction set
//!
//! Instruction data is an 8-byte discriminator, `SHA-256("global:" + name)[..8]`,
//! followed by the arguments in little-endian Borsh layout. Byte strings are
//! a `u32` length prefix and the bytes.

use super::error::ProtocolError;
use crate::hash::{sighash, Hash32};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MurklInstruction {
    InitializePool {
        min_deposit: u64,
        max_relayer_fee_bps: u16,
    },
    Deposit {
        amount: u64,
        commitment: Hash32,
    },
    SetPaused {
        paused: bool,
    },
    CreateProofBuffer {
        expected_size: u32,
    },
    WriteProofChunk {
        offset: u32,
        data: Vec<u8>,
    },
    FinalizeProofBuffer {
        commitment: Hash32,
        nullifier: Hash32,
        merkle_root: Hash32,
    },
    CloseProofBuffer,
    Claim {
        relayer_fee: u64,
        nullifier: Hash32,
    },
}

/// Names every instruction can be invoked by; the first is canonical.
const NAMES: [(&str, &[&str]); 8] = [
    ("initialize_pool", &[]),
    ("deposit", &[]),
    ("set_paused", &[]),
    ("create_proof_buffer", &["init_proof_buffer"]),
    ("write_proof_chunk", &["upload_chunk"]),
    ("finalize_proof_buffer", &["finalize_and_verify"]),
    ("close_proof_buffer", &[]),
    ("claim", &[]),
];

/// Account roles, in the order they must be supplied
pub mod accounts {
    pub const INITIALIZE_POOL: &[&str] = &["pool", "admin", "mint", "vault"];
    pub const DEPOSIT: &[&str] = &["pool", "depositor_token_account", "depositor"];
    pub const SET_PAUSED: &[&str] = &["pool", "admin"];
    pub const CREATE_PROOF_BUFFER: &[&str] = &["buffer", "owner"];
    pub const WRITE_PROOF_CHUNK: &[&str] = &["buffer", "owner"];
    pub const FINALIZE_PROOF_BUFFER: &[&str] = &["buffer", "owner", "recipient_token_account"];
    pub const CLOSE_PROOF_BUFFER: &[&str] = &["buffer", "owner"];
    pub const CLAIM: &[&str] = &[
        "pool",
        "deposit",
        "buffer",
        "recipient_token_account",
        "relayer_token_account",
        "relayer",
    ];
}

/// Discriminator for a global instruction name
pub fn discriminator(name: &str) -> [u8; 8] {
    sighash("global", name)
}

impl MurklInstruction {
    fn tag(&self) -> usize {
        match self {
            Self::InitializePool { .. } => 0,
            Self::Deposit { .. } => 1,
            Self::SetPaused { .. } => 2,
            Self::CreateProofBuffer { .. } => 3,
            Self::WriteProofChunk { .. } => 4,
            Self::FinalizeProofBuffer { .. } => 5,
            Self::CloseProofBuffer => 6,
            Self::Claim { .. } => 7,
        }
    }

    /// Canonical instruction name
    pub fn name(&self) -> &'static str {
        NAMES[self.tag()].0
    }

    /// Alternate names accepted on decode
    pub fn aliases(&self) -> &'static [&'static str] {
        NAMES[self.tag()].1
    }

    pub fn discriminator(&self) -> [u8; 8] {
        discriminator(self.name())
    }

    pub fn account_roles(&self) -> &'static [&'static str] {
        match self {
            Self::InitializePool { .. } => accounts::INITIALIZE_POOL,
            Self::Deposit { .. } => accounts::DEPOSIT,
            Self::SetPaused { .. } => accounts::SET_PAUSED,
            Self::CreateProofBuffer { .. } => accounts::CREATE_PROOF_BUFFER,
            Self::WriteProofChunk { .. } => accounts::WRITE_PROOF_CHUNK,
            Self::FinalizeProofBuffer { .. } => accounts::FINALIZE_PROOF_BUFFER,
            Self::CloseProofBuffer => accounts::CLOSE_PROOF_BUFFER,
            Self::Claim { .. } => accounts::CLAIM,
        }
    }

    /// Serialize with the canonical discriminator
    pub fn encode(&self) -> Vec<u8> {
        self.encode_as(self.name())
    }

    /// Serialize under `name`, which may be an alias
    pub fn encode_as(&self, name: &str) -> Vec<u8> {
        let mut out = discriminator(name).to_vec();
        match self {
            Self::InitializePool {
                min_deposit,
                max_relayer_fee_bps,
            } => {
                out.extend_from_slice(&min_deposit.to_le_bytes());
                out.extend_from_slice(&max_relayer_fee_bps.to_le_bytes());
            }
            Self::Deposit { amount, commitment } => {
                out.extend_from_slice(&amount.to_le_bytes());
                out.extend_from_slice(commitment);
            }
            Self::SetPaused { paused } => out.push(*paused as u8),
            Self::CreateProofBuffer { expected_size } => {
                out.extend_from_slice(&expected_size.to_le_bytes());
            }
            Self::WriteProofChunk { offset, data } => {
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&(data.len() as u32).to_le_bytes());
                out.extend_from_slice(data);
            }
            Self::FinalizeProofBuffer {
                commitment,
                nullifier,
                merkle_root,
            } => {
                out.extend_from_slice(commitment);
                out.extend_from_slice(nullifier);
                out.extend_from_slice(merkle_root);
            }
            Self::CloseProofBuffer => {}
            Self::Claim {
                relayer_fee,
                nullifier,
            } => {
                out.extend_from_slice(&relayer_fee.to_le_bytes());
                out.extend_from_slice(nullifier);
            }
        }
        out
    }

    /// Parse instruction data. Trailing bytes are rejected.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < 8 {
            return Err(ProtocolError::InvalidInstruction(format!(
                "{} bytes is shorter than a discriminator",
                data.len()
            )));
        }
        let tag = NAMES
            .iter()
            .position(|(name, aliases)| {
                discriminator(name) == data[..8] || aliases.iter().any(|a| discriminator(a) == data[..8])
            })
            .ok_or_else(|| ProtocolError::InvalidInstruction(format!("unknown discriminator {}", hex::encode(&data[..8]))))?;

        let mut r = ArgReader { data: &data[8..], pos: 0 };
        let ix = match tag {
            0 => Self::InitializePool {
                min_deposit: r.u64()?,
                max_relayer_fee_bps: r.u16()?,
            },
            1 => Self::Deposit {
                amount: r.u64()?,
                commitment: r.key()?,
            },
            2 => Self::SetPaused { paused: r.bool()? },
            3 => Self::CreateProofBuffer {
                expected_size: r.u32()?,
            },
            4 => Self::WriteProofChunk {
                offset: r.u32()?,
                data: r.bytes()?,
            },
            5 => Self::FinalizeProofBuffer {
                commitment: r.key()?,
                nullifier: r.key()?,
                merkle_root: r.key()?,
            },
            6 => Self::CloseProofBuffer,
            _ => Self::Claim {
                relayer_fee: r.u64()?,
                nullifier: r.key()?,
            },
        };
        r.finish()?;
        Ok(ix)
    }
}

struct ArgReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ArgReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let remaining = self.data.len() - self.pos;
        if n > remaining {
            return Err(ProtocolError::InvalidInstruction(format!(
                "argument needs {n} bytes at offset {}, {remaining} left",
                self.pos
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, ProtocolError> {
        self.array().map(u64::from_le_bytes)
    }

    fn key(&mut self) -> Result<Hash32, ProtocolError> {
        self.array()
    }

    fn bool(&mut self) -> Result<bool, ProtocolError> {
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(ProtocolError::InvalidInstruction(format!("invalid bool byte {b}"))),
        }
    }

    fn bytes(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn finish(&self) -> Result<(), ProtocolError> {
        match self.data.len() - self.pos {
            0 => Ok(()),
            n => Err(ProtocolError::InvalidInstruction(format!("{n} trailing bytes"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    #[test]
    fn test_discriminator_is_sha256_prefix() {
        let ix = MurklInstruction::Deposit {
            amount: 10_000_000,
            commitment: [7; 32],
        };
        let digest = Sha256::digest(b"global:deposit");
        assert_eq!(ix.discriminator(), digest[..8]);
        assert_eq!(ix.encode()[..8], digest[..8]);
    }

    #[test]
    fn test_write_chunk_layout() {
        let ix = MurklInstruction::WriteProofChunk {
            offset: 900,
            data: vec![0xab; 3],
        };
        let bytes = ix.encode();
        assert_eq!(&bytes[8..12], &900u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(&bytes[16..], &[0xab; 3]);
        assert_eq!(MurklInstruction::decode(&bytes), Ok(ix));
    }

    #[test]
    fn test_aliases_decode_to_same_instruction() {
        let ix = MurklInstruction::FinalizeProofBuffer {
            commitment: [1; 32],
            nullifier: [2; 32],
            merkle_root: [3; 32],
        };
        let legacy = ix.encode_as("finalize_and_verify");
        assert_ne!(legacy[..8], ix.encode()[..8]);
        assert_eq!(MurklInstruction::decode(&legacy), Ok(ix));

        let upload = MurklInstruction::CreateProofBuffer { expected_size: 3800 }.encode_as("init_proof_buffer");
        assert_eq!(
            MurklInstruction::decode(&upload),
            Ok(MurklInstruction::CreateProofBuffer { expected_size: 3800 })
        );
    }

    #[test]
    fn test_rejects_malformed_data() {
        assert!(MurklInstruction::decode(&[1, 2, 3]).is_err());
        assert!(MurklInstruction::decode(&[0u8; 8]).is_err());

        let mut bytes = MurklInstruction::CloseProofBuffer.encode();
        bytes.push(0);
        assert!(MurklInstruction::decode(&bytes).is_err());

        let mut paused = MurklInstruction::SetPaused { paused: true }.encode();
        paused[8] = 2;
        assert!(MurklInstruction::decode(&paused).is_err());

        let mut chunk = MurklInstruction::WriteProofChunk {
            offset: 0,
            data: vec![1, 2],
        }
        .encode();
        chunk.truncate(chunk.len() - 1);
        assert!(MurklInstruction::decode(&chunk).is_err());
    }

    #[test]
    fn test_account_roles() {
        let claim = MurklInstruction::Claim {
            relayer_fee: 0,
            nullifier: [0; 32],
        };
        assert_eq!(claim.account_roles().len(), 6);
        assert_eq!(claim.account_roles()[3], "recipient_token_account");
    }
}
