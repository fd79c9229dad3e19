//! Append-only Merkle accumulator of deposit commitments
//!
//! On-chain only the [`Accumulator`] is stored: the current root, the leaf
//! count, the frontier (one hash per level) and a short ring of recent
//! roots. Off-chain, [`DepositTree`] rebuilds the full leaf set from deposit
//! history and produces inclusion paths that fold to the same root.
//!
//! Leaves are raw 32-byte commitments, empty leaves are [`ZERO_HASH`] and
//! interior nodes are [`hash_pair`].

use crate::merkle::{fold_path, hash_pair, Hash, MerklePath, ZERO_HASH};
use std::sync::OnceLock;
use thiserror::Error;

/// Tree depth (supports 2^20 deposits per pool)
pub const MERKLE_DEPTH: usize = 20;

/// Maximum number of leaves
pub const MAX_LEAVES: u64 = 1 << MERKLE_DEPTH;

/// How many past roots remain acceptable for claims
pub const ROOT_HISTORY_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccumulatorError {
    #[error("deposit tree is full (2^20 leaves)")]
    TreeFull,
    #[error("leaf {index} out of range (tree has {count} leaves)")]
    LeafOutOfRange { index: u64, count: u64 },
}

/// Root of an all-empty subtree at each level; `zero_hashes()[MERKLE_DEPTH]`
/// is the root of the empty tree.
pub fn zero_hashes() -> &'static [Hash; MERKLE_DEPTH + 1] {
    static ZEROS: OnceLock<[Hash; MERKLE_DEPTH + 1]> = OnceLock::new();
    ZEROS.get_or_init(|| {
        let mut zeros = [ZERO_HASH; MERKLE_DEPTH + 1];
        for level in 0..MERKLE_DEPTH {
            zeros[level + 1] = hash_pair(&zeros[level], &zeros[level]);
        }
        zeros
    })
}

/// Persistent accumulator state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Accumulator {
    pub root: Hash,
    pub leaf_count: u64,
    /// Left sibling waiting for a partner at each level
    pub frontier: [Hash; MERKLE_DEPTH],
    /// Ring buffer of recent roots, including the current one
    pub root_history: [Hash; ROOT_HISTORY_SIZE],
    /// Slot in `root_history` holding the current root
    pub history_cursor: u32,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    /// Empty tree
    pub fn new() -> Self {
        Self {
            root: zero_hashes()[MERKLE_DEPTH],
            leaf_count: 0,
            frontier: [ZERO_HASH; MERKLE_DEPTH],
            root_history: [ZERO_HASH; ROOT_HISTORY_SIZE],
            history_cursor: 0,
        }
    }

    /// Insert a commitment at position `leaf_count` and advance the root.
    ///
    /// Returns the new leaf's index.
    pub fn append(&mut self, leaf: Hash) -> Result<u64, AccumulatorError> {
        if self.leaf_count >= MAX_LEAVES {
            return Err(AccumulatorError::TreeFull);
        }
        let zeros = zero_hashes();
        let leaf_index = self.leaf_count;
        let mut idx = leaf_index;
        let mut current = leaf;
        for level in 0..MERKLE_DEPTH {
            if idx & 1 == 0 {
                self.frontier[level] = current;
                current = hash_pair(&current, &zeros[level]);
            } else {
                current = hash_pair(&self.frontier[level], &current);
            }
            idx >>= 1;
        }

        self.root = current;
        self.leaf_count += 1;
        self.history_cursor = (self.history_cursor + 1) % ROOT_HISTORY_SIZE as u32;
        self.root_history[self.history_cursor as usize] = current;
        Ok(leaf_index)
    }

    /// Whether `root` is the current root or one of the recent ones
    pub fn is_known_root(&self, root: &Hash) -> bool {
        // Unused slots hold ZERO_HASH; the empty-tree root is never recorded.
        *root != ZERO_HASH && self.root_history.iter().any(|r| r == root)
    }
}

/// Off-chain mirror of a pool's deposit tree
#[derive(Clone, Debug, Default)]
pub struct DepositTree {
    leaves: Vec<Hash>,
}

impl DepositTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from commitments in leaf order
    pub fn from_leaves(leaves: Vec<Hash>) -> Result<Self, AccumulatorError> {
        if leaves.len() as u64 > MAX_LEAVES {
            return Err(AccumulatorError::TreeFull);
        }
        Ok(Self { leaves })
    }

    pub fn insert(&mut self, leaf: Hash) -> Result<u64, AccumulatorError> {
        if self.leaves.len() as u64 >= MAX_LEAVES {
            return Err(AccumulatorError::TreeFull);
        }
        self.leaves.push(leaf);
        Ok(self.leaves.len() as u64 - 1)
    }

    pub fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaf(&self, index: u64) -> Option<&Hash> {
        self.leaves.get(index as usize)
    }

    /// Level-by-level node hashes, padding with zero subtrees
    fn levels(&self) -> Vec<Vec<Hash>> {
        let zeros = zero_hashes();
        let mut levels = Vec::with_capacity(MERKLE_DEPTH + 1);
        levels.push(self.leaves.clone());
        for level in 0..MERKLE_DEPTH {
            let below = &levels[level];
            let next = below
                .chunks(2)
                .map(|pair| match pair {
                    [l, r] => hash_pair(l, r),
                    [l] => hash_pair(l, &zeros[level]),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }
        levels
    }

    pub fn root(&self) -> Hash {
        self.levels()[MERKLE_DEPTH]
            .first()
            .copied()
            .unwrap_or(zero_hashes()[MERKLE_DEPTH])
    }

    /// Inclusion path for one deposit
    pub fn path(&self, index: u64) -> Result<MerklePath, AccumulatorError> {
        if index >= self.len() {
            return Err(AccumulatorError::LeafOutOfRange {
                index,
                count: self.len(),
            });
        }
        let zeros = zero_hashes();
        let levels = self.levels();
        let mut idx = index as usize;
        let siblings = (0..MERKLE_DEPTH)
            .map(|level| {
                let sibling = levels[level].get(idx ^ 1).copied().unwrap_or(zeros[level]);
                idx >>= 1;
                sibling
            })
            .collect();
        Ok(MerklePath {
            siblings,
            leaf_index: index as usize,
        })
    }
}

/// Check a commitment's inclusion path against a root
pub fn verify_inclusion(commitment: &Hash, path: &MerklePath, root: &Hash) -> bool {
    path.siblings.len() == MERKLE_DEPTH
        && fold_path(commitment, path.leaf_index, &path.siblings) == *root
}
