//! Merkle trees using Keccak256
//!
//! A binary Merkle tree for committing to vectors of evaluations. Leaves are
//! arbitrary byte strings hashed once with [`hash_bytes`]; interior nodes are
//! [`hash_pair`]. The deposit accumulator in [`crate::accumulator`] shares
//! `hash_pair` but stores its leaves unhashed.

use sha3::{Digest, Keccak256};

/// Hash output size in bytes
pub const HASH_SIZE: usize = 32;

/// A 32-byte hash value
pub type Hash = [u8; HASH_SIZE];

/// Zero hash (32 zero bytes)
pub const ZERO_HASH: Hash = [0u8; HASH_SIZE];

/// Hash two child hashes together to form a parent hash
#[inline]
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(left);
    hasher.update(right);
    let mut hash = [0u8; HASH_SIZE];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Hash arbitrary bytes
#[inline]
pub fn hash_bytes(data: &[u8]) -> Hash {
    let mut hash = [0u8; HASH_SIZE];
    hash.copy_from_slice(&Keccak256::digest(data));
    hash
}

/// A Merkle authentication path (sibling hashes from leaf to root)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerklePath {
    /// Sibling hashes at each level (from leaf to root)
    pub siblings: Vec<Hash>,
    /// Leaf index
    pub leaf_index: usize,
}

impl MerklePath {
    /// Fold a leaf *hash* up to a root
    pub fn compute_root(&self, leaf_hash: &Hash) -> Hash {
        fold_path(leaf_hash, self.leaf_index, &self.siblings)
    }

    /// Verify that `leaf_hash` sits at `leaf_index` under `root`
    pub fn verify(&self, leaf_hash: &Hash, root: &Hash) -> bool {
        self.compute_root(leaf_hash) == *root
    }

    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Walk from a node hash to the root; bit `k` of `index` says whether the
/// node at level `k` is a right child.
pub fn fold_path(node: &Hash, mut index: usize, siblings: &[Hash]) -> Hash {
    let mut current = *node;
    for sibling in siblings {
        current = if index & 1 == 0 {
            hash_pair(&current, sibling)
        } else {
            hash_pair(sibling, &current)
        };
        index >>= 1;
    }
    current
}

/// Verify an opening of raw leaf bytes against a commitment root
pub fn verify_leaf(leaf: &[u8], index: usize, siblings: &[Hash], root: &Hash) -> bool {
    fold_path(&hash_bytes(leaf), index, siblings) == *root
}

/// A fully materialised Merkle tree over a power-of-two number of leaves
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `layers[0]` are the leaf hashes, the last layer is the root
    layers: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Commit to a vector of leaves.
    ///
    /// # Panics
    /// Panics if the number of leaves is zero or not a power of two. Callers
    /// build leaves from fixed-size evaluation domains.
    pub fn commit<L: AsRef<[u8]>>(leaves: &[L]) -> Self {
        assert!(
            leaves.len().is_power_of_two(),
            "leaf count must be a power of two"
        );
        let mut layers = vec![leaves.iter().map(|l| hash_bytes(l.as_ref())).collect::<Vec<_>>()];
        while layers[layers.len() - 1].len() > 1 {
            let next = layers[layers.len() - 1]
                .chunks_exact(2)
                .map(|pair| hash_pair(&pair[0], &pair[1]))
                .collect();
            layers.push(next);
        }
        Self { layers }
    }

    pub fn root(&self) -> Hash {
        self.layers[self.layers.len() - 1][0]
    }

    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Number of siblings in every path
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    /// Authentication path for one leaf
    pub fn open(&self, leaf_index: usize) -> MerklePath {
        let mut siblings = Vec::with_capacity(self.depth());
        let mut idx = leaf_index;
        for layer in &self.layers[..self.depth()] {
            siblings.push(layer[idx ^ 1]);
            idx >>= 1;
        }
        MerklePath {
            siblings,
            leaf_index,
        }
    }
}
