//! # Merkle Distribution Tree
//!
//! Sorted-pair sha256 Merkle tree over cumulative per-account entitlements.
//! Leaf = `sha256(account || cumulative_amount_le || cumulative_shares_le)`;
//! interior nodes hash the byte-wise smaller child first, so proofs carry no
//! direction bits. An odd node at any level is promoted by pairing with
//! itself.

use harbor_core::AccountId;
use sha2::{Digest, Sha256};

/// Hash of a cumulative-entitlement leaf.
pub fn leaf_hash(account: &AccountId, cumulative_amount: u64, cumulative_shares: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(account.as_bytes());
    hasher.update(cumulative_amount.to_le_bytes());
    hasher.update(cumulative_shares.to_le_bytes());
    hasher.finalize().into()
}

fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    if a <= b {
        hasher.update(a);
        hasher.update(b);
    } else {
        hasher.update(b);
        hasher.update(a);
    }
    hasher.finalize().into()
}

/// Verify a sorted-pair inclusion proof.
pub fn verify_proof(root: &[u8; 32], leaf: &[u8; 32], proof: &[[u8; 32]]) -> bool {
    let mut node = *leaf;
    for sibling in proof {
        node = hash_pair(&node, sibling);
    }
    &node == root
}

/// In-memory Merkle tree, kept level by level so proofs can be generated
/// for any leaf.
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    pub fn new(leaves: Vec<[u8; 32]>) -> Self {
        if leaves.is_empty() {
            return Self { levels: vec![] };
        }
        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                let left = &pair[0];
                // duplicate the last node if the level is odd
                let right = pair.get(1).unwrap_or(left);
                next.push(hash_pair(left, right));
            }
            levels.push(next);
        }
        Self { levels }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(|l| l.len()).unwrap_or(0)
    }

    /// Root hash; the all-zero root denotes an empty tree.
    pub fn root(&self) -> [u8; 32] {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    /// Sibling path from `leaf_index` to the root.
    pub fn proof(&self, leaf_index: usize) -> Option<Vec<[u8; 32]>> {
        if leaf_index >= self.leaf_count() {
            return None;
        }
        let mut proof = Vec::new();
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = index ^ 1;
            let sibling = level.get(sibling_index).unwrap_or(&level[index]);
            proof.push(*sibling);
            index /= 2;
        }
        Some(proof)
    }
}
