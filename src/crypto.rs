//! SHA3-256 hashing and the snapshot Merkle tree
//!
//! # Tree rules
//!
//! ```text
//! leaf  = SHA3-256(0x00 ‖ "{wallet}|{staked_amount}|{TIER}|{stake_timestamp}")
//! node  = SHA3-256(0x01 ‖ min(a, b) ‖ max(a, b))
//! odd   = last hash of an odd-length level is paired with itself
//! empty = 32 zero bytes
//! ```
//!
//! Pairs are sorted before hashing, so a proof is just the sibling list
//! from leaf to root with no left/right flags. `next_level` is the only
//! place the pairing rule lives; the builder, the proof generator and the
//! verifier all go through it or through `hash_pair`.

use crate::types::{Hash, TierLabel, Timestamp, TokenAmount};
use sha3::{Digest, Sha3_256};

const LEAF_TAG: u8 = 0x00;
const NODE_TAG: u8 = 0x01;

pub const EMPTY_ROOT: Hash = [0u8; 32];

pub fn sha3(data: &[u8]) -> Hash {
    Sha3_256::digest(data).into()
}

pub fn sha3_concat(a: &[u8], b: &[u8]) -> Hash {
    let mut hasher = Sha3_256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

/// Canonical pre-image of a participant leaf.
///
/// Field order is fixed: wallet, staked amount (decimal), tier label
/// (uppercase), stake timestamp (decimal ms).
pub fn leaf_preimage(
    wallet: &str,
    staked_amount: TokenAmount,
    tier: TierLabel,
    stake_timestamp: Timestamp,
) -> String {
    format!("{}|{}|{}|{}", wallet, staked_amount, tier.as_str(), stake_timestamp)
}

pub fn leaf_hash(
    wallet: &str,
    staked_amount: TokenAmount,
    tier: TierLabel,
    stake_timestamp: Timestamp,
) -> Hash {
    let preimage = leaf_preimage(wallet, staked_amount, tier, stake_timestamp);
    sha3_concat(&[LEAF_TAG], preimage.as_bytes())
}

/// Order-independent interior node hash.
pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha3_256::new();
    hasher.update([NODE_TAG]);
    hasher.update(lo);
    hasher.update(hi);
    hasher.finalize().into()
}

/// Hash one level into the next. Odd tail is paired with itself.
pub fn next_level(level: &[Hash]) -> Vec<Hash> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    for chunk in level.chunks(2) {
        if chunk.len() == 2 {
            next.push(hash_pair(&chunk[0], &chunk[1]));
        } else {
            next.push(hash_pair(&chunk[0], &chunk[0]));
        }
    }
    next
}

pub fn merkle_root(leaves: &[Hash]) -> Hash {
    MerkleTree::build(leaves.to_vec()).root()
}

/// All levels of a tree, leaves first.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    pub fn build(leaves: Vec<Hash>) -> Self {
        let mut levels = vec![leaves];
        while let Some(top) = levels.last() {
            if top.len() <= 1 {
                break;
            }
            let next = next_level(top);
            levels.push(next);
        }
        Self { levels }
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn root(&self) -> Hash {
        match self.levels.last() {
            Some(top) if !top.is_empty() => top[0],
            _ => EMPTY_ROOT,
        }
    }

    /// Sibling path from leaf `index` to the root. `None` if out of range.
    pub fn proof(&self, index: usize) -> Option<Vec<Hash>> {
        if index >= self.leaf_count() {
            return None;
        }
        let mut proof = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = idx ^ 1;
            // Odd tail: sibling is the node itself
            let hash = level.get(sibling).unwrap_or(&level[idx]);
            proof.push(*hash);
            idx /= 2;
        }
        Some(proof)
    }
}

/// Fold a leaf through its proof and compare with `expected_root`.
pub fn verify_merkle_path(leaf: &Hash, proof: &[Hash], expected_root: &Hash) -> bool {
    let computed = proof.iter().fold(*leaf, |acc, sibling| hash_pair(&acc, sibling));
    computed == *expected_root
}
