//! Binary Merkle tree with domain-separated hashing and odd-node-up
//! promotion.
//!
//! Leaves hash as `H(0x00 || data)`, internal nodes as
//! `H(0x01 || left || right)`. A node without a sibling moves up a level
//! unchanged. Proofs carry one step per level, so a tree of `n` leaves
//! yields proofs of exactly `ceil(log2 n)` steps.

use maple_crypto::Digest;
use serde::{Deserialize, Serialize};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

pub fn hash_leaf(data: &[u8]) -> Digest {
    let mut hasher = blake3_hasher();
    hasher.update(&[LEAF_PREFIX]);
    hasher.update(data);
    Digest::from(hasher.finalize())
}

pub fn hash_node(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = blake3_hasher();
    hasher.update(&[NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest::from(hasher.finalize())
}

fn blake3_hasher() -> blake3::Hasher {
    blake3::Hasher::new()
}

/// One level of an inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "side", content = "hash", rename_all = "snake_case")]
pub enum ProofStep {
    /// Sibling sits to the left.
    Left(Digest),
    /// Sibling sits to the right.
    Right(Digest),
    /// No sibling at this level; the node was promoted.
    Promoted,
}

/// Number of levels above the leaves: `ceil(log2 n)`, 0 for `n <= 1`.
pub fn proof_len(leaf_count: usize) -> usize {
    if leaf_count <= 1 {
        0
    } else {
        (usize::BITS - (leaf_count - 1).leading_zeros()) as usize
    }
}

#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `levels[0]` are leaf hashes, the last level holds only the root.
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build from leaf hashes, in order. `None` for an empty input.
    pub fn from_leaf_hashes(leaves: Vec<Digest>) -> Option<Self> {
        if leaves.is_empty() {
            return None;
        }
        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|l| l.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| match pair.get(1) {
                    Some(right) => hash_node(&pair[0], right),
                    None => pair[0],
                })
                .collect();
            levels.push(next);
        }
        Some(Self { levels })
    }

    pub fn root(&self) -> Digest {
        // Construction guarantees a non-empty last level.
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn leaves(&self) -> &[Digest] {
        &self.levels[0]
    }

    /// Sibling path for leaf `index`, bottom-up.
    pub fn proof(&self, index: usize) -> Option<Vec<ProofStep>> {
        if index >= self.leaf_count() {
            return None;
        }
        let mut pos = index;
        let mut path = Vec::with_capacity(self.levels.len() - 1);
        for level in &self.levels[..self.levels.len() - 1] {
            let step = if pos % 2 == 1 {
                ProofStep::Left(level[pos - 1])
            } else if pos + 1 < level.len() {
                ProofStep::Right(level[pos + 1])
            } else {
                ProofStep::Promoted
            };
            path.push(step);
            pos /= 2;
        }
        Some(path)
    }
}

/// Recompute the root from a leaf hash and its path.
///
/// The step kinds must be exactly those a tree of `leaf_count` leaves
/// produces for `index`; anything else yields `None`.
pub fn root_from_path(
    leaf: Digest,
    index: usize,
    leaf_count: usize,
    path: &[ProofStep],
) -> Option<Digest> {
    if index >= leaf_count || path.len() != proof_len(leaf_count) {
        return None;
    }
    let mut pos = index;
    let mut width = leaf_count;
    let mut current = leaf;
    for step in path {
        current = match step {
            ProofStep::Left(sibling) if pos % 2 == 1 => hash_node(sibling, &current),
            ProofStep::Right(sibling) if pos % 2 == 0 && pos + 1 < width => {
                hash_node(&current, sibling)
            }
            ProofStep::Promoted if pos % 2 == 0 && pos + 1 == width => current,
            _ => return None,
        };
        pos /= 2;
        width = width.div_ceil(2);
    }
    (width == 1).then_some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaves(n: usize) -> Vec<Digest> {
        (0..n).map(|i| hash_leaf(&(i as u64).to_be_bytes())).collect()
    }

    #[test]
    fn proof_len_is_ceil_log2() {
        let expected = [(1, 0), (2, 1), (3, 2), (4, 2), (5, 3), (8, 3), (9, 4), (1024, 10)];
        for (n, len) in expected {
            assert_eq!(proof_len(n), len, "n = {}", n);
        }
    }

    #[test]
    fn single_leaf_tree_root_is_the_leaf() {
        let tree = MerkleTree::from_leaf_hashes(leaves(1)).unwrap();
        assert_eq!(tree.root(), tree.leaves()[0]);
        assert_eq!(tree.proof(0).unwrap(), Vec::new());
        assert!(MerkleTree::from_leaf_hashes(Vec::new()).is_none());
    }

    #[test]
    fn odd_node_is_promoted_not_duplicated() {
        let l = leaves(3);
        let tree = MerkleTree::from_leaf_hashes(l.clone()).unwrap();
        assert_eq!(tree.root(), hash_node(&hash_node(&l[0], &l[1]), &l[2]));
        assert_eq!(
            tree.proof(2).unwrap(),
            vec![ProofStep::Promoted, ProofStep::Left(hash_node(&l[0], &l[1]))]
        );
    }

    #[test]
    fn leaf_and_node_hashes_are_domain_separated() {
        let a = hash_leaf(b"a");
        let b = hash_leaf(b"b");
        let mut concat = Vec::new();
        concat.extend_from_slice(a.as_bytes());
        concat.extend_from_slice(b.as_bytes());
        assert_ne!(hash_node(&a, &b), hash_leaf(&concat));
    }

    #[test]
    fn misplaced_steps_are_rejected() {
        let l = leaves(4);
        let tree = MerkleTree::from_leaf_hashes(l.clone()).unwrap();
        let mut path = tree.proof(0).unwrap();
        assert_eq!(root_from_path(l[0], 0, 4, &path), Some(tree.root()));

        // Claiming a different position with the same path fails.
        assert_eq!(root_from_path(l[0], 1, 4, &path), None);
        // Extra or missing steps fail.
        path.push(ProofStep::Promoted);
        assert_eq!(root_from_path(l[0], 0, 4, &path), None);
        assert_eq!(root_from_path(l[0], 0, 4, &path[..1]), None);
    }

    proptest! {
        #[test]
        fn every_leaf_proves_into_the_root(n in 1usize..80) {
            let l = leaves(n);
            let tree = MerkleTree::from_leaf_hashes(l.clone()).unwrap();
            for (i, leaf) in l.iter().enumerate() {
                let path = tree.proof(i).unwrap();
                prop_assert_eq!(path.len(), proof_len(n));
                prop_assert_eq!(root_from_path(*leaf, i, n, &path), Some(tree.root()));
            }
        }

        #[test]
        fn a_changed_leaf_fails_only_its_own_proof(
            n in 2usize..40,
            pick in any::<prop::sample::Index>(),
        ) {
            let l = leaves(n);
            let tree = MerkleTree::from_leaf_hashes(l.clone()).unwrap();
            let target = pick.index(n);
            let forged = hash_leaf(b"forged");
            for (i, leaf) in l.iter().enumerate() {
                let path = tree.proof(i).unwrap();
                let candidate = if i == target { forged } else { *leaf };
                let ok = root_from_path(candidate, i, n, &path) == Some(tree.root());
                prop_assert_eq!(ok, i != target);
            }
        }
    }
}
