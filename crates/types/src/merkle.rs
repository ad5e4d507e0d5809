//! Merkle tree utilities for batch root computation.
//!
//! Each batch is summarised by the root of a binary Merkle tree built over
//! its transaction hashes. Unlike a fixed-arity tree padded to a power of
//! two with zero leaves, this tree duplicates the last node of an odd-length
//! level and orders each pair lexicographically before hashing, so the root
//! does not depend on which side of a pair a hash happened to land on.

use crate::Hash;

/// Merkle inclusion proof for a leaf in the tree.
///
/// The proof consists of sibling hashes from the leaf to the root, along
/// with enough positional information to know, at each level, whether the
/// sibling was placed before or after the current node (since pairs are
/// ordered lexicographically rather than left-to-right by index).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// Index of the leaf in the original (unsorted-pair) tree.
    pub leaf_index: u32,
    /// Sibling hash at each level, from leaf to root.
    pub siblings: Vec<Hash>,
}

impl MerkleProof {
    /// Verify that `leaf_hash` is included in `root`.
    pub fn verify(&self, leaf_hash: &Hash, root: &Hash) -> bool {
        let mut current = *leaf_hash;
        for sibling in &self.siblings {
            current = hash_pair(&current, sibling);
        }
        current == *root
    }

    /// Depth of the tree this proof is for (number of levels above the leaf).
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Hash two sibling nodes, ordering them lexicographically first.
///
/// This makes the parent hash independent of which side of the pair either
/// hash started on, which is required for proofs to stay stable when the
/// only thing that changes is input ordering within a level.
#[inline]
fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let (left, right) = if a.as_bytes() <= b.as_bytes() {
        (a, b)
    } else {
        (b, a)
    };
    Hash::from_parts(&[left.as_bytes(), right.as_bytes()])
}

/// Build a Merkle tree from leaf hashes, returning the root and a proof per
/// leaf (in the same order as the input).
///
/// Algorithm: at each level, pair up adjacent nodes; if the level has odd
/// length, the last node is duplicated to form its own pair. Each pair is
/// hashed in lexicographic order of its two members.
///
/// # Panics
///
/// Panics if `leaves` is empty.
pub fn build_merkle_tree_with_proofs(leaves: &[Hash]) -> (Hash, Vec<MerkleProof>) {
    assert!(!leaves.is_empty(), "cannot build Merkle tree with no leaves");

    if leaves.len() == 1 {
        let leaf = leaves[0];
        let root = hash_pair(&leaf, &leaf);
        return (
            root,
            vec![MerkleProof {
                leaf_index: 0,
                siblings: vec![leaf],
            }],
        );
    }

    // `levels[0]` is the leaves; each subsequent level is half the size
    // (rounded up) of the one below it, built by pairing + duplication.
    let mut levels: Vec<Vec<Hash>> = vec![leaves.to_vec()];
    while levels.last().unwrap().len() > 1 {
        let current = levels.last().unwrap();
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        let mut i = 0;
        while i < current.len() {
            if i + 1 < current.len() {
                next.push(hash_pair(&current[i], &current[i + 1]));
            } else {
                // odd length: duplicate the last hash
                next.push(hash_pair(&current[i], &current[i]));
            }
            i += 2;
        }
        levels.push(next);
    }

    let root = levels.last().unwrap()[0];

    let proofs = (0..leaves.len())
        .map(|leaf_idx| {
            let mut siblings = Vec::with_capacity(levels.len() - 1);
            let mut idx = leaf_idx;
            for level in &levels[..levels.len() - 1] {
                let sibling_idx = if idx % 2 == 0 {
                    if idx + 1 < level.len() {
                        idx + 1
                    } else {
                        idx
                    }
                } else {
                    idx - 1
                };
                siblings.push(level[sibling_idx]);
                idx /= 2;
            }
            MerkleProof {
                leaf_index: leaf_idx as u32,
                siblings,
            }
        })
        .collect();

    (root, proofs)
}
