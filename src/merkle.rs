//! Binary Merkle tree over an ordered list of values
//!
//! Leaves are the values' own hashes; each parent is SHA-256 over the
//! concatenation of its two children. A level with an odd number of nodes
//! pairs its last node with itself. The root of an empty tree is the zero hash.

use crate::crypto::{Sha256Hash, ZERO_HASH};
use sha2::{Digest, Sha256};

pub trait Hashable {
    fn hash(&self) -> Sha256Hash;
}

/// One step of an inclusion proof: the sibling hash and whether it sits on
/// the left of the running hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Sha256Hash,
    pub sibling_is_left: bool,
}

#[derive(Debug, Clone)]
pub struct MerkleTree<T> {
    values: Vec<T>,
    /// levels[0] holds the leaf hashes, the last level holds the root.
    levels: Vec<Vec<Sha256Hash>>,
}

fn hash_pair(left: &Sha256Hash, right: &Sha256Hash) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

impl<T: Hashable> MerkleTree<T> {
    pub fn new(values: Vec<T>) -> Self {
        let leaves: Vec<Sha256Hash> = values.iter().map(Hashable::hash).collect();
        let mut levels = vec![leaves];

        while levels.last().map_or(0, Vec::len) > 1 {
            let current = &levels[levels.len() - 1];
            let next: Vec<Sha256Hash> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [single] => hash_pair(single, single),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        MerkleTree { values, levels }
    }

    pub fn root(&self) -> Sha256Hash {
        match self.levels.last() {
            Some(level) if !level.is_empty() => level[0],
            _ => ZERO_HASH,
        }
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Inclusion proof for the value at `index`.
    pub fn proof(&self, index: usize) -> Option<Vec<ProofStep>> {
        if index >= self.values.len() {
            return None;
        }

        let mut steps = Vec::new();
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_index = if position % 2 == 0 {
                (position + 1).min(level.len() - 1)
            } else {
                position - 1
            };
            steps.push(ProofStep {
                sibling: level[sibling_index],
                sibling_is_left: position % 2 == 1,
            });
            position /= 2;
        }
        Some(steps)
    }
}

/// Checks that `leaf` is included under `root`.
pub fn verify_proof(root: &Sha256Hash, leaf: &Sha256Hash, proof: &[ProofStep]) -> bool {
    let computed = proof.iter().fold(*leaf, |running, step| {
        if step.sibling_is_left {
            hash_pair(&step.sibling, &running)
        } else {
            hash_pair(&running, &step.sibling)
        }
    });
    computed == *root
}
