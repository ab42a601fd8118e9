//! Merkle tree over transaction ids.
//!
//! Parents are `hash(left ++ right)` over the hex strings of their children,
//! built left to right. The tree deliberately departs from the common
//! "duplicate the last node" convention: an odd trailing node at any level is
//! promoted unchanged to the next level. Block digests depend on this rule, so
//! it must not be "fixed".
//!
//! A single leaf is not its own root; the root is `hash(leaf)`.

use crate::hash::{hash, hash_concat, Digest};
use thiserror::Error;

/// Errors that can occur while building a Merkle tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("invalid input: a merkle tree needs at least one leaf")]
    InvalidInput,
}

pub type Result<T> = std::result::Result<T, MerkleError>;

/// Compute the merkle root of a list of leaf digests.
pub fn merkle_root(leaves: &[Digest]) -> Result<Digest> {
    Ok(MerkleTree::new(leaves.to_vec())?.root().clone())
}

/// Combine one level into the next.
fn next_level(current: &[Digest]) -> Vec<Digest> {
    let mut next = Vec::with_capacity(current.len().div_ceil(2));
    for chunk in current.chunks(2) {
        match chunk {
            [left, right] => next.push(hash_concat(&[left.as_str(), right.as_str()])),
            // Odd trailing node: promoted as-is.
            [last] => next.push(last.clone()),
            _ => unreachable!("chunks(2) yields one or two items"),
        }
    }
    next
}

/// A merkle tree that keeps every level for inclusion proofs.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All nodes in the tree, level by level (leaves first, root last).
    levels: Vec<Vec<Digest>>,
}

/// One step of an inclusion proof, from the leaf upwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofStep {
    /// Sibling sits to the left: `hash(sibling ++ current)`.
    Left(Digest),
    /// Sibling sits to the right: `hash(current ++ sibling)`.
    Right(Digest),
    /// The node was the odd trailing one and moved up unchanged.
    Promoted,
    /// Single-leaf tree: the root is `hash(current)`.
    HashSelf,
}

/// A merkle proof for a single leaf.
#[derive(Debug, Clone)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub leaf: Digest,
    /// Steps from leaf to root.
    pub steps: Vec<ProofStep>,
}

impl MerkleTree {
    /// Build a merkle tree from a non-empty list of leaf digests.
    pub fn new(leaves: Vec<Digest>) -> Result<Self> {
        if leaves.is_empty() {
            return Err(MerkleError::InvalidInput);
        }

        if leaves.len() == 1 {
            let root = hash(leaves[0].as_str());
            return Ok(Self {
                levels: vec![leaves, vec![root]],
            });
        }

        let mut levels = vec![leaves];
        loop {
            let current = &levels[levels.len() - 1];
            if current.len() == 1 {
                break;
            }
            let next = next_level(current);
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// Get the root of the merkle tree.
    pub fn root(&self) -> &Digest {
        // Construction guarantees a final level with exactly one node.
        &self.levels[self.levels.len() - 1][0]
    }

    /// Get the leaves in insertion order.
    pub fn leaves(&self) -> &[Digest] {
        &self.levels[0]
    }

    /// Number of levels including leaves and root.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Generate a proof for the leaf at the given index.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaf = self.leaves().get(index)?.clone();

        if self.leaves().len() == 1 {
            return Some(MerkleProof {
                leaf,
                steps: vec![ProofStep::HashSelf],
            });
        }

        let mut steps = Vec::with_capacity(self.levels.len() - 1);
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let step = if idx % 2 == 1 {
                ProofStep::Left(level[idx - 1].clone())
            } else if idx + 1 < level.len() {
                ProofStep::Right(level[idx + 1].clone())
            } else {
                ProofStep::Promoted
            };
            steps.push(step);
            idx /= 2;
        }

        Some(MerkleProof { leaf, steps })
    }

    /// Verify a merkle proof against this tree's root.
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        verify_proof(self.root(), proof)
    }
}

/// Verify a merkle proof against a given root.
pub fn verify_proof(root: &Digest, proof: &MerkleProof) -> bool {
    let mut current = proof.leaf.clone();

    for step in &proof.steps {
        current = match step {
            ProofStep::Left(sibling) => hash_concat(&[sibling.as_str(), current.as_str()]),
            ProofStep::Right(sibling) => hash_concat(&[current.as_str(), sibling.as_str()]),
            ProofStep::Promoted => current,
            ProofStep::HashSelf => hash(current.as_str()),
        };
    }

    current == *root
}
