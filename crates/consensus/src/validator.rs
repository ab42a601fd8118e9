//! Chain validation rules.
//!
//! Validation replays every block's digest, linkage and proof-of-work and
//! reports the first block that breaks one of them. It never mutates blocks.

use std::fmt;
use thiserror::Error;
use utxochain_core::Block;

/// Which invariant a block violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Stored digest differs from the recomputed one.
    DigestMismatch,
    /// Stored merkle root does not match the transactions.
    MerkleMismatch,
    /// `previous_digest` does not equal the predecessor's digest.
    BrokenLink,
    /// Digest lacks the required leading zeros.
    Unmined,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Violation::DigestMismatch => "block corrupted: digest mismatch",
            Violation::MerkleMismatch => "block corrupted: merkle root mismatch",
            Violation::BrokenLink => "chain broken",
            Violation::Unmined => "unmined block",
        };
        f.write_str(reason)
    }
}

/// A chain integrity failure at a specific block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain integrity error at block {index}: {violation}")]
pub struct IntegrityError {
    pub index: usize,
    pub violation: Violation,
}

pub type Result<T> = std::result::Result<T, IntegrityError>;

/// Block and chain validator.
pub struct ChainValidator;

impl ChainValidator {
    /// Check a block's own contents: merkle root, then digest.
    pub fn validate_block_contents(block: &Block, index: usize) -> Result<()> {
        if !block.verify_merkle_root() {
            return Err(IntegrityError {
                index,
                violation: Violation::MerkleMismatch,
            });
        }
        if block.calculate_hash() != block.digest {
            return Err(IntegrityError {
                index,
                violation: Violation::DigestMismatch,
            });
        }
        Ok(())
    }

    /// Check that `block` points at `parent`.
    pub fn validate_link(parent: &Block, block: &Block, index: usize) -> Result<()> {
        if block.previous_digest != parent.digest {
            return Err(IntegrityError {
                index,
                violation: Violation::BrokenLink,
            });
        }
        Ok(())
    }

    /// Check the proof-of-work rule.
    pub fn validate_pow(block: &Block, difficulty: usize, index: usize) -> Result<()> {
        if !block.digest.meets_difficulty(difficulty) {
            return Err(IntegrityError {
                index,
                violation: Violation::Unmined,
            });
        }
        Ok(())
    }

    /// Validate a whole chain.
    ///
    /// The genesis block is exempt from the linkage check but still has its
    /// contents and proof-of-work checked. Every later block is checked for
    /// contents, then linkage, then proof-of-work.
    pub fn validate_chain(blocks: &[Block], difficulty: usize) -> Result<()> {
        let Some(genesis) = blocks.first() else {
            return Ok(());
        };
        Self::validate_block_contents(genesis, 0)?;
        Self::validate_pow(genesis, difficulty, 0)?;

        for (offset, pair) in blocks.windows(2).enumerate() {
            let index = offset + 1;
            let (prev, cur) = (&pair[0], &pair[1]);
            Self::validate_block_contents(cur, index)?;
            Self::validate_link(prev, cur, index)?;
            Self::validate_pow(cur, difficulty, index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utxochain_core::{hash, Block, Keypair, Transaction, UtxoLedger, Wallet};

    const DIFFICULTY: usize = 2;

    /// Genesis plus two transfer blocks, all mined.
    fn three_blocks() -> Vec<Block> {
        let ledger = UtxoLedger::new();
        let alice = Wallet::generate();
        let bob = Keypair::generate();

        let mut genesis = Block::genesis();
        genesis
            .add_transaction(
                Transaction::coinbase(alice.public_key().clone(), 100, ledger.next_sequence()),
                &ledger,
            )
            .unwrap();
        genesis.mine(DIFFICULTY).unwrap();

        let mut blocks = vec![genesis];
        for value in [10, 20] {
            let tx = alice.send(&ledger, &bob.public_key, value).unwrap();
            let mut block = Block::new(blocks[blocks.len() - 1].digest.clone());
            block.add_transaction(tx, &ledger).unwrap();
            block.mine(DIFFICULTY).unwrap();
            blocks.push(block);
        }
        blocks
    }

    #[test]
    fn test_valid_chain() {
        let blocks = three_blocks();
        assert!(ChainValidator::validate_chain(&blocks, DIFFICULTY).is_ok());
    }

    #[test]
    fn test_empty_chain_is_valid() {
        assert!(ChainValidator::validate_chain(&[], DIFFICULTY).is_ok());
    }

    #[test]
    fn test_tampered_transactions_detected() {
        let mut blocks = three_blocks();
        blocks[1].transactions[0].value = 99;
        blocks[1].transactions[0].id = hash("rewritten");

        let err = ChainValidator::validate_chain(&blocks, DIFFICULTY).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.violation, Violation::MerkleMismatch);
    }

    #[test]
    fn test_tampered_nonce_detected() {
        let mut blocks = three_blocks();
        blocks[2].nonce += 1;

        let err = ChainValidator::validate_chain(&blocks, DIFFICULTY).unwrap_err();
        assert_eq!(
            err,
            IntegrityError {
                index: 2,
                violation: Violation::DigestMismatch
            }
        );
    }

    #[test]
    fn test_broken_link_detected() {
        let mut blocks = three_blocks();
        // Re-point block 2 and re-mine it so only the link is wrong.
        let mut relinked = Block::new(hash("elsewhere"));
        relinked.transactions = blocks[2].transactions.clone();
        relinked.mine(DIFFICULTY).unwrap();
        blocks[2] = relinked;

        let err = ChainValidator::validate_chain(&blocks, DIFFICULTY).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.violation, Violation::BrokenLink);
        assert!(err.to_string().contains("chain broken"));
    }

    #[test]
    fn test_unmined_block_detected() {
        let mut blocks = three_blocks();
        let err = ChainValidator::validate_chain(&blocks, DIFFICULTY + 60).unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.violation, Violation::Unmined);

        // A block sealed at a lower difficulty than the chain requires.
        let mut weak = Block::new(blocks[1].digest.clone());
        weak.transactions = blocks[2].transactions.clone();
        let root = weak.compute_merkle_root().unwrap();
        let timestamp = weak.timestamp;
        let nonce = (0u64..)
            .find(|n| {
                !Block::digest_for(&weak.previous_digest, timestamp, root.as_str(), *n)
                    .meets_difficulty(DIFFICULTY)
            })
            .unwrap();
        weak.seal(root, nonce, timestamp);
        blocks[2] = weak;

        let err = ChainValidator::validate_chain(&blocks, DIFFICULTY).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.violation, Violation::Unmined);
    }

    #[test]
    fn test_genesis_is_checked() {
        let mut blocks = three_blocks();
        blocks[0].timestamp += 1;
        let err = ChainValidator::validate_chain(&blocks, DIFFICULTY).unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.violation, Violation::DigestMismatch);
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let blocks = three_blocks();
        let before = serde_json::to_string(&blocks).unwrap();
        let _ = ChainValidator::validate_chain(&blocks, DIFFICULTY);
        assert_eq!(serde_json::to_string(&blocks).unwrap(), before);
    }
}
