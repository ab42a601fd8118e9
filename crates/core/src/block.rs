//! Blocks: transaction admission and proof-of-work sealing.

use crate::hash::{hash_concat, Digest, DIGEST_HEX_LEN, GENESIS_SENTINEL};
use crate::ledger::UtxoLedger;
use crate::merkle::{MerkleError, MerkleTree};
use crate::transaction::{Transaction, TransactionError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while filling or mining a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("transaction rejected: {0}")]
    Rejected(#[from] TransactionError),

    #[error("genesis block only admits a coinbase transaction")]
    GenesisRequiresCoinbase,

    #[error("block is already mined")]
    AlreadyMined,

    #[error("merkle error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("difficulty {0} exceeds the digest length")]
    DifficultyTooHigh(usize),

    #[error("difficulty {difficulty} not met within {attempts} attempts")]
    DifficultyNotMet { difficulty: usize, attempts: u64 },

    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
}

pub type Result<T> = std::result::Result<T, BlockError>;

/// Current Unix timestamp in milliseconds.
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A block of settled transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Digest of the previous block, or the genesis sentinel.
    pub previous_digest: Digest,
    /// Admitted transactions in admission order.
    pub transactions: Vec<Transaction>,
    /// Merkle root of the transaction ids, set when mining starts.
    pub merkle_root: Option<Digest>,
    /// Unix milliseconds of the last mining attempt.
    pub timestamp: i64,
    /// Proof-of-work counter.
    pub nonce: u64,
    /// Block digest; empty until mined.
    pub digest: Digest,
}

impl Block {
    /// Create an empty, unmined block on top of `previous_digest`.
    pub fn new(previous_digest: Digest) -> Self {
        Self {
            previous_digest,
            transactions: Vec::new(),
            merkle_root: None,
            timestamp: current_timestamp(),
            nonce: 0,
            digest: Digest::default(),
        }
    }

    /// Create the genesis block.
    pub fn genesis() -> Self {
        Self::new(Digest::genesis_sentinel())
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.previous_digest.as_str() == GENESIS_SENTINEL
    }

    /// Whether a digest has been sealed into the block.
    pub fn is_mined(&self) -> bool {
        !self.digest.is_empty()
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Ids of the admitted transactions, in order.
    pub fn transaction_ids(&self) -> Vec<Digest> {
        self.transactions.iter().map(|tx| tx.id.clone()).collect()
    }

    /// Merkle root over the current transaction ids.
    pub fn compute_merkle_root(&self) -> std::result::Result<Digest, MerkleError> {
        Ok(MerkleTree::new(self.transaction_ids())?.root().clone())
    }

    /// Verify the stored merkle root matches the transactions.
    pub fn verify_merkle_root(&self) -> bool {
        match (&self.merkle_root, self.compute_merkle_root()) {
            (Some(stored), Ok(computed)) => *stored == computed,
            _ => false,
        }
    }

    /// The block digest formula:
    /// `hash(previous_digest ++ timestamp ++ merkle_root ++ nonce)`, all in
    /// decimal/hex text with no delimiters.
    pub fn digest_for(previous_digest: &Digest, timestamp: i64, merkle_root: &str, nonce: u64) -> Digest {
        hash_concat(&[
            previous_digest.as_str(),
            &timestamp.to_string(),
            merkle_root,
            &nonce.to_string(),
        ])
    }

    /// Recompute the digest from the current field values.
    pub fn calculate_hash(&self) -> Digest {
        let merkle_root = self.merkle_root.as_ref().map(Digest::as_str).unwrap_or("");
        Self::digest_for(&self.previous_digest, self.timestamp, merkle_root, self.nonce)
    }

    /// Admit a transaction.
    ///
    /// The genesis block takes only the coinbase, which seeds the ledger. Any
    /// other block settles the transaction against `ledger` first; on failure
    /// neither the block nor the ledger changes.
    pub fn add_transaction(&mut self, mut tx: Transaction, ledger: &UtxoLedger) -> Result<()> {
        if self.is_mined() {
            return Err(BlockError::AlreadyMined);
        }

        let admitted = if self.is_genesis() {
            if !tx.coinbase {
                return Err(BlockError::GenesisRequiresCoinbase);
            }
            ledger.mint(&tx)
        } else {
            tx.process(ledger)
        };

        if let Err(err) = admitted {
            warn!(tx = ?tx.id, error = %err, "transaction rejected");
            return Err(err.into());
        }

        debug!(tx = ?tx.id, value = tx.value, "transaction admitted");
        self.transactions.push(tx);
        Ok(())
    }

    /// Fix the merkle root and store a winning nonce, returning the digest.
    pub fn seal(&mut self, merkle_root: Digest, nonce: u64, timestamp: i64) -> &Digest {
        self.merkle_root = Some(merkle_root);
        self.nonce = nonce;
        self.timestamp = timestamp;
        self.digest = self.calculate_hash();
        &self.digest
    }

    /// Search nonces until the digest has `difficulty` leading zeros.
    ///
    /// Unbounded: returns only once a nonce is found.
    pub fn mine(&mut self, difficulty: usize) -> Result<()> {
        self.mine_with(difficulty, None, &AtomicBool::new(false))
            .map(|_| ())
    }

    /// Bounded, cancellable nonce search. Returns the number of attempts.
    ///
    /// The search starts at the current nonce and refreshes the timestamp on
    /// every attempt. On error the block stays unmined and its nonce is the
    /// next untried one, so a later call continues the search.
    pub fn mine_with(
        &mut self,
        difficulty: usize,
        max_attempts: Option<u64>,
        cancel: &AtomicBool,
    ) -> Result<u64> {
        if self.is_mined() {
            return Err(BlockError::AlreadyMined);
        }
        if difficulty > DIGEST_HEX_LEN {
            return Err(BlockError::DifficultyTooHigh(difficulty));
        }
        let merkle_root = self.compute_merkle_root()?;

        let mut nonce = self.nonce;
        let mut attempts = 0u64;
        loop {
            if cancel.load(Ordering::Relaxed) {
                self.nonce = nonce;
                warn!(attempts, "mining cancelled");
                return Err(BlockError::Cancelled { attempts });
            }
            if max_attempts.is_some_and(|max| attempts >= max) {
                self.nonce = nonce;
                warn!(difficulty, attempts, "mining budget exhausted");
                return Err(BlockError::DifficultyNotMet { difficulty, attempts });
            }

            let timestamp = current_timestamp();
            let digest = Self::digest_for(&self.previous_digest, timestamp, merkle_root.as_str(), nonce);
            attempts += 1;

            if digest.meets_difficulty(difficulty) {
                self.seal(merkle_root, nonce, timestamp);
                info!(nonce, attempts, digest = ?self.digest, "block mined");
                return Ok(attempts);
            }
            nonce = nonce.wrapping_add(1);
        }
    }
}
