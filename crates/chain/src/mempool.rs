//! Pending transaction pool.
//!
//! A first-in, first-out queue of signed transactions waiting to be admitted
//! into a block. No fee ordering: transactions are offered to the next block in
//! submission order, and admission against the ledger happens only then.

use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use utxochain_core::{Digest, Transaction};

/// Errors that can occur during mempool operations.
#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("transaction already in mempool")]
    DuplicateTransaction,

    #[error("mempool is full (capacity: {0})")]
    MempoolFull(usize),

    #[error("settled transactions cannot be queued")]
    AlreadySettled,
}

pub type Result<T> = std::result::Result<T, MempoolError>;

/// Transaction mempool.
#[derive(Debug)]
pub struct Mempool {
    capacity: usize,
    queue: VecDeque<Transaction>,
    ids: HashSet<Digest>,
}

impl Mempool {
    /// Create a mempool holding at most `capacity` transactions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    /// Get the number of transactions in the mempool.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if the mempool is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Check if a transaction is in the mempool.
    pub fn contains(&self, id: &Digest) -> bool {
        self.ids.contains(id)
    }

    /// Queue a transaction.
    pub fn add(&mut self, tx: Transaction) -> Result<()> {
        if tx.is_settled() {
            return Err(MempoolError::AlreadySettled);
        }
        if self.contains(&tx.id) {
            return Err(MempoolError::DuplicateTransaction);
        }
        if self.queue.len() >= self.capacity {
            return Err(MempoolError::MempoolFull(self.capacity));
        }

        self.ids.insert(tx.id.clone());
        self.queue.push_back(tx);
        Ok(())
    }

    /// Take up to `limit` transactions in submission order.
    pub fn drain(&mut self, limit: usize) -> Vec<Transaction> {
        let count = limit.min(self.queue.len());
        let taken: Vec<Transaction> = self.queue.drain(..count).collect();
        for tx in &taken {
            self.ids.remove(&tx.id);
        }
        taken
    }
}
