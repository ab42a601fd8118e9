//! Proof-of-work mining.
//!
//! The nonce space is split across worker threads by stride: worker `i` of `n`
//! tries nonces `i, i + n, i + 2n, ...`. Workers only hash; they never touch
//! the ledger. The first worker to find a qualifying digest reports its nonce
//! and timestamp, the others stop at their next check.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use utxochain_core::{current_timestamp, Block, BlockError, Digest, DIGEST_HEX_LEN};

pub type Result<T> = std::result::Result<T, BlockError>;

/// Shared flag for cooperative cancellation of a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every search holding this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the token can be reused.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// The underlying flag.
    pub fn as_flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// Mining parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinerConfig {
    /// Worker threads. One thread reproduces the plain sequential search.
    pub threads: usize,
    /// Total attempts across all workers; `None` searches until found.
    pub max_attempts: Option<u64>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            max_attempts: None,
        }
    }
}

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningOutcome {
    pub nonce: u64,
    pub digest: Digest,
    /// Attempts made across all workers.
    pub attempts: u64,
}

#[derive(Debug, Clone)]
struct Found {
    nonce: u64,
    timestamp: i64,
}

/// Proof-of-work miner.
#[derive(Debug, Clone, Default)]
pub struct Miner {
    config: MinerConfig,
}

impl Miner {
    /// Create a miner with the given configuration.
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Mine `block` in place at `difficulty`.
    ///
    /// With one thread this delegates to [`Block::mine_with`]. On error the
    /// block is left unmined, with its nonce moved past the tried range.
    pub fn mine(&self, block: &mut Block, difficulty: usize, cancel: &CancelToken) -> Result<MiningOutcome> {
        let threads = self.config.threads.max(1);
        if threads == 1 {
            let attempts = block.mine_with(difficulty, self.config.max_attempts, cancel.as_flag())?;
            return Ok(MiningOutcome {
                nonce: block.nonce,
                digest: block.digest.clone(),
                attempts,
            });
        }

        if block.is_mined() {
            return Err(BlockError::AlreadyMined);
        }
        if difficulty > DIGEST_HEX_LEN {
            return Err(BlockError::DifficultyTooHigh(difficulty));
        }
        let merkle_root = block.compute_merkle_root()?;

        let found: Mutex<Option<Found>> = Mutex::new(None);
        let stop = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);
        let start = block.nonce;
        let resume_at = AtomicU64::new(start);
        let previous = &block.previous_digest;

        debug!(threads, difficulty, "starting parallel nonce search");
        thread::scope(|scope| {
            for worker in 0..threads as u64 {
                let merkle_root = merkle_root.as_str();
                let (found, stop, attempts, resume_at) = (&found, &stop, &attempts, &resume_at);
                scope.spawn(move || {
                    let mut nonce = start.wrapping_add(worker);
                    loop {
                        if stop.load(Ordering::Relaxed) || cancel.is_cancelled() {
                            resume_at.fetch_max(nonce, Ordering::Relaxed);
                            return;
                        }
                        let made = attempts.fetch_add(1, Ordering::Relaxed);
                        if self.config.max_attempts.is_some_and(|max| made >= max) {
                            attempts.fetch_sub(1, Ordering::Relaxed);
                            resume_at.fetch_max(nonce, Ordering::Relaxed);
                            return;
                        }

                        let timestamp = current_timestamp();
                        let digest = Block::digest_for(previous, timestamp, merkle_root, nonce);
                        if digest.meets_difficulty(difficulty) {
                            let mut slot = found.lock();
                            if slot.is_none() {
                                *slot = Some(Found { nonce, timestamp });
                            }
                            stop.store(true, Ordering::SeqCst);
                            return;
                        }
                        nonce = nonce.wrapping_add(threads as u64);
                    }
                });
            }
        });

        let attempts = attempts.load(Ordering::SeqCst);
        let found = found.into_inner();
        if found.is_none() {
            block.nonce = resume_at.load(Ordering::SeqCst);
        }
        match found {
            Some(Found { nonce, timestamp }) => {
                let digest = block.seal(merkle_root, nonce, timestamp).clone();
                info!(nonce, attempts, digest = ?digest, "block mined");
                Ok(MiningOutcome {
                    nonce,
                    digest,
                    attempts,
                })
            }
            None if cancel.is_cancelled() => {
                warn!(attempts, "mining cancelled");
                Err(BlockError::Cancelled { attempts })
            }
            None => {
                warn!(difficulty, attempts, "mining budget exhausted");
                Err(BlockError::DifficultyNotMet { difficulty, attempts })
            }
        }
    }
}
