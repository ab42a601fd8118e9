//! Proof-of-work consensus for utxochain.
//!
//! This crate provides:
//! - A proof-of-work miner that splits the nonce space across threads, with
//!   cooperative cancellation and an attempt budget
//! - Chain validation (digest replay, linkage, proof-of-work) that reports the
//!   first failing block and the invariant it breaks
//!
//! # Example
//!
//! ```rust,no_run
//! use utxochain_consensus::{CancelToken, ChainValidator, Miner, MinerConfig};
//! use utxochain_core::{Block, Transaction, UtxoLedger, Wallet};
//!
//! let ledger = UtxoLedger::new();
//! let alice = Wallet::generate();
//!
//! let mut genesis = Block::genesis();
//! let coinbase = Transaction::coinbase(alice.public_key().clone(), 100, ledger.next_sequence());
//! genesis.add_transaction(coinbase, &ledger).unwrap();
//!
//! let miner = Miner::new(MinerConfig { threads: 4, max_attempts: Some(1_000_000) });
//! miner.mine(&mut genesis, 3, &CancelToken::new()).unwrap();
//!
//! ChainValidator::validate_chain(&[genesis], 3).unwrap();
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{CancelToken, Miner, MinerConfig, MiningOutcome};
pub use validator::{ChainValidator, IntegrityError, Violation};
