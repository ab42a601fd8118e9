//! Blockchain orchestration for utxochain.
//!
//! This crate brings the pieces together into an append-only chain:
//! - **Config**: TOML-loadable difficulty, mining and mempool settings
//! - **Mempool**: FIFO pool of signed transactions waiting for a block
//! - **Blockchain**: genesis minting, mining, appending and validation
//!
//! # Example
//!
//! ```rust,no_run
//! use utxochain_chain::{Blockchain, BlockchainConfig};
//! use utxochain_core::Wallet;
//!
//! let alice = Wallet::generate();
//! let bob = Wallet::generate();
//!
//! let mut chain = Blockchain::new(BlockchainConfig::with_difficulty(3)).unwrap();
//! chain.genesis(alice.public_key().clone(), 100).unwrap();
//!
//! let tx = alice.send(chain.ledger(), bob.public_key(), 40).unwrap();
//! chain.submit(tx).unwrap();
//! chain.mine_pending().unwrap();
//!
//! assert_eq!(chain.balance(bob.public_key()), 40);
//! chain.validate().unwrap();
//! ```

pub mod blockchain;
pub mod config;
pub mod mempool;

// Re-export commonly used types
pub use blockchain::{Blockchain, BlockchainError};
pub use config::{BlockchainConfig, ConfigError, MempoolConfig, MiningConfig};
pub use mempool::{Mempool, MempoolError};
