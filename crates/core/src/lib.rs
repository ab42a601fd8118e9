//! Core ledger primitives for utxochain.
//!
//! This crate provides the fundamental types used throughout the chain:
//! - SHA-512 digests
//! - Ed25519 identities and signing
//! - Merkle trees (odd nodes are promoted, not duplicated)
//! - Transactions and their outputs
//! - The unspent-output ledger
//! - Blocks with proof-of-work sealing
//! - Wallets that spend from the ledger

pub mod block;
pub mod crypto;
pub mod hash;
pub mod ledger;
pub mod merkle;
pub mod transaction;
pub mod wallet;

// Re-export commonly used types at the crate root
pub use block::{current_timestamp, Block, BlockError};
pub use crypto::{Address, CryptoError, Keypair, PublicKey, Signature, Signer};
pub use hash::{hash, hash_concat, Digest, DIGEST_HEX_LEN, GENESIS_SENTINEL};
pub use ledger::UtxoLedger;
pub use merkle::{merkle_root, MerkleError, MerkleProof, MerkleTree, ProofStep};
pub use transaction::{Transaction, TransactionError, TransactionOutput};
pub use wallet::{Wallet, WalletError};
