//! A key pair that spends from the ledger.

use crate::crypto::{Address, Keypair, PublicKey, Signer};
use crate::ledger::UtxoLedger;
use crate::transaction::{Transaction, TransactionError, TransactionOutput};
use thiserror::Error;
use tracing::warn;

/// Errors returned when a wallet cannot produce a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("insufficient funds (required {required}, available {available})")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("signing failed: {0}")]
    Signing(#[from] TransactionError),
}

/// A participant holding a key pair.
#[derive(Debug)]
pub struct Wallet {
    keypair: Keypair,
}

impl Wallet {
    /// Create a wallet with a fresh key pair.
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// Wrap an existing key pair.
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// The wallet's identity.
    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public_key
    }

    /// Short display address.
    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// Balance according to `ledger`.
    pub fn balance(&self, ledger: &UtxoLedger) -> u64 {
        ledger.balance(self.public_key())
    }

    /// All unspent outputs owned by this wallet.
    pub fn unspent(&self, ledger: &UtxoLedger) -> Vec<TransactionOutput> {
        ledger.unspent_outputs(self.public_key())
    }

    /// Build and sign a payment of `value` to `to`.
    ///
    /// Inputs are a snapshot taken from the ledger now; the ledger itself is
    /// not touched until the transaction is admitted into a block.
    pub fn send(&self, ledger: &UtxoLedger, to: &PublicKey, value: u64) -> Result<Transaction, WalletError> {
        let Some(inputs) = ledger.select_inputs(self.public_key(), value) else {
            let available = self.balance(ledger);
            warn!(from = %self.address(), required = value, available, "insufficient funds");
            return Err(WalletError::InsufficientFunds {
                required: value,
                available,
            });
        };

        let tx = Transaction::new(
            self.public_key().clone(),
            to.clone(),
            value,
            inputs,
            ledger.next_sequence(),
        )
        .signed(self)?;
        Ok(tx)
    }
}

impl Signer for Wallet {
    fn identity(&self) -> &PublicKey {
        self.keypair.identity()
    }

    fn sign(&self, message: &[u8]) -> crate::crypto::Signature {
        self.keypair.sign(message)
    }
}
