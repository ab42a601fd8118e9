//! Transactions, their outputs, and settlement against the ledger.

use crate::crypto::{PublicKey, Signature, Signer};
use crate::hash::{hash_concat, Digest};
use crate::ledger::UtxoLedger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur while building or settling a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("validation error: bad signature")]
    BadSignature,

    #[error("validation error: unknown input")]
    UnknownInput,

    #[error("validation error: malformed transaction: {0}")]
    Malformed(String),

    #[error("validation error: coinbase already minted")]
    CoinbaseAlreadyMinted,

    #[error("validation error: signer does not match sender")]
    SignerMismatch,

    #[error("insufficient funds (required {required}, available {available})")]
    InsufficientFunds { required: u64, available: u64 },
}

impl TransactionError {
    /// Every transaction error leaves the ledger untouched; the sender may
    /// retry with a corrected transaction.
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// True for the `ValidationError` family (as opposed to insufficient funds).
    pub fn is_validation(&self) -> bool {
        !matches!(self, TransactionError::InsufficientFunds { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// An atomic spendable unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    /// `hash(recipient ++ value ++ parent_id)`.
    pub id: Digest,
    /// Id of the transaction that produced this output.
    pub parent_id: Digest,
    /// Amount carried by the output.
    pub value: u64,
    /// Identity allowed to spend the output.
    pub recipient: PublicKey,
}

impl TransactionOutput {
    /// Create an output and compute its id.
    pub fn new(recipient: PublicKey, value: u64, parent_id: Digest) -> Self {
        let id = hash_concat(&[&recipient.to_hex(), &value.to_string(), parent_id.as_str()]);
        Self {
            id,
            parent_id,
            value,
            recipient,
        }
    }

    /// Check whether this output belongs to the given identity.
    pub fn is_owned_by(&self, identity: &PublicKey) -> bool {
        self.recipient == *identity
    }
}

/// A payment from `sender` to `recipient` funded by previously unspent outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// `hash(sender ++ recipient ++ value ++ sequence)`, fixed before signing.
    pub id: Digest,
    /// Sender identity (the recipient itself for a coinbase).
    pub sender: PublicKey,
    /// Recipient identity.
    pub recipient: PublicKey,
    /// Amount to transfer.
    pub value: u64,
    /// Monotonic counter that keeps otherwise identical payments distinct.
    pub sequence: u64,
    /// Snapshot of the sender's outputs being spent.
    pub inputs: BTreeSet<TransactionOutput>,
    /// Outputs produced on settlement: recipient first, then change.
    pub outputs: Vec<TransactionOutput>,
    /// Sender's signature over `id`.
    pub signature: Signature,
    /// Set only on the transaction minting the genesis supply.
    #[serde(default)]
    pub coinbase: bool,
}

impl Transaction {
    /// Create an unsigned transfer spending `inputs`.
    pub fn new(
        sender: PublicKey,
        recipient: PublicKey,
        value: u64,
        inputs: BTreeSet<TransactionOutput>,
        sequence: u64,
    ) -> Self {
        let id = Self::compute_id(&sender, &recipient, value, sequence);
        Self {
            id,
            sender,
            recipient,
            value,
            sequence,
            inputs,
            outputs: Vec::new(),
            signature: Signature::default(),
            coinbase: false,
        }
    }

    /// Create the coinbase that mints `value` to `recipient`.
    ///
    /// The single output is built immediately; settlement only has to insert
    /// it into the ledger.
    pub fn coinbase(recipient: PublicKey, value: u64, sequence: u64) -> Self {
        let id = Self::compute_id(&recipient, &recipient, value, sequence);
        let output = TransactionOutput::new(recipient.clone(), value, id.clone());
        Self {
            id,
            sender: recipient.clone(),
            recipient,
            value,
            sequence,
            inputs: BTreeSet::new(),
            outputs: vec![output],
            signature: Signature::default(),
            coinbase: true,
        }
    }

    /// Compute a transaction id.
    pub fn compute_id(sender: &PublicKey, recipient: &PublicKey, value: u64, sequence: u64) -> Digest {
        hash_concat(&[
            &sender.to_hex(),
            &recipient.to_hex(),
            &value.to_string(),
            &sequence.to_string(),
        ])
    }

    /// Sign the transaction id. The signer must be the sender.
    pub fn sign(&mut self, signer: &impl Signer) -> Result<()> {
        if signer.identity() != &self.sender {
            return Err(TransactionError::SignerMismatch);
        }
        self.signature = signer.sign(self.id.as_str().as_bytes());
        Ok(())
    }

    /// Create a signed transaction.
    pub fn signed(mut self, signer: &impl Signer) -> Result<Self> {
        self.sign(signer)?;
        Ok(self)
    }

    /// Verify the signature over the id against the sender's identity.
    pub fn verify(&self) -> Result<()> {
        self.sender
            .verify(self.id.as_str().as_bytes(), &self.signature)
            .map_err(|_| TransactionError::BadSignature)
    }

    /// Sum of the claimed input values.
    pub fn inputs_value(&self) -> u64 {
        self.inputs.iter().map(|o| o.value).sum()
    }

    /// Sum of the produced output values.
    pub fn outputs_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    /// Whether outputs have been populated by settlement (or by `coinbase`).
    pub fn is_settled(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// Outputs a transfer produces when its inputs total `available`.
    pub(crate) fn build_outputs(&self, available: u64) -> Vec<TransactionOutput> {
        let mut outputs = vec![TransactionOutput::new(
            self.recipient.clone(),
            self.value,
            self.id.clone(),
        )];
        let change = available - self.value;
        if change > 0 {
            outputs.push(TransactionOutput::new(self.sender.clone(), change, self.id.clone()));
        }
        outputs
    }

    /// Validate this transfer and settle it against the ledger.
    ///
    /// The signature is checked first; input ownership, funds and the ledger
    /// update then run under a single ledger lock. On any error neither the
    /// ledger nor `self` is modified.
    pub fn process(&mut self, ledger: &UtxoLedger) -> Result<()> {
        if self.coinbase {
            return Err(TransactionError::Malformed(
                "coinbase outside the genesis block".to_string(),
            ));
        }
        if self.is_settled() {
            return Err(TransactionError::Malformed("already settled".to_string()));
        }
        if self.inputs.is_empty() {
            return Err(TransactionError::Malformed("no inputs".to_string()));
        }
        if self.id != Self::compute_id(&self.sender, &self.recipient, self.value, self.sequence) {
            return Err(TransactionError::Malformed("id does not match contents".to_string()));
        }

        self.verify()?;

        self.outputs = ledger.settle(self)?;
        Ok(())
    }
}
