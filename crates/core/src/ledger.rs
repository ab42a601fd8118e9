//! The authoritative unspent-output ledger.
//!
//! The ledger is the only mutable state shared between transactions. All of it
//! sits behind one lock: settlement validates ownership and funds and applies
//! the update inside a single critical section, so two transactions can never
//! both consume the same output.

use crate::crypto::PublicKey;
use crate::transaction::{Result, Transaction, TransactionError, TransactionOutput};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
struct LedgerState {
    unspent: HashMap<PublicKey, BTreeSet<TransactionOutput>>,
    minted: bool,
}

/// Mapping identity → currently unspent outputs.
#[derive(Debug, Default)]
pub struct UtxoLedger {
    state: Mutex<LedgerState>,
    sequence: AtomicU64,
}

impl UtxoLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next transaction sequence number.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Snapshot of the unspent outputs owned by `identity`.
    pub fn unspent_outputs(&self, identity: &PublicKey) -> Vec<TransactionOutput> {
        self.state
            .lock()
            .unspent
            .get(identity)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sum of the unspent output values owned by `identity`.
    pub fn balance(&self, identity: &PublicKey) -> u64 {
        self.state
            .lock()
            .unspent
            .get(identity)
            .map(|set| set.iter().map(|o| o.value).sum())
            .unwrap_or(0)
    }

    /// Check whether `output` is currently unspent under `identity`.
    pub fn contains(&self, identity: &PublicKey, output: &TransactionOutput) -> bool {
        self.state
            .lock()
            .unspent
            .get(identity)
            .is_some_and(|set| set.contains(output))
    }

    /// Whether the ledger has an entry for `identity`, even an empty one.
    pub fn has_entry(&self, identity: &PublicKey) -> bool {
        self.state.lock().unspent.contains_key(identity)
    }

    /// Pick unspent outputs of `identity`, in ledger order, until they cover
    /// `amount`. Returns `None` when the whole balance is not enough.
    pub fn select_inputs(&self, identity: &PublicKey, amount: u64) -> Option<BTreeSet<TransactionOutput>> {
        let state = self.state.lock();
        let owned = state.unspent.get(identity);

        let mut selected = BTreeSet::new();
        let mut total = 0u64;
        for output in owned.into_iter().flatten() {
            if total >= amount && !selected.is_empty() {
                break;
            }
            total = total.saturating_add(output.value);
            selected.insert(output.clone());
        }

        (total >= amount && !selected.is_empty()).then_some(selected)
    }

    /// Total value held across all identities.
    pub fn total_supply(&self) -> u64 {
        self.state
            .lock()
            .unspent
            .values()
            .flat_map(|set| set.iter())
            .map(|o| o.value)
            .sum()
    }

    /// Number of identities with a ledger entry.
    pub fn identity_count(&self) -> usize {
        self.state.lock().unspent.len()
    }

    /// Seed the ledger from the coinbase transaction. Allowed once.
    pub fn mint(&self, coinbase: &Transaction) -> Result<()> {
        if !coinbase.coinbase || coinbase.outputs.len() != 1 {
            return Err(TransactionError::Malformed("not a coinbase".to_string()));
        }

        let mut state = self.state.lock();
        if state.minted {
            return Err(TransactionError::CoinbaseAlreadyMinted);
        }
        for output in &coinbase.outputs {
            state
                .unspent
                .entry(output.recipient.clone())
                .or_default()
                .insert(output.clone());
        }
        state.minted = true;

        debug!(tx = ?coinbase.id, value = coinbase.value, "coinbase minted");
        Ok(())
    }

    /// Validate the claimed inputs of `tx` and apply it.
    ///
    /// Returns the produced outputs. The ledger is left untouched on error.
    pub(crate) fn settle(&self, tx: &Transaction) -> Result<Vec<TransactionOutput>> {
        let mut state = self.state.lock();

        let owned = state
            .unspent
            .get(&tx.sender)
            .ok_or(TransactionError::UnknownInput)?;
        if !tx.inputs.iter().all(|input| owned.contains(input)) {
            return Err(TransactionError::UnknownInput);
        }

        let available = tx.inputs_value();
        if available < tx.value {
            return Err(TransactionError::InsufficientFunds {
                required: tx.value,
                available,
            });
        }

        let outputs = tx.build_outputs(available);

        if let Some(owned) = state.unspent.get_mut(&tx.sender) {
            for input in &tx.inputs {
                owned.remove(input);
            }
        }
        for output in &outputs {
            state
                .unspent
                .entry(output.recipient.clone())
                .or_default()
                .insert(output.clone());
        }

        debug!(
            tx = ?tx.id,
            inputs = tx.inputs.len(),
            outputs = outputs.len(),
            value = tx.value,
            "transaction settled"
        );
        Ok(outputs)
    }
}
