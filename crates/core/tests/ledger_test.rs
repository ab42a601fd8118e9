use std::collections::BTreeSet;
use utxochain_core::{
    Block, BlockError, Keypair, Transaction, TransactionError, UtxoLedger, Wallet, WalletError,
};

fn mint(ledger: &UtxoLedger, owner: &Wallet, value: u64) -> Transaction {
    let coinbase = Transaction::coinbase(owner.public_key().clone(), value, ledger.next_sequence());
    let mut genesis = Block::genesis();
    genesis.add_transaction(coinbase.clone(), ledger).unwrap();
    coinbase
}

#[test]
fn test_coinbase_seeds_single_output() {
    let ledger = UtxoLedger::new();
    let alice = Wallet::generate();
    assert!(!ledger.has_entry(alice.public_key()));

    let coinbase = mint(&ledger, &alice, 100);

    assert_eq!(ledger.balance(alice.public_key()), 100);
    let outputs = ledger.unspent_outputs(alice.public_key());
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].value, 100);
    assert_eq!(outputs[0].parent_id, coinbase.id);
    assert_eq!(outputs[0].recipient, *alice.public_key());
}

#[test]
fn test_spent_output_cannot_be_spent_again() {
    let ledger = UtxoLedger::new();
    let alice = Wallet::generate();
    let bob = Wallet::generate();
    let coinbase = mint(&ledger, &alice, 10);
    let output = coinbase.outputs[0].clone();

    let mut first = Transaction::new(
        alice.public_key().clone(),
        bob.public_key().clone(),
        10,
        BTreeSet::from([output.clone()]),
        ledger.next_sequence(),
    )
    .signed(&alice)
    .unwrap();
    first.process(&ledger).unwrap();
    assert_eq!(ledger.balance(bob.public_key()), 10);

    let mut second = Transaction::new(
        alice.public_key().clone(),
        bob.public_key().clone(),
        10,
        BTreeSet::from([output]),
        ledger.next_sequence(),
    )
    .signed(&alice)
    .unwrap();
    let err = second.process(&ledger).unwrap_err();
    assert_eq!(err, TransactionError::UnknownInput);
    assert_eq!(err.to_string(), "validation error: unknown input");
    assert!(second.outputs.is_empty());
}

#[test]
fn test_overdraft_leaves_ledger_unchanged() {
    let ledger = UtxoLedger::new();
    let alice = Wallet::generate();
    let bob = Wallet::generate();
    mint(&ledger, &alice, 10);
    let before = ledger.unspent_outputs(alice.public_key());

    let err = alice.send(&ledger, bob.public_key(), 50).unwrap_err();
    assert_eq!(
        err,
        WalletError::InsufficientFunds {
            required: 50,
            available: 10
        }
    );
    assert_eq!(ledger.unspent_outputs(alice.public_key()), before);
    assert_eq!(ledger.balance(bob.public_key()), 0);
    assert!(!ledger.has_entry(bob.public_key()));
}

#[test]
fn test_transfer_chain_conserves_supply() {
    let ledger = UtxoLedger::new();
    let alice = Wallet::generate();
    let bob = Wallet::generate();
    let carol = Wallet::generate();
    mint(&ledger, &alice, 100);

    let hops = [(&alice, &bob, 60), (&bob, &carol, 25), (&carol, &alice, 5), (&bob, &alice, 35)];
    for (from, to, value) in hops {
        let mut block = Block::new(utxochain_core::hash("parent"));
        let tx = from.send(&ledger, to.public_key(), value).unwrap();
        block.add_transaction(tx, &ledger).unwrap();
        assert_eq!(ledger.total_supply(), 100);
    }

    assert_eq!(ledger.balance(alice.public_key()), 80);
    assert_eq!(ledger.balance(bob.public_key()), 0);
    assert_eq!(ledger.balance(carol.public_key()), 20);
}

#[test]
fn test_foreign_signature_rejected_by_block() {
    let ledger = UtxoLedger::new();
    let alice = Wallet::generate();
    let mallory = Keypair::generate();
    let coinbase = mint(&ledger, &alice, 10);

    let mut forged = Transaction::new(
        alice.public_key().clone(),
        mallory.public_key.clone(),
        10,
        coinbase.outputs.iter().cloned().collect(),
        ledger.next_sequence(),
    );
    forged.signature = utxochain_core::Signer::sign(&mallory, forged.id.as_str().as_bytes());

    let mut block = Block::new(utxochain_core::hash("parent"));
    assert_eq!(
        block.add_transaction(forged, &ledger),
        Err(BlockError::Rejected(TransactionError::BadSignature))
    );
    assert_eq!(block.tx_count(), 0);
    assert_eq!(ledger.balance(alice.public_key()), 10);
}

#[test]
fn test_mining_meets_difficulty() {
    let ledger = UtxoLedger::new();
    let alice = Wallet::generate();
    for difficulty in 0..=4 {
        let mut block = Block::new(utxochain_core::hash("parent"));
        if difficulty == 0 {
            mint(&ledger, &alice, 100);
        }
        let bob = Wallet::generate();
        let tx = alice.send(&ledger, bob.public_key(), 1).unwrap();
        block.add_transaction(tx, &ledger).unwrap();

        block.mine(difficulty).unwrap();
        assert!(block.digest.as_str().chars().take(difficulty).all(|c| c == '0'));
        assert_eq!(block.calculate_hash(), block.digest);
        assert!(block.verify_merkle_root());
    }
}
