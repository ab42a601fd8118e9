//! Main blockchain orchestration.
//!
//! This module brings together the ledger, the miner, validation and the
//! pending-transaction pool.

use crate::config::{BlockchainConfig, ConfigError, MiningConfig};
use crate::mempool::{Mempool, MempoolError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use utxochain_consensus::{CancelToken, ChainValidator, IntegrityError, Miner, MiningOutcome};
use utxochain_core::{Block, BlockError, Digest, PublicKey, Transaction, TransactionError, UtxoLedger};

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("block error: {0}")]
    Block(#[from] BlockError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("mempool error: {0}")]
    Mempool(#[from] MempoolError),

    #[error("{0}")]
    Integrity(#[from] IntegrityError),

    #[error("genesis block already exists")]
    GenesisExists,

    #[error("genesis block not found")]
    MissingGenesis,

    #[error("block does not extend the current tip (expected previous {expected:?}, got {got:?})")]
    StaleTip { expected: Digest, got: Digest },

    #[error("an admitted block is still unmined; resume it before appending another")]
    PendingBlock,

    #[error("no unmined block to resume")]
    NothingToResume,
}

pub type Result<T> = std::result::Result<T, BlockchainError>;

/// An append-only chain of mined blocks over one ledger.
pub struct Blockchain {
    /// Blocks in order, genesis first.
    blocks: Vec<Block>,
    /// Unspent-output ledger shared with block builders.
    ledger: Arc<UtxoLedger>,
    /// Proof-of-work miner.
    miner: Miner,
    /// Cancels in-flight mining.
    cancel: CancelToken,
    /// Pending transactions.
    mempool: Mempool,
    /// Block whose transactions are settled but whose mining failed.
    unmined: Option<Block>,
    /// Configuration.
    config: BlockchainConfig,
}

impl Blockchain {
    /// Create an empty chain with a fresh ledger.
    pub fn new(config: BlockchainConfig) -> Result<Self> {
        Self::with_ledger(config, Arc::new(UtxoLedger::new()))
    }

    /// Create an empty chain over an existing ledger handle.
    pub fn with_ledger(config: BlockchainConfig, ledger: Arc<UtxoLedger>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            blocks: Vec::new(),
            ledger,
            miner: Miner::new(config.mining.into()),
            cancel: CancelToken::new(),
            mempool: Mempool::new(config.mempool.capacity),
            unmined: None,
            config,
        })
    }

    /// The ledger this chain settles against.
    pub fn ledger(&self) -> &Arc<UtxoLedger> {
        &self.ledger
    }

    /// Required leading zeros for every block.
    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    /// Get the configuration.
    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    /// Replace the mining settings, e.g. to raise the budget before
    /// resuming an unmined block.
    pub fn set_mining_config(&mut self, mining: MiningConfig) -> Result<()> {
        let mut config = self.config.clone();
        config.mining = mining;
        config.validate()?;
        self.miner = Miner::new(mining.into());
        self.config = config;
        Ok(())
    }

    /// Token that cancels mining in progress on this chain.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// All blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no block has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Height of the tip (genesis is 0).
    pub fn height(&self) -> Option<u64> {
        self.blocks.len().checked_sub(1).map(|h| h as u64)
    }

    /// The latest block.
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Digest the next block must link to.
    fn expected_previous(&self) -> Digest {
        self.tip()
            .map(|b| b.digest.clone())
            .unwrap_or_else(Digest::genesis_sentinel)
    }

    /// An empty, unmined block linked to the current tip.
    pub fn next_block(&self) -> Result<Block> {
        let tip = self.tip().ok_or(BlockchainError::MissingGenesis)?;
        Ok(Block::new(tip.digest.clone()))
    }

    /// Block admitted into the ledger whose mining was cancelled or ran out
    /// of budget. It is mined again by [`Blockchain::resume`],
    /// [`Blockchain::mine_pending`] or [`Blockchain::genesis`].
    pub fn unmined_block(&self) -> Option<&Block> {
        self.unmined.as_ref()
    }

    /// Mint `amount` to `recipient` in a new genesis block and append it.
    ///
    /// If an earlier genesis call settled the coinbase but failed to mine,
    /// that block is resumed and `recipient` and `amount` are ignored.
    pub fn genesis(&mut self, recipient: PublicKey, amount: u64) -> Result<&Block> {
        if !self.blocks.is_empty() {
            return Err(BlockchainError::GenesisExists);
        }
        if self.unmined.is_some() {
            return self.resume();
        }
        let coinbase = Transaction::coinbase(recipient, amount, self.ledger.next_sequence());
        let mut block = Block::genesis();
        block.add_transaction(coinbase, &self.ledger)?;
        self.mine_and_push(block)
    }

    /// Mine `block` at the chain difficulty and append it.
    ///
    /// The block must link to the tip (or be a genesis block on an empty
    /// chain). If mining fails after the block's transactions were settled,
    /// the block is kept as the unmined block so the ledger never holds value
    /// that no block can record.
    pub fn append(&mut self, block: Block) -> Result<&Block> {
        if self.unmined.is_some() {
            return Err(BlockchainError::PendingBlock);
        }
        self.check_extends_tip(&block)?;
        self.mine_and_push(block)
    }

    /// Mine the unmined block left by an earlier failure and append it.
    pub fn resume(&mut self) -> Result<&Block> {
        match self.unmined.take() {
            Some(block) => {
                info!(txs = block.tx_count(), "resuming unmined block");
                self.mine_and_push(block)
            }
            None => Err(BlockchainError::NothingToResume),
        }
    }

    /// Append a block mined elsewhere, e.g. by a [`Miner`] on another thread.
    ///
    /// The tip may have moved while the block was mined, so linkage is
    /// checked against the tip now, followed by the block's digest, merkle
    /// root and proof-of-work.
    pub fn append_mined(&mut self, block: Block) -> Result<&Block> {
        if self.unmined.is_some() {
            return Err(BlockchainError::PendingBlock);
        }
        self.check_extends_tip(&block)?;
        let index = self.blocks.len();
        ChainValidator::validate_block_contents(&block, index)?;
        ChainValidator::validate_pow(&block, self.config.difficulty, index)?;
        Ok(self.push(block))
    }

    fn mine_and_push(&mut self, mut block: Block) -> Result<&Block> {
        match self.miner.mine(&mut block, self.config.difficulty, &self.cancel) {
            Ok(MiningOutcome { nonce, attempts, .. }) => {
                info!(nonce, attempts, "block mined");
                Ok(self.push(block))
            }
            Err(err) => {
                if block.tx_count() > 0 {
                    warn!(txs = block.tx_count(), error = %err, "keeping unmined block");
                    self.unmined = Some(block);
                }
                Err(err.into())
            }
        }
    }

    fn push(&mut self, block: Block) -> &Block {
        info!(
            height = self.blocks.len(),
            nonce = block.nonce,
            txs = block.tx_count(),
            digest = ?block.digest,
            "block appended"
        );
        self.blocks.push(block);
        &self.blocks[self.blocks.len() - 1]
    }

    fn check_extends_tip(&self, block: &Block) -> Result<()> {
        let expected = self.expected_previous();
        if block.previous_digest != expected {
            return Err(BlockchainError::StaleTip {
                expected,
                got: block.previous_digest.clone(),
            });
        }
        Ok(())
    }

    /// Replay digest, linkage and proof-of-work checks over the whole chain.
    pub fn validate(&self) -> std::result::Result<(), IntegrityError> {
        ChainValidator::validate_chain(&self.blocks, self.config.difficulty)
    }

    /// Queue a signed transaction for the next block.
    pub fn submit(&mut self, tx: Transaction) -> Result<()> {
        self.mempool.add(tx)?;
        Ok(())
    }

    /// Number of queued transactions.
    pub fn pending(&self) -> usize {
        self.mempool.len()
    }

    /// Admit queued transactions into a new block, then mine and append it.
    ///
    /// Transactions are settled in submission order; ones the ledger rejects
    /// are dropped. An unmined block from an earlier failure is extended
    /// instead of starting a new one. Returns the appended block and the
    /// rejected transactions with their errors.
    pub fn mine_pending(&mut self) -> Result<(&Block, Vec<(Transaction, BlockError)>)> {
        let mut block = match self.unmined.take() {
            Some(block) => block,
            None => self.next_block()?,
        };
        let mut rejected = Vec::new();

        if !block.is_genesis() {
            for tx in self.mempool.drain(self.config.mempool.capacity) {
                if let Err(err) = block.add_transaction(tx.clone(), &self.ledger) {
                    warn!(tx = ?tx.id, error = %err, "dropping pending transaction");
                    rejected.push((tx, err));
                }
            }
        }

        let appended = self.mine_and_push(block)?;
        Ok((appended, rejected))
    }

    /// Balance of `identity` in the chain's ledger.
    pub fn balance(&self, identity: &PublicKey) -> u64 {
        self.ledger.balance(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utxochain_consensus::Violation;
    use utxochain_core::{hash, Wallet};

    fn setup(difficulty: usize) -> (Blockchain, Wallet, Wallet) {
        let mut chain = Blockchain::new(BlockchainConfig::with_difficulty(difficulty)).unwrap();
        let alice = Wallet::generate();
        let bob = Wallet::generate();
        chain.genesis(alice.public_key().clone(), 100).unwrap();
        (chain, alice, bob)
    }

    fn pay(chain: &mut Blockchain, from: &Wallet, to: &Wallet, value: u64) {
        let tx = from.send(chain.ledger(), to.public_key(), value).unwrap();
        let mut block = chain.next_block().unwrap();
        block.add_transaction(tx, chain.ledger()).unwrap();
        chain.append(block).unwrap();
    }

    #[test]
    fn test_genesis_chain_validates() {
        for difficulty in 0..=3 {
            let (chain, alice, _) = setup(difficulty);
            assert_eq!(chain.len(), 1);
            assert_eq!(chain.height(), Some(0));
            assert!(chain.tip().unwrap().is_genesis());
            assert_eq!(chain.balance(alice.public_key()), 100);
            assert!(chain.validate().is_ok());
        }
    }

    #[test]
    fn test_second_genesis_rejected() {
        let (mut chain, alice, _) = setup(1);
        assert!(matches!(
            chain.genesis(alice.public_key().clone(), 5),
            Err(BlockchainError::GenesisExists)
        ));
    }

    #[test]
    fn test_next_block_requires_genesis() {
        let chain = Blockchain::new(BlockchainConfig::with_difficulty(1)).unwrap();
        assert!(chain.is_empty());
        assert!(matches!(chain.next_block(), Err(BlockchainError::MissingGenesis)));
    }

    #[test]
    fn test_append_transfers() {
        let (mut chain, alice, bob) = setup(2);
        pay(&mut chain, &alice, &bob, 40);
        pay(&mut chain, &bob, &alice, 15);

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.balance(alice.public_key()), 75);
        assert_eq!(chain.balance(bob.public_key()), 25);
        assert!(chain.validate().is_ok());
        for block in chain.blocks() {
            assert!(block.digest.meets_difficulty(2));
        }
    }

    #[test]
    fn test_append_rejects_stale_block() {
        let (mut chain, alice, bob) = setup(1);
        let stale = chain.next_block().unwrap();
        pay(&mut chain, &alice, &bob, 10);

        let mut stale = stale;
        let tx = alice.send(chain.ledger(), bob.public_key(), 10).unwrap();
        stale.add_transaction(tx, chain.ledger()).unwrap();

        assert!(matches!(chain.append(stale), Err(BlockchainError::StaleTip { .. })));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_append_unlinked_block_rejected() {
        let (mut chain, _, _) = setup(1);
        let block = Block::new(hash("nowhere"));
        assert!(matches!(chain.append(block), Err(BlockchainError::StaleTip { .. })));
    }

    #[test]
    fn test_tampered_block_fails_at_its_index() {
        let (mut chain, alice, bob) = setup(2);
        pay(&mut chain, &alice, &bob, 40);
        pay(&mut chain, &alice, &bob, 10);
        assert!(chain.validate().is_ok());

        chain.blocks[1].transactions.pop();
        let fake = Transaction::coinbase(bob.public_key().clone(), 1_000, 99);
        chain.blocks[1].transactions.push(fake);

        let err = chain.validate().unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.violation, Violation::MerkleMismatch);
    }

    #[test]
    fn test_relinked_block_breaks_chain() {
        let (mut chain, alice, bob) = setup(1);
        pay(&mut chain, &alice, &bob, 40);
        pay(&mut chain, &alice, &bob, 10);

        chain.blocks[2].previous_digest = hash("elsewhere");
        let err = chain.validate().unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.violation, Violation::DigestMismatch);
    }

    #[test]
    fn test_mine_pending_drops_rejected() {
        let (mut chain, alice, bob) = setup(1);
        let good = alice.send(chain.ledger(), bob.public_key(), 30).unwrap();
        // Spends the same output as `good`; settles second, so it fails.
        let double = alice.send(chain.ledger(), bob.public_key(), 30).unwrap();

        chain.submit(good.clone()).unwrap();
        chain.submit(double.clone()).unwrap();
        assert_eq!(chain.pending(), 2);

        let (block, rejected) = chain.mine_pending().unwrap();
        assert_eq!(block.tx_count(), 1);
        assert_eq!(block.transactions[0].id, good.id);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0.id, double.id);
        assert_eq!(rejected[0].1, BlockError::Rejected(TransactionError::UnknownInput));

        assert_eq!(chain.pending(), 0);
        assert_eq!(chain.balance(bob.public_key()), 30);
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn test_mine_pending_with_nothing_valid_fails() {
        let (mut chain, _, _) = setup(1);
        assert!(matches!(
            chain.mine_pending(),
            Err(BlockchainError::Block(BlockError::Merkle(_)))
        ));
        assert_eq!(chain.len(), 1);
    }

    /// Value paid to `who` across all appended blocks.
    fn recorded_to(chain: &Blockchain, who: &Wallet) -> u64 {
        chain
            .blocks()
            .iter()
            .flat_map(|b| &b.transactions)
            .filter(|tx| tx.recipient == *who.public_key())
            .map(|tx| tx.value)
            .sum()
    }

    #[test]
    fn test_cancelled_genesis_resumes() {
        let mut config = BlockchainConfig::with_difficulty(1);
        config.mining.threads = 2;
        let mut chain = Blockchain::new(config).unwrap();
        chain.cancel_token().cancel();

        let alice = Wallet::generate();
        let err = chain.genesis(alice.public_key().clone(), 100).unwrap_err();
        assert!(matches!(err, BlockchainError::Block(BlockError::Cancelled { .. })));
        assert!(chain.is_empty());
        assert!(chain.unmined_block().unwrap().is_genesis());
        assert_eq!(chain.balance(alice.public_key()), 100);

        chain.cancel_token().reset();
        let genesis = chain.genesis(alice.public_key().clone(), 100).unwrap();
        assert_eq!(genesis.tx_count(), 1);
        assert!(chain.unmined_block().is_none());
        assert_eq!(chain.len(), 1);
        assert_eq!(recorded_to(&chain, &alice), chain.balance(alice.public_key()));
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn test_cancelled_mine_pending_keeps_block() {
        let (mut chain, alice, bob) = setup(1);
        let tx = alice.send(chain.ledger(), bob.public_key(), 40).unwrap();
        chain.submit(tx).unwrap();

        chain.cancel_token().cancel();
        assert!(matches!(
            chain.mine_pending(),
            Err(BlockchainError::Block(BlockError::Cancelled { .. }))
        ));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.pending(), 0);
        assert_eq!(chain.unmined_block().unwrap().tx_count(), 1);
        assert_eq!(chain.balance(bob.public_key()), 40);

        // Other appends wait for the unmined block.
        let next = chain.next_block().unwrap();
        assert!(matches!(chain.append(next), Err(BlockchainError::PendingBlock)));

        // A later submission joins the resumed block.
        chain.cancel_token().reset();
        let more = alice.send(chain.ledger(), bob.public_key(), 5).unwrap();
        chain.submit(more).unwrap();
        let (block, rejected) = chain.mine_pending().unwrap();
        assert_eq!(block.tx_count(), 2);
        assert!(rejected.is_empty());

        assert_eq!(chain.len(), 2);
        assert_eq!(recorded_to(&chain, &bob), 45);
        assert_eq!(chain.balance(bob.public_key()), 45);
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn test_exhausted_budget_resumes_after_raising_it() {
        let (mut chain, alice, bob) = setup(1);
        chain
            .set_mining_config(MiningConfig {
                threads: 1,
                max_attempts: Some(1),
            })
            .unwrap();
        chain.config.difficulty = 64;

        let tx = alice.send(chain.ledger(), bob.public_key(), 30).unwrap();
        chain.submit(tx).unwrap();
        assert!(matches!(
            chain.mine_pending(),
            Err(BlockchainError::Block(BlockError::DifficultyNotMet { difficulty: 64, attempts: 1 }))
        ));
        assert!(chain.unmined_block().is_some());

        chain.config.difficulty = 1;
        chain.set_mining_config(MiningConfig::default()).unwrap();
        chain.resume().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(recorded_to(&chain, &bob), chain.balance(bob.public_key()));
        assert!(matches!(chain.resume(), Err(BlockchainError::NothingToResume)));
    }

    #[test]
    fn test_set_mining_config_validates() {
        let (mut chain, _, _) = setup(1);
        let bad = MiningConfig {
            threads: 0,
            max_attempts: None,
        };
        assert!(matches!(chain.set_mining_config(bad), Err(BlockchainError::Config(_))));
        assert_eq!(chain.config().mining.threads, 1);
    }

    #[test]
    fn test_append_mined_checks_tip_after_mining() {
        let (mut chain, alice, bob) = setup(1);
        let miner = Miner::default();

        let mut detached = chain.next_block().unwrap();
        let tx = alice.send(chain.ledger(), bob.public_key(), 10).unwrap();
        detached.add_transaction(tx, chain.ledger()).unwrap();
        miner.mine(&mut detached, chain.difficulty(), &CancelToken::new()).unwrap();

        // The tip moves while the detached block is mined.
        pay(&mut chain, &alice, &bob, 20);
        assert!(matches!(
            chain.append_mined(detached),
            Err(BlockchainError::StaleTip { .. })
        ));

        let mut fresh = chain.next_block().unwrap();
        let tx = alice.send(chain.ledger(), bob.public_key(), 5).unwrap();
        fresh.add_transaction(tx, chain.ledger()).unwrap();
        let unmined = fresh.clone();
        assert!(matches!(chain.append_mined(unmined), Err(BlockchainError::Integrity(_))));

        miner.mine(&mut fresh, chain.difficulty(), &CancelToken::new()).unwrap();
        chain.append_mined(fresh).unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = BlockchainConfig::default();
        config.mining.threads = 0;
        assert!(matches!(Blockchain::new(config), Err(BlockchainError::Config(_))));
    }
}
