//! Scripted demo command.
//!
//! Seeds a coinbase to alice, pays bob, pays back, then attempts a double
//! spend and an overdraft. Every block is mined at the configured difficulty
//! and the chain is validated at the end.

use crate::report::{DemoReport, Step};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;
use utxochain_chain::{Blockchain, BlockchainConfig};
use utxochain_core::Wallet;

const GENESIS_AMOUNT: u64 = 100;

#[derive(Args)]
pub struct DemoArgs {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Required leading zero hex characters
    #[arg(short, long)]
    difficulty: Option<usize>,

    /// Mining worker threads
    #[arg(short, long)]
    threads: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl DemoArgs {
    fn effective_config(&self) -> Result<BlockchainConfig> {
        let mut config = super::load_config(self.config.as_deref())?;
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        if let Some(threads) = self.threads {
            config.mining.threads = threads;
        }
        Ok(config)
    }
}

pub fn run(args: DemoArgs) -> Result<()> {
    let config = args.effective_config()?;
    let mut chain = Blockchain::new(config).context("Failed to create chain")?;
    let alice = Wallet::generate();
    let bob = Wallet::generate();

    info!(difficulty = chain.difficulty(), "starting demo");
    let steps = script(&mut chain, &alice, &bob)?;

    let report = DemoReport::new(&chain, &[("alice", &alice), ("bob", &bob)], steps);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }
    Ok(())
}

/// Run the transfers. Expected rejections become failed steps; anything else
/// aborts the demo.
fn script(chain: &mut Blockchain, alice: &Wallet, bob: &Wallet) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    chain
        .genesis(alice.public_key().clone(), GENESIS_AMOUNT)
        .context("Failed to mine genesis block")?;
    steps.push(Step::ok(format!("coinbase {} to alice", GENESIS_AMOUNT)));

    // Both payments snapshot the same coinbase output; only the first settles.
    let pay = alice.send(chain.ledger(), bob.public_key(), 40)?;
    let double = alice.send(chain.ledger(), bob.public_key(), 40)?;
    chain.submit(pay)?;
    chain.submit(double)?;
    let (_, rejected) = chain.mine_pending().context("Failed to mine block")?;
    steps.push(Step::ok("alice pays bob 40"));
    for (_, err) in rejected {
        steps.push(Step::rejected("alice pays bob 40 again from the same output", err));
    }

    let refund = bob.send(chain.ledger(), alice.public_key(), 15)?;
    chain.submit(refund)?;
    chain.mine_pending().context("Failed to mine block")?;
    steps.push(Step::ok("bob pays alice 15"));

    match bob.send(chain.ledger(), alice.public_key(), 1_000) {
        Ok(tx) => {
            chain.submit(tx)?;
            chain.mine_pending().context("Failed to mine block")?;
            steps.push(Step::ok("bob pays alice 1000"));
        }
        Err(err) => steps.push(Step::rejected("bob pays alice 1000", err)),
    }

    Ok(steps)
}
