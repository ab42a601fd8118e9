//! Demo report rendering, as colored text or JSON.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Display;
use utxochain_chain::Blockchain;
use utxochain_core::{Block, Wallet};

/// One scripted action and whether the chain accepted it.
#[derive(Debug, Serialize)]
pub struct Step {
    pub action: String,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Step {
    pub fn ok(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(action: impl Into<String>, reason: impl Display) -> Self {
        Self {
            action: action.into(),
            accepted: false,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Balance {
    pub name: String,
    pub address: String,
    pub balance: u64,
}

#[derive(Debug, Serialize)]
pub struct DemoReport<'a> {
    pub difficulty: usize,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_error: Option<String>,
    pub steps: Vec<Step>,
    pub balances: Vec<Balance>,
    pub blocks: &'a [Block],
}

impl<'a> DemoReport<'a> {
    pub fn new(chain: &'a Blockchain, wallets: &[(&str, &Wallet)], steps: Vec<Step>) -> Self {
        let integrity_error = chain.validate().err().map(|e| e.to_string());
        let balances = wallets
            .iter()
            .map(|(name, wallet)| Balance {
                name: name.to_string(),
                address: wallet.address().to_hex(),
                balance: chain.balance(wallet.public_key()),
            })
            .collect();

        Self {
            difficulty: chain.difficulty(),
            valid: integrity_error.is_none(),
            integrity_error,
            steps,
            balances,
            blocks: chain.blocks(),
        }
    }

    pub fn print(&self) {
        println!();
        println!("{}", "Steps:".bold().cyan());
        for step in &self.steps {
            match &step.reason {
                None => println!("  {}  {}", "✓".green().bold(), step.action),
                Some(reason) => println!(
                    "  {}  {} ({})",
                    "✗".red().bold(),
                    step.action,
                    reason.dimmed()
                ),
            }
        }

        println!();
        println!("{}", format!("Blocks (difficulty {}):", self.difficulty).bold().cyan());
        for (height, block) in self.blocks.iter().enumerate() {
            println!(
                "  #{:<3} {}  nonce {:<8} txs {}",
                height,
                short(block.digest.as_str()).bright_yellow(),
                block.nonce,
                block.tx_count()
            );
            for tx in &block.transactions {
                println!(
                    "         {} {} -> {} : {}",
                    short(tx.id.as_str()).dimmed(),
                    tx.sender,
                    tx.recipient,
                    tx.value.to_string().bold()
                );
            }
        }

        println!();
        println!("{}", "Balances:".bold().cyan());
        for entry in &self.balances {
            println!(
                "  {:<6} {}  {}",
                entry.name,
                entry.address.bright_yellow(),
                entry.balance.to_string().bold()
            );
        }

        println!();
        match &self.integrity_error {
            None => println!("{}  Chain valid", "✓".green().bold()),
            Some(err) => println!("{}  {}", "✗".red().bold(), err.red()),
        }
    }
}

fn short(digest: &str) -> &str {
    &digest[..digest.len().min(16)]
}
