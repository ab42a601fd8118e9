//! CLI commands module.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;
use utxochain_chain::BlockchainConfig;

mod config;
mod demo;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scripted transfer demo on a fresh chain
    Demo(demo::DemoArgs),
    /// Print the effective configuration
    Config(config::ConfigArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Demo(args) => demo::run(args),
        Commands::Config(args) => config::run(args),
    }
}

/// Load the config file if one was given, else the defaults.
fn load_config(path: Option<&Path>) -> Result<BlockchainConfig> {
    match path {
        Some(path) => BlockchainConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(BlockchainConfig::default()),
    }
}
