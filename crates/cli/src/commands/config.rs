//! Print configuration command.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ConfigArgs {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}
