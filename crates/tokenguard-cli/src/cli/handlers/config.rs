//! Configuration command handlers

use crate::cli::commands::ConfigAction;
use crate::error::Result;
use tokenguard_common::ConfigLoader;
use tokenguard_sdk::ClientConfig;

/// Handle `config` subcommands
pub fn handle_config(config: &ClientConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
