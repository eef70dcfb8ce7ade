//! Main entry point for the tokenguard CLI

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use tokenguard_cli::cli::Args;
use tokenguard_common::logging::{self, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    color_eyre::config::HookBuilder::default()
        .display_location_section(false)
        .display_env_section(false)
        .install()?;

    let format = if args.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logging::init_logging(
        &args.verbosity,
        "tokenguard=warn,tokenguard_sdk=warn",
        format,
    )
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

    Ok(args.run().await?)
}
