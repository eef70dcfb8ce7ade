use crate::cli::{commands::Commands, handlers};
use crate::error::Result;
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::PathBuf;
use tokenguard_common::ConfigLoader;
use tokenguard_sdk::ClientConfig;
use tracing::debug;

/// tokenguard - authenticated requests with single-flight credential refresh
#[derive(Parser, Debug)]
#[command(
    name = "tokenguard",
    version,
    about = "Send authenticated HTTP requests with transparent credential refresh",
    long_about = "Send authenticated HTTP requests with transparent credential refresh.

EXAMPLES:
  tokenguard token set tok_1                 # Seed the credential store
  tokenguard get /orders                     # Authenticated GET
  tokenguard send -X POST /orders -b '{}'    # Any method, JSON body
  tokenguard burst /orders /profile /cart    # Concurrent requests, one refresh
  tokenguard logout                          # End the session

Configuration is read from --config (TOML) and TOKENGUARD_* environment
variables, e.g. TOKENGUARD_HTTP__BASE_URL=https://shop.example.com"
)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true, env = "TOKENGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Args {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let config = ClientConfig::load(self.config.as_deref())?;
        debug!("Using base URL {}", config.http.base_url);

        match self.command {
            Commands::Get { path } => handlers::request::handle_get(&config, &path).await,
            Commands::Send { method, path, body } => {
                handlers::request::handle_send(&config, &method, &path, body.as_deref()).await
            }
            Commands::Burst { paths } => handlers::request::handle_burst(&config, &paths).await,
            Commands::Token { action } => handlers::token::handle_token(&config, action).await,
            Commands::Logout => handlers::session::handle_logout(&config).await,
            Commands::Config { action } => handlers::config::handle_config(&config, action),
        }
    }
}
