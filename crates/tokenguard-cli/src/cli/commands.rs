use clap::Subcommand;

/// Main CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticated GET, prints status and body
    Get {
        /// Path relative to the configured base URL
        path: String,
    },

    /// Send an arbitrary request through the pipeline
    Send {
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Path relative to the configured base URL
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Issue several GETs concurrently and report how many refreshes happened
    Burst {
        /// Paths to request, all at once
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Inspect or change the stored credential
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// End the session and clear the stored credential
    Logout,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Credential store actions
#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Store a credential
    Set {
        /// Access token value
        value: String,
    },

    /// Remove the stored credential
    Clear,

    /// Show the stored credential (redacted)
    Show,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}
