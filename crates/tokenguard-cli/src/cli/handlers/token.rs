//! Credential store command handlers

use crate::cli::commands::TokenAction;
use crate::error::Result;
use tokenguard_sdk::{ClientConfig, Credential, StoreKind};
use tracing::warn;

/// Handle `token` subcommands
pub async fn handle_token(config: &ClientConfig, action: TokenAction) -> Result<()> {
    if config.store.kind == StoreKind::Memory {
        warn!("The memory credential store does not outlive this process");
    }

    let store = config.store.build()?;
    match action {
        TokenAction::Set { value } => {
            store.set(Credential::new(value)).await?;
            println!("Credential stored ({})", store.name());
        }
        TokenAction::Clear => {
            store.clear().await?;
            println!("Credential cleared ({})", store.name());
        }
        TokenAction::Show => match store.get().await? {
            Some(credential) => println!("{}", credential.redacted()),
            None => println!("No credential stored"),
        },
    }
    Ok(())
}
