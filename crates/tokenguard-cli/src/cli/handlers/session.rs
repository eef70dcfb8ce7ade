//! Session command handlers

use crate::error::Result;
use tokenguard_sdk::{AuthClient, ClientConfig};

/// Handle `logout`
pub async fn handle_logout(config: &ClientConfig) -> Result<()> {
    let client = AuthClient::from_config(config)?;
    client.logout().await?;
    println!("Logged out");
    Ok(())
}
