//! Request command handlers

use crate::error::{CliError, Result};
use futures::future::join_all;
use reqwest::{Method, Response};
use tokenguard_sdk::{ApiError, AuthClient, ClientConfig};
use tracing::debug;

/// Handle `get`
pub async fn handle_get(config: &ClientConfig, path: &str) -> Result<()> {
    handle_send(config, "GET", path, None).await
}

/// Handle `send`
pub async fn handle_send(
    config: &ClientConfig,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<()> {
    let method = parse_method(method)?;
    let client = AuthClient::from_config(config)?;

    let mut request = client.request(method, path);
    if let Some(body) = body {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| CliError::invalid_argument(format!("Body is not valid JSON: {e}")))?;
        request = request
            .json(&value)
            .map_err(|e| CliError::invalid_argument(e.to_string()))?;
    }

    let response = client.send(request).await?;
    print_response(response).await
}

/// Handle `burst`: every path is requested concurrently through one client
pub async fn handle_burst(config: &ClientConfig, paths: &[String]) -> Result<()> {
    let client = AuthClient::from_config(config)?;
    debug!("Bursting {} requests", paths.len());

    let results = join_all(paths.iter().map(|path| {
        let client = client.clone();
        async move {
            let result = client.send(client.request(Method::GET, path)).await;
            (path, result)
        }
    }))
    .await;

    for (path, result) in results {
        match result {
            Ok(response) => println!("{:<32} {}", path, response.status()),
            Err(e) => println!("{:<32} error: {}", path, e),
        }
    }
    println!(
        "refresh calls: {}",
        client.coordinator().refresh_count()
    );
    Ok(())
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CliError::invalid_argument(format!("Unknown HTTP method: {method}")))
}

async fn print_response(response: Response) -> Result<()> {
    let status = response.status();
    let text = response.text().await.map_err(ApiError::from)?;

    println!("{status}");
    if text.is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or(text)
        ),
        Err(_) => println!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_is_case_insensitive() {
        assert_eq!(parse_method("post").unwrap(), Method::POST);
        assert_eq!(parse_method("DELETE").unwrap(), Method::DELETE);
    }

    #[test]
    fn test_parse_method_rejects_garbage() {
        assert!(matches!(
            parse_method("NOT A METHOD"),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
