//! Credential refresh call
//!
//! The coordinator treats the refresh as an opaque operation behind the
//! [`Refresher`] trait. [`HttpRefresher`] is the network implementation:
//! an empty `POST` to the refresh route that relies on the ambient session
//! cookie kept by the transport's cookie store.

use super::token_store::CredentialStore;
use super::types::{AuthError, AuthResult, Credential};
use crate::pipeline::stamper;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Obtains a new access credential
#[async_trait]
pub trait Refresher: Send + Sync {
    /// Perform exactly one refresh call
    async fn refresh(&self) -> AuthResult<Credential>;

    /// Name for logging/debugging
    fn name(&self) -> &str;
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(alias = "accessToken", alias = "token")]
    access_token: String,
}

/// Refreshes through the HTTP refresh route
pub struct HttpRefresher {
    http_client: reqwest::Client,
    url: Url,
    store: Arc<dyn CredentialStore>,
}

impl HttpRefresher {
    pub fn new(http_client: reqwest::Client, url: Url, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            http_client,
            url,
            store,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Refresher for HttpRefresher {
    async fn refresh(&self) -> AuthResult<Credential> {
        debug!("Refreshing access credential via {}", self.url);

        // Stamped like every other call; the endpoint may ignore it
        let current = match self.store.get().await {
            Ok(current) => current,
            Err(e) => {
                warn!("Could not read credential before refresh: {}", e);
                None
            }
        };
        let request = crate::pipeline::RetryableRequest::new(Method::POST, self.url.clone());
        let request = stamper::stamp(&request, current.as_ref());

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(format!("Refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: RefreshResponse = response.json().await.map_err(|e| {
            AuthError::InvalidResponse(format!("Failed to parse refresh response: {e}"))
        })?;

        if body.access_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "Refresh response carried an empty access token".to_string(),
            ));
        }

        info!("Access credential refreshed");
        Ok(Credential::new(body.access_token))
    }

    fn name(&self) -> &str {
        "http"
    }
}
