//! Authenticated HTTP client
//!
//! [`AuthClient`] wraps a `reqwest::Client` and runs every request through the
//! pipeline:
//!
//! 1. the stamper attaches `Authorization: Bearer <credential>` when one is stored
//! 2. the request is sent
//! 3. the guard inspects the status; a first 401 on a business route is
//!    handed to the [`RefreshCoordinator`], everything else is returned as is
//! 4. once the refresh succeeds the request is replayed exactly once with the
//!    new credential; if it fails every affected caller gets
//!    [`ApiError::SessionExpired`]. A refresh abandoned by its leader is
//!    picked up by a waiter; only repeated abandonment yields
//!    [`ApiError::RefreshInterrupted`]
//!
//! Clones share the same credential store and coordinator, so single-flight
//! holds across every clone of one client.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use tokenguard_sdk::{ClientBuilder, MemoryCredentialStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> tokenguard_sdk::Result<()> {
//! let client = ClientBuilder::default()
//!     .base_url("https://shop.example.com")
//!     .credential_store(Arc::new(MemoryCredentialStore::with_credential("tok_1")))
//!     .build()?;
//!
//! let orders: serde_json::Value = client.get_json("/orders").await?;
//! println!("{orders}");
//!
//! let mut events = client.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("session event: {event:?}");
//!     }
//! });
//! # Ok(())
//! # }
//! ```

use crate::{
    auth::{
        CredentialStore, HttpRefresher, MemoryCredentialStore, Refresher, SessionEndReason,
        SessionEvent,
    },
    config::{ClientConfig, RoutesConfig, DEFAULT_BASE_URL},
    error::{ApiError, ErrorResponse, Result},
    pipeline::{
        stamper, AuthRoutes, PassReason, RefreshCoordinator, ResponseGuard, RetryableRequest,
        Verdict,
    },
};
use reqwest::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

struct Inner {
    http_client: reqwest::Client,
    base_url: Url,
    logout_url: Url,
    guard: ResponseGuard,
    coordinator: RefreshCoordinator,
}

/// HTTP client that keeps one session authenticated
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<Inner>,
}

impl AuthClient {
    /// Build a client from loaded configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let store = config.store.build().map_err(ApiError::Storage)?;
        ClientBuilder::from_config(config)
            .credential_store(store)
            .build()
    }

    // ===== Pipeline =====

    /// Start a request description for `path` relative to the base URL
    pub fn request(&self, method: Method, path: &str) -> RetryableRequest {
        RetryableRequest::new(method, join_url(&self.inner.base_url, path))
    }

    /// Send a request through the pipeline.
    ///
    /// Returns the raw response for every status, including a 401 that is not
    /// refresh-eligible. Only transport failures and refresh failures are errors.
    pub async fn send(&self, mut request: RetryableRequest) -> Result<Response> {
        let response = self.dispatch(&request).await?;
        let status = response.status();

        match self.inner.guard.evaluate(status, &request) {
            Verdict::PassThrough(reason) => {
                if reason != PassReason::NotUnauthorized {
                    debug!(
                        method = %request.method(),
                        path = request.path(),
                        ?reason,
                        "Unauthorized response is not refresh-eligible"
                    );
                }
                Ok(response)
            }
            Verdict::Eligible => {
                request.mark_retried();
                debug!(
                    method = %request.method(),
                    path = request.path(),
                    "Credential rejected, waiting for refresh"
                );

                let credential = self
                    .inner
                    .coordinator
                    .refresh()
                    .await
                    .map_err(ApiError::from_refresh_failure)?;

                let replayed = self
                    .inner
                    .http_client
                    .execute(stamper::stamp(&request, Some(&credential)))
                    .await?;

                if replayed.status() == StatusCode::UNAUTHORIZED {
                    warn!(
                        path = request.path(),
                        "Replayed request rejected again, not retrying"
                    );
                }
                Ok(replayed)
            }
        }
    }

    // ===== Typed helpers =====

    /// GET and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.request(Method::GET, path);
        let response = self.send(request).await?;
        self.handle_response(response).await
    }

    /// POST a JSON body and decode the JSON answer
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.json_request(Method::POST, path, body)?;
        let response = self.send(request).await?;
        self.handle_response(response).await
    }

    /// PUT a JSON body and decode the JSON answer
    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.json_request(Method::PUT, path, body)?;
        let response = self.send(request).await?;
        self.handle_response(response).await
    }

    /// DELETE, ignoring any body
    pub async fn delete(&self, path: &str) -> Result<()> {
        let request = self.request(Method::DELETE, path);
        let response = self.send(request).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            self.handle_error_response(response).await
        }
    }

    // ===== Session =====

    /// End the session: best-effort call to the logout route, clear the
    /// stored credential and notify subscribers.
    pub async fn logout(&self) -> Result<()> {
        let request = RetryableRequest::post(self.inner.logout_url.clone());
        match self.send(request).await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "Logout call was rejected");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Logout call failed"),
        }

        self.credential_store()
            .clear()
            .await
            .map_err(ApiError::Storage)?;
        self.inner.coordinator.emit(SessionEvent::Ended {
            reason: SessionEndReason::LoggedOut,
        });
        info!("Logged out");
        Ok(())
    }

    /// Subscribe to refresh and session-ended notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.coordinator.subscribe()
    }

    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        self.inner.coordinator.store()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ===== Private Helper Methods =====

    fn json_request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<RetryableRequest> {
        self.request(method, path)
            .json(body)
            .map_err(|e| ApiError::InvalidRequest {
                message: format!("Failed to encode body: {e}"),
            })
    }

    /// Stamp with the stored credential and send once
    async fn dispatch(&self, request: &RetryableRequest) -> Result<Response> {
        let credential = match self.credential_store().get().await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Could not read stored credential, sending unauthenticated");
                None
            }
        };

        debug!(method = %request.method(), path = request.path(), "Sending request");
        let response = self
            .inner
            .http_client
            .execute(stamper::stamp(request, credential.as_ref()))
            .await?;
        Ok(response)
    }

    /// Handle successful response
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        if response.status().is_success() {
            response.json().await.map_err(ApiError::HttpClient)
        } else {
            self.handle_error_response(response).await
        }
    }

    /// Map an unsuccessful response to an error
    async fn handle_error_response<T>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&error_text)
            .map(|e| e.message)
            .unwrap_or(error_text);

        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Authentication { message }),
            StatusCode::FORBIDDEN => Err(ApiError::Authorization { message }),
            StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimitExceeded),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound { resource: message }),
            StatusCode::BAD_REQUEST => Err(ApiError::BadRequest { message }),
            _ => Err(ApiError::Status {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

impl fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("store", &self.credential_store().name())
            .field("coordinator", &self.inner.coordinator)
            .finish()
    }
}

/// Join `path` onto `base`, keeping any path prefix of the base URL
fn join_url(base: &Url, path: &str) -> Url {
    let mut joined = base.clone();
    let prefix = base.path().trim_end_matches('/');
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };
    joined.set_path(&format!("{}/{}", prefix, path.trim_start_matches('/')));
    joined.set_query(query);
    joined
}

/// Builder for constructing an AuthClient with custom configuration
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
    routes: Option<RoutesConfig>,
    store: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn Refresher>>,
}

impl ClientBuilder {
    /// Seed the builder from configuration; the store is not built here
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            base_url: Some(config.http.base_url.clone()),
            timeout: Some(config.request_timeout()),
            connect_timeout: Some(config.connect_timeout()),
            refresh_timeout: Some(config.refresh_timeout()),
            routes: Some(config.routes.clone()),
            store: None,
            refresher: None,
        }
    }

    /// Set the base URL for the API
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Upper bound on a single refresh call
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Override the auth route paths
    pub fn routes(mut self, routes: RoutesConfig) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Credential store; defaults to an empty in-memory store
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the HTTP refresh call
    pub fn refresher(mut self, refresher: Arc<dyn Refresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<AuthClient> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base_url).map_err(|e| ApiError::InvalidRequest {
            message: format!("Invalid base URL '{base_url}': {e}"),
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .connect_timeout(self.connect_timeout.unwrap_or(Duration::from_secs(10)))
            .cookie_store(true)
            .build()
            .map_err(ApiError::HttpClient)?;

        let routes = self.routes.unwrap_or_default();
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));

        let refresher = match self.refresher {
            Some(refresher) => refresher,
            None => Arc::new(HttpRefresher::new(
                http_client.clone(),
                join_url(&base_url, &routes.refresh),
                store.clone(),
            )),
        };

        let coordinator = RefreshCoordinator::new(
            refresher,
            store,
            self.refresh_timeout.unwrap_or(Duration::from_secs(30)),
        );

        Ok(AuthClient {
            inner: Arc::new(Inner {
                logout_url: join_url(&base_url, &routes.logout),
                guard: ResponseGuard::new(AuthRoutes::from(&routes)),
                http_client,
                base_url,
                coordinator,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_keeps_base_prefix() {
        let base = Url::parse("https://shop.example.com/api/").unwrap();
        assert_eq!(
            join_url(&base, "/orders").as_str(),
            "https://shop.example.com/api/orders"
        );
        assert_eq!(
            join_url(&base, "cart?page=2").as_str(),
            "https://shop.example.com/api/cart?page=2"
        );

        let root = Url::parse("https://shop.example.com").unwrap();
        assert_eq!(
            join_url(&root, "/auth/refresh").as_str(),
            "https://shop.example.com/auth/refresh"
        );
    }

    #[test]
    fn test_builder_defaults() {
        let client = ClientBuilder::default().build().unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/");
        assert_eq!(client.credential_store().name(), "memory");
        assert!(!client.coordinator().is_refreshing());
    }

    #[test]
    fn test_builder_rejects_bad_base_url() {
        let result = ClientBuilder::default().base_url("not a url").build();
        assert!(matches!(result, Err(ApiError::InvalidRequest { .. })));
    }

    #[test]
    fn test_builder_with_all_options() {
        let client = ClientBuilder::default()
            .base_url("https://shop.example.com")
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .refresh_timeout(Duration::from_secs(10))
            .routes(RoutesConfig::default())
            .build();

        assert!(client.is_ok());
    }

    #[test]
    fn test_clones_share_coordinator() {
        let client = ClientBuilder::default().build().unwrap();
        let clone = client.clone();
        assert!(std::ptr::eq(client.coordinator(), clone.coordinator()));
    }
}
